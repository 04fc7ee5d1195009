//! Pure rendering rule: overlay state + current result -> primitives to paint.

use egui::{Align2, Color32, Pos2, Rect, Vec2, pos2, vec2};

use super::state::{Overlay, OverlayState};
use crate::hint::{AnalysisResult, HintKind};

const DOT_RADIUS: f32 = 4.0;
const DOT_MARGIN: f32 = 19.0;
const INPUT_PLACEHOLDER: &str = "type here";

const IDLE: Color32 = Color32::from_rgb(100, 100, 100);
const SCANNING: Color32 = Color32::from_rgb(0, 150, 255);
const SUCCESS: Color32 = Color32::from_rgb(0, 255, 100);
const ERROR: Color32 = Color32::from_rgb(255, 50, 50);

#[derive(Clone, Debug, PartialEq)]
pub enum Primitive {
    Dot {
        center: Pos2,
        radius: f32,
        color: Color32,
    },
    Frame {
        rect: Rect,
        fill: Color32,
        stroke: Color32,
        stroke_width: f32,
    },
    Label {
        pos: Pos2,
        anchor: Align2,
        text: String,
        size: f32,
        color: Color32,
    },
}

/// Builds the paint list for one frame. Empty while disarmed or hidden.
pub fn render(overlay: &Overlay, screen: Vec2) -> Vec<Primitive> {
    if overlay.state() == OverlayState::Disarmed || !overlay.is_visible() {
        return Vec::new();
    }

    let mut out = vec![status_dot(overlay, screen)];
    if let Some(result) = overlay.current() {
        hint_primitives(result, screen, &mut out);
    }
    out
}

fn status_dot(overlay: &Overlay, screen: Vec2) -> Primitive {
    let color = match overlay.state() {
        OverlayState::Scanning => {
            let [r, g, b, _] = SCANNING.to_array();
            Color32::from_rgba_unmultiplied(r, g, b, overlay.pulse().alpha())
        }
        OverlayState::Success => SUCCESS,
        OverlayState::Error => ERROR,
        OverlayState::Armed | OverlayState::Disarmed => IDLE,
    };
    Primitive::Dot {
        center: pos2(DOT_MARGIN, screen.y - DOT_MARGIN),
        radius: DOT_RADIUS,
        color,
    }
}

fn hint_primitives(result: &AnalysisResult, screen: Vec2, out: &mut Vec<Primitive>) {
    for (i, item) in result.items.iter().enumerate() {
        if item.bbox.is_degenerate() {
            continue;
        }
        let px = item.bbox.to_pixels(screen.x, screen.y);
        let rect = Rect::from_min_size(pos2(px.x, px.y), vec2(px.w, px.h));

        match result.kind {
            HintKind::Choice => out.push(Primitive::Frame {
                rect,
                fill: Color32::from_rgba_unmultiplied(0, 100, 255, 80),
                stroke: Color32::from_rgba_unmultiplied(0, 100, 255, 150),
                stroke_width: 1.0,
            }),
            HintKind::Order => {
                out.push(Primitive::Frame {
                    rect,
                    fill: Color32::from_rgba_unmultiplied(0, 255, 100, 40),
                    stroke: Color32::from_rgba_unmultiplied(0, 255, 100, 180),
                    stroke_width: 2.0,
                });
                out.push(Primitive::Label {
                    pos: rect.left_top() + vec2(-4.0, 0.0),
                    anchor: Align2::RIGHT_TOP,
                    text: (i + 1).to_string(),
                    size: 15.0,
                    color: Color32::WHITE,
                });
            }
            HintKind::Input => {
                out.push(Primitive::Frame {
                    rect,
                    fill: Color32::from_rgba_unmultiplied(255, 200, 0, 60),
                    stroke: Color32::from_rgba_unmultiplied(255, 200, 0, 200),
                    stroke_width: 2.0,
                });
                out.push(Primitive::Label {
                    pos: rect.left_top() + vec2(0.0, -5.0),
                    anchor: Align2::LEFT_BOTTOM,
                    text: item.text.clone().unwrap_or_else(|| INPUT_PLACEHOLDER.to_string()),
                    size: 12.0,
                    color: Color32::WHITE,
                });
            }
        }
    }
}
