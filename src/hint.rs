//! Structured hints returned by the vision model.
//! The model replies with free text that should contain one JSON object:
//! `{"type": "A"|"B"|"C", "results": [{"box": [top, left, bottom, right], "text": "..."}]}`
//! Boxes are normalised to a 0-1000 scale on both axes.

use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use tracing::warn;

use crate::error::HintError;

/// Scale of normalised box coordinates.
pub const NORMALIZED_SCALE: f32 = 1000.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub enum HintKind {
    /// Highlight the correct option.
    #[serde(rename = "A")]
    Choice,
    /// Number the items in the order they belong.
    #[serde(rename = "B")]
    Order,
    /// Show text to type into a field.
    #[serde(rename = "C")]
    Input,
}

impl fmt::Display for HintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HintKind::Choice => write!(f, "choice"),
            HintKind::Order => write!(f, "order"),
            HintKind::Input => write!(f, "input"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NormalizedBox {
    pub top: f32,
    pub left: f32,
    pub bottom: f32,
    pub right: f32,
}

/// Screen-space rectangle in pixels (or egui points).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PixelRect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl NormalizedBox {
    /// Accepts exactly four finite components within `0..=1000`.
    fn from_components(components: &[f64]) -> Option<Self> {
        let range = 0.0..=f64::from(NORMALIZED_SCALE);
        if !components.iter().all(|c| range.contains(c)) {
            return None;
        }
        match components {
            [top, left, bottom, right] => Some(Self {
                top: *top as f32,
                left: *left as f32,
                bottom: *bottom as f32,
                right: *right as f32,
            }),
            _ => None,
        }
    }

    /// Maps to screen space: `pixel = normalized * dimension / 1000`.
    pub fn to_pixels(&self, width: f32, height: f32) -> PixelRect {
        let x = self.left * width / NORMALIZED_SCALE;
        let y = self.top * height / NORMALIZED_SCALE;
        PixelRect {
            x,
            y,
            w: self.right * width / NORMALIZED_SCALE - x,
            h: self.bottom * height / NORMALIZED_SCALE - y,
        }
    }

    pub fn is_degenerate(&self) -> bool {
        self.right <= self.left || self.bottom <= self.top
    }
}

impl fmt::Display for NormalizedBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}, {}, {}]",
            self.top, self.left, self.bottom, self.right
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct HintItem {
    pub bbox: NormalizedBox,
    pub text: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AnalysisResult {
    pub kind: HintKind,
    pub items: Vec<HintItem>,
}

impl fmt::Display for AnalysisResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.items.is_empty() {
            return write!(f, "No {} hint found", self.kind);
        }
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            let text = item.text.as_deref().unwrap_or("");
            match self.kind {
                HintKind::Choice if text.is_empty() => write!(f, "Choose option at {}", item.bbox)?,
                HintKind::Choice => write!(f, "Choose \"{}\" at {}", text, item.bbox)?,
                HintKind::Order if text.is_empty() => write!(f, "{}. item at {}", i + 1, item.bbox)?,
                HintKind::Order => write!(f, "{}. {}", i + 1, text)?,
                HintKind::Input => write!(f, "Type \"{}\" into field at {}", text, item.bbox)?,
            }
        }
        Ok(())
    }
}

// *************** Wire format ***************

#[derive(Deserialize)]
struct RawPayload {
    #[serde(rename = "type")]
    kind: HintKind,
    #[serde(default)]
    results: Vec<Value>,
}

#[derive(Deserialize)]
struct RawItem {
    #[serde(rename = "box")]
    bbox: Vec<f64>,
    #[serde(default)]
    text: Option<String>,
}

/// Returns the span from the first `{` to the last `}` inclusive.
fn json_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Extracts and decodes the hint payload from a raw model reply.
/// Malformed items are dropped; a missing or undecodable payload is an error.
pub fn parse_response(text: &str) -> Result<AnalysisResult, HintError> {
    let span = json_span(text)
        .ok_or_else(|| HintError::Parse("no JSON object in model reply".to_string()))?;

    let payload: RawPayload =
        serde_json::from_str(span).map_err(|e| HintError::Parse(e.to_string()))?;

    let items = payload
        .results
        .into_iter()
        .enumerate()
        .filter_map(|(i, value)| match serde_json::from_value::<RawItem>(value) {
            Ok(raw) => match NormalizedBox::from_components(&raw.bbox) {
                Some(bbox) => Some(HintItem { bbox, text: raw.text }),
                None => {
                    warn!("Skipping hint item {}: box {:?} is not four numbers in 0..=1000", i, raw.bbox);
                    None
                }
            },
            Err(e) => {
                warn!("Skipping malformed hint item {}: {}", i, e);
                None
            }
        })
        .collect();

    Ok(AnalysisResult {
        kind: payload.kind,
        items,
    })
}
