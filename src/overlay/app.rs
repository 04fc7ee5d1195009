//! eframe host for the overlay: a transparent, click-through, always-on-top full-screen layer.
//! This is the only thread that owns [`Overlay`]; hotkeys and scan workers talk to it through a
//! bounded channel.

use anyhow::Result;
use egui::viewport::WindowLevel;
use egui::{FontId, Id, LayerId, Order, Shape, Stroke, ViewportBuilder, ViewportCommand};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tracing::{debug, error, info, warn};

use super::render::{Primitive, render};
use super::state::{Command, Overlay, OverlayEvent, OverlayState};
use crate::config::Settings;
use crate::hotkey::{self, HotkeyBindings};
use crate::scanner::Scanner;

const EVENT_QUEUE_CAPACITY: usize = 64;
const PULSE_INTERVAL: Duration = Duration::from_millis(50);
const APP_NAME: &str = "hintlens";

struct OverlayApp {
    overlay: Overlay,
    events_rx: Receiver<OverlayEvent>,
    events_tx: Sender<OverlayEvent>,
    scanner: Arc<Scanner>,
    runtime: Handle,
    last_tick: Instant,
}

/// Opens the overlay window and blocks until it is closed (quit hotkey).
pub fn run(settings: &Settings, scanner: Arc<Scanner>, runtime: Handle) -> Result<()> {
    let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
    let bindings = HotkeyBindings::from_settings(&settings.hotkeys);

    let options = eframe::NativeOptions {
        viewport: ViewportBuilder::default()
            .with_title(APP_NAME)
            .with_transparent(true)
            .with_decorations(false)
            .with_fullscreen(true)
            .with_always_on_top()
            .with_mouse_passthrough(true)
            .with_taskbar(false),
        ..Default::default()
    };

    info!(
        "Overlay ready. {} arms, {} scans, {} quits",
        settings.hotkeys.arm, settings.hotkeys.scan, settings.hotkeys.quit
    );

    eframe::run_native(
        APP_NAME,
        options,
        Box::new(move |cc| {
            hotkey::spawn_listener(bindings, events_tx.clone(), cc.egui_ctx.clone());
            Ok(Box::new(OverlayApp {
                overlay: Overlay::new(),
                events_rx,
                events_tx,
                scanner,
                runtime,
                last_tick: Instant::now(),
            }))
        }),
    )
    .map_err(|e| anyhow::anyhow!("Overlay window failed: {}", e))
}

impl OverlayApp {
    fn handle(&mut self, ctx: &egui::Context, event: OverlayEvent) {
        let name = event.name();
        let before = self.overlay.state();

        match self.overlay.apply(event) {
            Ok(command) => {
                let after = self.overlay.state();
                if before != after {
                    info!("{}: {:?} -> {:?}", name, before, after);
                }
                match after {
                    OverlayState::Error => {
                        if let Some(message) = self.overlay.last_error() {
                            warn!("Scan failed: {}", message);
                        }
                    }
                    OverlayState::Success if before != after => {
                        if let Some(hint) = self.overlay.current() {
                            info!("Showing hint:\n{}", hint);
                        }
                    }
                    _ => {}
                }
                self.execute(ctx, command);
            }
            Err(e) => debug!("Ignored {} in {:?}: {}", name, before, e),
        }
    }

    fn execute(&mut self, ctx: &egui::Context, command: Command) {
        match command {
            Command::None => {}
            Command::Raise => {
                ctx.send_viewport_cmd(ViewportCommand::Visible(true));
                ctx.send_viewport_cmd(ViewportCommand::WindowLevel(WindowLevel::AlwaysOnTop));
            }
            Command::StartScan => self.start_scan(ctx),
            Command::Quit => {
                info!("Quit requested, closing overlay");
                ctx.send_viewport_cmd(ViewportCommand::Close);
            }
        }
    }

    /// Runs one capture-and-analyze cycle on a short-lived worker thread.
    fn start_scan(&mut self, ctx: &egui::Context) {
        let scanner = Arc::clone(&self.scanner);
        let runtime = self.runtime.clone();
        let events_tx = self.events_tx.clone();
        let worker_ctx = ctx.clone();

        let spawned = thread::Builder::new()
            .name("scan-worker".to_string())
            .spawn(move || {
                let outcome = runtime.block_on(scanner.scan()).map_err(|e| e.to_string());
                if events_tx
                    .blocking_send(OverlayEvent::ScanCompleted(outcome))
                    .is_err()
                {
                    debug!("Overlay closed before the scan finished");
                }
                worker_ctx.request_repaint();
            });

        if let Err(e) = spawned {
            error!("Failed to start scan worker: {}", e);
            let failed = OverlayEvent::ScanCompleted(Err(format!("Failed to start scan worker: {}", e)));
            self.handle(ctx, failed);
        }
    }

    fn paint(&self, ctx: &egui::Context) {
        let screen = ctx.screen_rect().size();
        let painter = ctx.layer_painter(LayerId::new(Order::Foreground, Id::new("hintlens_layer")));

        for primitive in render(&self.overlay, screen) {
            match primitive {
                Primitive::Dot { center, radius, color } => {
                    painter.circle_filled(center, radius, color);
                }
                Primitive::Frame {
                    rect,
                    fill,
                    stroke,
                    stroke_width,
                } => {
                    painter.rect_filled(rect, 0.0, fill);
                    painter.add(Shape::closed_line(
                        vec![rect.left_top(), rect.right_top(), rect.right_bottom(), rect.left_bottom()],
                        Stroke::new(stroke_width, stroke),
                    ));
                }
                Primitive::Label {
                    pos,
                    anchor,
                    text,
                    size,
                    color,
                } => {
                    painter.text(pos, anchor, text, FontId::proportional(size), color);
                }
            }
        }
    }
}

impl eframe::App for OverlayApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle(ctx, event);
        }

        if self.last_tick.elapsed() >= PULSE_INTERVAL {
            self.overlay.tick();
            self.last_tick = Instant::now();
        }

        self.paint(ctx);
        ctx.request_repaint_after(PULSE_INTERVAL);
    }

    fn clear_color(&self, _visuals: &egui::Visuals) -> [f32; 4] {
        [0.0; 4]
    }
}
