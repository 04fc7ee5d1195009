//! Screen capture module
//! Uses `xcap` for cross-platform screenshots of the primary display.
//! The whole screen is captured; the model locates the relevant widgets itself.
//! Debug: set `DEBUG_CAPTURE=1` to keep the last frame in `screenshots/last_scan.png`.

use anyhow::{Context, Result, bail};
use image::{DynamicImage, GenericImageView, ImageFormat};
use std::env;
use std::fs;
use std::io::Cursor;
use std::time::Instant;
use tracing::debug;
use xcap::Monitor;

use crate::error::HintError;

const DEBUG_DIR: &str = "screenshots";
const DEBUG_FILE: &str = "screenshots/last_scan.png";

/// Source of full-screen frames.
pub trait ScreenGrabber: Send + Sync {
    fn grab(&self) -> Result<DynamicImage, HintError>;
}

/// Captures the first monitor reported by the OS.
/// Permissions note: On macOS, grant "Screen & System Audio Recording" permission to the
/// terminal (or the app bundle) in System Settings > Privacy & Security.
#[derive(Debug, Default, Clone, Copy)]
pub struct PrimaryMonitor;

impl ScreenGrabber for PrimaryMonitor {
    fn grab(&self) -> Result<DynamicImage, HintError> {
        capture_primary().map_err(|e| HintError::Capture(format!("{e:#}")))
    }
}

fn capture_primary() -> Result<DynamicImage> {
    let start = Instant::now();

    let monitors = Monitor::all().context("Failed to enumerate monitors")?;

    let primary_monitor = monitors.first().context("No monitors found")?;

    let screenshot_raw = primary_monitor
        .capture_image()
        .context("Failed to capture image. On macOS, ensure Screen Recording permission is granted in System Settings > Privacy & Security")?;

    let screenshot = DynamicImage::ImageRgba8(screenshot_raw);
    if screenshot.dimensions() == (0, 0) {
        bail!("Captured empty screenshot - possible permission issue or no display");
    }

    if env::var_os("DEBUG_CAPTURE").is_some() {
        fs::create_dir_all(DEBUG_DIR).context("Failed to create screenshots/ debug directory")?;
        screenshot
            .save(DEBUG_FILE)
            .context("Failed to save debug capture to screenshots/")?;
    }

    let (w, h) = screenshot.dimensions();
    debug!("Captured {}x{} in {:?}", w, h, start.elapsed());

    Ok(screenshot)
}

/// Encodes a frame as PNG for upload.
pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, HintError> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(|e| HintError::Capture(format!("Failed to encode PNG: {e}")))?;
    Ok(bytes)
}
