//! Full-frame capture — the infrastructure layer that talks to the OS.
//!
//! `FrameSource` is the seam the coordinator depends on; the production
//! implementation grabs the primary monitor with `xcap` and re-encodes it
//! as PNG, which is how the frame travels through the rest of the pipeline.

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use xcap::Monitor;

/// Produces a PNG-encoded frame of the visible surface at physical-pixel
/// resolution.
#[async_trait]
pub trait FrameSource: Send + Sync {
    async fn capture_frame(&self) -> Result<Vec<u8>, CaptureError>;
}

/// Production frame source backed by the primary monitor.
pub struct ScreenFrameSource;

#[async_trait]
impl FrameSource for ScreenFrameSource {
    /// Grab and encode run under `spawn_blocking`; both are CPU/OS-bound
    /// and must not stall the event loop.
    async fn capture_frame(&self) -> Result<Vec<u8>, CaptureError> {
        tokio::task::spawn_blocking(capture_primary_monitor_png)
            .await
            .map_err(|e| CaptureError::CaptureFailed(format!("Capture task failed: {}", e)))?
    }
}

/// Captures the primary monitor and returns it as PNG bytes.
fn capture_primary_monitor_png() -> Result<Vec<u8>, CaptureError> {
    let image = capture_primary_monitor()?;

    let mut png_bytes: Vec<u8> = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut png_bytes), ImageFormat::Png)
        .map_err(|e| CaptureError::EncodingFailed(e.to_string()))?;

    if png_bytes.is_empty() {
        return Err(CaptureError::EmptyFrame);
    }
    Ok(png_bytes)
}

/// Captures the primary monitor's screen as a `DynamicImage`.
fn capture_primary_monitor() -> Result<DynamicImage, CaptureError> {
    let monitors = Monitor::all().map_err(|e| CaptureError::MonitorEnumeration(e.to_string()))?;

    let primary = monitors
        .into_iter()
        .find(|m| m.is_primary().unwrap_or(false))
        .or_else(|| {
            // Fallback: if no monitor reports as primary, use the first one
            let all = Monitor::all().ok()?;
            all.into_iter().next()
        })
        .ok_or(CaptureError::NoPrimaryMonitor)?;

    let image = primary
        .capture_image()
        .map_err(|e| CaptureError::CaptureFailed(e.to_string()))?;

    Ok(DynamicImage::ImageRgba8(image))
}

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("Failed to enumerate monitors: {0}")]
    MonitorEnumeration(String),

    #[error("No primary monitor found")]
    NoPrimaryMonitor,

    #[error("Screen capture failed: {0}")]
    CaptureFailed(String),

    #[error("Capture produced no frame data")]
    EmptyFrame,

    #[error("Frame encoding failed: {0}")]
    EncodingFailed(String),
}
