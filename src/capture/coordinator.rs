//! Capture transaction coordinator.
//!
//! Drives one capture end to end: target policy check, full-frame grab,
//! pixel-exact crop, delivery to the host. At most one transaction is in
//! flight at any time; a new request while one is active is rejected, not
//! queued. The `active` token replaces the ambient re-entrancy flags the
//! overlay would otherwise need.

use base64::Engine;
use serde_json::json;

use super::frame::{CaptureError, FrameSource};
use super::region::{self, CropError};
use super::{SelectionRect, SurfaceTarget};
use crate::events::{Event, EventBus};
use crate::session::SessionController;

/// Selections at or below this edge length (CSS pixels) are treated as a
/// cancelled drag, not a capture request.
pub const MIN_SELECTION_CSS_PX: f64 = 5.0;

/// Privileged address schemes the overlay must never be injected into.
const RESTRICTED_SCHEMES: &[&str] = &[
    "chrome://",
    "chrome-extension://",
    "edge://",
    "devtools://",
    "about:",
];

/// The Web Store rejects injection as well, on an ordinary https origin.
const RESTRICTED_ORIGINS: &[&str] = &[
    "https://chrome.google.com/webstore",
    "https://chromewebstore.google.com/",
];

#[derive(Debug, thiserror::Error)]
pub enum CaptureFlowError {
    #[error("Cannot activate on this page: {url}")]
    RestrictedTarget { url: String },

    #[error("A capture is already in progress")]
    Busy,

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Crop(#[from] CropError),

    #[error("Delivery failed: cropped image was not accepted by the host")]
    Delivery,
}

/// How a completed selection resolved.
#[derive(Debug)]
pub enum SelectionOutcome {
    /// Selection too small — normal user cancellation, nothing captured.
    Cancelled,
    /// Cropped image delivered to the host.
    Captured { image_data: String },
}

pub struct CaptureCoordinator {
    frames: Box<dyn FrameSource>,
    events: EventBus,
    active: bool,
}

impl CaptureCoordinator {
    pub fn new(frames: Box<dyn FrameSource>, events: EventBus) -> Self {
        Self {
            frames,
            events,
            active: false,
        }
    }

    /// Validate the target and arm the transaction token. The transaction
    /// continues when the overlay reports a selection.
    pub fn begin_capture(&mut self, target: &SurfaceTarget) -> Result<(), CaptureFlowError> {
        if self.active {
            return Err(CaptureFlowError::Busy);
        }
        if is_restricted(&target.url) {
            log::warn!("[CAPTURE] Rejecting restricted target: {}", target.url);
            return Err(CaptureFlowError::RestrictedTarget {
                url: target.url.clone(),
            });
        }
        self.active = true;
        log::info!("[CAPTURE] Transaction armed for {}", target.url);
        Ok(())
    }

    /// Abort before any frame was requested (overlay dismissed). Free.
    pub fn cancel(&mut self) {
        if self.active {
            log::info!("[CAPTURE] Transaction cancelled before capture");
        }
        self.active = false;
    }

    /// The overlay reported a selection: run capture → crop → send.
    /// The transaction token is released on every exit path; once the frame
    /// has been requested the transaction runs to completion or failure.
    pub async fn complete_selection(
        &mut self,
        rect: SelectionRect,
        dpr: f64,
        session: &mut SessionController,
    ) -> Result<SelectionOutcome, CaptureFlowError> {
        if rect.width <= MIN_SELECTION_CSS_PX || rect.height <= MIN_SELECTION_CSS_PX {
            log::info!("[CAPTURE] Selection too small, cancelling");
            self.active = false;
            return Ok(SelectionOutcome::Cancelled);
        }

        // The selection may arrive without a tracked begin_capture (the
        // worker can restart between injection and selection); it still
        // holds the token while it runs.
        self.active = true;
        let result = self.run_capture(rect, dpr, session).await;
        self.active = false;
        result
    }

    async fn run_capture(
        &mut self,
        rect: SelectionRect,
        dpr: f64,
        session: &mut SessionController,
    ) -> Result<SelectionOutcome, CaptureFlowError> {
        let start = std::time::Instant::now();

        let full_frame = self.frames.capture_frame().await?;
        let png_bytes = region::crop_to_png(&full_frame, &rect, dpr)?;
        let image_data = base64::engine::general_purpose::STANDARD.encode(&png_bytes);

        let envelope = json!({
            "type": "image_data",
            "imageData": image_data,
        });
        if !session.send(&envelope).await {
            // Image is discarded, not cached: the host never received it.
            return Err(CaptureFlowError::Delivery);
        }

        session.record_image(image_data.clone());
        self.events.publish(Event::ScreenshotTaken {
            image_data: image_data.clone(),
        });

        log::info!(
            "[CAPTURE] Cropped {}x{} at ({},{}) dpr {} in {}ms — {} bytes",
            rect.width,
            rect.height,
            rect.x,
            rect.y,
            dpr,
            start.elapsed().as_millis(),
            png_bytes.len()
        );

        Ok(SelectionOutcome::Captured { image_data })
    }
}

fn is_restricted(url: &str) -> bool {
    RESTRICTED_SCHEMES.iter().any(|s| url.starts_with(s))
        || RESTRICTED_ORIGINS.iter().any(|o| url.starts_with(o))
}
