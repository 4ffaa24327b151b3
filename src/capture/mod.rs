//! Screen capture domain — public API.
//!
//! This module owns the capture-and-crop pipeline: the pure crop engine,
//! the full-frame source, and the coordinator that drives one capture
//! transaction end to end.

mod coordinator;
mod frame;
mod region;

pub use coordinator::{CaptureCoordinator, CaptureFlowError, SelectionOutcome};
pub use frame::{CaptureError, FrameSource, ScreenFrameSource};
pub use region::{crop_to_png, CropError};

use serde::Deserialize;

/// A user-drawn selection in document coordinates (CSS pixels,
/// already scroll-adjusted by the overlay).
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SelectionRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// The surface a capture is requested against, identified by its address.
#[derive(Debug, Clone, Deserialize)]
pub struct SurfaceTarget {
    pub url: String,
}
