//! Pure region cropping logic — functional core.
//!
//! This module has zero infrastructure dependencies.
//! It takes encoded pixel data in, returns encoded pixel data out.

use image::ImageFormat;
use std::io::Cursor;

use super::SelectionRect;

/// Crops a PNG-encoded full frame to the given selection and returns PNG bytes.
///
/// The selection is expressed in CSS pixels while the frame is captured at
/// physical-pixel resolution, so every geometric quantity is scaled by the
/// device pixel ratio before sampling. The output is exactly
/// `round(rect.width * dpr)` x `round(rect.height * dpr)`.
///
/// This is a pure function with no side effects. It decodes, crops, and
/// re-encodes, so callers should keep it off latency-sensitive paths.
pub fn crop_to_png(
    full_frame_png: &[u8],
    rect: &SelectionRect,
    dpr: f64,
) -> Result<Vec<u8>, CropError> {
    if full_frame_png.is_empty() {
        return Err(CropError::EmptyInput);
    }
    if dpr <= 0.0 {
        return Err(CropError::InvalidScale(dpr));
    }
    if rect.x < 0.0 || rect.y < 0.0 {
        return Err(CropError::NegativeOrigin { x: rect.x, y: rect.y });
    }

    // Scaled geometry is kept in u64 so an absurd origin in an otherwise
    // well-formed envelope is rejected as out of bounds rather than
    // overflowing u32 arithmetic.
    let source_x = (rect.x * dpr).round() as u64;
    let source_y = (rect.y * dpr).round() as u64;
    let scaled_width = (rect.width * dpr).round() as u64;
    let scaled_height = (rect.height * dpr).round() as u64;

    if scaled_width == 0 || scaled_height == 0 {
        return Err(CropError::ZeroDimension);
    }

    let frame = image::load_from_memory(full_frame_png)
        .map_err(|e| CropError::DecodeFailed(e.to_string()))?;

    let (frame_width, frame_height) = (frame.width(), frame.height());
    let fits = source_x
        .checked_add(scaled_width)
        .is_some_and(|end| end <= u64::from(frame_width))
        && source_y
            .checked_add(scaled_height)
            .is_some_and(|end| end <= u64::from(frame_height));
    if !fits {
        return Err(CropError::OutOfBounds {
            requested: (source_x, source_y, scaled_width, scaled_height),
            frame_size: (frame_width, frame_height),
        });
    }

    // The bounds check caps every value at the frame dimensions, so the
    // narrowing casts are exact.
    let cropped = frame.crop_imm(
        source_x as u32,
        source_y as u32,
        scaled_width as u32,
        scaled_height as u32,
    );

    let mut png_bytes: Vec<u8> = Vec::new();
    cropped
        .write_to(&mut Cursor::new(&mut png_bytes), ImageFormat::Png)
        .map_err(|e| CropError::EncodingFailed(e.to_string()))?;

    Ok(png_bytes)
}

#[derive(Debug, thiserror::Error)]
pub enum CropError {
    #[error("No frame data to crop")]
    EmptyInput,

    #[error("Device pixel ratio must be positive, got {0}")]
    InvalidScale(f64),

    #[error("Selection origin ({x},{y}) is negative")]
    NegativeOrigin { x: f64, y: f64 },

    #[error("Scaled selection has zero width or height")]
    ZeroDimension,

    #[error("Failed to decode full frame: {0}")]
    DecodeFailed(String),

    #[error(
        "Scaled selection ({},{},{},{}) exceeds frame bounds ({}x{})",
        requested.0, requested.1, requested.2, requested.3,
        frame_size.0, frame_size.1
    )]
    OutOfBounds {
        requested: (u64, u64, u64, u64),
        frame_size: (u32, u32),
    },

    #[error("PNG encoding failed: {0}")]
    EncodingFailed(String),
}
