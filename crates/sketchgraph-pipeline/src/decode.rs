//! Image decoding and canonicalisation.
//!
//! Accepts raw image bytes (PNG, JPEG, BMP, WebP) or an already decoded
//! [`DynamicImage`] of any colour depth and produces the canonical
//! 3-channel `RgbImage` every stage starts from. Alpha is dropped.

use crate::types::{DynamicImage, PipelineError, RgbImage};

/// Decode raw image bytes.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
#[must_use = "returns the decoded image"]
pub fn decode(bytes: &[u8]) -> Result<DynamicImage, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }
    Ok(image::load_from_memory(bytes)?)
}

/// Convert any decoded image to 8-bit RGB.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidImage`] if either dimension is zero.
#[must_use = "returns the canonical RGB image"]
pub fn canonicalize(image: &DynamicImage) -> Result<RgbImage, PipelineError> {
    if image.width() == 0 || image.height() == 0 {
        return Err(PipelineError::InvalidImage(format!(
            "image has zero dimension ({}x{})",
            image.width(),
            image.height(),
        )));
    }
    Ok(image.to_rgb8())
}
