//! Global binarization with Otsu's threshold.
//!
//! Strokes are drawn dark on a light background, so the darker Otsu
//! class becomes foreground (255) and the lighter class background (0).

use imageproc::contrast::{ThresholdType, otsu_level, threshold};

use crate::types::GrayImage;

/// Output of [`otsu_binarize`].
#[derive(Debug, Clone)]
pub struct Binarized {
    /// Foreground mask (255 = stroke).
    pub mask: GrayImage,
    /// The Otsu level: pixels at or below it are foreground. `None` when
    /// the input was uniform and no threshold exists.
    pub level: Option<u8>,
}

/// Threshold `gray` at its Otsu level.
///
/// A uniform image has no two classes to separate and yields an empty
/// mask.
#[must_use]
pub fn otsu_binarize(gray: &GrayImage) -> Binarized {
    let (min, max) = gray
        .pixels()
        .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p.0[0]), hi.max(p.0[0])));
    if min >= max {
        return Binarized {
            mask: GrayImage::new(gray.width(), gray.height()),
            level: None,
        };
    }

    // Clamp into [min, max) so both classes are non-empty whatever the
    // level convention.
    let level = otsu_level(gray).clamp(min, max - 1);
    let mask = threshold(gray, level, ThresholdType::BinaryInverted);
    Binarized {
        mask,
        level: Some(level),
    }
}
