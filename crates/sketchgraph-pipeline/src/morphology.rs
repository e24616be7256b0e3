//! Morphological closing of the foreground mask.

use imageproc::distance_transform::Norm;

use crate::types::GrayImage;

/// Dilate then erode `mask` with a `kernel_size` x `kernel_size` square.
///
/// Closes gaps in strokes narrower than the kernel. A kernel of 1 (or
/// any size whose radius is zero) returns the mask unchanged. Values
/// above 0 count as foreground.
#[must_use]
pub fn close(mask: &GrayImage, kernel_size: u32) -> GrayImage {
    let radius = kernel_size / 2;
    if radius == 0 {
        return mask.clone();
    }
    // The L-infinity ball of radius r is the (2r+1)^2 square.
    let radius = u8::try_from(radius).unwrap_or(u8::MAX);
    imageproc::morphology::close(mask, Norm::LInf, radius)
}
