//! Edge-preserving bilateral smoothing.
//!
//! Wraps [`imageproc::filter::bilateral_filter`] with a Gaussian range
//! kernel on the intensity difference. Stroke edges stay sharp while
//! low-contrast paper noise is averaged out before thinning.

use imageproc::filter::bilateral::GaussianEuclideanColorDistance;

use crate::types::GrayImage;

/// Apply a bilateral filter over a `(2 * radius + 1)` square window.
///
/// Each output pixel is the average of its window weighted by a spatial
/// Gaussian (`sigma_space`, pixels) times a range Gaussian on the
/// intensity difference (`sigma_color`). Window cells past the border
/// repeat the edge pixel. The radius saturates at 255.
///
/// Radius 0 and empty images return the input unchanged, since
/// `imageproc`'s underlying function panics on a zero-size image.
#[must_use = "returns the smoothed image"]
#[allow(clippy::cast_possible_truncation)]
pub fn bilateral(image: &GrayImage, radius: u32, sigma_color: f64, sigma_space: f64) -> GrayImage {
    if radius == 0 || image.width() == 0 || image.height() == 0 {
        return image.clone();
    }
    let radius = u8::try_from(radius).unwrap_or(u8::MAX);

    imageproc::filter::bilateral_filter(
        image,
        radius,
        sigma_space as f32,
        GaussianEuclideanColorDistance::new(sigma_color as f32),
    )
}

#[cfg(test)]
mod tests {
    use image::Luma;

    use super::*;
    use crate::grid::BinaryGrid;

    fn bar() -> GrayImage {
        GrayImage::from_fn(30, 15, |x, y| {
            Luma([if (5..25).contains(&x) && (6..9).contains(&y) { 255 } else { 0 }])
        })
    }

    fn max_difference(a: &GrayImage, b: &GrayImage) -> u8 {
        a.pixels()
            .zip(b.pixels())
            .map(|(p, q)| p.0[0].abs_diff(q.0[0]))
            .max()
            .unwrap_or(0)
    }

    #[test]
    fn uniform_image_is_unchanged() {
        let image = GrayImage::from_pixel(8, 8, Luma([90]));
        assert!(max_difference(&bilateral(&image, 2, 75.0, 75.0), &image) <= 1);
    }

    #[test]
    fn stroke_edges_survive_as_mask() {
        let smoothed = bilateral(&bar(), 2, 75.0, 75.0);
        assert_eq!(BinaryGrid::from_gray(&smoothed), BinaryGrid::from_gray(&bar()));
    }

    #[test]
    fn small_range_sigma_preserves_binary_values() {
        let smoothed = bilateral(&bar(), 2, 10.0, 75.0);
        assert!(max_difference(&smoothed, &bar()) <= 1);
    }

    #[test]
    fn one_pixel_line_stays_foreground() {
        let line = GrayImage::from_fn(20, 9, |_, y| Luma([if y == 4 { 255 } else { 0 }]));
        let smoothed = bilateral(&line, 2, 75.0, 75.0);
        assert_eq!(BinaryGrid::from_gray(&smoothed), BinaryGrid::from_gray(&line));
    }

    #[test]
    fn smooths_low_contrast_noise() {
        let noisy = GrayImage::from_fn(9, 9, |x, y| Luma([if (x + y) % 2 == 0 { 100 } else { 110 }]));
        let smoothed = bilateral(&noisy, 1, 75.0, 75.0);
        let center = smoothed.get_pixel(4, 4).0[0];
        assert!((101..=109).contains(&center), "{center}");
    }

    #[test]
    fn zero_radius_is_identity() {
        assert_eq!(bilateral(&bar(), 0, 75.0, 75.0), bar());
    }

    #[test]
    fn empty_image_is_returned_as_is() {
        let empty = GrayImage::new(0, 0);
        assert_eq!(bilateral(&empty, 2, 75.0, 75.0), empty);
    }
}
