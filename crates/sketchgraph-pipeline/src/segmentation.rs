//! k-means colour segmentation.
//!
//! Flattens near-uniform regions by replacing every pixel with the
//! centre of its colour cluster. Initialisation is deterministic: the
//! initial centres are the pixels at evenly spaced luminance quantiles,
//! so the same image always segments the same way.

use image::Rgb;

use crate::types::RgbImage;

/// Output of [`kmeans_segment`].
#[derive(Debug, Clone)]
pub struct Segmentation {
    /// The input with every pixel replaced by its cluster centre.
    pub image: RgbImage,
    /// Final cluster centres, rounded to 8-bit colour.
    pub centers: Vec<[u8; 3]>,
    /// Lloyd iterations actually run.
    pub iterations: usize,
}

/// Cluster the image's colours into `cluster_count` groups.
///
/// Runs at most `max_iterations` Lloyd iterations, stopping as soon as no
/// pixel changes cluster. A cluster that loses all its pixels keeps its
/// previous centre. Ties in distance go to the lower cluster index.
#[must_use]
pub fn kmeans_segment(image: &RgbImage, cluster_count: usize, max_iterations: usize) -> Segmentation {
    let samples: Vec<[f64; 3]> = image
        .pixels()
        .map(|p| p.0.map(f64::from))
        .collect();
    if samples.is_empty() || cluster_count == 0 {
        return Segmentation {
            image: image.clone(),
            centers: Vec::new(),
            iterations: 0,
        };
    }

    let mut centers = initial_centers(&samples, cluster_count);
    let mut assignment = vec![usize::MAX; samples.len()];
    let mut iterations = 0;

    while iterations < max_iterations.max(1) {
        iterations += 1;
        let mut changed = false;
        for (slot, sample) in assignment.iter_mut().zip(&samples) {
            let nearest = nearest_center(&centers, sample);
            if *slot != nearest {
                *slot = nearest;
                changed = true;
            }
        }
        if !changed {
            break;
        }

        let mut sums = vec![[0.0_f64; 3]; centers.len()];
        let mut counts = vec![0_usize; centers.len()];
        for (&cluster, sample) in assignment.iter().zip(&samples) {
            for (acc, value) in sums[cluster].iter_mut().zip(sample) {
                *acc += value;
            }
            counts[cluster] += 1;
        }
        for ((center, sum), &count) in centers.iter_mut().zip(&sums).zip(&counts) {
            if count > 0 {
                #[allow(clippy::cast_precision_loss)]
                let n = count as f64;
                *center = sum.map(|s| s / n);
            }
        }
    }

    let palette: Vec<[u8; 3]> = centers.iter().map(|c| c.map(to_channel)).collect();
    let width = image.width() as usize;
    let segmented = RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let i = y as usize * width + x as usize;
        Rgb(palette[assignment[i]])
    });

    Segmentation {
        image: segmented,
        centers: palette,
        iterations,
    }
}

/// Pick `k` samples at evenly spaced luminance quantiles.
fn initial_centers(samples: &[[f64; 3]], k: usize) -> Vec<[f64; 3]> {
    let mut order: Vec<usize> = (0..samples.len()).collect();
    order.sort_by(|&a, &b| luminance(&samples[a]).total_cmp(&luminance(&samples[b])));
    let n = order.len();
    (0..k)
        .map(|i| {
            let rank = ((2 * i + 1) * n / (2 * k)).min(n - 1);
            samples[order[rank]]
        })
        .collect()
}

fn nearest_center(centers: &[[f64; 3]], sample: &[f64; 3]) -> usize {
    let mut best = 0;
    let mut best_distance = f64::INFINITY;
    for (i, center) in centers.iter().enumerate() {
        let d: f64 = center
            .iter()
            .zip(sample)
            .map(|(c, s)| (c - s) * (c - s))
            .sum();
        if d < best_distance {
            best = i;
            best_distance = d;
        }
    }
    best
}

fn luminance(rgb: &[f64; 3]) -> f64 {
    0.114f64.mul_add(rgb[2], 0.299f64.mul_add(rgb[0], 0.587 * rgb[1]))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_channel(value: f64) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}
