//! Spur pruning.
//!
//! Thinning noisy strokes leaves short side branches. A *spur* is the
//! chain from an endpoint (degree 1) to the first junction pixel (degree
//! 3 or more). Spurs shorter than the threshold are erased, repeatedly,
//! until none remain. Junction pixels themselves are never erased, so
//! pruning cannot disconnect the skeleton.
//!
//! A curve with no junction at all is handled separately: if it is
//! shorter than the threshold it is trimmed from both ends down to
//! [`MIN_CURVE_PIXELS`], never erased.

use crate::grid::BinaryGrid;
use crate::skeleton::is_simple;
use crate::types::Pixel;

/// Shortest length an isolated curve is trimmed to.
pub const MIN_CURVE_PIXELS: usize = 3;

/// Output of [`prune`].
#[derive(Debug, Clone)]
pub struct Pruned {
    /// The pruned skeleton.
    pub skeleton: BinaryGrid,
    /// Pixels erased in total.
    pub pixels_removed: usize,
    /// Spurs erased (isolated-curve trims not included).
    pub spurs_removed: usize,
}

/// What walking inward from an endpoint found.
enum Walk {
    /// Reached a junction; `path` excludes the junction pixel.
    Spur { path: Vec<Pixel>, junction: Pixel },
    /// Reached the opposite endpoint of a junction-free curve.
    Curve(Vec<Pixel>),
    /// At least `max_length` pixels without reaching anything.
    Long,
}

/// Erase spurs shorter than `max_length` pixels.
///
/// Idempotent: the result is a fixed point, so pruning it again changes
/// nothing.
#[must_use]
pub fn prune(skeleton: &BinaryGrid, max_length: u32) -> Pruned {
    let max_length = max_length as usize;
    let mut grid = skeleton.clone();
    let mut pixels_removed = 0;
    let mut spurs_removed = 0;

    if max_length == 0 {
        return Pruned {
            skeleton: grid,
            pixels_removed,
            spurs_removed,
        };
    }

    loop {
        let before = pixels_removed;
        let endpoints: Vec<Pixel> = grid.foreground().filter(|&p| grid.degree(p) == 1).collect();
        for endpoint in endpoints {
            if !grid.is_set(endpoint) || grid.degree(endpoint) != 1 {
                continue;
            }
            match walk(&grid, endpoint, max_length) {
                Walk::Spur { path, junction } => {
                    pixels_removed += erase(&mut grid, &path);
                    spurs_removed += 1;
                    // A junction pixel left dangling off the line by the
                    // spur is now redundant.
                    if grid.degree(junction) >= 2 && is_simple(&grid, junction) {
                        grid.set(junction, false);
                        pixels_removed += 1;
                    }
                }
                Walk::Curve(path) if path.len() > MIN_CURVE_PIXELS => {
                    let keep_from = (path.len() - MIN_CURVE_PIXELS) / 2;
                    let keep_to = keep_from + MIN_CURVE_PIXELS;
                    pixels_removed += erase(&mut grid, &path[..keep_from]);
                    pixels_removed += erase(&mut grid, &path[keep_to..]);
                }
                Walk::Curve(_) | Walk::Long => {}
            }
        }
        if pixels_removed == before {
            break;
        }
    }

    tracing::debug!(pixels_removed, spurs_removed, "pruned skeleton");
    Pruned {
        skeleton: grid,
        pixels_removed,
        spurs_removed,
    }
}

/// Follow the chain from `start` until a junction, the far end, or
/// `max_length` pixels.
fn walk(grid: &BinaryGrid, start: Pixel, max_length: usize) -> Walk {
    let mut path = vec![start];
    let mut current = start;
    loop {
        let (next, branching) = {
            let mut unvisited = grid.neighbors(current).filter(|q| !path.contains(q));
            (unvisited.next(), unvisited.next().is_some())
        };
        let Some(candidate) = next else {
            return Walk::Curve(path);
        };
        if branching {
            // Branching at a degree-2 pixel only happens in malformed
            // skeletons; leave it alone.
            return Walk::Long;
        }
        if grid.degree(candidate) >= 3 {
            return Walk::Spur {
                path,
                junction: candidate,
            };
        }
        path.push(candidate);
        current = candidate;
        if path.len() >= max_length {
            // Whether this is a long spur or a long curve, it stays.
            return Walk::Long;
        }
    }
}

fn erase(grid: &mut BinaryGrid, pixels: &[Pixel]) -> usize {
    for &p in pixels {
        grid.set(p, false);
    }
    pixels.len()
}
