//! Topology-preserving thinning.
//!
//! Peels the mask one border layer at a time in four directional
//! sub-passes (north, south, east, west). Within a sub-pass the border
//! pixels are collected first and then visited in raster order; each is
//! deleted only if it is still a *simple point* (removing it changes
//! neither the number of 8-connected foreground components nor the
//! number of 4-connected background components around it) and is not an
//! endpoint. Passes repeat until a full round removes nothing.
//!
//! Deleting simple points one at a time preserves the component count
//! exactly. Keeping endpoints stops open strokes from shrinking away.
//!
//! The result is one pixel wide except where connectivity forbids it. Two
//! diagonal strokes crossing between pixel centres meet in a 2x2 block
//! whose every pixel carries its own arm; deleting any of them would cut
//! that arm off, so the block stays. Connectivity wins over thinness
//! there, and such a block later shows up as a cluster of junction
//! candidates.

use crate::grid::BinaryGrid;
use crate::types::Pixel;

/// Offsets of the neighbour that must be background for a pixel to be
/// a border pixel in each sub-pass: north, south, east, west.
const SUBPASS_DIRECTIONS: [(i32, i32); 4] = [(0, -1), (0, 1), (1, 0), (-1, 0)];

/// Thin `mask` to 1-pixel-wide curves.
///
/// An all-background mask yields an all-background skeleton.
#[must_use]
pub fn skeletonize(mask: &BinaryGrid) -> BinaryGrid {
    let mut grid = mask.clone();
    loop {
        let mut removed = 0;
        for (dx, dy) in SUBPASS_DIRECTIONS {
            let border: Vec<Pixel> = grid
                .foreground()
                .filter(|&p| !grid.offset(p, dx, dy).is_some_and(|q| grid.is_set(q)))
                .collect();
            for p in border {
                if is_deletable(&grid, p) {
                    grid.set(p, false);
                    removed += 1;
                }
            }
        }
        tracing::trace!(removed, "thinning round");
        if removed == 0 {
            return grid;
        }
    }
}

/// A foreground pixel may be deleted when it is simple and has more than
/// one neighbour.
fn is_deletable(grid: &BinaryGrid, p: Pixel) -> bool {
    grid.degree(p) >= 2 && is_simple(grid, p)
}

/// Whether removing `p` preserves local topology.
///
/// Uses the 8-connectivity number of Yokoi, Toriwaki and Fukumura over
/// the neighbours numbered counter-clockwise from east:
/// `N = sum over k in {1,3,5,7} of (!x_k - !x_k * !x_{k+1} * !x_{k+2})`.
/// The pixel is simple exactly when `N == 1`.
#[must_use]
pub fn is_simple(grid: &BinaryGrid, p: Pixel) -> bool {
    connectivity_number(grid, p) == 1
}

fn connectivity_number(grid: &BinaryGrid, p: Pixel) -> u8 {
    // `ring` is clockwise from north: N, NE, E, SE, S, SW, W, NW.
    let [n, ne, e, se, s, sw, w, nw] = grid.ring(p);
    // Counter-clockwise from east, complemented, with x9 = x1.
    let x = [!e, !ne, !n, !nw, !w, !sw, !s, !se, !e];
    [0, 2, 4, 6]
        .into_iter()
        .map(|k| u8::from(x[k]) - u8::from(x[k] && x[k + 1] && x[k + 2]))
        .sum()
}
