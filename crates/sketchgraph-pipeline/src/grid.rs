//! Flat boolean pixel grid used by the skeleton stages.
//!
//! Neighbourhood queries, degree counting and traversal walks all index
//! into one `Vec<bool>` of `width * height` cells.

use image::Luma;
use imageproc::region_labelling::{Connectivity, connected_components};

use crate::types::{Dimensions, GrayImage, Pixel};

/// Gray values strictly above this are foreground when a raster is read
/// back as a mask.
pub const FOREGROUND_THRESHOLD: u8 = 127;

/// The 8-neighbourhood offsets, clockwise from north.
pub const NEIGHBOR_OFFSETS: [(i32, i32); 8] = [
    (0, -1),
    (1, -1),
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
];

/// A binary mask stored as a flat row-major arena.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryGrid {
    width: u32,
    height: u32,
    cells: Vec<bool>,
}

impl BinaryGrid {
    /// An all-background grid.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            cells: vec![false; width as usize * height as usize],
        }
    }

    /// Read a grayscale raster as a mask: values above
    /// [`FOREGROUND_THRESHOLD`] are foreground.
    #[must_use]
    pub fn from_gray(image: &GrayImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
            cells: image
                .as_raw()
                .iter()
                .map(|&v| v > FOREGROUND_THRESHOLD)
                .collect(),
        }
    }

    /// Build a grid of the given size with the listed pixels set.
    /// Pixels outside the grid are ignored.
    #[must_use]
    pub fn from_pixels(width: u32, height: u32, pixels: impl IntoIterator<Item = Pixel>) -> Self {
        let mut grid = Self::new(width, height);
        for p in pixels {
            if p.x < width && p.y < height {
                grid.set(p, true);
            }
        }
        grid
    }

    /// Render as a grayscale mask (255 foreground, 0 background).
    #[must_use]
    pub fn to_gray(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            Luma([if self.is_set(Pixel::new(x, y)) { 255 } else { 0 }])
        })
    }

    /// Width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Grid dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.width,
            height: self.height,
        }
    }

    /// Arena index of `p`. The caller guarantees `p` is in bounds.
    #[must_use]
    pub const fn index(&self, p: Pixel) -> usize {
        p.y as usize * self.width as usize + p.x as usize
    }

    /// Whether `p` is in bounds and foreground.
    #[must_use]
    pub fn is_set(&self, p: Pixel) -> bool {
        p.x < self.width && p.y < self.height && self.cells[self.index(p)]
    }

    /// Set or clear `p`. Out-of-bounds writes are ignored.
    pub fn set(&mut self, p: Pixel, value: bool) {
        if p.x < self.width && p.y < self.height {
            let i = self.index(p);
            self.cells[i] = value;
        }
    }

    /// Number of foreground pixels.
    #[must_use]
    pub fn count(&self) -> usize {
        self.cells.iter().filter(|&&c| c).count()
    }

    /// Whether there is no foreground at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.cells.iter().any(|&c| c)
    }

    /// Foreground pixels in raster order.
    pub fn foreground(&self) -> impl Iterator<Item = Pixel> + '_ {
        let width = self.width as usize;
        self.cells
            .iter()
            .enumerate()
            .filter(|&(_, &set)| set)
            .filter_map(move |(i, _)| {
                let x = u32::try_from(i % width).ok()?;
                let y = u32::try_from(i / width).ok()?;
                Some(Pixel::new(x, y))
            })
    }

    /// The in-bounds pixel at `p + (dx, dy)`.
    #[must_use]
    pub fn offset(&self, p: Pixel, dx: i32, dy: i32) -> Option<Pixel> {
        let x = u32::try_from(i64::from(p.x) + i64::from(dx)).ok()?;
        let y = u32::try_from(i64::from(p.y) + i64::from(dy)).ok()?;
        (x < self.width && y < self.height).then_some(Pixel::new(x, y))
    }

    /// In-bounds 8-neighbours of `p`, foreground or not, clockwise from
    /// north.
    pub fn neighborhood(&self, p: Pixel) -> impl Iterator<Item = Pixel> + '_ {
        NEIGHBOR_OFFSETS
            .iter()
            .filter_map(move |&(dx, dy)| self.offset(p, dx, dy))
    }

    /// Foreground 8-neighbours of `p`, clockwise from north.
    pub fn neighbors(&self, p: Pixel) -> impl Iterator<Item = Pixel> + '_ {
        self.neighborhood(p).filter(|&q| self.is_set(q))
    }

    /// Number of foreground 8-neighbours of `p`.
    #[must_use]
    pub fn degree(&self, p: Pixel) -> usize {
        self.neighbors(p).count()
    }

    /// The 8-neighbourhood as booleans, clockwise from north (N, NE, E,
    /// SE, S, SW, W, NW). Out-of-bounds reads as background.
    #[must_use]
    pub fn ring(&self, p: Pixel) -> [bool; 8] {
        NEIGHBOR_OFFSETS.map(|(dx, dy)| self.offset(p, dx, dy).is_some_and(|q| self.is_set(q)))
    }

    /// Number of 8-connected foreground components.
    #[must_use]
    pub fn component_count(&self) -> usize {
        if self.is_empty() {
            return 0;
        }
        let labels = connected_components(&self.to_gray(), Connectivity::Eight, Luma([0u8]));
        labels.pixels().map(|p| p.0[0]).max().unwrap_or(0) as usize
    }

    /// Whether any 2x2 block is entirely foreground.
    #[must_use]
    pub fn has_full_2x2_block(&self) -> bool {
        self.foreground().any(|p| {
            [(1, 0), (0, 1), (1, 1)]
                .iter()
                .all(|&(dx, dy)| self.offset(p, dx, dy).is_some_and(|q| self.is_set(q)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gray_round_trip_thresholds_at_127() {
        let image = GrayImage::from_fn(4, 1, |x, _| Luma([[0, 127, 128, 255][x as usize]]));
        let grid = BinaryGrid::from_gray(&image);
        let set: Vec<_> = grid.foreground().collect();
        assert_eq!(set, vec![Pixel::new(2, 0), Pixel::new(3, 0)]);
        assert_eq!(grid.to_gray().as_raw(), &vec![0, 0, 255, 255]);
    }

    #[test]
    fn degree_counts_eight_neighbours() {
        let grid = BinaryGrid::from_pixels(
            3,
            3,
            [
                Pixel::new(1, 1),
                Pixel::new(0, 0),
                Pixel::new(2, 0),
                Pixel::new(1, 2),
            ],
        );
        assert_eq!(grid.degree(Pixel::new(1, 1)), 3);
        assert_eq!(grid.degree(Pixel::new(0, 0)), 1);
    }

    #[test]
    fn corner_neighbourhood_stays_in_bounds() {
        let grid = BinaryGrid::new(2, 2);
        assert_eq!(grid.neighborhood(Pixel::new(0, 0)).count(), 3);
        assert_eq!(grid.ring(Pixel::new(0, 0)), [false; 8]);
    }

    #[test]
    fn counts_components() {
        let grid = BinaryGrid::from_pixels(
            6,
            3,
            [
                Pixel::new(0, 0),
                Pixel::new(1, 1),
                Pixel::new(4, 0),
                Pixel::new(5, 2),
            ],
        );
        // (0,0)-(1,1) touch diagonally; (4,0) and (5,2) are isolated.
        assert_eq!(grid.component_count(), 3);
        assert_eq!(BinaryGrid::new(3, 3).component_count(), 0);
    }

    #[test]
    fn detects_full_block() {
        let mut grid = BinaryGrid::from_pixels(3, 3, [Pixel::new(0, 0), Pixel::new(1, 0)]);
        grid.set(Pixel::new(0, 1), true);
        assert!(!grid.has_full_2x2_block());
        grid.set(Pixel::new(1, 1), true);
        assert!(grid.has_full_2x2_block());
    }
}
