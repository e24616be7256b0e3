//! Shared types for the sketchgraph image processing pipeline.

use serde::{Deserialize, Serialize};

use crate::stage::StageId;

/// Re-export the raster types so downstream crates can reference stage
/// imagery without depending on `image` directly.
pub use image::{DynamicImage, GrayImage, RgbImage};

/// An integer pixel coordinate, origin top-left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pixel {
    /// Column, counted from the left edge.
    pub x: u32,
    /// Row, counted from the top edge.
    pub y: u32,
}

impl Pixel {
    /// Create a new pixel coordinate.
    #[must_use]
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Sort key for raster scan order (row-major, top to bottom).
    #[must_use]
    pub const fn raster_key(self) -> (u32, u32) {
        (self.y, self.x)
    }

    /// The pixel centre as a floating-point [`Point`].
    #[must_use]
    pub fn to_point(self) -> Point {
        Point::new(f64::from(self.x), f64::from(self.y))
    }

    /// Whether `other` is a diagonal (not orthogonal) neighbour.
    #[must_use]
    pub const fn is_diagonal_to(self, other: Self) -> bool {
        self.x != other.x && self.y != other.y
    }
}

/// A 2D point in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (pixels from left edge).
    pub x: f64,
    /// Vertical position (pixels from top edge).
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    ///
    /// Avoids the square root for comparison purposes.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }

    /// Chebyshev (chessboard) distance to another point: the number of
    /// 8-connected unit steps between them.
    #[must_use]
    pub fn chessboard_distance(self, other: Self) -> f64 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }

    /// The point as an `[x, y]` array, the form the spatial index expects.
    #[must_use]
    pub const fn to_array(self) -> [f64; 2] {
        [self.x, self.y]
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// Which of the optional pipeline stages run.
///
/// Every stage is independently toggleable; a disabled stage passes its
/// input through unchanged and records no step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)]
pub struct StageToggles {
    /// k-means colour segmentation.
    pub segmentation: bool,
    /// Otsu binarization.
    pub binarization: bool,
    /// Morphological closing.
    pub morph_close: bool,
    /// Bilateral smoothing.
    pub filter: bool,
    /// Topology-preserving thinning.
    pub skeletonization: bool,
    /// Spur pruning.
    pub branch_removal: bool,
    /// Endpoint and junction detection.
    pub vertex_search: bool,
    /// Clustering of nearby candidates into vertices.
    pub vertex_deduplication: bool,
    /// Segment labelling.
    pub path_coloring: bool,
    /// Segment length measurement into edge weights.
    pub path_flooding: bool,
}

impl StageToggles {
    /// Every stage enabled.
    pub const ALL_ENABLED: Self = Self::uniform(true);

    /// Every stage disabled.
    pub const ALL_DISABLED: Self = Self::uniform(false);

    const fn uniform(enabled: bool) -> Self {
        Self {
            segmentation: enabled,
            binarization: enabled,
            morph_close: enabled,
            filter: enabled,
            skeletonization: enabled,
            branch_removal: enabled,
            vertex_search: enabled,
            vertex_deduplication: enabled,
            path_coloring: enabled,
            path_flooding: enabled,
        }
    }

    /// Whether `stage` is enabled.
    #[must_use]
    pub const fn get(&self, stage: StageId) -> bool {
        match stage {
            StageId::Segmentation => self.segmentation,
            StageId::Binarization => self.binarization,
            StageId::MorphClose => self.morph_close,
            StageId::Filter => self.filter,
            StageId::Skeletonization => self.skeletonization,
            StageId::BranchRemoval => self.branch_removal,
            StageId::VertexSearch => self.vertex_search,
            StageId::VertexDeduplication => self.vertex_deduplication,
            StageId::PathColoring => self.path_coloring,
            StageId::PathFlooding => self.path_flooding,
        }
    }

    /// Enable or disable `stage`.
    pub const fn set(&mut self, stage: StageId, enabled: bool) {
        let flag = match stage {
            StageId::Segmentation => &mut self.segmentation,
            StageId::Binarization => &mut self.binarization,
            StageId::MorphClose => &mut self.morph_close,
            StageId::Filter => &mut self.filter,
            StageId::Skeletonization => &mut self.skeletonization,
            StageId::BranchRemoval => &mut self.branch_removal,
            StageId::VertexSearch => &mut self.vertex_search,
            StageId::VertexDeduplication => &mut self.vertex_deduplication,
            StageId::PathColoring => &mut self.path_coloring,
            StageId::PathFlooding => &mut self.path_flooding,
        };
        *flag = enabled;
    }

    /// Builder-style variant of [`set`](Self::set).
    #[must_use]
    pub const fn with(mut self, stage: StageId, enabled: bool) -> Self {
        self.set(stage, enabled);
        self
    }
}

impl Default for StageToggles {
    fn default() -> Self {
        Self::ALL_ENABLED
    }
}

/// Configuration for the image processing pipeline.
///
/// All parameters have defaults exposed as `DEFAULT_*` associated
/// constants. Call [`validate`](Self::validate) before running a
/// configuration that came from user input; [`crate::process`] does so
/// itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Which stages run.
    pub stages: StageToggles,

    /// Number of colour clusters for k-means segmentation. Must be at
    /// least 1.
    pub cluster_count: usize,

    /// Upper bound on Lloyd iterations for k-means. Iteration stops
    /// earlier once no pixel changes cluster.
    pub kmeans_max_iterations: usize,

    /// Side length of the square structuring element used for
    /// morphological closing. Must be odd; 3 means a 3x3 square.
    pub morph_kernel_size: u32,

    /// Half-width of the bilateral filter window in pixels.
    pub bilateral_radius: u32,

    /// Bilateral range sigma (intensity units). Larger values smooth
    /// across stronger edges.
    pub bilateral_sigma_color: f64,

    /// Bilateral spatial sigma (pixels).
    pub bilateral_sigma_space: f64,

    /// Spurs shorter than this many pixels are pruned.
    pub prune_length: u32,

    /// Vertex candidates closer than this many pixels are merged into one
    /// vertex. Output vertices are always at least this far apart.
    pub dedup_distance: f64,

    /// Weigh diagonal skeleton steps by sqrt(2) instead of 1.
    pub diagonal_weighting: bool,
}

impl PipelineConfig {
    /// Default k-means cluster count.
    pub const DEFAULT_CLUSTER_COUNT: usize = 3;

    /// Default k-means iteration cap.
    pub const DEFAULT_KMEANS_MAX_ITERATIONS: usize = 10;

    /// Default closing kernel (3x3 square).
    pub const DEFAULT_MORPH_KERNEL_SIZE: u32 = 3;

    /// Default bilateral window half-width.
    pub const DEFAULT_BILATERAL_RADIUS: u32 = 2;

    /// Default bilateral range sigma.
    pub const DEFAULT_BILATERAL_SIGMA_COLOR: f64 = 75.0;

    /// Default bilateral spatial sigma.
    pub const DEFAULT_BILATERAL_SIGMA_SPACE: f64 = 75.0;

    /// Default spur length threshold.
    pub const DEFAULT_PRUNE_LENGTH: u32 = 10;

    /// Default vertex merge distance.
    pub const DEFAULT_DEDUP_DISTANCE: f64 = 10.0;

    /// Check every numeric parameter against its documented range.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] naming the first
    /// offending parameter.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.cluster_count == 0 {
            return Err(PipelineError::InvalidConfig(
                "cluster_count must be at least 1".to_owned(),
            ));
        }
        if self.morph_kernel_size == 0 || self.morph_kernel_size % 2 == 0 {
            return Err(PipelineError::InvalidConfig(format!(
                "morph_kernel_size must be a positive odd number, got {}",
                self.morph_kernel_size,
            )));
        }
        for (name, sigma) in [
            ("bilateral_sigma_color", self.bilateral_sigma_color),
            ("bilateral_sigma_space", self.bilateral_sigma_space),
        ] {
            if !sigma.is_finite() || sigma <= 0.0 {
                return Err(PipelineError::InvalidConfig(format!(
                    "{name} must be finite and positive, got {sigma}",
                )));
            }
        }
        if !self.dedup_distance.is_finite() || self.dedup_distance < 0.0 {
            return Err(PipelineError::InvalidConfig(format!(
                "dedup_distance must be finite and non-negative, got {}",
                self.dedup_distance,
            )));
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            stages: StageToggles::default(),
            cluster_count: Self::DEFAULT_CLUSTER_COUNT,
            kmeans_max_iterations: Self::DEFAULT_KMEANS_MAX_ITERATIONS,
            morph_kernel_size: Self::DEFAULT_MORPH_KERNEL_SIZE,
            bilateral_radius: Self::DEFAULT_BILATERAL_RADIUS,
            bilateral_sigma_color: Self::DEFAULT_BILATERAL_SIGMA_COLOR,
            bilateral_sigma_space: Self::DEFAULT_BILATERAL_SIGMA_SPACE,
            prune_length: Self::DEFAULT_PRUNE_LENGTH,
            dedup_distance: Self::DEFAULT_DEDUP_DISTANCE,
            diagonal_weighting: true,
        }
    }
}

/// Errors that can occur during pipeline processing.
///
/// Only malformed input and invalid configuration are errors. Degenerate
/// content (an empty mask, a dangling segment) yields an empty graph and
/// a logged warning instead.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The decoded image cannot be processed (e.g. zero width).
    #[error("invalid image: {0}")]
    InvalidImage(String),

    /// Pipeline configuration is invalid.
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),
}
