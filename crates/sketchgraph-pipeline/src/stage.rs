//! Pipeline stage identifiers and metadata.
//!
//! [`StageId::ALL`] is the single declared stage order. The pipeline
//! folds over it, skipping any stage whose toggle is off.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{DynamicImage, StageToggles};

/// Identifier for one optional pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    /// k-means colour clustering of the input.
    Segmentation,
    /// Otsu thresholding to a foreground mask.
    Binarization,
    /// Morphological closing of the mask.
    MorphClose,
    /// Edge-preserving bilateral smoothing.
    Filter,
    /// Thinning to 1-pixel-wide curves.
    Skeletonization,
    /// Removal of short spurs.
    BranchRemoval,
    /// Endpoint and junction detection.
    VertexSearch,
    /// Clustering of nearby candidates into vertices.
    VertexDeduplication,
    /// Splitting the skeleton into labelled segments.
    PathColoring,
    /// Measuring each segment into a weighted edge.
    PathFlooding,
}

impl StageId {
    /// All stages in pipeline order.
    pub const ALL: [Self; 10] = [
        Self::Segmentation,
        Self::Binarization,
        Self::MorphClose,
        Self::Filter,
        Self::Skeletonization,
        Self::BranchRemoval,
        Self::VertexSearch,
        Self::VertexDeduplication,
        Self::PathColoring,
        Self::PathFlooding,
    ];

    /// Stable machine-readable name, also used for `--no-<name>` flags
    /// and step file names.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Segmentation => "segmentation",
            Self::Binarization => "binarization",
            Self::MorphClose => "morph_close",
            Self::Filter => "filter",
            Self::Skeletonization => "skeletonization",
            Self::BranchRemoval => "branch_removal",
            Self::VertexSearch => "vertex_search",
            Self::VertexDeduplication => "vertex_deduplication",
            Self::PathColoring => "path_coloring",
            Self::PathFlooding => "path_flooding",
        }
    }

    /// Display label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Segmentation => "Segmentation",
            Self::Binarization => "Binarization",
            Self::MorphClose => "Morph close",
            Self::Filter => "Filter",
            Self::Skeletonization => "Skeletonization",
            Self::BranchRemoval => "Branch removal",
            Self::VertexSearch => "Vertex search",
            Self::VertexDeduplication => "Vertex deduplication",
            Self::PathColoring => "Path coloring",
            Self::PathFlooding => "Path flooding",
        }
    }

    /// One-sentence description of what the stage does.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Segmentation => "Performs image segmentation using k-means clustering.",
            Self::Binarization => {
                "Converts the image to a binary mask using Otsu's automatic threshold."
            }
            Self::MorphClose => "Performs morphological closing on the binary mask.",
            Self::Filter => "Applies a bilateral filter to the mask.",
            Self::Skeletonization => "Thins the mask to 1-pixel-wide curves.",
            Self::BranchRemoval => "Removes short branches from the skeleton.",
            Self::VertexSearch => "Finds endpoints and junctions in the skeleton.",
            Self::VertexDeduplication => "Merges adjacent junction candidates into one vertex.",
            Self::PathColoring => "Colors each path between vertices with a different color.",
            Self::PathFlooding => "Measures each path into a weighted edge between its vertices.",
        }
    }

    /// Whether this stage runs under `toggles`.
    #[must_use]
    pub const fn is_enabled(self, toggles: &StageToggles) -> bool {
        toggles.get(self)
    }

    /// Parse a stage from its [`name`](Self::name).
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|stage| stage.name() == name)
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The image produced by one enabled stage, kept for inspection.
///
/// Steps are never consumed downstream.
#[derive(Debug, Clone)]
pub struct Step {
    /// Which stage produced the image.
    pub stage: StageId,
    /// The stage's output rendered as an image.
    pub image: DynamicImage,
}
