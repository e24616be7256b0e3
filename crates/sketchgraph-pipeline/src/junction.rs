//! Vertex candidate detection by local skeleton topology.

use serde::{Deserialize, Serialize};

use crate::grid::BinaryGrid;
use crate::types::Pixel;

/// How a candidate pixel sits in the skeleton.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CandidateKind {
    /// No foreground neighbours.
    Isolated,
    /// Exactly one foreground neighbour.
    Endpoint,
    /// Three or more foreground neighbours.
    Junction,
}

/// A skeleton pixel whose degree is not 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VertexCandidate {
    /// Where the candidate is.
    pub pixel: Pixel,
    /// Number of foreground 8-neighbours.
    pub degree: u8,
}

impl VertexCandidate {
    /// Classify by degree.
    #[must_use]
    pub const fn kind(&self) -> CandidateKind {
        match self.degree {
            0 => CandidateKind::Isolated,
            1 => CandidateKind::Endpoint,
            _ => CandidateKind::Junction,
        }
    }
}

/// Every skeleton pixel of degree other than 2, in raster order.
///
/// The result depends only on the skeleton, never on visiting order.
#[must_use]
pub fn find_candidates(skeleton: &BinaryGrid) -> Vec<VertexCandidate> {
    skeleton
        .foreground()
        .filter_map(|pixel| {
            let degree = skeleton.degree(pixel);
            (degree != 2).then(|| VertexCandidate {
                pixel,
                degree: u8::try_from(degree).unwrap_or(u8::MAX),
            })
        })
        .collect()
}
