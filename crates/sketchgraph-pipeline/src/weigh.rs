//! Edge weighing ("path flooding").
//!
//! Walks each labelled segment from one attached end to the other and
//! turns the walked length into an edge weight. The weight covers the
//! whole vertex-to-vertex distance: the step from the first vertex's
//! centroid to the segment, the chain itself, and the step from the
//! segment to the second vertex's centroid.
//!
//! Vertices whose separators touch ([`SegmentMap::links`]) have no
//! segment between them and are joined directly, weighted by the
//! distance between their centroids.

use std::collections::{HashMap, VecDeque};

use crate::dedup::VertexCluster;
use crate::graph::Edge;
use crate::label::{Segment, SegmentMap};
use crate::types::{Pixel, Point};

/// Orthogonal neighbours first, so ties between equally short walks
/// always resolve the same way.
const WALK_OFFSETS: [(i64, i64); 8] = [
    (0, -1),
    (1, 0),
    (0, 1),
    (-1, 0),
    (1, -1),
    (1, 1),
    (-1, 1),
    (-1, -1),
];

/// How skeleton steps are measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepMetric {
    /// Diagonal steps count sqrt(2); connections use Euclidean distance.
    Euclidean,
    /// Every step counts 1; connections use chessboard distance.
    Chessboard,
}

impl StepMetric {
    /// The metric selected by the `diagonal_weighting` option.
    #[must_use]
    pub const fn from_diagonal_weighting(diagonal_weighting: bool) -> Self {
        if diagonal_weighting {
            Self::Euclidean
        } else {
            Self::Chessboard
        }
    }

    fn step(self, from: Pixel, to: Pixel) -> f64 {
        match self {
            Self::Euclidean if from.is_diagonal_to(to) => std::f64::consts::SQRT_2,
            Self::Euclidean | Self::Chessboard => 1.0,
        }
    }

    fn between(self, a: Point, b: Point) -> f64 {
        match self {
            Self::Euclidean => a.distance(b),
            Self::Chessboard => a.chessboard_distance(b),
        }
    }
}

/// One edge together with the segment it was measured from.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedSegment {
    /// Label of the source segment; `None` for a link between touching
    /// vertices.
    pub label: Option<u32>,
    /// The measured edge.
    pub edge: Edge,
    /// Number of pixels walked along the segment.
    pub walked: usize,
}

/// Measure every segment of `map` into an edge.
#[must_use]
pub fn weigh_segments(
    map: &SegmentMap,
    vertices: &[VertexCluster],
    metric: StepMetric,
) -> Vec<WeightedSegment> {
    let mut weighted: Vec<WeightedSegment> = map
        .segments
        .iter()
        .filter_map(|segment| {
            let measured = weigh_segment(segment, vertices, metric);
            if measured.is_none() {
                let [start, end] = segment.ends;
                tracing::warn!(
                    label = segment.label,
                    u = start.vertex,
                    v = end.vertex,
                    "dropping segment that cannot be walked between its vertices",
                );
            }
            measured
        })
        .collect();
    let segment_edges = weighted.len();

    weighted.extend(map.links.iter().filter_map(|&[a, b]| {
        let (Some(u), Some(v)) = (vertices.get(a), vertices.get(b)) else {
            tracing::warn!(u = a, v = b, "dropping link to unknown vertex");
            return None;
        };
        Some(WeightedSegment {
            label: None,
            edge: Edge::new(a, b, metric.between(u.position, v.position)),
            walked: 0,
        })
    }));

    tracing::debug!(
        edges = weighted.len(),
        links = weighted.len() - segment_edges,
        "weighed segments"
    );
    weighted
}

fn weigh_segment(
    segment: &Segment,
    vertices: &[VertexCluster],
    metric: StepMetric,
) -> Option<WeightedSegment> {
    let [start, end] = segment.ends;
    let u = vertices.get(start.vertex)?;
    let v = vertices.get(end.vertex)?;

    let chain = walk(&segment.pixels, start.pixel, end.pixel)?;
    let along: f64 = chain.windows(2).map(|w| metric.step(w[0], w[1])).sum();
    let weight = metric.between(u.position, start.pixel.to_point())
        + along
        + metric.between(end.pixel.to_point(), v.position);

    Some(WeightedSegment {
        label: Some(segment.label),
        edge: Edge::new(start.vertex, end.vertex, weight),
        walked: chain.len(),
    })
}

/// Breadth-first walk from `from` to `to` through `pixels`.
///
/// Takes the walk with the fewest steps, which on a simple chain is the
/// chain itself with any redundant corner pixel skipped. Returns the
/// pixels from `from` to `to` inclusive.
fn walk(pixels: &[Pixel], from: Pixel, to: Pixel) -> Option<Vec<Pixel>> {
    let index: HashMap<Pixel, usize> = pixels.iter().enumerate().map(|(i, &p)| (p, i)).collect();
    let start = *index.get(&from)?;
    let goal = *index.get(&to)?;

    let mut previous: Vec<Option<usize>> = vec![None; pixels.len()];
    let mut seen = vec![false; pixels.len()];
    let mut queue = VecDeque::from([start]);
    seen[start] = true;

    while let Some(current) = queue.pop_front() {
        if current == goal {
            break;
        }
        let p = pixels[current];
        for (dx, dy) in WALK_OFFSETS {
            let Some(q) = offset(p, dx, dy) else { continue };
            let Some(&next) = index.get(&q) else { continue };
            if !seen[next] {
                seen[next] = true;
                previous[next] = Some(current);
                queue.push_back(next);
            }
        }
    }

    if !seen[goal] {
        return None;
    }
    let mut chain = vec![pixels[goal]];
    let mut current = goal;
    while let Some(prev) = previous[current] {
        chain.push(pixels[prev]);
        current = prev;
    }
    chain.reverse();
    Some(chain)
}

fn offset(p: Pixel, dx: i64, dy: i64) -> Option<Pixel> {
    let x = u32::try_from(i64::from(p.x) + dx).ok()?;
    let y = u32::try_from(i64::from(p.y) + dy).ok()?;
    Some(Pixel::new(x, y))
}
