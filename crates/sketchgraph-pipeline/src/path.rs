//! Shortest-path queries over an assembled [`Graph`].
//!
//! Dijkstra's algorithm over the petgraph adjacency view, with a binary
//! heap keyed by `(tentative distance, vertex id)`. Self-loops never
//! appear in the view. Among parallel edges the lightest one wins
//! naturally.
//!
//! Equal-weight alternatives resolve deterministically: when a vertex
//! can be reached from two predecessors at exactly the same tentative
//! distance, the predecessor with the lower id is kept.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};

use crate::graph::Graph;

/// Outcome of a valid path query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PathResult {
    /// A path exists.
    Found {
        /// Sum of edge weights along the path.
        total_weight: f64,
        /// Vertex ids from start to end, inclusive.
        vertices: Vec<usize>,
    },
    /// No sequence of edges connects the two vertices.
    Unreachable {
        /// Query start.
        start: usize,
        /// Query end.
        end: usize,
    },
}

impl PathResult {
    /// The vertex sequence, if a path was found.
    #[must_use]
    pub fn vertices(&self) -> Option<&[usize]> {
        match self {
            Self::Found { vertices, .. } => Some(vertices),
            Self::Unreachable { .. } => None,
        }
    }

    /// The total weight, if a path was found.
    #[must_use]
    pub const fn total_weight(&self) -> Option<f64> {
        match self {
            Self::Found { total_weight, .. } => Some(*total_weight),
            Self::Unreachable { .. } => None,
        }
    }
}

/// Errors from an invalid path query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    /// The id is not a vertex of the graph.
    #[error("unknown vertex id {0}")]
    UnknownVertex(usize),
}

/// Heap entry, ordered so that `BinaryHeap` pops the smallest distance
/// first and, on equal distance, the lowest vertex id.
#[derive(Debug, Clone, Copy)]
struct Frontier {
    distance: f64,
    vertex: usize,
}

impl PartialEq for Frontier {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Frontier {}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .distance
            .total_cmp(&self.distance)
            .then_with(|| other.vertex.cmp(&self.vertex))
    }
}

/// Find the lightest path from `start` to `end`.
///
/// `start == end` returns the zero-weight single-vertex path without
/// searching.
///
/// # Errors
///
/// Returns [`PathError::UnknownVertex`] if either id is not in `graph`.
pub fn shortest_path(graph: &Graph, start: usize, end: usize) -> Result<PathResult, PathError> {
    for id in [start, end] {
        if !graph.contains(id) {
            return Err(PathError::UnknownVertex(id));
        }
    }
    if start == end {
        return Ok(PathResult::Found {
            total_weight: 0.0,
            vertices: vec![start],
        });
    }

    let adjacency = graph.to_petgraph();
    let n = graph.vertex_count();
    let mut distance = vec![f64::INFINITY; n];
    let mut previous: Vec<Option<usize>> = vec![None; n];
    let mut settled = vec![false; n];
    let mut heap = BinaryHeap::new();

    distance[start] = 0.0;
    heap.push(Frontier {
        distance: 0.0,
        vertex: start,
    });

    while let Some(Frontier {
        distance: reached,
        vertex,
    }) = heap.pop()
    {
        if settled[vertex] {
            continue;
        }
        settled[vertex] = true;
        if vertex == end {
            break;
        }
        let node = NodeIndex::new(vertex);
        for edge in adjacency.edges(node) {
            let other = if edge.source() == node {
                edge.target()
            } else {
                edge.source()
            }
            .index();
            if settled[other] {
                continue;
            }
            let candidate = reached + *edge.weight();
            match candidate.total_cmp(&distance[other]) {
                Ordering::Less => {
                    distance[other] = candidate;
                    previous[other] = Some(vertex);
                    heap.push(Frontier {
                        distance: candidate,
                        vertex: other,
                    });
                }
                Ordering::Equal if previous[other].is_some_and(|p| vertex < p) => {
                    previous[other] = Some(vertex);
                }
                Ordering::Equal | Ordering::Greater => {}
            }
        }
    }

    if !settled[end] {
        tracing::debug!(start, end, "no path");
        return Ok(PathResult::Unreachable { start, end });
    }

    let mut vertices = vec![end];
    let mut current = end;
    while let Some(prev) = previous[current] {
        vertices.push(prev);
        current = prev;
    }
    vertices.reverse();
    Ok(PathResult::Found {
        total_weight: distance[end],
        vertices,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::graph::{Edge, Vertex};
    use crate::types::Point;

    fn graph(n: usize, edges: &[(usize, usize, f64)]) -> Graph {
        let vertices = (0..n)
            .map(|i| Vertex::new(i, Point::new(0.0, 0.0)))
            .collect();
        let edges = edges.iter().map(|&(a, b, w)| Edge::new(a, b, w)).collect();
        Graph::assemble(vertices, edges)
    }

    #[test]
    fn frontier_pops_smallest_distance_then_lowest_id() {
        let mut heap = BinaryHeap::new();
        for (distance, vertex) in [(3.0, 0), (1.0, 5), (1.0, 2), (2.0, 1)] {
            heap.push(Frontier { distance, vertex });
        }
        let order: Vec<_> = std::iter::from_fn(|| heap.pop().map(|f| f.vertex)).collect();
        assert_eq!(order, vec![2, 5, 1, 0]);
    }

    #[test]
    fn prefers_lighter_parallel_edge() {
        let g = graph(2, &[(0, 1, 5.0), (0, 1, 2.0)]);
        let result = shortest_path(&g, 0, 1).unwrap();
        assert_eq!(result.total_weight(), Some(2.0));
    }

    #[test]
    fn self_loops_are_ignored() {
        let g = graph(2, &[(0, 0, 0.0), (0, 1, 3.0)]);
        let result = shortest_path(&g, 0, 1).unwrap();
        assert_eq!(result.vertices(), Some(&[0, 1][..]));
    }

    #[test]
    fn equal_paths_take_lower_predecessor() {
        // 0 -> 2 -> 3 and 0 -> 1 -> 3 both weigh 2.
        let g = graph(4, &[(0, 2, 1.0), (2, 3, 1.0), (0, 1, 1.0), (1, 3, 1.0)]);
        let result = shortest_path(&g, 0, 3).unwrap();
        assert_eq!(result.vertices(), Some(&[0, 1, 3][..]));
    }

    #[test]
    fn unknown_end_is_an_error() {
        let g = graph(2, &[(0, 1, 1.0)]);
        assert_eq!(shortest_path(&g, 0, 9), Err(PathError::UnknownVertex(9)));
        assert_eq!(shortest_path(&g, 9, 9), Err(PathError::UnknownVertex(9)));
    }

    #[test]
    fn empty_graph_rejects_everything() {
        assert_eq!(
            shortest_path(&Graph::default(), 0, 0),
            Err(PathError::UnknownVertex(0)),
        );
    }
}
