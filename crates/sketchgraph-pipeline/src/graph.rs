//! The assembled vertex/edge graph.
//!
//! A [`Graph`] is a plain value: the pipeline builds a new one on every
//! run and never mutates it afterwards, except to attach or clear a
//! shortest-path result.
//!
//! Deserialized graphs are checked the same way [`Graph::assemble`]
//! checks its input, so every `Graph` value satisfies its invariants.

use std::ops::Range;

use petgraph::graph::{NodeIndex, UnGraph};
use serde::{Deserialize, Serialize};

use crate::types::{Pixel, Point};

/// A graph vertex: one deduplicated junction or endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    /// Sequential id, `0..vertex_count`, in raster order of position.
    pub id: usize,
    /// Centroid of the pixels the vertex was merged from.
    pub position: Point,
}

impl Vertex {
    /// Create a vertex.
    #[must_use]
    pub const fn new(id: usize, position: Point) -> Self {
        Self { id, position }
    }

    /// The position rounded to the nearest pixel.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn pixel(&self) -> Pixel {
        Pixel::new(
            self.position.x.round().max(0.0) as u32,
            self.position.y.round().max(0.0) as u32,
        )
    }
}

/// An undirected weighted edge. `u <= v` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    /// Lower vertex id.
    pub u: usize,
    /// Higher vertex id (equal to `u` for a self-loop).
    pub v: usize,
    /// Traversal length in pixels. Non-negative.
    pub weight: f64,
}

impl Edge {
    /// Create an edge, ordering the endpoints so that `u <= v`.
    #[must_use]
    pub fn new(a: usize, b: usize, weight: f64) -> Self {
        Self {
            u: a.min(b),
            v: a.max(b),
            weight,
        }
    }

    /// Whether the weight is finite and non-negative.
    #[must_use]
    pub fn has_valid_weight(&self) -> bool {
        self.weight.is_finite() && self.weight >= 0.0
    }

    /// Whether both ends are the same vertex.
    #[must_use]
    pub const fn is_self_loop(&self) -> bool {
        self.u == self.v
    }

    /// The endpoint opposite `id`, or `None` if `id` is not an endpoint.
    #[must_use]
    pub const fn other(&self, id: usize) -> Option<usize> {
        if id == self.u {
            Some(self.v)
        } else if id == self.v {
            Some(self.u)
        } else {
            None
        }
    }
}

/// Why a serialized graph was rejected.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GraphError {
    /// A vertex id does not match its position in the vertex list.
    #[error("vertex at index {index} has id {id}")]
    NonSequentialId {
        /// Position in the vertex list.
        index: usize,
        /// The id found there.
        id: usize,
    },

    /// An edge or path names a vertex that does not exist.
    #[error("unknown vertex id {0}")]
    UnknownVertex(usize),

    /// An edge weight is negative, infinite or NaN.
    #[error("edge {u}-{v} has invalid weight {weight}")]
    InvalidWeight {
        /// Lower vertex id.
        u: usize,
        /// Higher vertex id.
        v: usize,
        /// The offending weight.
        weight: f64,
    },
}

/// Vertices, edges and an optional attached shortest path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "GraphRecord")]
pub struct Graph {
    vertices: Vec<Vertex>,
    edges: Vec<Edge>,
    shortest_path: Option<Vec<usize>>,
}

/// The unchecked serialized form of a [`Graph`].
#[derive(Deserialize)]
struct GraphRecord {
    vertices: Vec<Vertex>,
    edges: Vec<Edge>,
    #[serde(default)]
    shortest_path: Option<Vec<usize>>,
}

impl TryFrom<GraphRecord> for Graph {
    type Error = GraphError;

    fn try_from(record: GraphRecord) -> Result<Self, Self::Error> {
        if let Some((index, vertex)) = record
            .vertices
            .iter()
            .enumerate()
            .find(|(i, v)| v.id != *i)
        {
            return Err(GraphError::NonSequentialId {
                index,
                id: vertex.id,
            });
        }
        let n = record.vertices.len();
        let path = record.shortest_path.iter().flatten();
        if let Some(id) = record
            .edges
            .iter()
            .flat_map(|e| [e.u, e.v])
            .chain(path.copied())
            .find(|&id| id >= n)
        {
            return Err(GraphError::UnknownVertex(id));
        }
        if let Some(edge) = record.edges.iter().find(|e| !e.has_valid_weight()) {
            return Err(GraphError::InvalidWeight {
                u: edge.u,
                v: edge.v,
                weight: edge.weight,
            });
        }
        Ok(Self {
            vertices: record.vertices,
            edges: record.edges.into_iter().map(|e| Edge::new(e.u, e.v, e.weight)).collect(),
            shortest_path: record.shortest_path,
        })
    }
}

impl Graph {
    /// Combine vertices and edges into a graph.
    ///
    /// Vertex ids must equal their index in `vertices`, every edge must
    /// reference existing ids and every weight must be finite and
    /// non-negative. The pipeline guarantees all three; edges that
    /// violate them are dropped with a warning.
    #[must_use]
    pub fn assemble(vertices: Vec<Vertex>, edges: Vec<Edge>) -> Self {
        debug_assert!(
            vertices.iter().enumerate().all(|(i, v)| v.id == i),
            "vertex ids must be sequential",
        );
        let n = vertices.len();
        let (edges, invalid): (Vec<Edge>, Vec<Edge>) =
            edges.into_iter().partition(|e| e.u < n && e.v < n);
        if !invalid.is_empty() {
            tracing::warn!(count = invalid.len(), "dropping edges with unknown vertices");
        }
        let (edges, unweighable): (Vec<Edge>, Vec<Edge>) =
            edges.into_iter().partition(Edge::has_valid_weight);
        if !unweighable.is_empty() {
            tracing::warn!(
                count = unweighable.len(),
                "dropping edges with negative or non-finite weights"
            );
        }
        Self {
            vertices,
            edges,
            shortest_path: None,
        }
    }

    /// All vertices, ordered by id.
    #[must_use]
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// All edges, including self-loops and parallel edges.
    #[must_use]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// The vertex with `id`.
    #[must_use]
    pub fn vertex(&self, id: usize) -> Option<&Vertex> {
        self.vertices.get(id)
    }

    /// Whether `id` names a vertex of this graph.
    #[must_use]
    pub const fn contains(&self, id: usize) -> bool {
        id < self.vertices.len()
    }

    /// Every valid vertex id: the possible path query endpoints.
    #[must_use]
    pub const fn vertex_ids(&self) -> Range<usize> {
        0..self.vertices.len()
    }

    /// Number of vertices.
    #[must_use]
    pub const fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of edges.
    #[must_use]
    pub const fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Whether the graph has no vertices.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Number of self-loop edges.
    #[must_use]
    pub fn self_loop_count(&self) -> usize {
        self.edges.iter().filter(|e| e.is_self_loop()).count()
    }

    /// Sum of all edge weights.
    #[must_use]
    pub fn total_weight(&self) -> f64 {
        self.edges.iter().map(|e| e.weight).sum()
    }

    /// Neighbours of `id` with the connecting edge weight, one entry per
    /// edge (parallel edges repeat the neighbour). Self-loops are
    /// skipped.
    pub fn neighbors(&self, id: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.edges
            .iter()
            .filter(|e| !e.is_self_loop())
            .filter_map(move |e| e.other(id).map(|other| (other, e.weight)))
    }

    /// The attached shortest path, if any.
    #[must_use]
    pub fn shortest_path(&self) -> Option<&[usize]> {
        self.shortest_path.as_deref()
    }

    /// Attach a shortest path (vertex ids from start to end).
    #[must_use]
    pub fn with_shortest_path(mut self, path: Vec<usize>) -> Self {
        self.shortest_path = Some(path);
        self
    }

    /// Remove any attached shortest path.
    pub fn clear_shortest_path(&mut self) {
        self.shortest_path = None;
    }

    /// Adjacency as a petgraph graph. Node index `i` is vertex `i`;
    /// self-loops are left out.
    #[must_use]
    pub fn to_petgraph(&self) -> UnGraph<usize, f64> {
        let mut graph = UnGraph::with_capacity(self.vertices.len(), self.edges.len());
        for vertex in &self.vertices {
            graph.add_node(vertex.id);
        }
        for edge in self.edges.iter().filter(|e| !e.is_self_loop()) {
            graph.add_edge(NodeIndex::new(edge.u), NodeIndex::new(edge.v), edge.weight);
        }
        graph
    }
}
