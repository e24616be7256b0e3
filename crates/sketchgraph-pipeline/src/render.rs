//! Stage snapshot imagery and the graph overlay.
//!
//! Everything here is pure: each function returns a new image and never
//! touches its inputs.

use image::Rgb;
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut};

use crate::dedup::VertexCluster;
use crate::graph::Graph;
use crate::grid::BinaryGrid;
use crate::junction::{CandidateKind, VertexCandidate};
use crate::label::SegmentMap;
use crate::types::{Pixel, Point, RgbImage};
use crate::weigh::WeightedSegment;

const SKELETON: Rgb<u8> = Rgb([255, 255, 255]);
const SKELETON_DIM: Rgb<u8> = Rgb([110, 110, 110]);
const ENDPOINT: Rgb<u8> = Rgb([40, 90, 255]);
const JUNCTION: Rgb<u8> = Rgb([255, 40, 40]);
const ISOLATED: Rgb<u8> = Rgb([255, 220, 0]);
const MEMBER: Rgb<u8> = Rgb([255, 150, 0]);
const VERTEX: Rgb<u8> = Rgb([0, 220, 90]);

/// Radius of vertex markers in stage snapshots.
const SNAPSHOT_MARKER_RADIUS: i32 = 2;

/// Drawing options for [`render_overlay`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayStyle {
    /// Radius of the disc drawn at each vertex.
    pub marker_radius: i32,
    /// Edge line colour.
    pub edge_color: [u8; 3],
    /// Vertex disc colour.
    pub vertex_color: [u8; 3],
    /// Colour of the attached shortest path.
    pub path_color: [u8; 3],
    /// Line thickness of the attached shortest path, in pixels.
    pub path_thickness: u32,
    /// Draw the attached shortest path, if the graph carries one.
    pub highlight_path: bool,
}

impl OverlayStyle {
    /// Default marker radius.
    pub const DEFAULT_MARKER_RADIUS: i32 = 6;
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            marker_radius: Self::DEFAULT_MARKER_RADIUS,
            edge_color: [0, 120, 255],
            vertex_color: [255, 40, 40],
            path_color: [0, 200, 60],
            path_thickness: 3,
            highlight_path: true,
        }
    }
}

/// Draw `graph` over a copy of `original`.
///
/// Every edge becomes a straight line between its vertices and every
/// vertex a filled disc. When the graph carries a shortest path and
/// `style.highlight_path` is set, consecutive path vertices are joined
/// by thick lines in the path colour.
#[must_use]
pub fn render_overlay(original: &RgbImage, graph: &Graph, style: &OverlayStyle) -> RgbImage {
    let mut canvas = original.clone();

    for edge in graph.edges().iter().filter(|e| !e.is_self_loop()) {
        if let (Some(a), Some(b)) = (graph.vertex(edge.u), graph.vertex(edge.v)) {
            draw_segment(&mut canvas, a.position, b.position, Rgb(style.edge_color), 1);
        }
    }

    if style.highlight_path
        && let Some(path) = graph.shortest_path()
    {
        for pair in path.windows(2) {
            if let (Some(a), Some(b)) = (graph.vertex(pair[0]), graph.vertex(pair[1])) {
                draw_segment(
                    &mut canvas,
                    a.position,
                    b.position,
                    Rgb(style.path_color),
                    style.path_thickness,
                );
            }
        }
    }

    for vertex in graph.vertices() {
        draw_marker(
            &mut canvas,
            vertex.position,
            style.marker_radius,
            Rgb(style.vertex_color),
        );
    }
    canvas
}

/// Skeleton in white with endpoints blue, junctions red and isolated
/// pixels yellow.
#[must_use]
pub fn candidates_snapshot(skeleton: &BinaryGrid, candidates: &[VertexCandidate]) -> RgbImage {
    let mut canvas = skeleton_canvas(skeleton, SKELETON);
    for candidate in candidates {
        let color = match candidate.kind() {
            CandidateKind::Isolated => ISOLATED,
            CandidateKind::Endpoint => ENDPOINT,
            CandidateKind::Junction => JUNCTION,
        };
        put(&mut canvas, candidate.pixel, color);
    }
    canvas
}

/// Skeleton dimmed, merged candidate pixels orange, one green disc per
/// vertex.
#[must_use]
pub fn vertices_snapshot(skeleton: &BinaryGrid, vertices: &[VertexCluster]) -> RgbImage {
    let mut canvas = skeleton_canvas(skeleton, SKELETON_DIM);
    for vertex in vertices {
        for &member in &vertex.members {
            put(&mut canvas, member, MEMBER);
        }
        draw_marker(&mut canvas, vertex.position, SNAPSHOT_MARKER_RADIUS, VERTEX);
    }
    canvas
}

/// Every segment in its own colour; separators and background black.
#[must_use]
pub fn segments_snapshot(map: &SegmentMap) -> RgbImage {
    let mut canvas = RgbImage::new(map.width(), map.height());
    for segment in &map.segments {
        let color = label_color(segment.label);
        for &p in &segment.pixels {
            put(&mut canvas, p, color);
        }
    }
    canvas
}

/// Segments coloured by their edge weight (light blue for the lightest
/// edge through red for the heaviest), with vertex markers. Direct links
/// between touching vertices are drawn as straight lines.
#[must_use]
pub fn flooding_snapshot(
    map: &SegmentMap,
    weighted: &[WeightedSegment],
    vertices: &[VertexCluster],
) -> RgbImage {
    let mut canvas = RgbImage::new(map.width(), map.height());
    let (lightest, heaviest) = weighted.iter().fold((f64::INFINITY, 0.0_f64), |(lo, hi), w| {
        (lo.min(w.edge.weight), hi.max(w.edge.weight))
    });
    let span = heaviest - lightest;

    for w in weighted {
        let t = if span > 0.0 {
            (w.edge.weight - lightest) / span
        } else {
            0.0
        };
        let color = heat(t);
        let segment = w
            .label
            .and_then(|label| map.segments.iter().find(|s| s.label == label));
        if let Some(segment) = segment {
            for &p in &segment.pixels {
                put(&mut canvas, p, color);
            }
        } else if let (Some(u), Some(v)) = (vertices.get(w.edge.u), vertices.get(w.edge.v)) {
            draw_segment(&mut canvas, u.position, v.position, color, 1);
        }
    }
    for vertex in vertices {
        draw_marker(&mut canvas, vertex.position, SNAPSHOT_MARKER_RADIUS, SKELETON);
    }
    canvas
}

/// A deterministic, well-spread colour for segment `label`.
///
/// Hues step by the golden angle so neighbouring labels differ strongly.
#[must_use]
pub fn label_color(label: u32) -> Rgb<u8> {
    const GOLDEN_ANGLE: f64 = 137.507_764;
    let hue = (f64::from(label) * GOLDEN_ANGLE).rem_euclid(360.0);
    hsv(hue, 0.85, 1.0)
}

/// Map `t` in `[0, 1]` from blue through green to red.
fn heat(t: f64) -> Rgb<u8> {
    hsv(240.0 * (1.0 - t.clamp(0.0, 1.0)), 1.0, 1.0)
}

#[allow(clippy::many_single_char_names)]
fn hsv(hue: f64, saturation: f64, value: f64) -> Rgb<u8> {
    let c = value * saturation;
    let h = hue / 60.0;
    let x = c * (1.0 - (h.rem_euclid(2.0) - 1.0).abs());
    let (r, g, b) = match h {
        h if h < 1.0 => (c, x, 0.0),
        h if h < 2.0 => (x, c, 0.0),
        h if h < 3.0 => (0.0, c, x),
        h if h < 4.0 => (0.0, x, c),
        h if h < 5.0 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = value - c;
    Rgb([r, g, b].map(|channel| to_byte(channel + m)))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_byte(unit: f64) -> u8 {
    (unit * 255.0).round().clamp(0.0, 255.0) as u8
}

fn skeleton_canvas(skeleton: &BinaryGrid, color: Rgb<u8>) -> RgbImage {
    let mut canvas = RgbImage::new(skeleton.width(), skeleton.height());
    for p in skeleton.foreground() {
        put(&mut canvas, p, color);
    }
    canvas
}

fn put(canvas: &mut RgbImage, p: Pixel, color: Rgb<u8>) {
    if p.x < canvas.width() && p.y < canvas.height() {
        canvas.put_pixel(p.x, p.y, color);
    }
}

#[allow(clippy::cast_possible_truncation)]
fn draw_marker(canvas: &mut RgbImage, center: Point, radius: i32, color: Rgb<u8>) {
    let center = (center.x.round() as i32, center.y.round() as i32);
    draw_filled_circle_mut(canvas, center, radius.max(0), color);
}

/// Draw a line `thickness` pixels wide by stacking offset copies.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn draw_segment(canvas: &mut RgbImage, a: Point, b: Point, color: Rgb<u8>, thickness: u32) {
    let (ax, ay) = (a.x as f32, a.y as f32);
    let (bx, by) = (b.x as f32, b.y as f32);
    let half = thickness.saturating_sub(1) as f32 / 2.0;
    for t in 0..thickness.max(1) {
        let offset = t as f32 - half;
        draw_line_segment_mut(canvas, (ax + offset, ay), (bx + offset, by), color);
        draw_line_segment_mut(canvas, (ax, ay + offset), (bx, by + offset), color);
    }
}
