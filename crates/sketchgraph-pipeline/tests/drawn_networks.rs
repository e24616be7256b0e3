//! Integration tests: synthetic network drawings through the full pipeline.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use image::{Rgb, RgbImage};
use sketchgraph_pipeline::dedup::deduplicate;
use sketchgraph_pipeline::grid::BinaryGrid;
use sketchgraph_pipeline::junction::VertexCandidate;
use sketchgraph_pipeline::prune::prune;
use sketchgraph_pipeline::skeleton::skeletonize;
use sketchgraph_pipeline::{
    OverlayStyle, PipelineConfig, PipelineError, Pixel, StageId, StageToggles, process_bytes,
    render_overlay, shortest_path,
};

const PAPER: Rgb<u8> = Rgb([250, 250, 245]);
const INK: Rgb<u8> = Rgb([20, 20, 30]);

fn png_bytes(image: &RgbImage) -> Vec<u8> {
    let mut buf = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new(&mut buf);
    image::ImageEncoder::write_image(
        encoder,
        image.as_raw(),
        image.width(),
        image.height(),
        image::ExtendedColorType::Rgb8,
    )
    .unwrap();
    buf
}

/// A dark 100-pixel stroke, three pixels thick, on light paper.
fn stroke() -> RgbImage {
    RgbImage::from_fn(140, 40, |x, y| {
        if (20..120).contains(&x) && (19..22).contains(&y) {
            INK
        } else {
            PAPER
        }
    })
}

/// An "H": two 81-pixel uprights joined by a crossbar at mid height.
fn letter_h() -> RgbImage {
    RgbImage::from_fn(100, 120, |x, y| {
        let upright = (x == 20 || x == 80) && (20..=100).contains(&y);
        let bar = y == 60 && (20..=80).contains(&x);
        if upright || bar { INK } else { PAPER }
    })
}

#[test]
fn straight_stroke_becomes_one_edge() {
    let output = process_bytes(&png_bytes(&stroke()), &PipelineConfig::default()).unwrap();
    let graph = &output.graph;
    assert_eq!(graph.vertex_count(), 2);
    assert_eq!(graph.edge_count(), 1);

    let edge = graph.edges()[0];
    assert_eq!((edge.u, edge.v), (0, 1));
    assert!(
        (95.0..=101.0).contains(&edge.weight),
        "weight {}",
        edge.weight
    );

    let result = shortest_path(graph, 0, 1).unwrap();
    assert_eq!(result.vertices(), Some(&[0, 1][..]));
}

#[test]
fn letter_h_has_six_vertices_and_five_edges() {
    let output = process_bytes(&png_bytes(&letter_h()), &PipelineConfig::default()).unwrap();
    let graph = &output.graph;
    assert_eq!(graph.vertex_count(), 6);
    assert_eq!(graph.edge_count(), 5);
    assert_eq!(graph.self_loop_count(), 0);

    // Vertices are numbered in raster order: the two top ends first.
    let top: Vec<_> = graph.vertices()[..2].iter().map(|v| v.pixel()).collect();
    assert_eq!(top, vec![Pixel::new(20, 20), Pixel::new(80, 20)]);

    // Top-left to bottom-right must cross the bar.
    let result = shortest_path(graph, 0, 5).unwrap();
    let weight = result.total_weight().unwrap();
    assert!((135.0..=145.0).contains(&weight), "weight {weight}");
    assert_eq!(result.vertices().map(<[usize]>::len), Some(4));
}

#[test]
fn every_edge_references_known_vertices() {
    let output = process_bytes(&png_bytes(&letter_h()), &PipelineConfig::default()).unwrap();
    let graph = &output.graph;
    for edge in graph.edges() {
        assert!(graph.contains(edge.u) && graph.contains(edge.v));
        assert!(edge.u <= edge.v);
        assert!(edge.weight >= 0.0);
    }
}

#[test]
fn pipeline_is_deterministic() {
    let bytes = png_bytes(&letter_h());
    let config = PipelineConfig::default();
    let first = process_bytes(&bytes, &config).unwrap();
    let second = process_bytes(&bytes, &config).unwrap();
    assert_eq!(first.graph, second.graph);
    for (a, b) in first.steps.iter().zip(&second.steps) {
        assert_eq!(a.stage, b.stage);
        assert_eq!(a.image, b.image);
    }
}

#[test]
fn steps_follow_stage_order() {
    let config = PipelineConfig {
        stages: StageToggles::default()
            .with(StageId::Segmentation, false)
            .with(StageId::Filter, false),
        ..PipelineConfig::default()
    };
    let output = process_bytes(&png_bytes(&stroke()), &config).unwrap();
    let names: Vec<_> = output.steps.iter().map(|s| s.stage.name()).collect();
    assert_eq!(
        names,
        vec![
            "binarization",
            "morph_close",
            "skeletonization",
            "branch_removal",
            "vertex_search",
            "vertex_deduplication",
            "path_coloring",
            "path_flooding",
        ]
    );
    assert!(output.step(StageId::Filter).is_none());
}

#[test]
fn blank_paper_yields_empty_graph() {
    let blank = RgbImage::from_pixel(60, 60, PAPER);
    let output = process_bytes(&png_bytes(&blank), &PipelineConfig::default()).unwrap();
    assert!(output.graph.is_empty());
    assert_eq!(output.graph.edge_count(), 0);
}

#[test]
fn disabled_flooding_yields_no_edges() {
    let config = PipelineConfig {
        stages: StageToggles::default().with(StageId::PathFlooding, false),
        ..PipelineConfig::default()
    };
    let output = process_bytes(&png_bytes(&letter_h()), &config).unwrap();
    assert_eq!(output.graph.vertex_count(), 6);
    assert_eq!(output.graph.edge_count(), 0);
}

#[test]
fn invalid_configuration_is_rejected() {
    let config = PipelineConfig {
        morph_kernel_size: 4,
        ..PipelineConfig::default()
    };
    let result = process_bytes(&png_bytes(&stroke()), &config);
    assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
}

#[test]
fn overlay_marks_vertices_and_path() {
    let output = process_bytes(&png_bytes(&letter_h()), &PipelineConfig::default()).unwrap();
    let path = shortest_path(&output.graph, 0, 5).unwrap();
    let graph = output
        .graph
        .clone()
        .with_shortest_path(path.vertices().unwrap().to_vec());
    let style = OverlayStyle::default();
    let overlay = render_overlay(&output.original, &graph, &style);

    assert_eq!(overlay.dimensions(), output.original.dimensions());
    for vertex in graph.vertices() {
        let p = vertex.pixel();
        assert_eq!(overlay.get_pixel(p.x, p.y).0, style.vertex_color);
    }
    // Midway along the crossbar only the highlighted path passes.
    assert_eq!(overlay.get_pixel(50, 60).0, style.path_color);
}

fn thick_shapes() -> BinaryGrid {
    let mut grid = BinaryGrid::new(80, 60);
    // A filled rectangle.
    for y in 5..20 {
        for x in 5..30 {
            grid.set(Pixel::new(x, y), true);
        }
    }
    // A thick ring.
    for y in 25..55 {
        for x in 40..70 {
            let (dx, dy) = (i64::from(x) - 55, i64::from(y) - 40);
            let r2 = dx * dx + dy * dy;
            if (64..=196).contains(&r2) {
                grid.set(Pixel::new(x, y), true);
            }
        }
    }
    // A thick "L".
    for y in 30..55 {
        for x in 5..10 {
            grid.set(Pixel::new(x, y), true);
        }
    }
    for y in 50..55 {
        for x in 5..30 {
            grid.set(Pixel::new(x, y), true);
        }
    }
    grid
}

#[test]
fn skeleton_preserves_components_and_is_thin() {
    let mask = thick_shapes();
    let skeleton = skeletonize(&mask);
    assert_eq!(skeleton.component_count(), mask.component_count());
    assert_eq!(skeleton.component_count(), 3);
    assert!(!skeleton.has_full_2x2_block());
    assert!(skeleton.count() < mask.count());
}

#[test]
fn pruning_is_idempotent() {
    let skeleton = skeletonize(&thick_shapes());
    let once = prune(&skeleton, 10);
    let twice = prune(&once.skeleton, 10);
    assert_eq!(twice.skeleton, once.skeleton);
    assert_eq!(twice.pixels_removed, 0);
}

#[test]
fn deduplicated_vertices_are_separated() {
    let pixels = [
        (10, 10),
        (12, 11),
        (11, 14),
        (30, 10),
        (33, 12),
        (31, 30),
        (50, 50),
        (52, 53),
        (58, 50),
    ];
    let candidates: Vec<_> = pixels
        .iter()
        .map(|&(x, y)| VertexCandidate {
            pixel: Pixel::new(x, y),
            degree: 3,
        })
        .collect();
    let threshold = 8.0;
    let vertices = deduplicate(&candidates, threshold);
    assert!(vertices.len() < candidates.len());
    for (i, a) in vertices.iter().enumerate() {
        for b in &vertices[i + 1..] {
            assert!(a.position.distance(b.position) >= threshold);
        }
    }
}
