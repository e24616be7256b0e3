//! The stage driver: a fold over the enabled [`StageId`]s.
//!
//! Every run starts from the canonical RGB input and threads a
//! [`Working`] accumulator through the enabled stages in the fixed
//! order of [`StageId::ALL`]. Each stage appends exactly one [`Step`].
//!
//! Stages that consume a skeleton read whatever binary image is current
//! when thinning is disabled, so disabling an early stage never breaks a
//! later one. Stages that need vertex data which was never produced
//! (e.g. path colouring with vertex search disabled) pass the previous
//! image through and report [`StageMetrics::Skipped`].

use std::borrow::Cow;

use image::DynamicImage;

use crate::dedup::{self, VertexCluster};
use crate::diagnostics::{
    Clock, PipelineDiagnostics, PipelineSummary, StageDiagnostics, StageMetrics,
};
use crate::graph::{Graph, Vertex};
use crate::grid::{BinaryGrid, FOREGROUND_THRESHOLD};
use crate::junction::{CandidateKind, VertexCandidate};
use crate::label::SegmentMap;
use crate::stage::{StageId, Step};
use crate::types::{Dimensions, GrayImage, PipelineConfig, RgbImage};
use crate::weigh::{StepMetric, WeightedSegment};

/// Everything a pipeline run produces.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// The canonical RGB input.
    pub original: RgbImage,
    /// One step per enabled stage, in pipeline order.
    pub steps: Vec<Step>,
    /// The assembled graph.
    pub graph: Graph,
    /// Source image dimensions.
    pub dimensions: Dimensions,
}

impl PipelineOutput {
    /// The step recorded for `stage`, if it was enabled.
    #[must_use]
    pub fn step(&self, stage: StageId) -> Option<&Step> {
        self.steps.iter().find(|s| s.stage == stage)
    }

    /// The last step's image, or the input when every stage is disabled.
    #[must_use]
    pub fn final_image(&self) -> DynamicImage {
        self.steps.last().map_or_else(
            || DynamicImage::ImageRgb8(self.original.clone()),
            |step| step.image.clone(),
        )
    }
}

/// The current raster: colour until something reduces it to one channel.
#[derive(Debug, Clone)]
enum Raster {
    Color(RgbImage),
    Gray(GrayImage),
}

impl Raster {
    fn to_rgb(&self) -> Cow<'_, RgbImage> {
        match self {
            Self::Color(rgb) => Cow::Borrowed(rgb),
            Self::Gray(gray) => Cow::Owned(DynamicImage::ImageLuma8(gray.clone()).to_rgb8()),
        }
    }

    fn to_gray(&self) -> Cow<'_, GrayImage> {
        match self {
            Self::Color(rgb) => Cow::Owned(image::imageops::grayscale(rgb)),
            Self::Gray(gray) => Cow::Borrowed(gray),
        }
    }
}

/// State threaded through the fold.
#[derive(Debug)]
struct Working {
    raster: Raster,
    skeleton: Option<BinaryGrid>,
    candidates: Option<Vec<VertexCandidate>>,
    clusters: Option<Vec<VertexCluster>>,
    segments: Option<SegmentMap>,
    weighted: Option<Vec<WeightedSegment>>,
}

impl Working {
    fn new(original: &RgbImage) -> Self {
        Self {
            raster: Raster::Color(original.clone()),
            skeleton: None,
            candidates: None,
            clusters: None,
            segments: None,
            weighted: None,
        }
    }

    /// The skeleton, or the current raster read as a binary mask.
    fn grid(&self) -> Cow<'_, BinaryGrid> {
        self.skeleton.as_ref().map_or_else(
            || Cow::Owned(BinaryGrid::from_gray(&self.raster.to_gray())),
            Cow::Borrowed,
        )
    }

    /// Deduplicated vertices, falling back to one vertex per candidate
    /// when deduplication did not run.
    fn ensure_clusters(&mut self) -> Option<&[VertexCluster]> {
        if self.clusters.is_none() {
            self.clusters = self.candidates.as_deref().map(dedup::singleton_clusters);
        }
        self.clusters.as_deref()
    }

    fn into_graph(mut self) -> Graph {
        let vertices = self
            .ensure_clusters()
            .unwrap_or_default()
            .iter()
            .enumerate()
            .map(|(id, cluster)| Vertex::new(id, cluster.position))
            .collect();
        let edges = self
            .weighted
            .unwrap_or_default()
            .into_iter()
            .map(|w| w.edge)
            .collect();
        Graph::assemble(vertices, edges)
    }
}

/// Result of one stage: the new state, the step image (`None` to repeat
/// the previous one) and its metrics.
type Applied = (Working, Option<DynamicImage>, StageMetrics);

/// Run every enabled stage over `original`.
///
/// `config` must already be validated.
pub(crate) fn run<C: Clock>(
    original: RgbImage,
    config: &PipelineConfig,
    clock: &C,
) -> (PipelineOutput, PipelineDiagnostics) {
    let pipeline_start = clock.now();
    let dimensions = Dimensions {
        width: original.width(),
        height: original.height(),
    };

    let mut steps: Vec<Step> = Vec::new();
    let mut stages = Vec::new();
    let working = StageId::ALL
        .into_iter()
        .filter(|stage| stage.is_enabled(&config.stages))
        .fold(Working::new(&original), |working, stage| {
            let start = clock.now();
            let (working, image, metrics) = apply(stage, working, config);
            let duration = clock.elapsed(&start);
            tracing::debug!(stage = stage.name(), ?metrics, "stage finished");

            let image = image.unwrap_or_else(|| {
                steps.last().map_or_else(
                    || DynamicImage::ImageRgb8(original.clone()),
                    |previous| previous.image.clone(),
                )
            });
            steps.push(Step { stage, image });
            stages.push(StageDiagnostics {
                stage,
                duration,
                metrics,
            });
            working
        });

    let graph = working.into_graph();
    tracing::debug!(
        vertices = graph.vertex_count(),
        edges = graph.edge_count(),
        "graph assembled"
    );

    let diagnostics = PipelineDiagnostics {
        stages,
        total_duration: clock.elapsed(&pipeline_start),
        summary: PipelineSummary {
            image_width: dimensions.width,
            image_height: dimensions.height,
            step_count: steps.len(),
            vertex_count: graph.vertex_count(),
            edge_count: graph.edge_count(),
        },
    };
    let output = PipelineOutput {
        original,
        steps,
        graph,
        dimensions,
    };
    (output, diagnostics)
}

fn apply(stage: StageId, working: Working, config: &PipelineConfig) -> Applied {
    match stage {
        StageId::Segmentation => segment(working, config),
        StageId::Binarization => binarize(working),
        StageId::MorphClose => {
            let closed = crate::morphology::close(&working.raster.to_gray(), config.morph_kernel_size);
            let metrics = StageMetrics::MorphClose {
                kernel_size: config.morph_kernel_size,
                foreground_pixels: foreground_pixels(&closed),
            };
            replace_mask(working, closed, metrics)
        }
        StageId::Filter => {
            let smoothed = crate::filter::bilateral(
                &working.raster.to_gray(),
                config.bilateral_radius,
                config.bilateral_sigma_color,
                config.bilateral_sigma_space,
            );
            let metrics = StageMetrics::Filter {
                radius: config.bilateral_radius,
                foreground_pixels: foreground_pixels(&smoothed),
            };
            replace_mask(working, smoothed, metrics)
        }
        StageId::Skeletonization => skeletonize(working),
        StageId::BranchRemoval => remove_branches(working, config),
        StageId::VertexSearch => search_vertices(working),
        StageId::VertexDeduplication => deduplicate(working, config),
        StageId::PathColoring => color_paths(working),
        StageId::PathFlooding => flood_paths(working, config),
    }
}

fn segment(mut working: Working, config: &PipelineConfig) -> Applied {
    let result = crate::segmentation::kmeans_segment(
        &working.raster.to_rgb(),
        config.cluster_count,
        config.kmeans_max_iterations,
    );
    let metrics = StageMetrics::Segmentation {
        cluster_count: result.centers.len(),
        iterations: result.iterations,
    };
    let image = DynamicImage::ImageRgb8(result.image.clone());
    working.raster = Raster::Color(result.image);
    (working, Some(image), metrics)
}

fn binarize(working: Working) -> Applied {
    let binarized = crate::binarize::otsu_binarize(&working.raster.to_gray());
    let metrics = StageMetrics::Binarization {
        level: binarized.level,
        foreground_pixels: foreground_pixels(&binarized.mask),
    };
    replace_mask(working, binarized.mask, metrics)
}

fn replace_mask(mut working: Working, mask: GrayImage, metrics: StageMetrics) -> Applied {
    if foreground_pixels(&mask) == 0 {
        tracing::warn!("mask is empty");
    }
    let image = DynamicImage::ImageLuma8(mask.clone());
    working.raster = Raster::Gray(mask);
    (working, Some(image), metrics)
}

fn skeletonize(mut working: Working) -> Applied {
    let mask = BinaryGrid::from_gray(&working.raster.to_gray());
    let skeleton = crate::skeleton::skeletonize(&mask);
    if skeleton.is_empty() {
        tracing::warn!("skeleton is empty");
    }
    let metrics = StageMetrics::Skeletonization {
        pixels_before: mask.count(),
        pixels_after: skeleton.count(),
        components: skeleton.component_count(),
    };
    let image = skeleton.to_gray();
    working.raster = Raster::Gray(image.clone());
    working.skeleton = Some(skeleton);
    (working, Some(DynamicImage::ImageLuma8(image)), metrics)
}

fn remove_branches(mut working: Working, config: &PipelineConfig) -> Applied {
    let pruned = crate::prune::prune(&working.grid(), config.prune_length);
    let metrics = StageMetrics::BranchRemoval {
        pixels_removed: pruned.pixels_removed,
        spurs_removed: pruned.spurs_removed,
    };
    let image = pruned.skeleton.to_gray();
    working.raster = Raster::Gray(image.clone());
    working.skeleton = Some(pruned.skeleton);
    (working, Some(DynamicImage::ImageLuma8(image)), metrics)
}

fn search_vertices(mut working: Working) -> Applied {
    let grid = working.grid();
    let candidates = crate::junction::find_candidates(&grid);
    let count = |kind| candidates.iter().filter(|c| c.kind() == kind).count();
    let metrics = StageMetrics::VertexSearch {
        endpoints: count(CandidateKind::Endpoint),
        junctions: count(CandidateKind::Junction),
        isolated: count(CandidateKind::Isolated),
    };
    let image = crate::render::candidates_snapshot(&grid, &candidates);
    drop(grid);
    working.candidates = Some(candidates);
    working.clusters = None;
    (working, Some(DynamicImage::ImageRgb8(image)), metrics)
}

fn deduplicate(mut working: Working, config: &PipelineConfig) -> Applied {
    let Some(candidates) = working.candidates.as_deref() else {
        return skipped(working, "no vertex candidates");
    };
    let clusters = dedup::deduplicate(candidates, config.dedup_distance);
    let metrics = StageMetrics::VertexDeduplication {
        candidates: candidates.len(),
        vertices: clusters.len(),
    };
    let image = crate::render::vertices_snapshot(&working.grid(), &clusters);
    working.clusters = Some(clusters);
    (working, Some(DynamicImage::ImageRgb8(image)), metrics)
}

fn color_paths(mut working: Working) -> Applied {
    let grid = working.grid().into_owned();
    let Some(vertices) = working.ensure_clusters() else {
        return skipped(working, "no vertices");
    };
    let map = crate::label::label_segments(&grid, vertices);
    let metrics = StageMetrics::PathColoring {
        segments: map.segments.len(),
        dangling: map.dangling.len(),
    };
    let image = crate::render::segments_snapshot(&map);
    working.segments = Some(map);
    (working, Some(DynamicImage::ImageRgb8(image)), metrics)
}

fn flood_paths(mut working: Working, config: &PipelineConfig) -> Applied {
    let (Some(map), Some(vertices)) = (working.segments.as_ref(), working.clusters.as_deref())
    else {
        return skipped(working, "no labelled segments");
    };
    let metric = StepMetric::from_diagonal_weighting(config.diagonal_weighting);
    let weighted = crate::weigh::weigh_segments(map, vertices, metric);
    let metrics = StageMetrics::PathFlooding {
        edges: weighted.len(),
        self_loops: weighted.iter().filter(|w| w.edge.is_self_loop()).count(),
        total_weight: weighted.iter().map(|w| w.edge.weight).sum(),
    };
    let image = crate::render::flooding_snapshot(map, &weighted, vertices);
    working.weighted = Some(weighted);
    (working, Some(DynamicImage::ImageRgb8(image)), metrics)
}

fn skipped(working: Working, reason: &str) -> Applied {
    tracing::debug!(reason, "stage input missing, passing through");
    let metrics = StageMetrics::Skipped {
        reason: reason.to_owned(),
    };
    (working, None, metrics)
}

fn foreground_pixels(mask: &GrayImage) -> usize {
    mask.pixels().filter(|p| p.0[0] > FOREGROUND_THRESHOLD).count()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::Rgb;

    use super::*;
    use crate::diagnostics::NoClock;
    use crate::types::StageToggles;

    /// A dark horizontal stroke on white paper.
    fn stroke_image() -> RgbImage {
        RgbImage::from_fn(140, 30, |x, y| {
            if (20..120).contains(&x) && (14..17).contains(&y) {
                Rgb([0, 0, 0])
            } else {
                Rgb([255, 255, 255])
            }
        })
    }

    fn run_with(config: &PipelineConfig) -> (PipelineOutput, PipelineDiagnostics) {
        run(stroke_image(), config, &NoClock)
    }

    #[test]
    fn one_step_per_enabled_stage() {
        let config = PipelineConfig::default();
        let (output, diagnostics) = run_with(&config);
        let stages: Vec<_> = output.steps.iter().map(|s| s.stage).collect();
        assert_eq!(stages, StageId::ALL.to_vec());
        assert_eq!(diagnostics.stages.len(), StageId::ALL.len());
        assert_eq!(diagnostics.summary.step_count, StageId::ALL.len());
    }

    #[test]
    fn all_disabled_returns_input() {
        let config = PipelineConfig {
            stages: StageToggles::ALL_DISABLED,
            ..PipelineConfig::default()
        };
        let (output, _) = run_with(&config);
        assert!(output.steps.is_empty());
        assert!(output.graph.is_empty());
        assert_eq!(output.final_image().to_rgb8(), output.original);
    }

    #[test]
    fn dedup_without_candidates_passes_through() {
        let config = PipelineConfig {
            stages: StageToggles::default().with(StageId::VertexSearch, false),
            ..PipelineConfig::default()
        };
        let (output, diagnostics) = run_with(&config);
        let dedup = diagnostics.stage(StageId::VertexDeduplication).unwrap();
        assert!(matches!(dedup.metrics, StageMetrics::Skipped { .. }));

        let pruned = output.step(StageId::BranchRemoval).unwrap();
        let passed = output.step(StageId::VertexDeduplication).unwrap();
        assert_eq!(passed.image, pruned.image);
        assert!(output.graph.is_empty());
    }

    #[test]
    fn disabled_flooding_keeps_vertices_without_edges() {
        let config = PipelineConfig {
            stages: StageToggles::default().with(StageId::PathFlooding, false),
            ..PipelineConfig::default()
        };
        let (output, _) = run_with(&config);
        assert_eq!(output.graph.vertex_count(), 2);
        assert_eq!(output.graph.edge_count(), 0);
    }

    #[test]
    fn disabled_dedup_uses_every_candidate() {
        let config = PipelineConfig {
            stages: StageToggles::default().with(StageId::VertexDeduplication, false),
            ..PipelineConfig::default()
        };
        let (output, _) = run_with(&config);
        assert_eq!(output.graph.vertex_count(), 2);
        assert_eq!(output.graph.edge_count(), 1);
    }

    /// A 1-pixel "+" whose centre leaves five touching junction pixels.
    fn cross_image() -> RgbImage {
        RgbImage::from_fn(70, 60, |x, y| {
            let bar = y == 30 && (10..=60).contains(&x);
            let post = x == 35 && (5..=55).contains(&y);
            if bar || post {
                Rgb([0, 0, 0])
            } else {
                Rgb([255, 255, 255])
            }
        })
    }

    #[test]
    fn disabled_dedup_keeps_junction_connected() {
        let config = PipelineConfig {
            stages: StageToggles::default().with(StageId::VertexDeduplication, false),
            ..PipelineConfig::default()
        };
        let (output, _) = run(cross_image(), &config, &NoClock);
        let graph = &output.graph;
        assert_eq!(graph.vertex_count(), 9);

        for v in graph.vertex_ids() {
            let result = crate::path::shortest_path(graph, 0, v).unwrap();
            assert!(result.vertices().is_some(), "vertex {v} unreachable");
        }

        let at = |x, y| {
            graph
                .vertices()
                .iter()
                .find(|v| v.pixel() == crate::types::Pixel::new(x, y))
                .map(|v| v.id)
                .unwrap()
        };
        let result = crate::path::shortest_path(graph, at(10, 30), at(60, 30)).unwrap();
        let weight = result.total_weight().unwrap();
        assert!((49.0..=51.0).contains(&weight), "weight {weight}");
    }

    #[test]
    fn deduplicated_cross_has_one_centre() {
        let (output, _) = run(cross_image(), &PipelineConfig::default(), &NoClock);
        assert_eq!(output.graph.vertex_count(), 5);
        assert_eq!(output.graph.edge_count(), 4);
        assert_eq!(output.graph.self_loop_count(), 0);
    }

    #[test]
    fn blank_image_yields_empty_graph() {
        let blank = RgbImage::from_pixel(40, 40, Rgb([255, 255, 255]));
        let (output, diagnostics) = run(blank, &PipelineConfig::default(), &NoClock);
        assert!(output.graph.is_empty());
        assert_eq!(output.graph.edge_count(), 0);
        assert_eq!(diagnostics.summary.vertex_count, 0);
    }

    #[test]
    fn steps_keep_source_dimensions() {
        let (output, _) = run_with(&PipelineConfig::default());
        for step in &output.steps {
            assert_eq!(
                (step.image.width(), step.image.height()),
                (output.dimensions.width, output.dimensions.height),
                "{}",
                step.stage,
            );
        }
    }
}
