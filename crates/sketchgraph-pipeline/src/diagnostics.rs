//! Pipeline diagnostics: timing, counts, and other metrics for each stage.
//!
//! These diagnostics are permanent instrumentation intended for
//! parameter tuning. [`process_with_diagnostics`](crate::process_with_diagnostics)
//! collects one [`StageDiagnostics`] per enabled stage alongside the
//! normal pipeline output.
//!
//! The pipeline never reads the system clock itself: the caller passes a
//! [`Clock`]. Durations are serialized as fractional seconds (`f64`) for
//! JSON compatibility, since `std::time::Duration` does not implement
//! serde traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::stage::StageId;

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Source of timestamps for stage timing.
pub trait Clock {
    /// Opaque timestamp.
    type Instant;

    /// The current time.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// A clock that never advances. Used when timing is not wanted.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoClock;

impl Clock for NoClock {
    type Instant = ();

    fn now(&self) {}

    fn elapsed(&self, _since: &()) -> Duration {
        Duration::ZERO
    }
}

/// Diagnostics collected from a single pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// One entry per enabled stage, in pipeline order.
    pub stages: Vec<StageDiagnostics>,
    /// Total wall-clock duration of the entire pipeline (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary counts across all stages.
    pub summary: PipelineSummary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Which stage.
    pub stage: StageId,
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics.
///
/// Stages that ran without the input they need (e.g. deduplication with
/// vertex search disabled) report [`StageMetrics::Skipped`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StageMetrics {
    /// k-means segmentation.
    Segmentation {
        /// Clusters used.
        cluster_count: usize,
        /// Lloyd iterations run.
        iterations: usize,
    },
    /// Otsu binarization.
    Binarization {
        /// Chosen level (`None` for a uniform image).
        level: Option<u8>,
        /// Foreground pixels in the mask.
        foreground_pixels: usize,
    },
    /// Morphological closing.
    MorphClose {
        /// Structuring element side length.
        kernel_size: u32,
        /// Foreground pixels after closing.
        foreground_pixels: usize,
    },
    /// Bilateral smoothing.
    Filter {
        /// Window half-width.
        radius: u32,
        /// Foreground pixels after smoothing.
        foreground_pixels: usize,
    },
    /// Thinning.
    Skeletonization {
        /// Foreground pixels before thinning.
        pixels_before: usize,
        /// Skeleton pixels.
        pixels_after: usize,
        /// 8-connected components (identical before and after).
        components: usize,
    },
    /// Spur pruning.
    BranchRemoval {
        /// Pixels erased.
        pixels_removed: usize,
        /// Spurs erased.
        spurs_removed: usize,
    },
    /// Candidate detection.
    VertexSearch {
        /// Degree-1 pixels.
        endpoints: usize,
        /// Degree-3+ pixels.
        junctions: usize,
        /// Degree-0 pixels.
        isolated: usize,
    },
    /// Candidate clustering.
    VertexDeduplication {
        /// Candidates in.
        candidates: usize,
        /// Vertices out.
        vertices: usize,
    },
    /// Segment labelling.
    PathColoring {
        /// Segments attached at both ends.
        segments: usize,
        /// Components discarded as dangling.
        dangling: usize,
    },
    /// Segment weighing.
    PathFlooding {
        /// Edges produced.
        edges: usize,
        /// Of which self-loops.
        self_loops: usize,
        /// Sum of edge weights.
        total_weight: f64,
    },
    /// The stage ran but had no input to work on and passed through.
    Skipped {
        /// Why.
        reason: String,
    },
}

/// High-level summary counts for the entire pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Source image width in pixels.
    pub image_width: u32,
    /// Source image height in pixels.
    pub image_height: u32,
    /// Steps recorded (one per enabled stage).
    pub step_count: usize,
    /// Vertices in the final graph.
    pub vertex_count: usize,
    /// Edges in the final graph.
    pub edge_count: usize,
}

impl PipelineDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Pipeline Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{}",
            self.summary.image_width, self.summary.image_height,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        for diag in &self.stages {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let name = diag.stage.label();
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!(
            "Steps: {}  |  Vertices: {}  |  Edges: {}",
            self.summary.step_count, self.summary.vertex_count, self.summary.edge_count,
        ));

        lines.join("\n")
    }

    /// Diagnostics for `stage`, if it ran.
    #[must_use]
    pub fn stage(&self, stage: StageId) -> Option<&StageDiagnostics> {
        self.stages.iter().find(|d| d.stage == stage)
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Segmentation {
            cluster_count,
            iterations,
        } => format!("k={cluster_count} iterations={iterations}"),
        StageMetrics::Binarization {
            level,
            foreground_pixels,
        } => match level {
            Some(level) => format!("level={level} foreground={foreground_pixels}"),
            None => format!("uniform image, foreground={foreground_pixels}"),
        },
        StageMetrics::MorphClose {
            kernel_size,
            foreground_pixels,
        } => format!("kernel={kernel_size}x{kernel_size} foreground={foreground_pixels}"),
        StageMetrics::Filter {
            radius,
            foreground_pixels,
        } => format!("radius={radius} foreground={foreground_pixels}"),
        StageMetrics::Skeletonization {
            pixels_before,
            pixels_after,
            components,
        } => format!("{pixels_before} -> {pixels_after} px, {components} components"),
        StageMetrics::BranchRemoval {
            pixels_removed,
            spurs_removed,
        } => format!("removed {pixels_removed} px in {spurs_removed} spurs"),
        StageMetrics::VertexSearch {
            endpoints,
            junctions,
            isolated,
        } => format!("endpoints={endpoints} junctions={junctions} isolated={isolated}"),
        StageMetrics::VertexDeduplication {
            candidates,
            vertices,
        } => format!("{candidates} candidates -> {vertices} vertices"),
        StageMetrics::PathColoring { segments, dangling } => {
            format!("segments={segments} dangling={dangling}")
        }
        StageMetrics::PathFlooding {
            edges,
            self_loops,
            total_weight,
        } => format!("edges={edges} self_loops={self_loops} total_weight={total_weight:.1}"),
        StageMetrics::Skipped { reason } => format!("skipped: {reason}"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample() -> PipelineDiagnostics {
        PipelineDiagnostics {
            stages: vec![
                StageDiagnostics {
                    stage: StageId::Binarization,
                    duration: Duration::from_millis(10),
                    metrics: StageMetrics::Binarization {
                        level: Some(120),
                        foreground_pixels: 500,
                    },
                },
                StageDiagnostics {
                    stage: StageId::PathFlooding,
                    duration: Duration::from_millis(30),
                    metrics: StageMetrics::PathFlooding {
                        edges: 4,
                        self_loops: 1,
                        total_weight: 321.5,
                    },
                },
            ],
            total_duration: Duration::from_millis(40),
            summary: PipelineSummary {
                image_width: 100,
                image_height: 80,
                step_count: 2,
                vertex_count: 5,
                edge_count: 4,
            },
        }
    }

    #[test]
    fn duration_ms_converts_correctly() {
        let d = Duration::from_micros(1500);
        assert!((duration_ms(d) - 1.5).abs() < 1e-10);
    }

    #[test]
    fn no_clock_reports_zero() {
        let clock = NoClock;
        let start = clock.now();
        assert_eq!(clock.elapsed(&start), Duration::ZERO);
    }

    #[test]
    fn report_lists_every_stage() {
        let report = sample().report();
        assert!(report.contains("Pipeline Diagnostics Report"));
        assert!(report.contains("Binarization"));
        assert!(report.contains("level=120"));
        assert!(report.contains("Path flooding"));
        assert!(report.contains("Vertices: 5"));
    }

    #[test]
    fn durations_serialize_as_seconds() {
        let json = serde_json::to_value(sample()).unwrap();
        assert!((json["total_duration"].as_f64().unwrap() - 0.04).abs() < 1e-12);
        assert_eq!(json["stages"][0]["stage"], "binarization");
        let back: PipelineDiagnostics = serde_json::from_value(json).unwrap();
        assert_eq!(back.stages.len(), 2);
        assert_eq!(
            back.stage(StageId::PathFlooding).map(|d| d.duration),
            Some(Duration::from_millis(30)),
        );
    }
}
