//! sketchgraph-bench: CLI tool for running the pipeline on image files.
//!
//! Reads a photograph of a drawn network, runs the image-to-graph
//! pipeline with configurable stages and parameters, and prints per-stage
//! diagnostics. Optionally:
//!
//! - writes every stage snapshot as a PNG (`--steps-dir`)
//! - writes the original image with the graph drawn over it (`--overlay`)
//! - answers a shortest-path query between two vertex ids (`--from`/`--to`)
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin sketchgraph-bench -- [OPTIONS] <IMAGE_PATH>
//! ```
//!
//! Set `RUST_LOG=sketchgraph_pipeline=debug` to see per-stage events.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::Parser;
use serde::Serialize;
use sketchgraph_pipeline::diagnostics::{Clock, PipelineDiagnostics};
use sketchgraph_pipeline::{
    Graph, OverlayStyle, PathResult, PipelineConfig, PipelineOutput, StageId, StageToggles,
};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Turn a photographed network drawing into a weighted graph.
///
/// Runs the image-to-graph pipeline on a given image and prints detailed
/// per-stage timing and count diagnostics.
#[derive(Parser)]
#[command(name = "sketchgraph-bench", version)]
#[allow(clippy::struct_excessive_bools)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    image_path: PathBuf,

    /// Skip k-means colour segmentation.
    #[arg(long)]
    no_segmentation: bool,

    /// Skip Otsu binarization (gray values above 127 count as foreground).
    #[arg(long)]
    no_binarization: bool,

    /// Skip morphological closing.
    #[arg(long)]
    no_morph_close: bool,

    /// Skip bilateral smoothing.
    #[arg(long)]
    no_filter: bool,

    /// Skip thinning.
    #[arg(long)]
    no_skeletonization: bool,

    /// Skip spur pruning.
    #[arg(long)]
    no_branch_removal: bool,

    /// Skip vertex search.
    #[arg(long)]
    no_vertex_search: bool,

    /// Skip vertex deduplication (every candidate becomes a vertex).
    #[arg(long)]
    no_vertex_deduplication: bool,

    /// Skip segment labelling.
    #[arg(long)]
    no_path_coloring: bool,

    /// Skip segment weighing (the graph gets no edges).
    #[arg(long)]
    no_path_flooding: bool,

    /// Disable every stage after this one (e.g. `skeletonization`).
    #[arg(long, value_name = "STAGE", value_parser = parse_stage)]
    stop_after: Option<StageId>,

    /// Number of k-means colour clusters.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_CLUSTER_COUNT, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    cluster_count: usize,

    /// Maximum k-means iterations.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_KMEANS_MAX_ITERATIONS)]
    kmeans_max_iterations: usize,

    /// Side length of the square closing kernel (odd).
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_MORPH_KERNEL_SIZE)]
    morph_kernel_size: u32,

    /// Bilateral filter window radius in pixels.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_BILATERAL_RADIUS)]
    bilateral_radius: u32,

    /// Bilateral filter range sigma.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_BILATERAL_SIGMA_COLOR)]
    bilateral_sigma_color: f64,

    /// Bilateral filter spatial sigma.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_BILATERAL_SIGMA_SPACE)]
    bilateral_sigma_space: f64,

    /// Spurs shorter than this many pixels are pruned.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_PRUNE_LENGTH)]
    prune_length: u32,

    /// Vertex candidates closer than this many pixels are merged.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_DEDUP_DISTANCE)]
    dedup_distance: f64,

    /// Count every skeleton step as 1 instead of weighting diagonals by sqrt(2).
    #[arg(long)]
    no_diagonal_weighting: bool,

    /// Full pipeline config as a JSON string.
    ///
    /// When provided, all other pipeline parameter flags are ignored.
    /// The JSON must be a valid `PipelineConfig` serialization; missing
    /// fields take their defaults.
    #[arg(long)]
    config_json: Option<String>,

    /// Directory to write one PNG per pipeline step into.
    #[arg(long)]
    steps_dir: Option<PathBuf>,

    /// Write the original image with the graph drawn over it.
    #[arg(long)]
    overlay: Option<PathBuf>,

    /// Vertex marker radius in the overlay.
    #[arg(long, default_value_t = OverlayStyle::DEFAULT_MARKER_RADIUS)]
    marker_radius: i32,

    /// Start vertex id of a shortest-path query.
    #[arg(long, requires = "to")]
    from: Option<usize>,

    /// End vertex id of a shortest-path query.
    #[arg(long, requires = "from")]
    to: Option<usize>,

    /// Number of runs for averaging.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Output diagnostics, graph and path as JSON instead of a report.
    #[arg(long)]
    json: bool,
}

/// Everything `--json` prints for one run.
#[derive(Serialize)]
struct JsonReport<'a> {
    diagnostics: &'a PipelineDiagnostics,
    graph: &'a Graph,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<&'a PathResult>,
}

/// Build a [`PipelineConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored.  Otherwise, a config is
/// assembled from the individual flags.
fn config_from_cli(cli: &Cli) -> Result<PipelineConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    let disabled = [
        (StageId::Segmentation, cli.no_segmentation),
        (StageId::Binarization, cli.no_binarization),
        (StageId::MorphClose, cli.no_morph_close),
        (StageId::Filter, cli.no_filter),
        (StageId::Skeletonization, cli.no_skeletonization),
        (StageId::BranchRemoval, cli.no_branch_removal),
        (StageId::VertexSearch, cli.no_vertex_search),
        (StageId::VertexDeduplication, cli.no_vertex_deduplication),
        (StageId::PathColoring, cli.no_path_coloring),
        (StageId::PathFlooding, cli.no_path_flooding),
    ];
    let stages = disabled
        .into_iter()
        .map(|(stage, off)| (stage, off || cli.stop_after.is_some_and(|last| stage > last)))
        .fold(StageToggles::ALL_ENABLED, |toggles, (stage, off)| {
            toggles.with(stage, !off)
        });

    Ok(PipelineConfig {
        stages,
        cluster_count: cli.cluster_count,
        kmeans_max_iterations: cli.kmeans_max_iterations,
        morph_kernel_size: cli.morph_kernel_size,
        bilateral_radius: cli.bilateral_radius,
        bilateral_sigma_color: cli.bilateral_sigma_color,
        bilateral_sigma_space: cli.bilateral_sigma_space,
        prune_length: cli.prune_length,
        dedup_distance: cli.dedup_distance,
        diagonal_weighting: !cli.no_diagonal_weighting,
    })
}

/// Parse a stage from its snake_case name.
fn parse_stage(name: &str) -> Result<StageId, String> {
    StageId::from_name(name).ok_or_else(|| {
        let names: Vec<&str> = StageId::ALL.iter().map(|s| s.name()).collect();
        format!("unknown stage {name:?}, expected one of: {}", names.join(", "))
    })
}

/// Install a stderr subscriber filtered by `RUST_LOG` (default `warn`).
fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let image_bytes = match std::fs::read(&cli.image_path) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error reading {}: {e}", cli.image_path.display());
            return ExitCode::FAILURE;
        }
    };
    let image = match sketchgraph_pipeline::decode::decode(&image_bytes) {
        Ok(image) => image,
        Err(e) => {
            eprintln!("Error decoding {}: {e}", cli.image_path.display());
            return ExitCode::FAILURE;
        }
    };

    eprintln!(
        "Image: {} ({} bytes)",
        cli.image_path.display(),
        image_bytes.len(),
    );
    eprintln!("Config: {config:#?}");
    eprintln!("Stages:");
    for stage in StageId::ALL.into_iter().filter(|s| s.is_enabled(&config.stages)) {
        eprintln!("  {:<22} {}", stage.name(), stage.description());
    }
    eprintln!("Runs: {}", cli.runs);
    eprintln!();

    let mut all_diagnostics = Vec::with_capacity(cli.runs);

    for run in 0..cli.runs {
        if cli.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, cli.runs);
        }

        let (output, diagnostics) =
            match sketchgraph_pipeline::process_with_diagnostics(&image, &config, &StdClock) {
                Ok(result) => result,
                Err(e) => {
                    eprintln!("Pipeline error: {e}");
                    return ExitCode::FAILURE;
                }
            };

        tracing::info!(
            run,
            vertices = output.graph.vertex_count(),
            edges = output.graph.edge_count(),
            "pipeline run finished"
        );

        let path = match query_path(&cli, &output.graph) {
            Ok(path) => path,
            Err(msg) => {
                eprintln!("{msg}");
                return ExitCode::FAILURE;
            }
        };

        if cli.json {
            let report = JsonReport {
                diagnostics: &diagnostics,
                graph: &output.graph,
                path: path.as_ref(),
            };
            match serde_json::to_string_pretty(&report) {
                Ok(json) => println!("{json}"),
                Err(e) => {
                    eprintln!("Error serializing diagnostics: {e}");
                    return ExitCode::FAILURE;
                }
            }
        } else {
            println!("{}", diagnostics.report());
            print_graph(&output.graph);
            if let Some(ref path) = path {
                print_path(path);
            }
        }

        // Write images on the first run only.
        if run == 0 {
            if let Some(ref dir) = cli.steps_dir {
                write_steps(dir, &output);
            }
            if let Some(ref overlay_path) = cli.overlay {
                write_overlay(overlay_path, &output, path.as_ref(), cli.marker_radius);
            }
        }

        all_diagnostics.push(diagnostics);

        if cli.runs > 1 {
            eprintln!();
        }
    }

    // Print summary when multiple runs.
    if cli.runs > 1 {
        print_multi_run_summary(&all_diagnostics);
    }

    ExitCode::SUCCESS
}

/// Answer `--from`/`--to`, if given.
fn query_path(cli: &Cli, graph: &Graph) -> Result<Option<PathResult>, String> {
    let (Some(from), Some(to)) = (cli.from, cli.to) else {
        return Ok(None);
    };
    sketchgraph_pipeline::shortest_path(graph, from, to)
        .map(Some)
        .map_err(|e| format!("Path query error: {e} (graph has {} vertices)", graph.vertex_count()))
}

/// List vertices and edges; the overlay carries no text, so ids live here.
fn print_graph(graph: &Graph) {
    println!();
    println!("{:<6} {:>10} {:>10}  {}", "Vertex", "x", "y", "Neighbours");
    println!("{}", "-".repeat(40));
    for vertex in graph.vertices() {
        let neighbours: Vec<String> = graph
            .neighbors(vertex.id)
            .map(|(other, _)| other.to_string())
            .collect();
        println!(
            "{:<6} {:>10.1} {:>10.1}  {}",
            vertex.id,
            vertex.position.x,
            vertex.position.y,
            neighbours.join(" "),
        );
    }
    println!();
    println!("{:<6} {:<6} {:>10}", "u", "v", "weight");
    println!("{}", "-".repeat(24));
    for edge in graph.edges() {
        println!("{:<6} {:<6} {:>10.2}", edge.u, edge.v, edge.weight);
    }
}

fn print_path(path: &PathResult) {
    println!();
    match path {
        PathResult::Found {
            total_weight,
            vertices,
        } => {
            let hops: Vec<String> = vertices.iter().map(ToString::to_string).collect();
            println!("Shortest path: {} (weight {total_weight:.2})", hops.join(" -> "));
        }
        PathResult::Unreachable { start, end } => {
            println!("No path from {start} to {end}");
        }
    }
}

/// Write `NN-<stage>.png` for every step.
fn write_steps(dir: &Path, output: &PipelineOutput) {
    if let Err(e) = std::fs::create_dir_all(dir) {
        eprintln!("Error creating {}: {e}", dir.display());
        return;
    }
    for (index, step) in output.steps.iter().enumerate() {
        let path = dir.join(format!("{:02}-{}.png", index + 1, step.stage.name()));
        match step.image.save(&path) {
            Ok(()) => eprintln!("Step written to {}", path.display()),
            Err(e) => eprintln!("Error writing step to {}: {e}", path.display()),
        }
    }
}

fn write_overlay(
    overlay_path: &Path,
    output: &PipelineOutput,
    path: Option<&PathResult>,
    marker_radius: i32,
) {
    let graph = match path.and_then(PathResult::vertices) {
        Some(vertices) => output.graph.clone().with_shortest_path(vertices.to_vec()),
        None => output.graph.clone(),
    };
    let style = OverlayStyle {
        marker_radius,
        ..OverlayStyle::default()
    };
    let overlay = sketchgraph_pipeline::render_overlay(&output.original, &graph, &style);
    match overlay.save(overlay_path) {
        Ok(()) => eprintln!("Overlay written to {}", overlay_path.display()),
        Err(e) => eprintln!("Error writing overlay to {}: {e}", overlay_path.display()),
    }
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

/// Print aggregated statistics across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[PipelineDiagnostics]) {
    debug_assert!(!all_diagnostics.is_empty(), "no diagnostics to summarize");

    println!();
    println!(
        "Summary ({} runs)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    if all_diagnostics.is_empty() {
        println!("Warning: no diagnostics to summarize");
        return;
    }

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| d.total_duration.as_secs_f64() * 1000.0)
        .collect();

    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;

    println!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    // Per-stage means.
    println!();
    println!("{:<24} {:>12}", "Stage", "Mean (ms)");
    println!("{}", "-".repeat(40));

    for stage in StageId::ALL {
        let stage_durations: Vec<f64> = all_diagnostics
            .iter()
            .filter_map(|d| d.stage(stage))
            .map(|s| s.duration.as_secs_f64() * 1000.0)
            .collect();

        if stage_durations.is_empty() {
            continue;
        }

        let stage_mean = stage_durations.iter().sum::<f64>() / stage_durations.len() as f64;
        println!("{:<24} {stage_mean:>10.3}ms", stage.label());
    }
}
