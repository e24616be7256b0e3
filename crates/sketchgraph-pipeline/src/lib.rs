//! sketchgraph-pipeline: Pure image-to-graph pipeline (sans-IO).
//!
//! Converts a photograph of a drawn network into a weighted graph through:
//! segmentation -> binarization -> closing -> smoothing -> thinning ->
//! spur pruning -> vertex search -> vertex deduplication ->
//! segment labelling -> segment weighing -> graph assembly.
//! [`shortest_path`] then answers queries over the assembled [`Graph`].
//!
//! Every stage can be switched off through [`StageToggles`]; each enabled
//! stage records a [`Step`] image for inspection.
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! images and byte slices and returns structured data. Reading files and
//! showing images lives in `sketchgraph-bench`.

pub mod binarize;
pub mod decode;
pub mod dedup;
pub mod diagnostics;
pub mod filter;
pub mod graph;
pub mod grid;
pub mod junction;
pub mod label;
pub mod morphology;
pub mod path;
pub mod pipeline;
pub mod prune;
pub mod render;
pub mod segmentation;
pub mod skeleton;
pub mod stage;
pub mod types;
pub mod weigh;

pub use diagnostics::{Clock, PipelineDiagnostics, StageMetrics};
pub use graph::{Edge, Graph, GraphError, Vertex};
pub use path::{PathError, PathResult, shortest_path};
pub use pipeline::PipelineOutput;
pub use render::{OverlayStyle, render_overlay};
pub use stage::{StageId, Step};
pub use types::{Dimensions, PipelineConfig, PipelineError, Pixel, Point, StageToggles};

use diagnostics::NoClock;
use types::DynamicImage;

/// Run the full pipeline over a decoded image.
///
/// The image may have any colour depth; it is converted to 8-bit RGB
/// first. Stages run in [`StageId::ALL`] order, skipping those disabled
/// in `config.stages`.
///
/// An image with no visible network is not an error: it yields an empty
/// [`Graph`].
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if `config` fails
/// [`PipelineConfig::validate`].
/// Returns [`PipelineError::InvalidImage`] if the image has a zero
/// dimension.
pub fn process(
    image: &DynamicImage,
    config: &PipelineConfig,
) -> Result<PipelineOutput, PipelineError> {
    process_with_diagnostics(image, config, &NoClock).map(|(output, _)| output)
}

/// Decode image bytes (PNG, JPEG, BMP, WebP) and run the pipeline.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `image_bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is unrecognized.
/// Otherwise as [`process`].
pub fn process_bytes(
    image_bytes: &[u8],
    config: &PipelineConfig,
) -> Result<PipelineOutput, PipelineError> {
    config.validate()?;
    let image = decode::decode(image_bytes)?;
    process(&image, config)
}

/// Run the pipeline and collect per-stage diagnostics.
///
/// `clock` times each stage; pass [`diagnostics::NoClock`] when timing is
/// not needed.
///
/// # Errors
///
/// As [`process`].
pub fn process_with_diagnostics<C: Clock>(
    image: &DynamicImage,
    config: &PipelineConfig,
    clock: &C,
) -> Result<(PipelineOutput, PipelineDiagnostics), PipelineError> {
    config.validate()?;
    let original = decode::canonicalize(image)?;
    tracing::debug!(
        width = original.width(),
        height = original.height(),
        "pipeline started"
    );
    Ok(pipeline::run(original, config, clock))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn png_bytes(image: &image::RgbImage) -> Vec<u8> {
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

    #[test]
    fn process_empty_input() {
        let result = process_bytes(&[], &PipelineConfig::default());
        assert!(matches!(result, Err(PipelineError::EmptyInput)));
    }

    #[test]
    fn process_corrupt_input() {
        let result = process_bytes(&[0xFF, 0x00], &PipelineConfig::default());
        assert!(matches!(result, Err(PipelineError::ImageDecode(_))));
    }

    #[test]
    fn invalid_config_is_rejected_before_decoding() {
        let config = PipelineConfig {
            cluster_count: 0,
            ..PipelineConfig::default()
        };
        let result = process_bytes(&[], &config);
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn zero_sized_image_is_invalid() {
        let empty = DynamicImage::new_rgb8(0, 5);
        let result = process(&empty, &PipelineConfig::default());
        assert!(matches!(result, Err(PipelineError::InvalidImage(_))));
    }

    #[test]
    fn uniform_image_yields_empty_graph() {
        let gray = image::RgbImage::from_pixel(20, 20, image::Rgb([128, 128, 128]));
        let output = process_bytes(&png_bytes(&gray), &PipelineConfig::default()).unwrap();
        assert!(output.graph.is_empty());
        assert_eq!(output.dimensions, Dimensions { width: 20, height: 20 });
        assert_eq!(output.steps.len(), StageId::ALL.len());
    }

    #[test]
    fn rgba_input_is_accepted() {
        let rgba = image::RgbaImage::from_pixel(8, 8, image::Rgba([10, 20, 30, 0]));
        let output = process(&DynamicImage::ImageRgba8(rgba), &PipelineConfig::default()).unwrap();
        assert_eq!(output.original.get_pixel(0, 0).0, [10, 20, 30]);
    }

    #[test]
    fn outputs_are_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Graph>();
        assert_send_sync::<PipelineOutput>();
        assert_send_sync::<PathResult>();
    }
}
