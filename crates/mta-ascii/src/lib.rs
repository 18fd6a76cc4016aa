/// Character-grid conversion engine.
///
/// Cell sampling, luminance → glyph mapping, single-frame conversion, and
/// the ordered parallel video pipeline.
pub mod converter;
pub mod luminance;
pub mod pipeline;
pub mod sampler;

pub use converter::convert_frame;
pub use pipeline::{CollectSink, PipelineReport, PipelineState, VideoPipeline};
