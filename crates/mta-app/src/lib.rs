/// Caller-facing conversion API and the pieces of the `mediatoascii` binary.

pub mod cli;
pub mod job;
pub mod terminal;

pub use job::{
    ConversionResult, JobOptions, VideoOutcome, convert_image, convert_video, run_video,
};
pub use mta_source::image::ImageInput;
