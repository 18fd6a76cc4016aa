/// Decoders feeding the converter: still images via the `image` crate,
/// video via an `ffmpeg` subprocess.

pub mod image;
pub mod video;

pub use crate::image::ImageInput;
pub use video::{VideoDecoder, VideoInfo};
