/// Types, traits, and configuration shared across the mediatoascii workspace.
///
/// Pixel buffers, glyph ramps, character/color grids, conversion settings,
/// frame-rate policy, and the collaborator traits the video pipeline talks to.

pub mod color;
pub mod config;
pub mod error;
pub mod frame;
pub mod ramp;
pub mod rate;
pub mod traits;

pub use color::Rgb;
pub use config::{ConversionConfig, OutputTarget, Settings, VideoTarget};
pub use error::{ConvertError, ErrorKind, Result};
pub use frame::{CharacterGrid, ColorGrid, ConvertedFrame, PixelBuffer};
pub use ramp::GlyphRamp;
pub use rate::{FrameRatePolicy, FrameSelector};
