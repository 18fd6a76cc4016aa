use std::path::{Path, PathBuf};

use mta_ascii::converter::convert_frame;
use mta_ascii::pipeline::{CollectSink, PipelineReport, VideoPipeline};
use mta_core::config::{ConversionConfig, OutputTarget, Settings, VideoTarget, default_workers};
use mta_core::error::Result;
use mta_core::frame::{CharacterGrid, ColorGrid, ConvertedFrame, LineEnding, Rotation};
use mta_core::rate::{FrameRatePolicy, FrameSelector};
use mta_core::traits::{FrameSink, FrameSource, SourceHandle};
use mta_export::font::load_font;
use mta_export::image_out::write_image;
use mta_export::rasterizer::{RasterStyle, Rasterizer};
use mta_export::sink::VideoFileSink;
use mta_export::text::write_text;
use mta_source::image::ImageInput;
use mta_source::video::VideoDecoder;

/// Per-call knobs that are not part of the conversion itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobOptions {
    pub rotate: Option<Rotation>,
    pub workers: usize,
    pub overwrite: bool,
    pub line_ending: LineEnding,
    pub font_path: Option<PathBuf>,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            rotate: None,
            workers: default_workers(),
            overwrite: false,
            line_ending: LineEnding::Lf,
            font_path: None,
        }
    }
}

impl From<&Settings> for JobOptions {
    fn from(s: &Settings) -> Self {
        Self {
            rotate: s.video.rotate,
            workers: s.video.workers,
            overwrite: s.output.overwrite,
            line_ending: s.output.line_ending,
            font_path: s.output.font_path.clone(),
        }
    }
}

/// Result of a single-image conversion, shaped by the requested target.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConversionResult {
    TextGrid(CharacterGrid),
    TextGridWithColor(CharacterGrid, ColorGrid),
    FileWritten(PathBuf),
}

/// Result of a video conversion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VideoOutcome {
    Frames(Vec<ConvertedFrame>),
    FileWritten { path: PathBuf, frames: usize },
}

/// Convert one still image.
///
/// Output files are checked for clobbering before anything is decoded.
///
/// # Errors
/// `InvalidConfig`, `Decode`, `Encode` or `Io`, unchanged from the stage
/// that failed.
///
/// # Example
/// ```no_run
/// use mta_app::job::{ConversionResult, JobOptions, convert_image};
/// use mta_core::config::{ConversionConfig, OutputTarget};
/// use mta_source::image::ImageInput;
///
/// let result = convert_image(
///     &ImageInput::Path("photo.png".into()),
///     &ConversionConfig::default(),
///     &OutputTarget::None,
///     &JobOptions::default(),
/// ).unwrap();
/// assert!(matches!(result, ConversionResult::TextGrid(_)));
/// ```
pub fn convert_image(
    input: &ImageInput,
    config: &ConversionConfig,
    target: &OutputTarget,
    options: &JobOptions,
) -> Result<ConversionResult> {
    config.validate()?;
    match target {
        OutputTarget::TextFile(p) | OutputTarget::ImageFile(p) => {
            mta_export::check_output_path(p, options.overwrite)?;
        }
        OutputTarget::None => {}
    }

    let pixels = input.decode(options.rotate)?;
    let frame = convert_frame(&pixels, config, 0)?;
    log::debug!(
        "Image {}x{} → grille {}x{}",
        pixels.width(),
        pixels.height(),
        frame.chars.width(),
        frame.chars.height()
    );

    match target {
        OutputTarget::None => Ok(match frame.colors {
            Some(colors) => ConversionResult::TextGridWithColor(frame.chars, colors),
            None => ConversionResult::TextGrid(frame.chars),
        }),
        OutputTarget::TextFile(path) => {
            write_text(path, &frame.chars, options.line_ending)?;
            Ok(ConversionResult::FileWritten(path.clone()))
        }
        OutputTarget::ImageFile(path) => {
            let rasterizer = build_rasterizer(config, options)?;
            write_image(path, &frame, &rasterizer, raster_style(config))?;
            Ok(ConversionResult::FileWritten(path.clone()))
        }
    }
}

/// Convert a video file, collecting frames or encoding a new video.
///
/// # Errors
/// As [`VideoPipeline::run`], plus `Io`/`Decode` from opening the file.
pub fn convert_video(
    path: &Path,
    config: &ConversionConfig,
    policy: FrameRatePolicy,
    target: &VideoTarget,
    options: &JobOptions,
) -> Result<VideoOutcome> {
    config.validate()?;
    policy.validate()?;
    if let VideoTarget::VideoFile(out) = target {
        mta_export::check_output_path(out, options.overwrite)?;
    }

    let mut decoder = VideoDecoder::open(path, options.rotate)?;
    match target {
        VideoTarget::Collect => {
            let mut sink = CollectSink::new();
            run_video(&mut decoder, config, policy, options, &mut sink)?;
            Ok(VideoOutcome::Frames(sink.into_frames()))
        }
        VideoTarget::VideoFile(out) => {
            let rasterizer = build_rasterizer(config, options)?;
            let fps = FrameSelector::new(policy, decoder.frame_rate()).output_fps();
            let mut sink = VideoFileSink::new(out, fps, rasterizer, raster_style(config));
            let report = run_video(&mut decoder, config, policy, options, &mut sink)?;
            Ok(VideoOutcome::FileWritten {
                path: out.clone(),
                frames: report.frames_converted,
            })
        }
    }
}

/// Open `path` for decoding and return the decoder with its close handle.
///
/// # Errors
/// `Io` for a missing file, `Decode` if ffmpeg cannot read it.
pub fn open_video(path: &Path, options: &JobOptions) -> Result<(VideoDecoder, SourceHandle)> {
    let decoder = VideoDecoder::open(path, options.rotate)?;
    let handle = decoder.handle();
    Ok((decoder, handle))
}

/// Run the pipeline from any source into any sink.
///
/// # Errors
/// See [`VideoPipeline::run`].
pub fn run_video<S, K>(
    source: &mut S,
    config: &ConversionConfig,
    policy: FrameRatePolicy,
    options: &JobOptions,
    sink: &mut K,
) -> Result<PipelineReport>
where
    S: FrameSource + ?Sized,
    K: FrameSink + ?Sized,
{
    VideoPipeline::new(config.clone(), policy)
        .with_workers(options.workers)
        .run(source, sink)
}

fn build_rasterizer(config: &ConversionConfig, options: &JobOptions) -> Result<Rasterizer> {
    let font = load_font(options.font_path.as_deref())?;
    Rasterizer::new(&font, config.font_size, config.ramp.as_slice())
}

fn raster_style(config: &ConversionConfig) -> RasterStyle {
    RasterStyle::new(config.invert, config.preserve_color)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mta_core::color::Rgb;
    use mta_core::error::ErrorKind;
    use mta_core::frame::PixelBuffer;
    use mta_core::traits::MemorySource;

    #[test]
    fn options_follow_settings() {
        let mut settings = Settings::default();
        settings.output.overwrite = true;
        settings.video.workers = 3;
        let opts = JobOptions::from(&settings);
        assert!(opts.overwrite);
        assert_eq!(opts.workers, 3);
    }

    #[test]
    fn run_video_over_memory_source() {
        let frames = vec![PixelBuffer::filled(6, 6, Rgb::new(255, 255, 255)); 4];
        let mut source = MemorySource::new(frames, 20.0);
        let mut sink = CollectSink::new();
        let opts = JobOptions {
            workers: 2,
            ..JobOptions::default()
        };
        let report = run_video(
            &mut source,
            &ConversionConfig::default(),
            FrameRatePolicy::Cap(10),
            &opts,
            &mut sink,
        )
        .unwrap();
        assert_eq!(report.frames_converted, 2);
        assert!(sink.frames()[0].chars.cells().iter().all(|&c| c == '@'));
    }

    #[test]
    fn missing_video_is_io() {
        let dir = tempfile::tempdir().unwrap();
        let err = convert_video(
            &dir.path().join("nope.mp4"),
            &ConversionConfig::default(),
            FrameRatePolicy::EveryFrame,
            &VideoTarget::Collect,
            &JobOptions::default(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn zero_cap_rejected_before_open() {
        let err = convert_video(
            Path::new("does-not-matter.mp4"),
            &ConversionConfig::default(),
            FrameRatePolicy::Cap(0),
            &VideoTarget::Collect,
            &JobOptions::default(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
    }
}
