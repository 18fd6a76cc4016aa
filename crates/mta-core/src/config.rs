use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{ConvertError, Result};
use crate::frame::{LineEnding, Rotation};
use crate::ramp::GlyphRamp;
use crate::rate::FrameRatePolicy;

/// Monospace glyph advance as a fraction of the font size.
///
/// Fixed approximation of common terminal fonts; it sets the cell aspect
/// used by the sampler and the glyph box used by the rasterizer.
pub const GLYPH_WIDTH_RATIO: f32 = 0.55;

/// Size of the rendered glyph box derived from a font size.
///
/// # Example
/// ```
/// use mta_core::config::FontMetrics;
/// let m = FontMetrics::monospace(20.0);
/// assert!((m.advance - 11.0).abs() < 1e-6);
/// assert!((m.line_height - 20.0).abs() < 1e-6);
/// assert!((m.aspect() - 1.0 / 0.55).abs() < 1e-4);
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FontMetrics {
    pub font_size: f32,
    /// Horizontal advance per glyph, in pixels.
    pub advance: f32,
    /// Vertical distance between rows, in pixels.
    pub line_height: f32,
}

impl FontMetrics {
    #[must_use]
    pub fn monospace(font_size: f32) -> Self {
        Self {
            font_size,
            advance: font_size * GLYPH_WIDTH_RATIO,
            line_height: font_size,
        }
    }

    /// Cell height / width.
    #[must_use]
    pub fn aspect(&self) -> f32 {
        self.line_height / self.advance
    }
}

/// Parameters of one conversion call. Never mutated while a call runs.
///
/// # Example
/// ```
/// use mta_core::config::ConversionConfig;
/// let config = ConversionConfig::default().with_scale_down(4.0).with_invert(true);
/// assert!(config.validate().is_ok());
/// let (w, h) = config.cell_size();
/// assert!((w - 4.0).abs() < 1e-9);
/// assert!(h > w);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct ConversionConfig {
    /// Shrink factor; 1.0 = one cell per source pixel column.
    pub scale_down: f32,
    /// Font size of the rendered glyphs.
    pub font_size: f32,
    /// Overrides the font-derived cell height/width ratio.
    pub cell_aspect: Option<f32>,
    /// Map dark cells to the lightest glyphs (for light backgrounds).
    pub invert: bool,
    /// Keep per-cell average RGB alongside the glyph.
    pub preserve_color: bool,
    pub ramp: GlyphRamp,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            scale_down: 1.0,
            font_size: 12.0,
            cell_aspect: None,
            invert: false,
            preserve_color: false,
            ramp: GlyphRamp::default(),
        }
    }
}

impl ConversionConfig {
    /// Defaults with a caller-supplied ramp.
    #[must_use]
    pub fn new(ramp: GlyphRamp) -> Self {
        Self {
            ramp,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_scale_down(mut self, scale_down: f32) -> Self {
        self.scale_down = scale_down;
        self
    }

    #[must_use]
    pub fn with_font_size(mut self, font_size: f32) -> Self {
        self.font_size = font_size;
        self
    }

    #[must_use]
    pub fn with_cell_aspect(mut self, aspect: Option<f32>) -> Self {
        self.cell_aspect = aspect;
        self
    }

    #[must_use]
    pub fn with_invert(mut self, invert: bool) -> Self {
        self.invert = invert;
        self
    }

    #[must_use]
    pub fn with_preserve_color(mut self, preserve: bool) -> Self {
        self.preserve_color = preserve;
        self
    }

    #[must_use]
    pub fn with_ramp(mut self, ramp: GlyphRamp) -> Self {
        self.ramp = ramp;
        self
    }

    /// Reject non-positive or non-finite numeric parameters.
    ///
    /// # Errors
    /// `InvalidConfig` naming the offending parameter.
    pub fn validate(&self) -> Result<()> {
        positive("scale_down", self.scale_down)?;
        positive("font_size", self.font_size)?;
        if let Some(aspect) = self.cell_aspect {
            positive("cell_aspect", aspect)?;
        }
        Ok(())
    }

    #[must_use]
    pub fn font_metrics(&self) -> FontMetrics {
        FontMetrics::monospace(self.font_size)
    }

    /// Effective cell height/width ratio.
    #[must_use]
    pub fn aspect(&self) -> f32 {
        self.cell_aspect.unwrap_or_else(|| self.font_metrics().aspect())
    }

    /// Cell size in source pixels, `(width, height)`.
    #[must_use]
    pub fn cell_size(&self) -> (f64, f64) {
        let scale = f64::from(self.scale_down);
        (scale, f64::from(self.aspect()) * scale)
    }
}

fn positive(name: &str, value: f32) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConvertError::config(format!(
            "{name} must be a positive number, got {value}"
        )))
    }
}

/// Where a single-image conversion goes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum OutputTarget {
    /// Return the grids to the caller.
    #[default]
    None,
    TextFile(PathBuf),
    ImageFile(PathBuf),
}

/// Where a video conversion goes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum VideoTarget {
    /// Return every converted frame in memory.
    #[default]
    Collect,
    VideoFile(PathBuf),
}

/// Video-specific settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VideoSettings {
    pub max_fps: Option<u32>,
    /// Size of the conversion worker pool.
    pub workers: usize,
    pub rotate: Option<Rotation>,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            max_fps: None,
            workers: default_workers(),
            rotate: None,
        }
    }
}

impl VideoSettings {
    #[must_use]
    pub fn policy(&self) -> FrameRatePolicy {
        FrameRatePolicy::from_max_fps(self.max_fps)
    }
}

/// Available parallelism, at least 1.
#[must_use]
pub fn default_workers() -> usize {
    std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
}

/// File-output settings.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OutputSettings {
    /// Replace existing output files.
    pub overwrite: bool,
    pub line_ending: LineEnding,
    /// TrueType/OpenType font for image and video output.
    pub font_path: Option<PathBuf>,
}

/// Everything a run needs: conversion, video and output settings.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Settings {
    pub conversion: ConversionConfig,
    pub video: VideoSettings,
    pub output: OutputSettings,
}

impl Settings {
    /// # Errors
    /// `InvalidConfig` from any section.
    pub fn validate(&self) -> Result<()> {
        self.conversion.validate()?;
        self.video.policy().validate()?;
        if self.video.workers == 0 {
            return Err(ConvertError::config("workers must be at least 1"));
        }
        Ok(())
    }
}

/// Structure TOML intermédiaire, toutes les valeurs optionnelles.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    conversion: ConversionSection,
    #[serde(default)]
    video: VideoSection,
    #[serde(default)]
    output: OutputSection,
}

#[derive(Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ConversionSection {
    scale_down: Option<f32>,
    font_size: Option<f32>,
    cell_aspect: Option<f32>,
    invert: Option<bool>,
    preserve_color: Option<bool>,
    ramp: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct VideoSection {
    max_fps: Option<u32>,
    workers: Option<usize>,
    rotate: Option<u8>,
}

#[derive(Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct OutputSection {
    overwrite: Option<bool>,
    line_ending: Option<LineEnding>,
    font_path: Option<PathBuf>,
}

/// Parse TOML text and merge it over the defaults.
///
/// # Errors
/// `InvalidConfig` on a parse error or an invalid value.
///
/// # Example
/// ```
/// use mta_core::config::parse_config;
/// let settings = parse_config("[conversion]\nscale_down = 2.0\n").unwrap();
/// assert!((settings.conversion.scale_down - 2.0).abs() < f32::EPSILON);
/// assert_eq!(settings.conversion.font_size, 12.0);
/// ```
pub fn parse_config(content: &str) -> Result<Settings> {
    let file: ConfigFile =
        toml::from_str(content).map_err(|e| ConvertError::config(format!("TOML: {e}")))?;

    let mut settings = Settings::default();

    let c = file.conversion;
    let conv = &mut settings.conversion;
    if let Some(v) = c.scale_down {
        conv.scale_down = v;
    }
    if let Some(v) = c.font_size {
        conv.font_size = v;
    }
    if c.cell_aspect.is_some() {
        conv.cell_aspect = c.cell_aspect;
    }
    if let Some(v) = c.invert {
        conv.invert = v;
    }
    if let Some(v) = c.preserve_color {
        conv.preserve_color = v;
    }
    if let Some(v) = c.ramp {
        conv.ramp = GlyphRamp::parse(&v)?;
    }

    let v = file.video;
    if v.max_fps.is_some() {
        settings.video.max_fps = v.max_fps;
    }
    if let Some(n) = v.workers {
        settings.video.workers = n;
    }
    if let Some(r) = v.rotate {
        settings.video.rotate = Some(Rotation::from_index(r)?);
    }

    let o = file.output;
    if let Some(b) = o.overwrite {
        settings.output.overwrite = b;
    }
    if let Some(le) = o.line_ending {
        settings.output.line_ending = le;
    }
    if o.font_path.is_some() {
        settings.output.font_path = o.font_path;
    }

    settings.validate()?;
    Ok(settings)
}

/// Charge un fichier TOML et fusionne avec les valeurs par défaut.
///
/// # Errors
/// `Io` if the file cannot be read, `InvalidConfig` if it cannot be parsed.
///
/// # Example
/// ```no_run
/// use mta_core::config::load_config;
/// use std::path::Path;
/// let settings = load_config(Path::new("config/default.toml")).unwrap();
/// ```
pub fn load_config(path: &Path) -> Result<Settings> {
    let content = std::fs::read_to_string(path).map_err(|e| ConvertError::io(path, e))?;
    parse_config(&content).map_err(|e| match e {
        ConvertError::InvalidConfig(msg) => {
            ConvertError::config(format!("{}: {msg}", path.display()))
        }
        other => other,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(ConversionConfig::default().validate().is_ok());
        assert!(Settings::default().validate().is_ok());
    }

    #[test]
    fn non_positive_scale_rejected() {
        for bad in [0.0, -1.0, f32::NAN, f32::INFINITY] {
            let err = ConversionConfig::default()
                .with_scale_down(bad)
                .validate()
                .unwrap_err();
            assert!(err.to_string().contains("scale_down"));
        }
    }

    #[test]
    fn aspect_override_wins() {
        let config = ConversionConfig::default().with_cell_aspect(Some(2.046));
        assert!((config.aspect() - 2.046).abs() < 1e-6);
        let (w, h) = config.with_scale_down(2.0).cell_size();
        assert!((w - 2.0).abs() < 1e-9);
        assert!((h - 4.092).abs() < 1e-5);
    }

    #[test]
    fn aspect_independent_of_font_size() {
        let a = ConversionConfig::default().with_font_size(8.0).aspect();
        let b = ConversionConfig::default().with_font_size(32.0).aspect();
        assert!((a - b).abs() < 1e-5);
    }

    #[test]
    fn full_file_parses() {
        let toml = r#"
            [conversion]
            scale_down = 3.0
            font_size = 16.0
            invert = true
            preserve_color = true
            ramp = "blocks"

            [video]
            max_fps = 10
            workers = 2
            rotate = 1

            [output]
            overwrite = true
            line_ending = "crlf"
            font_path = "/tmp/font.ttf"
        "#;
        let s = parse_config(toml).unwrap();
        assert!(s.conversion.invert);
        assert!(s.conversion.preserve_color);
        assert_eq!(s.conversion.ramp.length(), 5);
        assert_eq!(s.video.policy(), FrameRatePolicy::Cap(10));
        assert_eq!(s.video.workers, 2);
        assert_eq!(s.video.rotate, Some(Rotation::Rotate180));
        assert_eq!(s.output.line_ending, LineEnding::CrLf);
        assert_eq!(s.output.font_path, Some(PathBuf::from("/tmp/font.ttf")));
    }

    #[test]
    fn empty_file_gives_defaults() {
        let s = parse_config("").unwrap();
        assert_eq!(s.conversion, ConversionConfig::default());
        assert_eq!(s.video.max_fps, None);
    }

    #[test]
    fn unknown_key_rejected() {
        assert!(parse_config("[conversion]\nscale = 2.0\n").is_err());
    }

    #[test]
    fn invalid_values_rejected() {
        assert!(parse_config("[conversion]\nscale_down = 0.0\n").is_err());
        assert!(parse_config("[video]\nmax_fps = 0\n").is_err());
        assert!(parse_config("[video]\nworkers = 0\n").is_err());
        assert!(parse_config("[video]\nrotate = 5\n").is_err());
        assert!(parse_config("[conversion]\nramp = \"\"\n").is_err());
    }

    #[test]
    fn load_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[conversion]\nscale_down = -2.0\n").unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("bad.toml"));

        let missing = load_config(&dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(missing, ConvertError::Io { .. }));
    }
}
