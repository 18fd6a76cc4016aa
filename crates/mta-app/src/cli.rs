use std::path::PathBuf;

use clap::Parser;
use mta_core::config::Settings;
use mta_core::frame::Rotation;
use mta_core::ramp::GlyphRamp;

/// mediatoascii: convert images and videos to character art.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Image source (PNG, JPEG, BMP, GIF).
    #[arg(long, conflicts_with = "video_path")]
    pub image_path: Option<PathBuf>,

    /// Video source; needs ffmpeg and ffprobe on PATH.
    #[arg(long)]
    pub video_path: Option<PathBuf>,

    /// Shrink factor; 1.0 = one column per source pixel column.
    #[arg(long)]
    pub scale_down: Option<f32>,

    /// Font size of rendered glyphs; sets the cell aspect.
    #[arg(long)]
    pub font_size: Option<f32>,

    /// Override the cell height/width ratio derived from the font.
    #[arg(long)]
    pub cell_aspect: Option<f32>,

    /// Light glyphs for dark pixels (for light backgrounds).
    #[arg(long, default_value_t = false, conflicts_with = "no_invert")]
    pub invert: bool,

    /// Disable `invert` even if the config file enables it.
    #[arg(long, default_value_t = false)]
    pub no_invert: bool,

    /// Keep per-cell colors (ANSI on a terminal, glyph colors in images/videos).
    #[arg(long, default_value_t = false, conflicts_with = "no_color")]
    pub color: bool,

    /// Disable color preservation even if the config file enables it.
    #[arg(long, default_value_t = false)]
    pub no_color: bool,

    /// Ramp preset name or literal glyphs, darkest first.
    #[arg(long)]
    pub ramp: Option<String>,

    /// Convert at most this many frames per second of video.
    #[arg(long)]
    pub max_fps: Option<u32>,

    /// Conversion worker threads for video.
    #[arg(long)]
    pub workers: Option<usize>,

    /// Rotate input: 0 = 90° clockwise, 1 = 180°, 2 = 90° counter-clockwise.
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=2))]
    pub rotate: Option<u8>,

    /// Output file. Images: .txt with --as-text, otherwise an image format.
    /// Videos: an .mp4 file.
    #[arg(short, long)]
    pub output_file_path: Option<PathBuf>,

    /// Write image output as plain text instead of a rendered image.
    #[arg(long, default_value_t = false)]
    pub as_text: bool,

    /// Replace an existing output file.
    #[arg(long, default_value_t = false)]
    pub overwrite: bool,

    /// Fichier de configuration TOML. Défaut : config/default.toml.
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: PathBuf,

    /// Niveau de log : error, warn, info, debug, trace.
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}

impl Cli {
    /// Validate that exactly one source is provided.
    ///
    /// # Errors
    /// Returns an error if neither or both sources are given.
    pub fn validate_source(&self) -> anyhow::Result<()> {
        match (&self.image_path, &self.video_path) {
            (None, None) => anyhow::bail!("No source given. Use --image-path or --video-path."),
            (Some(_), Some(_)) => {
                anyhow::bail!("Only one source at a time: --image-path OR --video-path.")
            }
            _ => Ok(()),
        }
    }

    /// Apply command-line flags over settings loaded from the config file.
    ///
    /// # Errors
    /// Returns an error if a flag value is invalid (ramp, rotation, ranges).
    pub fn apply_overrides(&self, settings: &mut Settings) -> anyhow::Result<()> {
        let conv = &mut settings.conversion;
        if let Some(v) = self.scale_down {
            conv.scale_down = v;
        }
        if let Some(v) = self.font_size {
            conv.font_size = v;
        }
        if self.cell_aspect.is_some() {
            conv.cell_aspect = self.cell_aspect;
        }
        if let Some(v) = switch(self.invert, self.no_invert) {
            conv.invert = v;
        }
        if let Some(v) = switch(self.color, self.no_color) {
            conv.preserve_color = v;
        }
        if let Some(ref ramp) = self.ramp {
            conv.ramp = GlyphRamp::parse(ramp)?;
        }

        if self.max_fps.is_some() {
            settings.video.max_fps = self.max_fps;
        }
        if let Some(n) = self.workers {
            settings.video.workers = n;
        }
        if let Some(r) = self.rotate {
            settings.video.rotate = Some(Rotation::from_index(r)?);
        }
        if self.overwrite {
            settings.output.overwrite = true;
        }

        settings.validate()?;
        Ok(())
    }
}

/// `--flag` / `--no-flag` pair: `None` leaves the loaded setting alone.
fn switch(on: bool, off: bool) -> Option<bool> {
    match (on, off) {
        (true, _) => Some(true),
        (false, true) => Some(false),
        (false, false) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_flag_set() {
        let cli = Cli::try_parse_from([
            "mediatoascii",
            "--video-path",
            "in.mp4",
            "--scale-down",
            "4",
            "--max-fps",
            "10",
            "--rotate",
            "2",
            "-o",
            "out.mp4",
            "--color",
            "--overwrite",
        ])
        .unwrap();
        assert!(cli.validate_source().is_ok());
        assert_eq!(cli.max_fps, Some(10));
        assert_eq!(cli.rotate, Some(2));
        assert!(cli.color && cli.overwrite);
        assert_eq!(cli.output_file_path, Some(PathBuf::from("out.mp4")));
    }

    #[test]
    fn rotate_out_of_range_rejected() {
        assert!(Cli::try_parse_from(["mediatoascii", "--image-path", "a.png", "--rotate", "3"]).is_err());
    }

    #[test]
    fn both_sources_rejected() {
        assert!(
            Cli::try_parse_from(["mediatoascii", "--image-path", "a.png", "--video-path", "b.mp4"])
                .is_err()
        );
    }

    #[test]
    fn flags_override_settings() {
        let cli = Cli::try_parse_from([
            "mediatoascii",
            "--image-path",
            "a.png",
            "--ramp",
            "blocks",
            "--invert",
            "--cell-aspect",
            "2.0",
        ])
        .unwrap();
        let mut settings = Settings::default();
        cli.apply_overrides(&mut settings).unwrap();
        assert!(settings.conversion.invert);
        assert_eq!(settings.conversion.cell_aspect, Some(2.0));
        assert_eq!(settings.conversion.ramp.lightest(), '█');
    }

    #[test]
    fn no_flags_turn_config_switches_off() {
        let mut settings = Settings::default();
        settings.conversion.invert = true;
        settings.conversion.preserve_color = true;

        let cli = Cli::try_parse_from(["mediatoascii", "--image-path", "a.png", "--no-invert", "--no-color"])
            .unwrap();
        cli.apply_overrides(&mut settings).unwrap();
        assert!(!settings.conversion.invert);
        assert!(!settings.conversion.preserve_color);
    }

    #[test]
    fn absent_switches_keep_config_values() {
        let mut settings = Settings::default();
        settings.conversion.invert = true;
        let cli = Cli::try_parse_from(["mediatoascii", "--image-path", "a.png"]).unwrap();
        cli.apply_overrides(&mut settings).unwrap();
        assert!(settings.conversion.invert);
        assert!(!settings.conversion.preserve_color);
    }

    #[test]
    fn contradictory_switches_rejected() {
        assert!(
            Cli::try_parse_from(["mediatoascii", "--image-path", "a.png", "--invert", "--no-invert"])
                .is_err()
        );
        assert!(
            Cli::try_parse_from(["mediatoascii", "--image-path", "a.png", "--color", "--no-color"])
                .is_err()
        );
    }

    #[test]
    fn invalid_override_rejected() {
        let cli = Cli::try_parse_from(["mediatoascii", "--image-path", "a.png", "--scale-down", "0"])
            .unwrap();
        assert!(cli.apply_overrides(&mut Settings::default()).is_err());
    }

    #[test]
    fn no_source_rejected() {
        let cli = Cli::try_parse_from(["mediatoascii"]).unwrap();
        assert!(cli.validate_source().is_err());
    }
}
