use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use mta_app::cli::Cli;
use mta_app::job::{
    ConversionResult, JobOptions, VideoOutcome, convert_image, convert_video, open_video,
    run_video,
};
use mta_app::terminal::TerminalPlayer;
use mta_core::config::{OutputTarget, Settings, VideoTarget, load_config};
use mta_core::rate::FrameSelector;
use mta_core::traits::FrameSource;
use mta_export::text::print_grid;
use mta_source::image::ImageInput;

fn main() -> Result<()> {
    // 1. Parser CLI
    let cli = Cli::parse();

    // 2. Initialiser le logging
    env_logger::Builder::new()
        .filter_level(cli.log_level.parse().unwrap_or(log::LevelFilter::Warn))
        .init();

    // 3. Valider la source
    cli.validate_source()?;

    // 4. Charger la config puis appliquer les overrides CLI
    let mut settings = resolve_settings(&cli)?;
    cli.apply_overrides(&mut settings)?;
    let options = JobOptions::from(&settings);

    if let Some(ref path) = cli.image_path {
        run_image(&cli, path, &settings, &options)
    } else if let Some(ref path) = cli.video_path {
        if cli.as_text {
            log::warn!("--as-text ne s'applique qu'aux images, ignoré.");
        }
        run_video_file(&cli, path, &settings, &options)
    } else {
        anyhow::bail!("No source given. Use --image-path or --video-path.")
    }
}

/// Config file if present, defaults otherwise.
fn resolve_settings(cli: &Cli) -> Result<Settings> {
    if cli.config.exists() {
        load_config(&cli.config)
            .with_context(|| format!("Chargement de {}", cli.config.display()))
    } else {
        log::warn!(
            "Config introuvable : {}. Utilisation des défauts.",
            cli.config.display()
        );
        Ok(Settings::default())
    }
}

fn run_image(cli: &Cli, path: &Path, settings: &Settings, options: &JobOptions) -> Result<()> {
    let target = match cli.output_file_path.clone() {
        None => OutputTarget::None,
        Some(p) if cli.as_text => OutputTarget::TextFile(p),
        Some(p) => OutputTarget::ImageFile(p),
    };

    let result = convert_image(
        &ImageInput::Path(path.to_path_buf()),
        &settings.conversion,
        &target,
        options,
    )
    .with_context(|| format!("Conversion de {}", path.display()))?;

    let mut stdout = std::io::stdout().lock();
    match result {
        ConversionResult::TextGrid(grid) => {
            print_grid(&mut stdout, &grid, None, options.line_ending)?;
        }
        ConversionResult::TextGridWithColor(grid, colors) => {
            print_grid(&mut stdout, &grid, Some(&colors), options.line_ending)?;
        }
        ConversionResult::FileWritten(out) => {
            writeln!(stdout, "Wrote {}", out.display())?;
        }
    }
    Ok(())
}

fn run_video_file(
    cli: &Cli,
    path: &Path,
    settings: &Settings,
    options: &JobOptions,
) -> Result<()> {
    let policy = settings.video.policy();

    if let Some(ref out) = cli.output_file_path {
        let outcome = convert_video(
            path,
            &settings.conversion,
            policy,
            &VideoTarget::VideoFile(out.clone()),
            options,
        )
        .with_context(|| format!("Conversion de {}", path.display()))?;
        if let VideoOutcome::FileWritten { path, frames } = outcome {
            println!("Wrote {frames} frame(s) to {}", path.display());
        }
        return Ok(());
    }

    // Lecture dans le terminal ; Ctrl-C ferme la source et le pipeline échoue proprement.
    let (mut decoder, handle) = open_video(path, options)
        .with_context(|| format!("Ouverture de {}", path.display()))?;
    let interrupt = handle.clone();
    if let Err(e) = ctrlc::set_handler(move || interrupt.close()) {
        log::warn!("Impossible d'installer le handler Ctrl-C : {e}");
    }

    let fps = FrameSelector::new(policy, decoder.frame_rate()).output_fps();
    let mut player = TerminalPlayer::new(std::io::stdout().lock(), fps, options.line_ending);
    match run_video(&mut decoder, &settings.conversion, policy, options, &mut player) {
        Ok(report) => {
            log::info!(
                "Lecture terminée : {} frame(s) affichée(s) sur {} décodée(s)",
                report.frames_converted,
                report.frames_decoded
            );
            Ok(())
        }
        Err(_) if handle.is_closed() => {
            eprintln!("\nInterrupted after {} frame(s).", player.frames_shown());
            Ok(())
        }
        Err(e) => Err(e).with_context(|| format!("Lecture de {}", path.display())),
    }
}
