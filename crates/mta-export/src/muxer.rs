use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Output, Stdio};

use mta_core::error::{ConvertError, Result};
use mta_core::frame::PixelBuffer;

/// Largest frame the encoder accepts, in pixels (4096 × 2304).
pub const MAX_ENCODE_PIXELS: u64 = 9_437_184;

/// Encode des frames RGBA brutes en MP4 (H.264) via ffmpeg.
///
/// Frames are piped to ffmpeg's stdin; odd dimensions are padded to even
/// ones as `yuv420p` requires.
pub struct Mp4Muxer {
    path: PathBuf,
    child: Child,
    stdin: Option<ChildStdin>,
    width: u32,
    height: u32,
    frames: usize,
}

impl Mp4Muxer {
    /// Start ffmpeg writing to `output_path` at `fps` frames per second.
    ///
    /// # Errors
    /// `Encode` if the frame is too large or ffmpeg cannot be started.
    pub fn new(output_path: &Path, width: u32, height: u32, fps: f64) -> Result<Self> {
        check_frame_size(width, height)?;
        let fps = if fps.is_finite() && fps > 0.0 { fps } else { 30.0 };

        let mut child = Command::new("ffmpeg")
            .args([
                "-y",
                "-hide_banner",
                "-loglevel",
                "error",
                "-f",
                "rawvideo",
                "-pix_fmt",
                "rgba",
                "-s",
                &format!("{width}x{height}"),
                "-r",
                &format!("{fps:.6}"),
                "-i",
                "-",
                "-vf",
                "pad=ceil(iw/2)*2:ceil(ih/2)*2",
                "-c:v",
                "libx264",
                "-pix_fmt",
                "yuv420p",
                "-an",
            ])
            .arg(output_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                ConvertError::encode(format!(
                    "cannot start ffmpeg encoder ({e}); is it installed and on PATH?"
                ))
            })?;
        let stdin = child.stdin.take();

        log::info!(
            "Encodeur ouvert: {width}x{height} @ {fps:.3}fps → {}",
            output_path.display()
        );
        Ok(Self {
            path: output_path.to_path_buf(),
            child,
            stdin,
            width,
            height,
            frames: 0,
        })
    }

    /// Append one frame. Must match the size given to [`Mp4Muxer::new`].
    ///
    /// # Errors
    /// `Encode` on a size mismatch or if ffmpeg stopped reading.
    pub fn write_frame(&mut self, frame: &PixelBuffer) -> Result<()> {
        if frame.width() != self.width || frame.height() != self.height {
            return Err(ConvertError::encode(format!(
                "frame {}x{} does not match encoder size {}x{}",
                frame.width(),
                frame.height(),
                self.width,
                self.height
            )));
        }
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| ConvertError::encode("encoder input already closed"))?;
        stdin
            .write_all(frame.as_raw())
            .map_err(|e| ConvertError::encode(format!("ffmpeg stopped accepting frames: {e}")))?;
        self.frames += 1;
        Ok(())
    }

    #[must_use]
    pub fn frames_written(&self) -> usize {
        self.frames
    }

    /// Ferme le flux et attend la fin de l'encodage.
    ///
    /// # Errors
    /// `Encode` with ffmpeg's diagnostics if it exits unsuccessfully; the
    /// partial file is removed in that case.
    pub fn finish(mut self) -> Result<usize> {
        drop(self.stdin.take());
        let output = self.child.wait_with_output();
        match output {
            Ok(output) => settle(&self.path, &output, self.frames),
            Err(e) => {
                remove_partial(&self.path);
                Err(ConvertError::io(&self.path, e))
            }
        }
    }

    /// Kill the encoder and delete the partial file.
    pub fn abort(mut self) {
        drop(self.stdin.take());
        let _ = self.child.kill();
        let _ = self.child.wait();
        remove_partial(&self.path);
        log::warn!(
            "Encodage interrompu après {} frame(s), sortie supprimée",
            self.frames
        );
    }
}

/// Outcome of an exited encoder: the frame count, or `Encode` with its
/// stderr after deleting the unusable output.
fn settle(path: &Path, output: &Output, frames: usize) -> Result<usize> {
    if output.status.success() {
        log::info!("Encodage terminé: {frames} frame(s) → {}", path.display());
        return Ok(frames);
    }
    remove_partial(path);
    let stderr = String::from_utf8_lossy(&output.stderr);
    Err(ConvertError::encode(format!(
        "ffmpeg encoder failed ({}): {}",
        output.status,
        stderr.trim()
    )))
}

fn remove_partial(path: &Path) {
    if path.exists()
        && let Err(e) = std::fs::remove_file(path)
    {
        log::warn!("Impossible de supprimer {}: {e}", path.display());
    }
}

/// # Errors
/// `Encode` if `width × height` exceeds [`MAX_ENCODE_PIXELS`] or is zero.
pub fn check_frame_size(width: u32, height: u32) -> Result<()> {
    let pixels = u64::from(width) * u64::from(height);
    if pixels == 0 {
        return Err(ConvertError::encode("cannot encode an empty frame"));
    }
    if pixels > MAX_ENCODE_PIXELS {
        return Err(ConvertError::encode(format!(
            "rendered frame {width}x{height} ({pixels} px) exceeds the encoder limit of \
             {MAX_ENCODE_PIXELS} px; raise scale_down or lower font_size"
        )));
    }
    Ok(())
}
