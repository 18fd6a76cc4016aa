use std::path::{Path, PathBuf};

use mta_core::error::{ConvertError, Result};
use mta_core::frame::{ConvertedFrame, PixelBuffer};
use mta_core::traits::FrameSink;

use crate::muxer::{Mp4Muxer, check_frame_size};
use crate::rasterizer::{RasterStyle, Rasterizer};

/// Sink that rasterizes each frame and encodes it to an MP4 file.
///
/// The encoder starts on the first frame, once the grid size is known.
/// On abort, or when the encoder fails at finish, the partial file is removed.
pub struct VideoFileSink {
    path: PathBuf,
    fps: f64,
    rasterizer: Rasterizer,
    style: RasterStyle,
    muxer: Option<Mp4Muxer>,
    canvas: Option<PixelBuffer>,
    written: usize,
}

impl VideoFileSink {
    #[must_use]
    pub fn new(path: &Path, fps: f64, rasterizer: Rasterizer, style: RasterStyle) -> Self {
        Self {
            path: path.to_path_buf(),
            fps,
            rasterizer,
            style,
            muxer: None,
            canvas: None,
            written: 0,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Frames handed to the encoder so far.
    #[must_use]
    pub fn frames_written(&self) -> usize {
        self.written
    }
}

impl FrameSink for VideoFileSink {
    fn accept(&mut self, frame: ConvertedFrame) -> Result<()> {
        let (w, h) = self
            .rasterizer
            .target_dimensions(frame.chars.width(), frame.chars.height());

        if self.muxer.is_none() {
            check_frame_size(w, h)?;
            self.muxer = Some(Mp4Muxer::new(&self.path, w, h, self.fps)?);
            self.canvas = Some(PixelBuffer::new(w, h));
        }
        let (Some(muxer), Some(canvas)) = (self.muxer.as_mut(), self.canvas.as_mut()) else {
            return Err(ConvertError::encode("encoder not initialised"));
        };
        if (canvas.width(), canvas.height()) != (w, h) {
            return Err(ConvertError::encode(format!(
                "frame size changed mid-stream: {w}x{h} vs {}x{}",
                canvas.width(),
                canvas.height()
            )));
        }

        self.rasterizer.render_into(&frame, self.style, canvas)?;
        muxer.write_frame(canvas)?;
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        let muxer = self
            .muxer
            .take()
            .ok_or_else(|| ConvertError::encode("no frames selected, nothing to encode"))?;
        self.canvas = None;
        muxer.finish()?;
        Ok(())
    }

    fn abort(&mut self) {
        self.canvas = None;
        if let Some(muxer) = self.muxer.take() {
            muxer.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::locate_font;
    use mta_core::error::ErrorKind;

    fn rasterizer() -> Option<Rasterizer> {
        let data = std::fs::read(locate_font(None).ok()?).ok()?;
        Rasterizer::new(&data, 12.0, &[]).ok()
    }

    #[test]
    fn finish_without_frames_is_encode_error() {
        let Some(r) = rasterizer() else {
            return;
        };
        let dir = tempfile::tempdir().unwrap();
        let mut sink = VideoFileSink::new(&dir.path().join("empty.mp4"), 30.0, r, RasterStyle::new(false, false));
        let err = sink.finish().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Encode);
        assert_eq!(sink.frames_written(), 0);
    }

    #[test]
    fn oversized_grid_rejected() {
        let Some(r) = rasterizer() else {
            return;
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("huge.mp4");
        let mut sink = VideoFileSink::new(&path, 30.0, r, RasterStyle::new(false, false));
        let frame = ConvertedFrame {
            index: 0,
            chars: mta_core::frame::CharacterGrid::new(2000, 1000),
            colors: None,
        };
        let err = sink.accept(frame).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Encode);
        sink.abort();
        assert!(!path.exists());
    }
}
