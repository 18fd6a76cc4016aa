use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{ConvertError, Result};
use crate::frame::{ConvertedFrame, PixelBuffer};

/// Fournit des frames décodées au pipeline vidéo.
///
/// Implémenté par : `VideoDecoder` (ffmpeg), [`MemorySource`].
///
/// # Example
/// ```
/// use mta_core::traits::FrameSource;
/// use mta_core::frame::PixelBuffer;
/// use mta_core::error::Result;
///
/// struct Empty;
/// impl FrameSource for Empty {
///     fn frame_rate(&self) -> f64 { 24.0 }
///     fn next_frame(&mut self) -> Result<Option<PixelBuffer>> { Ok(None) }
/// }
/// ```
pub trait FrameSource {
    /// Declared source rate in frames per second. 0.0 if unknown.
    fn frame_rate(&self) -> f64;

    /// Next decoded frame in stream order.
    ///
    /// `Ok(None)` when the stream is exhausted normally.
    ///
    /// # Errors
    /// `Decode` for corrupt media, a truncated frame or a closed handle.
    fn next_frame(&mut self) -> Result<Option<PixelBuffer>>;

    /// Expected number of decoded frames, when the container says so.
    /// Only used for progress reporting.
    fn frame_count_hint(&self) -> Option<usize> {
        None
    }
}

/// Reçoit les frames converties, dans l'ordre source.
///
/// Implémenté par : `CollectSink`, `VideoFileSink`, le lecteur terminal.
pub trait FrameSink {
    /// Take ownership of the next frame in order.
    ///
    /// # Errors
    /// `Encode` or `Io` when the frame cannot be written.
    fn accept(&mut self, frame: ConvertedFrame) -> Result<()>;

    /// Flush and close after the last frame.
    ///
    /// # Errors
    /// `Encode` or `Io` if the artifact cannot be finalized.
    fn finish(&mut self) -> Result<()>;

    /// Release resources after a failed run. Must not block indefinitely.
    fn abort(&mut self) {}
}

/// Shared close flag for an open frame source.
///
/// A caller wanting early termination calls [`SourceHandle::close`]; the
/// source then fails its next read instead of blocking.
///
/// # Example
/// ```
/// use mta_core::traits::SourceHandle;
/// let handle = SourceHandle::new();
/// let observer = handle.clone();
/// handle.close();
/// assert!(observer.is_closed());
/// ```
#[derive(Clone, Debug, Default)]
pub struct SourceHandle {
    closed: Arc<AtomicBool>,
}

impl SourceHandle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// `Decode` error if closed.
    ///
    /// # Errors
    /// When [`SourceHandle::close`] has been called.
    pub fn check(&self) -> Result<()> {
        if self.is_closed() {
            Err(ConvertError::decode("source handle closed by caller"))
        } else {
            Ok(())
        }
    }
}

/// In-memory frame source, for decoded sequences already held by the caller.
///
/// # Example
/// ```
/// use mta_core::traits::{FrameSource, MemorySource};
/// use mta_core::frame::PixelBuffer;
/// let mut src = MemorySource::new(vec![PixelBuffer::new(2, 2)], 30.0);
/// assert!(src.next_frame().unwrap().is_some());
/// assert!(src.next_frame().unwrap().is_none());
/// ```
#[derive(Debug)]
pub struct MemorySource {
    frames: VecDeque<PixelBuffer>,
    fps: f64,
    handle: SourceHandle,
}

impl MemorySource {
    #[must_use]
    pub fn new(frames: Vec<PixelBuffer>, fps: f64) -> Self {
        Self {
            frames: frames.into(),
            fps,
            handle: SourceHandle::new(),
        }
    }

    /// Handle that closes this source.
    #[must_use]
    pub fn handle(&self) -> SourceHandle {
        self.handle.clone()
    }
}

impl FrameSource for MemorySource {
    fn frame_rate(&self) -> f64 {
        self.fps
    }

    fn next_frame(&mut self) -> Result<Option<PixelBuffer>> {
        self.handle.check()?;
        Ok(self.frames.pop_front())
    }

    fn frame_count_hint(&self) -> Option<usize> {
        Some(self.frames.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_source_hints_remaining_frames() {
        let mut src = MemorySource::new(vec![PixelBuffer::new(1, 1); 3], 10.0);
        assert_eq!(src.frame_count_hint(), Some(3));
        src.next_frame().unwrap();
        assert_eq!(src.frame_count_hint(), Some(2));
    }

    #[test]
    fn closed_memory_source_fails() {
        let mut src = MemorySource::new(vec![PixelBuffer::new(1, 1); 3], 10.0);
        assert!(src.next_frame().unwrap().is_some());
        src.handle().close();
        let err = src.next_frame().unwrap_err();
        assert!(matches!(err, ConvertError::Decode { .. }));
    }
}
