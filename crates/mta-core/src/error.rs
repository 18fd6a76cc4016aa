use std::path::PathBuf;

use thiserror::Error;

/// Result alias used across the conversion crates.
pub type Result<T> = std::result::Result<T, ConvertError>;

/// Errors surfaced by conversion, decoding and encoding.
///
/// None of these are retried: they are either configuration mistakes or
/// environmental failures.
#[derive(Error, Debug)]
pub enum ConvertError {
    /// Bad scale factor, empty ramp, degenerate grid dimensions.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Malformed or corrupt source media.
    #[error("decode error{}: {message}", frame_suffix(.frame))]
    Decode {
        /// Index of the source frame being decoded, when known.
        frame: Option<usize>,
        /// Decoder diagnostic.
        message: String,
    },

    /// Output write/encode failure.
    #[error("encode error{}: {message}", frame_suffix(.frame))]
    Encode {
        /// Index of the output frame being encoded, when known.
        frame: Option<usize>,
        /// Encoder diagnostic.
        message: String,
    },

    /// Filesystem access failure.
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        /// Path being read or written.
        path: PathBuf,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// A video run failed after frames were already handed to an encoder.
    #[error("output incomplete after {frames_emitted} frame(s): {source}")]
    Incomplete {
        /// Frames accepted by the sink before the failure.
        frames_emitted: usize,
        /// The failure that aborted the run.
        #[source]
        source: Box<ConvertError>,
    },
}

/// Coarse classification of a [`ConvertError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidConfig,
    Decode,
    Encode,
    Io,
}

impl ConvertError {
    /// Shorthand for [`ConvertError::InvalidConfig`].
    pub fn config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Decode error not tied to a frame.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode {
            frame: None,
            message: msg.into(),
        }
    }

    /// Encode error not tied to a frame.
    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode {
            frame: None,
            message: msg.into(),
        }
    }

    /// Wrap an `io::Error` with the path it concerns.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Attach a frame index to a decode/encode error that has none yet.
    #[must_use]
    pub fn at_frame(self, index: usize) -> Self {
        match self {
            Self::Decode {
                frame: None,
                message,
            } => Self::Decode {
                frame: Some(index),
                message,
            },
            Self::Encode {
                frame: None,
                message,
            } => Self::Encode {
                frame: Some(index),
                message,
            },
            other => other,
        }
    }

    /// Kind of the underlying failure. `Incomplete` reports its cause.
    ///
    /// # Example
    /// ```
    /// use mta_core::error::{ConvertError, ErrorKind};
    /// let err = ConvertError::config("scale_down must be > 0");
    /// assert_eq!(err.kind(), ErrorKind::InvalidConfig);
    /// ```
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidConfig(_) => ErrorKind::InvalidConfig,
            Self::Decode { .. } => ErrorKind::Decode,
            Self::Encode { .. } => ErrorKind::Encode,
            Self::Io { .. } => ErrorKind::Io,
            Self::Incomplete { source, .. } => source.kind(),
        }
    }
}

#[allow(clippy::ref_option)]
fn frame_suffix(frame: &Option<usize>) -> String {
    frame.map_or_else(String::new, |i| format!(" at frame {i}"))
}
