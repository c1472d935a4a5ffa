//! Error taxonomy for decoding, loading and rendering

use std::path::PathBuf;

use thiserror::Error;

use crate::media::Timestamp;

/// Failure decoding a single PPM image or frame
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("bad magic: expected P6, found {found:?}")]
    BadMagic { found: String },

    #[error("bad header: {0}")]
    BadHeader(String),

    #[error("bad payload: expected {expected} bytes, got {actual}")]
    BadPayload { expected: usize, actual: usize },

    #[error("bad target resolution {width}x{height}")]
    BadTargetResolution { width: u32, height: u32 },

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DecodeError {
    pub(crate) fn header(msg: impl Into<String>) -> Self {
        Self::BadHeader(msg.into())
    }
}

/// Failure resolving a video's timestamp index
#[derive(Debug, Error)]
pub enum TrackError {
    #[error("index file not found: {}", path.display())]
    MissingIndexFile { path: PathBuf },

    #[error("malformed index file {}: {reason}", path.display())]
    MalformedIndexFile { path: PathBuf, reason: String },
}

/// Error recorded on a load job
#[derive(Debug, Error)]
pub enum LoadError {
    /// The timestamp index could not be resolved; no frames were loaded
    #[error(transparent)]
    Track(#[from] TrackError),

    /// A single-image job failed to decode
    #[error("image decode failed: {0}")]
    Image(#[source] DecodeError),

    /// One frame of a video failed; siblings are unaffected
    #[error("frame at {timestamp} failed: {source}")]
    PartialFrameFailure {
        timestamp: Timestamp,
        #[source]
        source: DecodeError,
    },

    /// A decode unit panicked; `timestamp` is set for video frames
    #[error("decode worker panicked: {message}")]
    WorkerPanicked {
        timestamp: Option<Timestamp>,
        message: String,
    },
}

impl LoadError {
    /// Whether the error leaves the job without usable media
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::PartialFrameFailure { .. }
                | Self::WorkerPanicked {
                    timestamp: Some(_),
                    ..
                }
        )
    }
}

/// Failure writing a frame onto the display grid
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RenderError {
    #[error("frame size ({frame}) mismatch with pixel count ({grid})")]
    SizeMismatch { frame: usize, grid: usize },

    #[error("scene context unavailable")]
    ContextUnavailable,
}

/// Failure reported by the host collaborator
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HostError {
    #[error("node {0} no longer exists")]
    NodeMissing(u64),

    #[error("scene context unavailable")]
    ContextUnavailable,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Source(#[from] config::ConfigError),

    #[error("invalid config: {0}")]
    Invalid(String),
}
