pub mod frame;
pub mod track;

use std::collections::BTreeMap;
use std::sync::Arc;

pub use frame::{FrameBuffer, Resolution, Rgb, Timestamp};
pub use track::{TimestampTrack, TrackEntry};

/// Decoded frames of a video keyed by timestamp
pub type VideoFrames = BTreeMap<Timestamp, Arc<FrameBuffer>>;

/// Kinds of media a job can load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

/// Result payload of a load job
#[derive(Debug, Clone)]
pub enum MediaData {
    /// `None` until the image decoded successfully
    Image(Option<Arc<FrameBuffer>>),
    Video(VideoFrames),
}

impl MediaData {
    pub fn empty(kind: MediaKind) -> Self {
        match kind {
            MediaKind::Image => Self::Image(None),
            MediaKind::Video => Self::Video(VideoFrames::new()),
        }
    }

    pub fn kind(&self) -> MediaKind {
        match self {
            Self::Image(_) => MediaKind::Image,
            Self::Video(_) => MediaKind::Video,
        }
    }
}
