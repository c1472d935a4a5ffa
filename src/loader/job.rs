use std::fmt;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::error::{DecodeError, LoadError};
use crate::media::{FrameBuffer, MediaData, MediaKind, Resolution, Timestamp, VideoFrames};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job#{}", self.0)
    }
}

/// One-shot notification fired on the owner thread when a job completes
pub type ReadyCallback = Box<dyn FnOnce(&MediaLoadJob)>;

/// Which part of a job a decode unit produced
#[derive(Debug, Clone, Copy)]
pub(crate) enum UnitKey {
    Image,
    Frame(Timestamp),
}

/// What a decode unit hands back
pub(crate) enum UnitOutcome {
    Decoded(FrameBuffer),
    Failed(DecodeError),
    Panicked(String),
}

/// Message a worker posts to the owner thread
pub(crate) struct Completion {
    pub job: JobId,
    pub key: UnitKey,
    pub outcome: UnitOutcome,
}

/// An in-flight or completed image or video load
///
/// Only the owning [`AsyncMediaLoader`](super::AsyncMediaLoader) mutates a
/// job, and only while draining completions on the main thread.
pub struct MediaLoadJob {
    id: JobId,
    source: String,
    resolution: Option<Resolution>,
    expected: usize,
    processed: usize,
    complete: bool,
    errors: Vec<LoadError>,
    data: MediaData,
    on_ready: Option<ReadyCallback>,
}

impl MediaLoadJob {
    pub(crate) fn new(
        id: JobId,
        kind: MediaKind,
        source: String,
        resolution: Option<Resolution>,
        expected: usize,
    ) -> Self {
        Self {
            id,
            source,
            resolution,
            expected,
            processed: 0,
            complete: false,
            errors: Vec::new(),
            data: MediaData::empty(kind),
            on_ready: None,
        }
    }

    /// A job that failed before any work was spawned
    pub(crate) fn failed(
        id: JobId,
        kind: MediaKind,
        source: String,
        resolution: Option<Resolution>,
        err: LoadError,
    ) -> Self {
        let mut job = Self::new(id, kind, source, resolution, 0);
        job.errors.push(err);
        job.complete = true;
        job
    }

    /// Finish a job that has nothing to wait for
    pub(crate) fn mark_complete(&mut self) {
        self.complete = true;
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn kind(&self) -> MediaKind {
        self.data.kind()
    }

    /// Image reference or video folder this job loads
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn resolution(&self) -> Option<Resolution> {
        self.resolution
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn expected(&self) -> usize {
        self.expected
    }

    pub fn processed(&self) -> usize {
        self.processed
    }

    /// First error recorded, fatal or not
    pub fn error(&self) -> Option<&LoadError> {
        self.errors.first()
    }

    pub fn errors(&self) -> &[LoadError] {
        &self.errors
    }

    /// First error that leaves the job without usable media
    pub fn fatal_error(&self) -> Option<&LoadError> {
        self.errors.iter().find(|e| e.is_fatal())
    }

    pub fn data(&self) -> &MediaData {
        &self.data
    }

    pub fn image(&self) -> Option<&Arc<FrameBuffer>> {
        match &self.data {
            MediaData::Image(frame) => frame.as_ref(),
            MediaData::Video(_) => None,
        }
    }

    pub fn frames(&self) -> Option<&VideoFrames> {
        match &self.data {
            MediaData::Video(frames) => Some(frames),
            MediaData::Image(_) => None,
        }
    }

    /// Store the callback, or hand it back when the job is already complete
    pub(crate) fn set_on_ready(&mut self, callback: ReadyCallback) -> Option<ReadyCallback> {
        if self.complete {
            return Some(callback);
        }
        if self.on_ready.replace(callback).is_some() {
            warn!("{}: replacing previously registered ready-callback", self.id);
        }
        None
    }

    /// Fire the ready-callback if one is waiting
    pub(crate) fn notify_ready(&mut self) {
        if let Some(callback) = self.on_ready.take() {
            callback(self);
        }
    }

    /// Apply one unit's outcome; returns true when this completes the job
    pub(crate) fn apply(&mut self, key: UnitKey, outcome: UnitOutcome) -> bool {
        if self.complete {
            warn!("{}: completion after job finished, ignoring", self.id);
            return false;
        }
        self.processed += 1;

        match (key, outcome) {
            (UnitKey::Image, UnitOutcome::Decoded(frame)) => {
                self.data = MediaData::Image(Some(Arc::new(frame)));
            }
            (UnitKey::Image, UnitOutcome::Failed(e)) => {
                error!("Error processing image {}: {}", self.source, e);
                self.errors.push(LoadError::Image(e));
            }
            (UnitKey::Image, UnitOutcome::Panicked(message)) => {
                error!("Image worker for {} panicked: {}", self.source, message);
                self.errors.push(LoadError::WorkerPanicked {
                    timestamp: None,
                    message,
                });
            }
            (UnitKey::Frame(timestamp), UnitOutcome::Decoded(frame)) => {
                if let MediaData::Video(frames) = &mut self.data {
                    frames.insert(timestamp, Arc::new(frame));
                }
            }
            (UnitKey::Frame(timestamp), UnitOutcome::Failed(source)) => {
                warn!("Frame {} of {} failed: {}", timestamp, self.source, source);
                self.errors
                    .push(LoadError::PartialFrameFailure { timestamp, source });
            }
            (UnitKey::Frame(timestamp), UnitOutcome::Panicked(message)) => {
                warn!("Frame {} of {} panicked: {}", timestamp, self.source, message);
                self.errors.push(LoadError::WorkerPanicked {
                    timestamp: Some(timestamp),
                    message,
                });
            }
        }

        if self.processed < self.expected {
            return false;
        }

        self.complete = true;
        match (self.kind(), self.error()) {
            (MediaKind::Video, Some(e)) => info!(
                "All {} frames of {} processed with errors: {}",
                self.expected, self.source, e
            ),
            (MediaKind::Video, None) => info!(
                "All {} frames of {} processed successfully",
                self.expected, self.source
            ),
            (MediaKind::Image, _) => {}
        }
        true
    }
}

impl fmt::Debug for MediaLoadJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaLoadJob")
            .field("id", &self.id)
            .field("kind", &self.kind())
            .field("source", &self.source)
            .field("resolution", &self.resolution)
            .field("expected", &self.expected)
            .field("processed", &self.processed)
            .field("complete", &self.complete)
            .field("errors", &self.errors)
            .field("has_callback", &self.on_ready.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::media::Rgb;

    fn frame(v: f32) -> FrameBuffer {
        FrameBuffer::filled(Resolution::new(1, 1), Rgb::new(v, v, v))
    }

    fn outcomes() -> Vec<(UnitKey, f32)> {
        [0.0, 0.5, 1.0, 1.5]
            .iter()
            .map(|&t| (UnitKey::Frame(Timestamp::from_secs(t)), t as f32))
            .collect()
    }

    fn run(order: &[usize]) -> (VideoFrames, usize) {
        let mut job = MediaLoadJob::new(JobId(1), MediaKind::Video, "clip".into(), None, 4);
        let fired = Rc::new(Cell::new(0));
        let counter = fired.clone();
        job.set_on_ready(Box::new(move |_| counter.set(counter.get() + 1)));

        let units = outcomes();
        for &i in order {
            let (key, v) = units[i];
            if job.apply(key, UnitOutcome::Decoded(frame(v))) {
                job.notify_ready();
            }
        }
        // A late duplicate must not re-fire
        assert!(!job.apply(units[0].0, UnitOutcome::Decoded(frame(0.0))));
        job.notify_ready();

        (job.frames().unwrap().clone(), fired.get())
    }

    #[test]
    fn arrival_order_does_not_change_result() {
        let (forward, fired_a) = run(&[0, 1, 2, 3]);
        let (shuffled, fired_b) = run(&[2, 0, 3, 1]);
        assert_eq!(forward, shuffled);
        assert_eq!(forward.len(), 4);
        assert_eq!((fired_a, fired_b), (1, 1));
    }

    #[test]
    fn failures_count_toward_completion() {
        let mut job = MediaLoadJob::new(JobId(2), MediaKind::Video, "clip".into(), None, 2);
        let ts = Timestamp::from_secs(0.0);
        assert!(!job.apply(UnitKey::Frame(ts), UnitOutcome::Decoded(frame(1.0))));
        assert!(job.apply(
            UnitKey::Frame(Timestamp::from_secs(1.0)),
            UnitOutcome::Failed(DecodeError::header("truncated")),
        ));

        assert!(job.is_complete());
        assert_eq!(job.frames().unwrap().len(), 1);
        assert!(job.fatal_error().is_none());
        assert!(matches!(
            job.error(),
            Some(LoadError::PartialFrameFailure { .. })
        ));
    }

    #[test]
    fn callback_is_returned_once_complete() {
        let mut job = MediaLoadJob::failed(
            JobId(3),
            MediaKind::Image,
            "img.ppm".into(),
            None,
            LoadError::WorkerPanicked {
                timestamp: None,
                message: "boom".into(),
            },
        );
        assert!(job.set_on_ready(Box::new(|_| {})).is_some());
        assert!(job.fatal_error().is_some());
    }
}
