//! Background media loading
//!
//! Decode units run on a bounded [`WorkerPool`] and never touch job state.
//! Each unit posts exactly one [`Completion`] to the loader's mailbox; the
//! owner applies them in [`AsyncMediaLoader::pump`], which is the only place
//! jobs change and ready-callbacks fire.

pub mod job;
pub mod mailbox;
pub mod pool;

use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, instrument};

use crate::decode::load_ppm;
use crate::error::{DecodeError, LoadError};
use crate::media::{FrameBuffer, MediaKind, Resolution, TimestampTrack};
use crate::utils;
use crate::Config;

pub use job::{JobId, MediaLoadJob, ReadyCallback};
pub use mailbox::{Mailbox, Poster};
pub use pool::WorkerPool;

use job::{Completion, UnitKey, UnitOutcome};

pub struct AsyncMediaLoader {
    root: PathBuf,
    index_file: String,
    pool: WorkerPool,
    mailbox: Mailbox<Completion>,
    jobs: HashMap<JobId, MediaLoadJob>,
    next_id: u64,
}

impl AsyncMediaLoader {
    pub fn new(config: &Config) -> Self {
        Self {
            root: config.media.root.clone(),
            index_file: config.media.index_file.clone(),
            pool: WorkerPool::new(config.loader.workers),
            mailbox: Mailbox::new(),
            jobs: HashMap::new(),
            next_id: 0,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Start decoding one image; `reference` is relative to the media root
    #[instrument(skip(self, reference), fields(reference = %reference.as_ref().display()))]
    pub fn load_image(
        &mut self,
        reference: impl AsRef<Path>,
        resolution: Option<Resolution>,
    ) -> JobId {
        let id = self.next_job_id();
        let path = utils::resolve_media_path(&self.root, reference.as_ref());
        let source = reference.as_ref().display().to_string();

        self.jobs.insert(
            id,
            MediaLoadJob::new(id, MediaKind::Image, source, resolution, 1),
        );
        self.spawn_unit(id, UnitKey::Image, move || load_ppm(&path, resolution));
        id
    }

    /// Start decoding every frame of `track`
    #[instrument(skip(self, track), fields(dir = %track.dir().display(), frames = track.len()))]
    pub fn load_video(&mut self, track: TimestampTrack, resolution: Option<Resolution>) -> JobId {
        let id = self.next_job_id();
        let source = track.dir().display().to_string();
        let mut job = MediaLoadJob::new(id, MediaKind::Video, source, resolution, track.len());

        if track.is_empty() {
            info!("No frames found in index of {}, complete", job.source());
            job.mark_complete();
            self.jobs.insert(id, job);
            return id;
        }

        info!(
            "Start processing {} frames from {}",
            track.len(),
            job.source()
        );
        self.jobs.insert(id, job);

        for entry in track.entries() {
            let path = track.frame_path(entry);
            self.spawn_unit(id, UnitKey::Frame(entry.timestamp), move || {
                load_ppm(&path, resolution)
            });
        }
        debug!("{} decode units waiting for a worker", self.pool.queued());
        id
    }

    /// Resolve `folder`'s timestamp index under the media root and load it
    ///
    /// A missing or malformed index yields a job that is already complete
    /// with a fatal error; no work is spawned.
    pub fn load_video_folder(
        &mut self,
        folder: impl AsRef<Path>,
        resolution: Option<Resolution>,
    ) -> JobId {
        let dir = utils::resolve_media_path(&self.root, folder.as_ref());
        match TimestampTrack::from_folder(&dir, &self.index_file) {
            Ok(track) => self.load_video(track, resolution),
            Err(e) => {
                error!("Failed to read timestamps from {}: {}", dir.display(), e);
                let id = self.next_job_id();
                let job = MediaLoadJob::failed(
                    id,
                    MediaKind::Video,
                    dir.display().to_string(),
                    resolution,
                    LoadError::Track(e),
                );
                self.jobs.insert(id, job);
                id
            }
        }
    }

    /// Apply every completion posted so far; returns how many were applied
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Some(completion) = self.mailbox.try_recv() {
            self.apply(completion);
            applied += 1;
        }
        applied
    }

    /// Block up to `timeout` for the first completion, then pump
    pub fn pump_timeout(&mut self, timeout: Duration) -> usize {
        match self.mailbox.recv_timeout(timeout) {
            Some(completion) => {
                self.apply(completion);
                1 + self.pump()
            }
            None => 0,
        }
    }

    /// Pump until `job` completes or `timeout` elapses; returns completion
    pub fn wait(&mut self, job: JobId, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            match self.jobs.get(&job) {
                Some(j) if j.is_complete() => return true,
                Some(_) => {}
                None => return false,
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            self.pump_timeout(deadline - now);
        }
    }

    /// Register the ready-callback for `job`
    ///
    /// Runs the callback immediately when the job has already completed.
    /// Returns false for an unknown or released job.
    pub fn on_ready(&mut self, job: JobId, callback: impl FnOnce(&MediaLoadJob) + 'static) -> bool {
        let Some(entry) = self.jobs.get_mut(&job) else {
            debug!("Ready-callback for unknown {}", job);
            return false;
        };
        if let Some(callback) = entry.set_on_ready(Box::new(callback)) {
            callback(entry);
        }
        true
    }

    pub fn job(&self, job: JobId) -> Option<&MediaLoadJob> {
        self.jobs.get(&job)
    }

    /// Forget a job; completions still in flight for it are discarded
    pub fn release(&mut self, job: JobId) -> Option<MediaLoadJob> {
        self.jobs.remove(&job)
    }

    /// Jobs that are still waiting on decode units
    pub fn pending_jobs(&self) -> usize {
        self.jobs.values().filter(|j| !j.is_complete()).count()
    }

    fn next_job_id(&mut self) -> JobId {
        self.next_id += 1;
        JobId(self.next_id)
    }

    /// Run `decode` on the pool; it posts exactly one completion, even on panic
    fn spawn_unit<F>(&self, job: JobId, key: UnitKey, decode: F)
    where
        F: FnOnce() -> Result<FrameBuffer, DecodeError> + Send + 'static,
    {
        let poster = self.mailbox.poster();
        self.pool.submit(Box::new(move || {
            let outcome = match panic::catch_unwind(AssertUnwindSafe(decode)) {
                Ok(Ok(frame)) => UnitOutcome::Decoded(frame),
                Ok(Err(e)) => UnitOutcome::Failed(e),
                Err(payload) => UnitOutcome::Panicked(panic_message(payload.as_ref())),
            };
            poster.post(Completion { job, key, outcome });
        }));
    }

    fn apply(&mut self, completion: Completion) {
        let Some(job) = self.jobs.get_mut(&completion.job) else {
            debug!("Dropping completion for released {}", completion.job);
            return;
        };

        match &completion.outcome {
            UnitOutcome::Decoded(_) => metrics::counter!("frames_decoded").increment(1),
            _ => metrics::counter!("frames_failed").increment(1),
        }

        if job.apply(completion.key, completion.outcome) {
            job.notify_ready();
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
