//! Screen: a pixel grid plus whatever media is currently loaded on it

use tracing::{debug, error, info, instrument, warn};

use crate::display::DisplayGrid;
use crate::host::{Host, TimerId};
use crate::loader::{AsyncMediaLoader, JobId, Mailbox, MediaLoadJob};
use crate::media::MediaData;
use crate::playback::{PlaybackOptions, PlaybackScheduler, PlaybackState};
use crate::ScreenConfig;

pub struct Screen {
    config: ScreenConfig,
    grid: DisplayGrid,
    scheduler: PlaybackScheduler,
    options: PlaybackOptions,
    current: Option<JobId>,
    awaiting: bool,
    ready: Mailbox<JobId>,
}

impl Screen {
    pub fn new(host: &mut dyn Host, config: ScreenConfig) -> Self {
        let grid = DisplayGrid::new(host, &config);
        Self {
            config,
            grid,
            scheduler: PlaybackScheduler::new(),
            options: PlaybackOptions::default(),
            current: None,
            awaiting: false,
            ready: Mailbox::new(),
        }
    }

    /// Make `job` the screen's media
    ///
    /// Any running playback stops first and the job it replaces is released
    /// from `loader`. A finished job is shown right away; otherwise it is
    /// shown from [`update`](Self::update) once the loader reports it ready.
    #[instrument(skip(self, host, loader))]
    pub fn load(
        &mut self,
        host: &mut dyn Host,
        loader: &mut AsyncMediaLoader,
        job: JobId,
        options: PlaybackOptions,
    ) {
        self.scheduler.stop(host);
        if let Some(prev) = self.current.replace(job) {
            if prev != job && loader.release(prev).is_some() {
                debug!("Released superseded {}", prev);
            }
        }
        self.options = options;
        self.awaiting = false;

        match loader.job(job) {
            None => {
                warn!("Cannot load unknown {}", job);
                self.current = None;
            }
            Some(media) if media.is_complete() => self.apply(host, media),
            Some(_) => {
                info!("Media data not ready, waiting for callback");
                let poster = self.ready.poster();
                self.awaiting = loader.on_ready(job, move |media| {
                    poster.post(media.id());
                });
            }
        }
    }

    /// Show media whose ready notification arrived since the last call
    pub fn update(&mut self, host: &mut dyn Host, loader: &AsyncMediaLoader) {
        let ready: Vec<JobId> = self.ready.drain().collect();
        for id in ready {
            if self.current != Some(id) {
                warn!("Received ready notification for {}, which is no longer loaded", id);
                continue;
            }
            self.awaiting = false;
            match loader.job(id) {
                Some(media) => self.apply(host, media),
                None => warn!("{} was released before it could be shown", id),
            }
        }
    }

    /// Forward a fired host timer to playback
    pub fn on_timer(&mut self, host: &mut dyn Host, timer: TimerId) -> bool {
        self.scheduler.on_timer(host, &self.grid, timer)
    }

    /// Stop playback, delete every pixel node and release the media
    pub fn delete(&mut self, host: &mut dyn Host, loader: &mut AsyncMediaLoader) {
        info!("Deleting screen");
        self.scheduler.stop(host);
        self.grid.clear(host);
        if let Some(job) = self.current.take() {
            loader.release(job);
        }
        self.awaiting = false;
    }

    /// Nothing waiting to load and no playback in progress
    pub fn is_idle(&self) -> bool {
        !self.awaiting
            && !matches!(
                self.scheduler.state(),
                PlaybackState::Playing | PlaybackState::Looping
            )
    }

    pub fn config(&self) -> &ScreenConfig {
        &self.config
    }

    pub fn grid(&self) -> &DisplayGrid {
        &self.grid
    }

    pub fn scheduler(&self) -> &PlaybackScheduler {
        &self.scheduler
    }

    pub fn current_job(&self) -> Option<JobId> {
        self.current
    }

    fn apply(&mut self, host: &mut dyn Host, media: &MediaLoadJob) {
        if let Some(e) = media.fatal_error() {
            error!("Media loading failed with error: {}", e);
            return;
        }
        if !host.context_active() {
            error!("Cannot load data, context gone or invalid");
            return;
        }

        match media.data() {
            MediaData::Image(Some(frame)) => {
                if let Err(e) = self.grid.set_frame(host, frame) {
                    error!("Failed to show image {}: {}", media.source(), e);
                }
            }
            MediaData::Image(None) => error!("Image data for {} is missing", media.source()),
            MediaData::Video(frames) => {
                let failed = media.errors().len();
                if failed > 0 {
                    warn!(
                        "{} of {} frames failed, playing the rest",
                        failed,
                        media.expected()
                    );
                }
                self.scheduler
                    .start(host, &self.grid, frames, self.options);
            }
        }
    }
}
