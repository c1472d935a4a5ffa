//! Timestamp-driven video playback
//!
//! The scheduler owns at most one host timer. Every path that replaces or
//! drops playback cancels it first, so a superseded session can never tick
//! into fresh frame data.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::display::DisplayGrid;
use crate::error::RenderError;
use crate::host::{Host, TimerId};
use crate::media::{FrameBuffer, Timestamp, VideoFrames};
use crate::PlaybackConfig;

/// Slowest playback rate accepted; lower requests are raised to it
pub const MIN_SPEED: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing,
    /// Last frame shown, restart from the first one is scheduled
    Looping,
    Complete,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackOptions {
    speed: f64,
    looping: bool,
}

impl PlaybackOptions {
    pub fn new(speed: f64, looping: bool) -> Self {
        let clamped = if speed.is_nan() {
            MIN_SPEED
        } else {
            speed.max(MIN_SPEED)
        };
        if clamped != speed {
            debug!("Playback speed {} clamped to {}", speed, clamped);
        }
        Self {
            speed: clamped,
            looping,
        }
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn looping(&self) -> bool {
        self.looping
    }
}

impl Default for PlaybackOptions {
    fn default() -> Self {
        Self::new(1.0, false)
    }
}

impl From<&PlaybackConfig> for PlaybackOptions {
    fn from(config: &PlaybackConfig) -> Self {
        Self::new(config.speed, config.looping)
    }
}

/// Wall time between showing `current` and `next` at `speed`
pub fn frame_delay(current: Timestamp, next: Timestamp, speed: f64) -> Duration {
    let mut gap = next.as_secs() - current.as_secs();
    if gap < 0.0 {
        warn!("Negative video frame delay ({}), using 0", gap);
        gap = 0.0;
    }
    Duration::try_from_secs_f64(gap / speed).unwrap_or(Duration::MAX)
}

#[derive(Debug)]
pub struct PlaybackScheduler {
    state: PlaybackState,
    frames: Vec<(Timestamp, Arc<FrameBuffer>)>,
    index: usize,
    options: PlaybackOptions,
    timer: Option<TimerId>,
    loops_completed: u64,
}

impl Default for PlaybackScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackScheduler {
    pub fn new() -> Self {
        Self {
            state: PlaybackState::Idle,
            frames: Vec::new(),
            index: 0,
            options: PlaybackOptions::default(),
            timer: None,
            loops_completed: 0,
        }
    }

    /// Begin a session over `frames` in timestamp order
    ///
    /// Frame 0 is rendered before this returns; later frames follow on host
    /// timers delivered through [`on_timer`](Self::on_timer).
    pub fn start(
        &mut self,
        host: &mut dyn Host,
        grid: &DisplayGrid,
        frames: &VideoFrames,
        options: PlaybackOptions,
    ) {
        self.cancel_timer(host);
        self.frames = frames
            .iter()
            .map(|(ts, frame)| (*ts, Arc::clone(frame)))
            .collect();
        self.index = 0;
        self.options = options;
        self.loops_completed = 0;

        if self.frames.is_empty() || grid.is_empty() {
            warn!(
                "Playback started with {} frames on {} pixels, stopping",
                self.frames.len(),
                grid.len()
            );
            self.state = PlaybackState::Stopped;
            return;
        }

        info!(
            "Playing {} frames at {}x{}",
            self.frames.len(),
            options.speed,
            if options.looping { " (loop)" } else { "" }
        );
        self.state = PlaybackState::Playing;
        self.tick(host, grid);
    }

    /// Handle a fired host timer; returns false when `timer` is not ours
    pub fn on_timer(&mut self, host: &mut dyn Host, grid: &DisplayGrid, timer: TimerId) -> bool {
        if self.timer != Some(timer) {
            debug!("Ignoring stale {}", timer);
            return false;
        }
        self.timer = None;
        if self.state == PlaybackState::Looping {
            self.state = PlaybackState::Playing;
        }
        self.tick(host, grid);
        true
    }

    /// Cancel the outstanding timer; safe to call repeatedly
    pub fn stop(&mut self, host: &mut dyn Host) {
        self.cancel_timer(host);
        if matches!(self.state, PlaybackState::Playing | PlaybackState::Looping) {
            info!("Playback stopped at frame {}", self.index);
            self.state = PlaybackState::Stopped;
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Index of the next frame to render
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn speed(&self) -> f64 {
        self.options.speed
    }

    pub fn is_looping(&self) -> bool {
        self.options.looping
    }

    pub fn has_timer(&self) -> bool {
        self.timer.is_some()
    }

    pub fn loops_completed(&self) -> u64 {
        self.loops_completed
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    fn tick(&mut self, host: &mut dyn Host, grid: &DisplayGrid) {
        let (ts, frame) = match self.frames.get(self.index) {
            Some((ts, frame)) => (*ts, Arc::clone(frame)),
            None => {
                warn!("Playback tick with invalid index {}", self.index);
                self.halt(host, PlaybackState::Stopped);
                return;
            }
        };

        match grid.set_frame(host, &frame) {
            Ok(()) => {}
            Err(e @ RenderError::SizeMismatch { .. }) => {
                warn!("Skipping frame {}: {}", ts, e);
            }
            Err(RenderError::ContextUnavailable) => {
                error!("Context expired during video playback at frame {}", ts);
                self.halt(host, PlaybackState::Stopped);
                return;
            }
        }

        self.index += 1;
        if let Some(&(next, _)) = self.frames.get(self.index) {
            let delay = frame_delay(ts, next, self.options.speed);
            self.timer = Some(host.schedule_timer(delay));
        } else if self.options.looping {
            info!("Video playback complete, looping");
            self.index = 0;
            self.loops_completed += 1;
            self.state = PlaybackState::Looping;
            self.timer = Some(host.schedule_timer(Duration::ZERO));
        } else {
            info!("Video playback complete");
            self.halt(host, PlaybackState::Complete);
        }
    }

    fn halt(&mut self, host: &mut dyn Host, state: PlaybackState) {
        self.cancel_timer(host);
        self.state = state;
    }

    fn cancel_timer(&mut self, host: &mut dyn Host) {
        if let Some(timer) = self.timer.take() {
            host.cancel_timer(timer);
        }
    }
}
