pub mod decode;
pub mod display;
pub mod error;
pub mod host;
pub mod loader;
pub mod media;
pub mod playback;
pub mod screen;
pub mod utils;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub use error::{ConfigError, DecodeError, HostError, LoadError, RenderError, TrackError};
pub use loader::{AsyncMediaLoader, JobId, MediaLoadJob};
pub use media::{FrameBuffer, MediaData, MediaKind, Resolution, Rgb, Timestamp, TimestampTrack};
pub use playback::{PlaybackOptions, PlaybackScheduler, PlaybackState};
pub use screen::Screen;

/// Prefix for environment overrides, e.g. `GLYPHCAST_LOADER__WORKERS=8`
pub const ENV_PREFIX: &str = "GLYPHCAST";

/// System configuration
///
/// Passed explicitly to the loader and screen; nothing reads ambient state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub media: MediaConfig,
    pub loader: LoaderConfig,
    pub screen: ScreenConfig,
    pub playback: PlaybackConfig,
    pub runtime: RuntimeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Image references and video folders resolve against this directory
    pub root: PathBuf,
    /// Timestamp index inside each video folder
    pub index_file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Concurrency cap for decode units
    pub workers: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenConfig {
    pub width: u32,
    pub height: u32,
    pub glyph: String,
    pub scale: f32,
    /// Distance between pixel nodes; `None` derives it from `scale`
    pub spacing: Option<f32>,
    /// Bottom-left corner of the grid in scene coordinates
    pub position: [f32; 3],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub speed: f64,
    pub looping: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Main-loop pump interval
    pub tick_ms: u64,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("media"),
            index_file: "stamps.json".into(),
        }
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self { workers: 4 }
    }
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            width: 100,
            height: 50,
            glyph: "\u{25A0}".into(),
            scale: 0.01,
            spacing: None,
            position: [0.0, 0.0, 0.0],
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            speed: 1.0,
            looping: false,
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self { tick_ms: 10 }
    }
}

impl ScreenConfig {
    /// Auto spacing keeps adjacent glyphs touching at the given scale
    pub const AUTO_SPACING_FACTOR: f32 = 13.5;

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    pub fn spacing(&self) -> f32 {
        self.spacing
            .unwrap_or(self.scale * Self::AUTO_SPACING_FACTOR)
    }
}

impl Config {
    /// Defaults, then the optional TOML file, then `GLYPHCAST_*` environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(path, Self::environment())
    }

    /// `GLYPHCAST_<SECTION>__<KEY>` variables, e.g. `GLYPHCAST_SCREEN__WIDTH`
    pub fn environment() -> config::Environment {
        config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
    }

    /// [`load`](Self::load) with an explicit environment layer
    pub fn load_with_env(
        path: Option<&Path>,
        env: config::Environment,
    ) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            info!("Loading configuration from {}", path.display());
            builder = builder.add_source(config::File::from(path));
        }
        builder = builder.add_source(env);

        let config: Config = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.screen.glyph.is_empty() {
            return Err(ConfigError::Invalid("screen.glyph must not be empty".into()));
        }
        if self.media.index_file.is_empty() {
            return Err(ConfigError::Invalid("media.index_file must not be empty".into()));
        }
        Ok(())
    }

    /// Create the media root if missing; failure is logged, not fatal
    pub fn ensure_root(&self) {
        if let Err(e) = std::fs::create_dir_all(&self.media.root) {
            warn!(
                "Failed to create media root {}: {}",
                self.media.root.display(),
                e
            );
        }
    }
}
