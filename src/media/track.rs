//! Timestamp index (`stamps.json`) parsing

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::TrackError;
use crate::media::Timestamp;

/// One frame reference of a video
#[derive(Debug, Clone, PartialEq)]
pub struct TrackEntry {
    pub timestamp: Timestamp,
    /// Key as written in the index file
    pub key: String,
    /// Frame file name, relative to the track directory
    pub file: String,
}

/// Sparse time -> frame-file mapping for one video folder, sorted by time
#[derive(Debug, Clone, PartialEq)]
pub struct TimestampTrack {
    dir: PathBuf,
    entries: Vec<TrackEntry>,
}

impl TimestampTrack {
    /// Read `index_file` from `dir`
    pub fn from_folder(dir: impl Into<PathBuf>, index_file: &str) -> Result<Self, TrackError> {
        let dir = dir.into();
        let index_path = dir.join(index_file);
        if !index_path.is_file() {
            return Err(TrackError::MissingIndexFile { path: index_path });
        }

        let json = std::fs::read_to_string(&index_path).map_err(|e| {
            TrackError::MalformedIndexFile {
                path: index_path.clone(),
                reason: e.to_string(),
            }
        })?;

        Self::parse_from(dir, &index_path, &json)
    }

    /// Parse index JSON whose frame files live in `dir`
    pub fn parse(dir: impl Into<PathBuf>, json: &str) -> Result<Self, TrackError> {
        let dir = dir.into();
        let origin = dir.clone();
        Self::parse_from(dir, &origin, json)
    }

    fn parse_from(dir: PathBuf, origin: &Path, json: &str) -> Result<Self, TrackError> {
        let malformed = |reason: String| TrackError::MalformedIndexFile {
            path: origin.to_path_buf(),
            reason,
        };

        let raw: BTreeMap<String, String> =
            serde_json::from_str(json).map_err(|e| malformed(e.to_string()))?;

        let mut by_time: BTreeMap<Timestamp, TrackEntry> = BTreeMap::new();
        for (key, file) in raw {
            let timestamp = Timestamp::parse(&key)
                .ok_or_else(|| malformed(format!("timestamp key {key:?} is not a finite number")))?;
            let entry = TrackEntry {
                timestamp,
                key,
                file,
            };
            if let Some(prev) = by_time.insert(timestamp, entry) {
                warn!(
                    "Duplicate timestamp {} in index (key {:?} replaced)",
                    timestamp, prev.key
                );
            }
        }

        debug!("Parsed {} timestamps from {}", by_time.len(), origin.display());

        Ok(Self {
            dir,
            entries: by_time.into_values().collect(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Entries in ascending timestamp order
    pub fn entries(&self) -> &[TrackEntry] {
        &self.entries
    }

    pub fn timestamps(&self) -> impl Iterator<Item = Timestamp> + '_ {
        self.entries.iter().map(|e| e.timestamp)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn frame_path(&self, entry: &TrackEntry) -> PathBuf {
        self.dir.join(&entry.file)
    }
}
