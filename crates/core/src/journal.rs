//! Bounded on-disk journal.
//!
//! Append-only observability log shared by the daemon (writer) and the
//! status command (reader). At most [`MAX_ENTRIES`] entries are retained;
//! the oldest are dropped first. Reads of a missing or corrupt file yield an
//! empty list rather than an error, so a wedged journal never takes the
//! relay down.

use std::path::{Path, PathBuf};

use chrono::Local;
use serde::{Deserialize, Serialize};

/// Retention cap, oldest entries dropped beyond it.
pub const MAX_ENTRIES: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JournalEntry {
    /// Human-readable local time, `%Y-%m-%d %H:%M:%S`.
    pub timestamp: String,
    /// Epoch millis of the same instant.
    pub timestamp_ms: i64,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum JournalError {
    #[error("failed to write journal at {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to serialize journal: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Handle on the journal file. Cheap to construct; every operation reads or
/// rewrites the whole file, which is fine at a 100-entry cap.
#[derive(Debug, Clone)]
pub struct Journal {
    path: PathBuf,
}

impl Journal {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append an entry stamped with the current wall clock, truncating the
    /// oldest entries beyond [`MAX_ENTRIES`].
    pub fn append(&self, message: impl Into<String>) -> Result<(), JournalError> {
        let now = Local::now();
        let entry = JournalEntry {
            timestamp: now.format("%Y-%m-%d %H:%M:%S").to_string(),
            timestamp_ms: now.timestamp_millis(),
            message: message.into(),
        };

        let mut entries = self.entries();
        entries.push(entry);
        if entries.len() > MAX_ENTRIES {
            let excess = entries.len() - MAX_ENTRIES;
            entries.drain(..excess);
        }
        self.save(&entries)
    }

    /// All retained entries, oldest first. Missing or unreadable file reads
    /// as empty.
    pub fn entries(&self) -> Vec<JournalEntry> {
        let Ok(raw) = std::fs::read_to_string(&self.path) else {
            return Vec::new();
        };
        serde_json::from_str(&raw).unwrap_or_default()
    }

    pub fn clear(&self) -> Result<(), JournalError> {
        self.save(&[])
    }

    fn save(&self, entries: &[JournalEntry]) -> Result<(), JournalError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| JournalError::Write {
                path: self.path.clone(),
                source,
            })?;
        }
        let body = serde_json::to_string(entries)?;
        std::fs::write(&self.path, body).map_err(|source| JournalError::Write {
            path: self.path.clone(),
            source,
        })
    }
}
