//! Runtime-mutated runner state, split from the user-edited config the way
//! config and state files are conventionally separated: `gitsms.toml` is
//! only ever written by the operator, `state.json` only by the daemon (and
//! read by `status`). Writes are last-writer-wins.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::config::config_dir;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RelayState {
    /// The recurring loop is active; the trigger may only be armed while
    /// this is true.
    #[serde(default)]
    pub running: bool,
    /// A check is executing right now (status rendering only).
    #[serde(default)]
    pub checking: bool,
    /// Epoch millis of the last completed (or transiently failed) check;
    /// 0 before the first one.
    #[serde(default)]
    pub last_run_ms: i64,
}

/// File-backed handle on [`RelayState`].
#[derive(Debug, Clone)]
pub struct StateFile {
    path: PathBuf,
}

impl StateFile {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn default_location() -> Result<Self> {
        Ok(Self::at(state_path()?))
    }

    /// Missing or unreadable state reads as the default (stopped).
    pub fn load(&self) -> RelayState {
        let Ok(raw) = std::fs::read_to_string(&self.path) else {
            return RelayState::default();
        };
        serde_json::from_str(&raw).unwrap_or_default()
    }

    pub fn save(&self, state: &RelayState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let body = serde_json::to_string(state).context("Failed to serialize state")?;
        std::fs::write(&self.path, body)
            .with_context(|| format!("Failed to write state at {}", self.path.display()))?;
        Ok(())
    }

    /// Load-modify-save. Infrequent single-writer updates, no locking.
    pub fn update(&self, f: impl FnOnce(&mut RelayState)) -> Result<RelayState> {
        let mut state = self.load();
        f(&mut state);
        self.save(&state)?;
        Ok(state)
    }
}

/// Get the state file path
pub fn state_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("state.json"))
}

/// Get the PID file path
pub fn pid_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("daemon.pid"))
}

/// Get the journal file path
pub fn journal_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("journal.json"))
}
