//! Durable operator state.
//!
//! One small JSON record survives operator restarts: the capacity floor
//! and the force-update watermark. Writes land in a sibling temp file
//! first and rename over the target, so a crashed write leaves the
//! previous record intact.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Operator state persisted across restarts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    /// Largest Ready-node population observed while no replacement was
    /// wanted. New grants are refused below this floor.
    pub node_count: usize,
    /// Nodes created strictly before this instant are force-eligible.
    pub last_accepted_creation_time: DateTime<Utc>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            node_count: 0,
            last_accepted_creation_time: DateTime::UNIX_EPOCH,
        }
    }
}

/// File-backed store for [`State`]. Single writer: the operator process.
#[derive(Clone, Debug)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the state, or the zero value when no file exists yet. A file
    /// that exists but does not parse is an error, never a silent reset.
    pub async fn load(&self) -> Result<State> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(State::default()),
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&raw)?)
    }

    /// Atomically replaces the stored state.
    pub async fn save(&self, state: &State) -> Result<()> {
        let raw = serde_json::to_vec_pretty(state)?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, raw).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}
