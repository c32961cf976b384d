//! Persistence of sequential pipeline runs between invocations.
//!
//! A run is stored whole under its run id. Completed runs stay in the store
//! so that resuming them returns the stored result; `remove` is the only way
//! a run disappears.
//!
//! Saves are atomic, so concurrent writers never leave a torn file, but two
//! writers advancing the same run still race: the last save wins. Drive a run
//! from one process at a time.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::PipelineError;
use crate::models::{PipelineState, PipelineStateInfo, STATE_VERSION};

/// Keyed store for pipeline state
pub trait CheckpointStore: Send + Sync {
    /// Load a run; `None` when no run is stored under `run_id`
    fn load(&self, run_id: &str) -> Result<Option<PipelineState>>;

    /// Insert or replace the run stored under `state.run_id`
    fn save(&self, state: &PipelineState) -> Result<()>;

    /// Delete a run; returns whether anything was removed
    fn remove(&self, run_id: &str) -> Result<bool>;

    /// Summaries of every stored run, most recently updated first
    fn list(&self) -> Result<Vec<PipelineStateInfo>>;
}

/// One JSON file per run inside a directory
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    dir: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn state_path(&self, run_id: &str) -> Result<PathBuf> {
        if run_id.is_empty() || run_id.contains(['/', '\\']) || run_id.starts_with('.') {
            return Err(anyhow!("Invalid run id: {:?}", run_id));
        }
        Ok(self.dir.join(format!("{}.json", run_id)))
    }
}

impl CheckpointStore for FileCheckpointStore {
    fn load(&self, run_id: &str) -> Result<Option<PipelineState>> {
        let path = self.state_path(run_id)?;
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read checkpoint: {}", path.display()))?;
        let state: PipelineState = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse checkpoint: {}", path.display()))?;

        if state.version > STATE_VERSION {
            return Err(PipelineError::UnsupportedVersion {
                found: state.version,
                supported: STATE_VERSION,
            }
            .into());
        }

        Ok(Some(state))
    }

    /// Written to a uniquely named temporary file in the store directory,
    /// then renamed over the final path
    fn save(&self, state: &PipelineState) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create store directory: {}", self.dir.display()))?;

        let path = self.state_path(&state.run_id)?;
        let content =
            serde_json::to_string_pretty(state).context("Failed to serialize pipeline state")?;

        let mut temp = NamedTempFile::new_in(&self.dir).with_context(|| {
            format!("Failed to create temp checkpoint in: {}", self.dir.display())
        })?;
        temp.write_all(content.as_bytes())
            .context("Failed to write temp checkpoint")?;
        temp.persist(&path)
            .map_err(|e| e.error)
            .with_context(|| format!("Failed to move temp checkpoint to: {}", path.display()))?;

        debug!("Saved checkpoint {}", path.display());
        Ok(())
    }

    fn remove(&self, run_id: &str) -> Result<bool> {
        let path = self.state_path(run_id)?;
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path)
            .with_context(|| format!("Failed to delete checkpoint: {}", path.display()))?;
        Ok(true)
    }

    fn list(&self) -> Result<Vec<PipelineStateInfo>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut runs = Vec::new();
        for entry in fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to read store directory: {}", self.dir.display()))?
        {
            let path = entry?.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            let parsed = fs::read_to_string(&path)
                .ok()
                .and_then(|content| serde_json::from_str::<PipelineState>(&content).ok());
            match parsed {
                Some(state) => runs.push(state.info()),
                None => debug!("Skipping unreadable checkpoint {}", path.display()),
            }
        }

        runs.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(runs)
    }
}

/// Process-local store, mainly for tests and embedding
#[derive(Debug, Default)]
pub struct InMemoryCheckpointStore {
    states: Mutex<HashMap<String, PipelineState>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, PipelineState>>> {
        self.states
            .lock()
            .map_err(|_| anyhow!("Checkpoint store lock poisoned"))
    }
}

impl CheckpointStore for InMemoryCheckpointStore {
    fn load(&self, run_id: &str) -> Result<Option<PipelineState>> {
        Ok(self.lock()?.get(run_id).cloned())
    }

    fn save(&self, state: &PipelineState) -> Result<()> {
        self.lock()?.insert(state.run_id.clone(), state.clone());
        Ok(())
    }

    fn remove(&self, run_id: &str) -> Result<bool> {
        Ok(self.lock()?.remove(run_id).is_some())
    }

    fn list(&self) -> Result<Vec<PipelineStateInfo>> {
        let mut runs: Vec<_> = self.lock()?.values().map(PipelineState::info).collect();
        runs.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(runs)
    }
}
