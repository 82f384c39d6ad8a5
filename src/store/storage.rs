//! Durable key-value backing for learning progress
//!
//! Progress is written as one JSON blob under a fixed namespace, the same
//! way the browser client keeps it in local storage. The file backend lives
//! in the configured data directory, next to the config by default.

use crate::config::StorageConfig;
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Namespace (and file stem) of the persisted progress blob
pub const PROGRESS_NAMESPACE: &str = "sprout-progress";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Progress data is malformed: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Unsupported progress version: {0}")]
    UnsupportedVersion(u32),
}

/// Where the progress blob is read from and written to
pub trait ProgressStorage: Send {
    /// Raw blob, or `None` when nothing has been saved yet
    fn load(&self) -> Result<Option<String>, StorageError>;

    fn save(&self, blob: &str) -> Result<(), StorageError>;

    fn clear(&self) -> Result<(), StorageError>;
}

/// Progress stored as `<dir>/sprout-progress.json`
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(format!("{}.json", PROGRESS_NAMESPACE)),
        }
    }

    /// Storage in the configured data directory (`~/.sprout` by default)
    pub fn from_config(config: &StorageConfig) -> Self {
        Self::in_dir(config.resolved_data_dir())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ProgressStorage for JsonFileStorage {
    fn load(&self) -> Result<Option<String>, StorageError> {
        if !self.path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(&self.path)?))
    }

    fn save(&self, blob: &str) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        // Write-then-rename so a crash never leaves a truncated blob
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, blob)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

/// In-process storage; clones share the same slot
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    slot: Arc<Mutex<Option<String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seeded with `blob`
    pub fn with_blob(blob: impl Into<String>) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(blob.into()))),
        }
    }

    /// Current raw contents
    pub fn contents(&self) -> Option<String> {
        self.slot.lock().clone()
    }
}

impl ProgressStorage for MemoryStorage {
    fn load(&self) -> Result<Option<String>, StorageError> {
        Ok(self.slot.lock().clone())
    }

    fn save(&self, blob: &str) -> Result<(), StorageError> {
        *self.slot.lock() = Some(blob.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        *self.slot.lock() = None;
        Ok(())
    }
}
