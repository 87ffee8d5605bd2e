//! Side file mirroring the turn log for external inspection.

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

/// Snapshot write error.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Snapshot serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Overwrites a JSON file with the full turn list on every update.
#[derive(Debug, Clone)]
pub struct SnapshotMirror {
    path: PathBuf,
}

impl SnapshotMirror {
    /// Mirror into the file at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Target file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Truncate to an empty array so a previous run's turns never show.
    ///
    /// # Errors
    /// Returns error if the file cannot be written.
    pub async fn reset(&self) -> Result<(), SnapshotError> {
        self.write_bytes(b"[]").await
    }

    /// Replace the file contents with `snapshot` as pretty-printed JSON.
    ///
    /// # Errors
    /// Returns error if serialization or the write fails.
    pub async fn write<T: Serialize + ?Sized>(&self, snapshot: &T) -> Result<(), SnapshotError> {
        let bytes = serde_json::to_vec_pretty(snapshot)?;
        self.write_bytes(&bytes).await
    }

    async fn write_bytes(&self, bytes: &[u8]) -> Result<(), SnapshotError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, bytes).await?;
        Ok(())
    }
}
