//! Failure ledger: the set of tracks a batch run could not download.
//!
//! Stored as a pretty JSON array in the batch destination directory. The file
//! reflects only the latest run: it is replaced when a run ends with failures
//! and removed when a run ends with none.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::model::TrackDescriptor;

pub const DEFAULT_LEDGER_FILENAME: &str = "failed_tracks.json";

#[derive(Debug, Clone)]
pub struct FailureLedger {
    path: PathBuf,
}

impl FailureLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Ledger at `<dir>/<filename>`.
    pub fn in_dir(dir: &Path, filename: &str) -> Self {
        Self::new(dir.join(filename))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes `failed`, or deletes any existing ledger when `failed` is empty.
    /// Returns the ledger path when a file was written.
    pub fn store(&self, failed: &[TrackDescriptor]) -> Result<Option<PathBuf>> {
        if failed.is_empty() {
            match std::fs::remove_file(&self.path) {
                Ok(()) => {
                    tracing::info!(
                        path = %self.path.display(),
                        "all tracks downloaded, ledger removed"
                    );
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(e).with_context(|| format!("remove ledger: {}", self.path.display()))
                }
            }
            return Ok(None);
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create dir: {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(failed).context("serialize failure ledger")?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).with_context(|| format!("write ledger: {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("rename {} to {}", tmp.display(), self.path.display()))?;
        tracing::info!(path = %self.path.display(), count = failed.len(), "failure ledger written");
        Ok(Some(self.path.clone()))
    }

    /// Reads the ledger back. A missing file means no failures (empty set).
    pub fn load(&self) -> Result<Vec<TrackDescriptor>> {
        let bytes = match std::fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("read ledger: {}", self.path.display()))
            }
        };
        serde_json::from_slice(&bytes)
            .with_context(|| format!("parse ledger: {}", self.path.display()))
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }
}
