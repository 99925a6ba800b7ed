//! # Path Resolution Module
//!
//! Centralizza il calcolo dei path locali di output della pipeline.
//!
//! ```text
//! <proc_dir>/<id>.<ext>
//! <proc_dir>/preview/<id>.<ext>
//! <proc_dir>/meta/<id>.json
//! ```

use crate::error::SupResult;
use crate::file_manager::ImageFormat;
use crate::naming::{META_DIR, PREVIEW_DIR};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Local directory layout of processed artifacts
#[derive(Debug, Clone)]
pub struct OutputLayout {
    proc_dir: PathBuf,
}

impl OutputLayout {
    pub fn new(proc_dir: impl Into<PathBuf>) -> Self {
        Self {
            proc_dir: proc_dir.into(),
        }
    }

    /// Create the directories and switch to the canonical path, so that
    /// `contains` works with the absolute paths delivered by the watcher
    pub async fn ensure_dirs(&mut self) -> SupResult<()> {
        tokio::fs::create_dir_all(self.preview_dir()).await?;
        tokio::fs::create_dir_all(self.meta_dir()).await?;
        self.proc_dir = tokio::fs::canonicalize(&self.proc_dir).await?;
        debug!("Output directory: {}", self.proc_dir.display());
        Ok(())
    }

    pub fn proc_dir(&self) -> &Path {
        &self.proc_dir
    }

    pub fn preview_dir(&self) -> PathBuf {
        self.proc_dir.join(PREVIEW_DIR)
    }

    pub fn meta_dir(&self) -> PathBuf {
        self.proc_dir.join(META_DIR)
    }

    pub fn preview_path(&self, text_id: &str, format: ImageFormat) -> PathBuf {
        self.preview_dir()
            .join(format!("{}.{}", text_id, format.extension()))
    }

    pub fn metadata_path(&self, text_id: &str) -> PathBuf {
        self.meta_dir().join(format!("{}.json", text_id))
    }

    /// True for paths inside the processed directory (our own output)
    pub fn contains(&self, path: &Path) -> bool {
        if path.starts_with(&self.proc_dir) {
            return true;
        }
        // Il file può essere già sparito: si confronta il parent canonico
        path.parent()
            .and_then(|parent| parent.canonicalize().ok())
            .map(|parent| parent.starts_with(&self.proc_dir))
            .unwrap_or(false)
    }
}
