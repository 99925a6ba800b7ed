//! # Derivative Generation Module
//!
//! Genera gli artifact opzionali derivati dall'immagine principale.
//!
//! ## Derivati:
//! - **preview**: copia ridotta nel bounding box configurato, solo "shrink"
//!   (un'immagine già più piccola non viene mai ingrandita)
//! - **metadata**: sidecar JSON con dimensioni, content type, size e timestamp UTC
//!
//! ## Struttura Output
//! ```text
//! processed/
//! ├── 2s.png
//! ├── preview/
//! │   └── 2s.png
//! └── meta/
//!     └── 2s.json
//! ```
//!
//! ## Best-effort:
//! La lettura delle dimensioni non blocca mai la pipeline: se `identify`
//! fallisce le dimensioni principali valgono 0 e quelle della preview
//! vengono omesse.

use crate::error::{SupError, SupResult};
use crate::file_manager::{FileManager, ImageFormat};
use crate::image_processor::OptimizedEncoding;
use crate::naming::content_type_for;
use crate::toolchain::ImageToolchain;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// A downscaled copy of the primary image
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewArtifact {
    pub path: PathBuf,
    pub format: ImageFormat,
    pub size: u64,
}

/// Metadata sidecar record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_height: Option<u32>,
    pub content_type: String,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_size: Option<u64>,
    pub timestamp: String,
}

/// The written metadata sidecar
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataArtifact {
    pub path: PathBuf,
    pub record: ImageMetadata,
    pub size: u64,
}

/// Optional artifacts produced for one source file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Derivatives {
    pub preview: Option<PreviewArtifact>,
    pub metadata: Option<MetadataArtifact>,
}

/// Produces preview and metadata artifacts
pub struct DerivativeGenerator {
    toolchain: Arc<dyn ImageToolchain>,
}

impl DerivativeGenerator {
    pub fn new(toolchain: Arc<dyn ImageToolchain>) -> Self {
        Self { toolchain }
    }

    /// Shrink `source` into the bounding box at `target`
    pub async fn generate_preview(
        &self,
        source: &Path,
        target: &Path,
        max_width: u32,
        max_height: u32,
        quality: u8,
    ) -> SupResult<PreviewArtifact> {
        let format = FileManager::image_format(target)?;
        let quality = format.is_jpeg().then_some(quality);

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        self.toolchain
            .resize(source, target, max_width, max_height, quality)
            .await
            .map_err(|e| match e {
                SupError::Resize(_) => e,
                other => SupError::Resize(other.to_string()),
            })?;

        let size = FileManager::file_size(target).await.map_err(|e| {
            SupError::Resize(format!("preview {} missing: {}", target.display(), e))
        })?;
        debug!("Preview {} ({})", target.display(), FileManager::format_size(size));

        Ok(PreviewArtifact {
            path: target.to_path_buf(),
            format,
            size,
        })
    }

    /// Probe (width, height) of an image
    pub async fn read_dimensions(&self, path: &Path) -> SupResult<(u32, u32)> {
        self.toolchain
            .probe_dimensions(path)
            .await
            .map_err(|e| match e {
                SupError::DimensionProbe(_) => e,
                other => SupError::DimensionProbe(other.to_string()),
            })
    }

    /// Build and write the metadata sidecar for `primary` at `target`
    pub async fn generate_metadata(
        &self,
        primary: &OptimizedEncoding,
        preview: Option<&PreviewArtifact>,
        target: &Path,
    ) -> SupResult<MetadataArtifact> {
        let (width, height) = match self.read_dimensions(&primary.path).await {
            Ok(dimensions) => dimensions,
            Err(e) => {
                warn!("{}; writing zero dimensions for {}", e, primary.path.display());
                (0, 0)
            }
        };

        let preview_dimensions = match preview {
            Some(preview) => match self.read_dimensions(&preview.path).await {
                Ok(dimensions) => Some(dimensions),
                Err(e) => {
                    warn!("{}; omitting preview dimensions", e);
                    None
                }
            },
            None => None,
        };

        let record = ImageMetadata {
            width,
            height,
            preview_width: preview_dimensions.map(|(w, _)| w),
            preview_height: preview_dimensions.map(|(_, h)| h),
            content_type: metadata_content_type(primary.format),
            size: primary.size,
            preview_size: preview.map(|p| p.size),
            timestamp: utc_timestamp(),
        };

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec(&record)
            .map_err(|e| SupError::Validation(format!("metadata serialization: {}", e)))?;
        tokio::fs::write(target, &json).await?;

        Ok(MetadataArtifact {
            path: target.to_path_buf(),
            record,
            size: json.len() as u64,
        })
    }
}

/// Content type recorded in the sidecar; formats without a fixed mapping get `image/<ext>`
fn metadata_content_type(format: ImageFormat) -> String {
    content_type_for(format.extension())
        .map(str::to_string)
        .unwrap_or_else(|| format!("image/{}", format.extension()))
}

fn utc_timestamp() -> String {
    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string()
}
