//! # Image Processing Module
//!
//! Questo modulo sceglie la codifica più compatta per ogni screenshot,
//! delegando la conversione vera e propria al toolchain esterno.
//!
//! ## Pipeline di Ottimizzazione
//!
//! 1. **Rilevamento formato**: estensione (case-insensitive, `jpeg` -> `jpg`)
//! 2. **Formato alternativo**: PNG <-> JPEG, qualsiasi altro formato -> JPEG
//! 3. **Conversione**: `<target_dir>/<stem>.<alternativo>` tramite `ImageToolchain`
//! 4. **Confronto dimensioni**:
//!    - originale <= alternativo: l'alternativo viene scartato e l'originale copiato
//!    - altrimenti vince l'alternativo
//! 5. **Gain**: `|orig - alt| / max(orig, alt) * 100`, arrotondato a una cifra decimale
//!
//! ## Qualità
//! - **JPEG Quality**: 1-100 (default: 80), passata solo per target JPEG
//! - PNG/BMP ignorano il parametro
//!
//! ## Error Handling
//! - Conversione fallita: `SupError::Conversion`, nessuna modifica al
//!   filesystem oltre a quella fatta dal tool stesso
//!
//! ## Esempio
//! ```rust,ignore
//! let optimizer = FormatOptimizer::new(toolchain, 80);
//! let encoding = optimizer.optimize(Path::new("shot.png"), Path::new("processed"), "2s").await?;
//! info!("{} is {}% more compact", encoding.format, encoding.gain_percent);
//! ```

use crate::error::{SupError, SupResult};
use crate::file_manager::{FileManager, ImageFormat};
use crate::toolchain::ImageToolchain;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info};

/// The encoding chosen for a source file
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizedEncoding {
    /// Path of the chosen file inside the target directory
    pub path: PathBuf,
    pub format: ImageFormat,
    /// Size of the chosen file in bytes
    pub size: u64,
    /// Size of the source file in bytes
    pub original_size: u64,
    /// Size of the alternate encoding in bytes
    pub alternate_size: u64,
    /// Relative size difference between the two encodings, for logging
    pub gain_percent: f64,
}

impl OptimizedEncoding {
    /// True when the converted encoding won
    pub fn converted(&self, source_format: ImageFormat) -> bool {
        self.format != source_format
    }
}

/// Chooses the smaller of the source encoding and its alternate
pub struct FormatOptimizer {
    toolchain: Arc<dyn ImageToolchain>,
    jpeg_quality: u8,
}

impl FormatOptimizer {
    pub fn new(toolchain: Arc<dyn ImageToolchain>, jpeg_quality: u8) -> Self {
        Self {
            toolchain,
            jpeg_quality,
        }
    }

    /// Quality argument for a target format
    pub fn quality_for(&self, format: ImageFormat) -> Option<u8> {
        format.is_jpeg().then_some(self.jpeg_quality)
    }

    /// Produce `<target_dir>/<stem>.<ext>` in the most compact of the two formats.
    pub async fn optimize(
        &self,
        source: &Path,
        target_dir: &Path,
        stem: &str,
    ) -> SupResult<OptimizedEncoding> {
        let source_format = FileManager::image_format(source)?;
        let alternate = source_format.alternate();

        let alternate_path = target_dir.join(format!("{}.{}", stem, alternate.extension()));
        debug!(
            "Converting {} -> {}",
            source.display(),
            alternate_path.display()
        );
        self.toolchain
            .convert(source, &alternate_path, self.quality_for(alternate))
            .await
            .map_err(|e| match e {
                SupError::Conversion(_) => e,
                other => SupError::Conversion(other.to_string()),
            })?;

        let original_size = FileManager::file_size(source).await?;
        let alternate_size = FileManager::file_size(&alternate_path).await.map_err(|e| {
            SupError::Conversion(format!(
                "converter reported success but {} is unreadable: {}",
                alternate_path.display(),
                e
            ))
        })?;

        let gain_percent = gain_percent(original_size, alternate_size);

        // A parità di dimensione vince il formato originale
        let encoding = if original_size <= alternate_size {
            fs::remove_file(&alternate_path).await?;
            let copy_path = target_dir.join(format!("{}.{}", stem, source_format.extension()));
            fs::copy(source, &copy_path).await?;
            OptimizedEncoding {
                path: copy_path,
                format: source_format,
                size: original_size,
                original_size,
                alternate_size,
                gain_percent,
            }
        } else {
            OptimizedEncoding {
                path: alternate_path,
                format: alternate,
                size: alternate_size,
                original_size,
                alternate_size,
                gain_percent,
            }
        };

        info!(
            "{} is {}% more compact",
            encoding.format.extension().to_uppercase(),
            encoding.gain_percent
        );
        info!("image size: {}", FileManager::format_size(encoding.size));
        Ok(encoding)
    }
}

/// `|a - b| / max(a, b) * 100`, rounded to one decimal place
pub fn gain_percent(original_size: u64, alternate_size: u64) -> f64 {
    let max_size = original_size.max(alternate_size);
    if max_size == 0 {
        return 0.0;
    }
    let diff = original_size.abs_diff(alternate_size) as f64;
    (diff / max_size as f64 * 1000.0).round() / 10.0
}
