//! # File Management Module
//!
//! Questo modulo gestisce il riconoscimento dei formati e le operazioni sui file.
//!
//! ## Responsabilità:
//! - Allow-list dei formati immagine (`png`, `jpg`/`jpeg`, `bmp`), case-insensitive
//! - Normalizzazione `jpeg` -> `jpg`
//! - Dimensione e signature (size + mtime) dei file
//! - Formattazione human-readable delle dimensioni
//!
//! ## Esempio:
//! ```rust,ignore
//! let format = FileManager::image_format(Path::new("Shot.JPEG"))?;
//! assert_eq!(format, ImageFormat::Jpeg);
//! assert_eq!(format.extension(), "jpg");
//! ```

use crate::error::{SupError, SupResult};
use std::fmt;
use std::path::Path;
use std::time::SystemTime;
use tokio::fs;

/// Allow-listed image formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Bmp,
}

impl ImageFormat {
    /// Parse an extension (without dot), case-insensitive; `jpeg` is accepted as `jpg`
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "bmp" => Some(Self::Bmp),
            _ => None,
        }
    }

    /// Canonical extension
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Bmp => "bmp",
        }
    }

    /// Format tried as the alternative encoding: PNG and JPEG swap, anything else goes to JPEG
    pub fn alternate(&self) -> Self {
        match self {
            Self::Png => Self::Jpeg,
            Self::Jpeg => Self::Png,
            Self::Bmp => Self::Jpeg,
        }
    }

    pub fn is_jpeg(&self) -> bool {
        matches!(self, Self::Jpeg)
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Size and modification time, used to recognise a file already handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileSignature {
    pub size: u64,
    pub modified: u64,
}

/// Manages file operations and format detection
pub struct FileManager;

impl FileManager {
    /// Check if a file extension is in the allow-list
    pub fn is_supported_format(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(ImageFormat::from_extension)
            .is_some()
    }

    /// Detect the image format of a path from its extension
    pub fn image_format(path: &Path) -> SupResult<ImageFormat> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(ImageFormat::from_extension)
            .ok_or_else(|| SupError::UnsupportedFormat(path.display().to_string()))
    }

    /// Size of a file in bytes
    pub async fn file_size(path: &Path) -> SupResult<u64> {
        Ok(fs::metadata(path).await?.len())
    }

    /// Size and modification time (seconds since the epoch)
    pub async fn signature(path: &Path) -> SupResult<FileSignature> {
        let metadata = fs::metadata(path).await?;
        let modified = metadata
            .modified()?
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Ok(FileSignature {
            size: metadata.len(),
            modified,
        })
    }

    /// Remove a set of files, ignoring the ones already gone
    pub async fn remove_files<P: AsRef<Path>>(paths: &[P]) {
        for path in paths {
            let path = path.as_ref();
            if let Err(e) = fs::remove_file(path).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!("Failed to remove {}: {}", path.display(), e);
                }
            }
        }
    }

    /// Get human-readable file size
    pub fn format_size(size: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = size as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", size as u64, UNITS[unit_index])
        } else {
            format!("{:.2} {}", size, UNITS[unit_index])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_format_detection() {
        assert_eq!(FileManager::image_format(Path::new("a.PNG")).unwrap(), ImageFormat::Png);
        assert_eq!(FileManager::image_format(Path::new("a.jpeg")).unwrap(), ImageFormat::Jpeg);
        assert_eq!(FileManager::image_format(Path::new("a.Jpg")).unwrap(), ImageFormat::Jpeg);
        assert_eq!(FileManager::image_format(Path::new("a.bmp")).unwrap(), ImageFormat::Bmp);

        assert!(matches!(
            FileManager::image_format(Path::new("a.gif")),
            Err(SupError::UnsupportedFormat(_))
        ));
        assert!(!FileManager::is_supported_format(Path::new("id.txt")));
        assert!(!FileManager::is_supported_format(Path::new("noext")));
    }

    #[test]
    fn test_alternate_formats() {
        assert_eq!(ImageFormat::Png.alternate(), ImageFormat::Jpeg);
        assert_eq!(ImageFormat::Jpeg.alternate(), ImageFormat::Png);
        assert_eq!(ImageFormat::Bmp.alternate(), ImageFormat::Jpeg);
    }

    #[test]
    fn test_format_size() {
        assert_eq!(FileManager::format_size(512), "512 B");
        assert_eq!(FileManager::format_size(1536), "1.50 KB");
        assert_eq!(FileManager::format_size(5 * 1024 * 1024), "5.00 MB");
    }

    #[tokio::test]
    async fn test_remove_files_ignores_missing() {
        let temp_dir = TempDir::new().unwrap();
        let present = temp_dir.path().join("a.png");
        tokio::fs::write(&present, b"x").await.unwrap();
        let missing = temp_dir.path().join("b.png");

        FileManager::remove_files(&[present.clone(), missing]).await;
        assert!(!present.exists());
    }
}
