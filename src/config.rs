//! # Configuration Management Module
//!
//! Questo modulo gestisce tutta la configurazione dell'applicazione.
//!
//! ## Responsabilità:
//! - Definisce la struct `Config` con tutti i parametri del watcher e della pipeline
//! - Fornisce validazione robusta dei parametri di input
//! - Supporta caricamento/salvataggio configurazione da/verso file JSON
//! - Risolve i path derivati (processed dir, id cache, base URL)
//!
//! ## Parametri di configurazione:
//! - `watch_dir`: Directory osservata per nuovi screenshot
//! - `bucket`: Bucket S3 di destinazione
//! - `proc_dir`: Directory per i file processati (default: "processed", relativa a `watch_dir`)
//! - `base_url`: URL pubblico base (default: `http://<bucket>/`)
//! - `jpeg_quality`: Qualità JPEG (1-100, default: 80)
//! - `preview` / `preview_width` / `preview_height`: Anteprima ridotta (default: off, 640x480)
//! - `metadata`: Sidecar JSON con dimensioni e formato (default: on)
//! - `notify` / `clipboard`: Side effect desktop (default: on)
//! - `keep_local`: Mantiene la copia locale dopo l'upload (default: off)
//! - `latency` / `force_polling`: Parametri del watcher
//! - `workers`: Numero di file processati in parallelo (default: 4)
//!
//! ## Layering:
//! default < file JSON (`--config`) < flag CLI espliciti. Il risultato viene
//! validato una sola volta e non viene più modificato durante l'esecuzione.
//!
//! ## Esempio:
//! ```rust,ignore
//! let config = Config {
//!     bucket: "shots.example.com".to_string(),
//!     jpeg_quality: 85,
//!     ..Default::default()
//! };
//! config.validate()?;
//! ```

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default name of the directory receiving processed artifacts
pub const DEFAULT_PROC_DIR: &str = "processed";
/// Default name of the id cache file, relative to the watch directory
pub const DEFAULT_ID_FILE: &str = "id.txt";
/// Default credentials file name, relative to the home directory
pub const DEFAULT_CREDENTIALS_FILE: &str = ".sup";
/// Upper bound for the coalescing window, in seconds
pub const MAX_LATENCY_SECS: f64 = 3600.0;
/// Upper bound for parallel workers
pub const MAX_WORKERS: usize = 256;

/// Configuration for the watcher and the processing pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory watched for new screenshots
    pub watch_dir: PathBuf,
    /// Destination bucket
    pub bucket: String,
    /// Directory for processed files (relative paths are resolved against `watch_dir`)
    pub proc_dir: PathBuf,
    /// Base URL for uploaded files (None = `http://<bucket>/`)
    pub base_url: Option<String>,
    /// JPEG quality (1-100)
    pub jpeg_quality: u8,
    /// Generate a downscaled preview
    pub preview: bool,
    /// Preview bounding box width
    pub preview_width: u32,
    /// Preview bounding box height
    pub preview_height: u32,
    /// Generate the JSON metadata sidecar
    pub metadata: bool,
    /// Send a desktop notification with the URL
    pub notify: bool,
    /// Copy the URL to the clipboard
    pub clipboard: bool,
    /// Keep local copies of the uploaded artifacts
    pub keep_local: bool,
    /// Event coalescing window in seconds
    pub latency: f64,
    /// Poll the directory instead of using native filesystem events
    pub force_polling: bool,
    /// Number of files processed in parallel
    pub workers: usize,
    /// Directory containing the ImageMagick tools (None = search PATH)
    pub im_dir: Option<PathBuf>,
    /// Id cache file (None = `<watch_dir>/id.txt`)
    pub id_file: Option<PathBuf>,
    /// Textual ids that must never be assigned
    pub denied_ids: Vec<String>,
    /// Credentials file (None = `~/.sup`)
    pub credentials_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            watch_dir: PathBuf::from("."),
            bucket: String::new(),
            proc_dir: PathBuf::from(DEFAULT_PROC_DIR),
            base_url: None,
            jpeg_quality: 80,
            preview: false,
            preview_width: 640,
            preview_height: 480,
            metadata: true,
            notify: true,
            clipboard: true,
            keep_local: false,
            latency: 0.5,
            force_polling: false,
            workers: 4,
            im_dir: None,
            id_file: None,
            denied_ids: ["meta", "preview", "fuck", "bitch"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            credentials_file: None,
        }
    }
}

impl Config {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.bucket.trim().is_empty() {
            return Err(anyhow::anyhow!("Bucket name must not be empty"));
        }

        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return Err(anyhow::anyhow!("JPEG quality must be between 1 and 100"));
        }

        if self.preview && (self.preview_width == 0 || self.preview_height == 0) {
            return Err(anyhow::anyhow!("Preview bounds must be greater than 0"));
        }

        let latency_ok = self.latency.is_finite() && self.latency > 0.0;
        if !latency_ok || self.latency > MAX_LATENCY_SECS {
            return Err(anyhow::anyhow!(
                "Latency must be between 0 and {} seconds",
                MAX_LATENCY_SECS
            ));
        }

        if self.workers == 0 || self.workers > MAX_WORKERS {
            return Err(anyhow::anyhow!(
                "Number of workers must be between 1 and {}",
                MAX_WORKERS
            ));
        }

        if let Some(ref base_url) = self.base_url {
            url::Url::parse(base_url)
                .map_err(|e| anyhow::anyhow!("Invalid base URL {}: {}", base_url, e))?;
        }

        if !self.watch_dir.is_dir() {
            return Err(anyhow::anyhow!(
                "Watch path is not a directory: {}",
                self.watch_dir.display()
            ));
        }

        Ok(())
    }

    /// Processed directory, resolved against the watch directory when relative
    pub fn resolved_proc_dir(&self) -> PathBuf {
        resolve_against(&self.watch_dir, &self.proc_dir)
    }

    /// Location of the id cache file
    pub fn id_file_path(&self) -> PathBuf {
        match self.id_file {
            Some(ref path) => resolve_against(&self.watch_dir, path),
            None => self.watch_dir.join(DEFAULT_ID_FILE),
        }
    }

    /// Base URL used for public links
    pub fn resolved_base_url(&self) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| format!("http://{}/", self.bucket))
    }

    /// Location of the credentials file
    pub fn credentials_path(&self) -> Result<PathBuf> {
        if let Some(ref path) = self.credentials_file {
            return Ok(path.clone());
        }
        let home = dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find home directory"))?;
        Ok(home.join(DEFAULT_CREDENTIALS_FILE))
    }

    /// Latency as a `Duration`
    pub fn latency(&self) -> Duration {
        Duration::from_secs_f64(self.latency)
    }

    /// Load configuration from file
    pub async fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}

fn resolve_against(base: &Path, path: &Path) -> PathBuf {
    if path.is_relative() {
        base.join(path)
    } else {
        path.to_path_buf()
    }
}
