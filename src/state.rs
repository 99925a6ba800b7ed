//! # State Management Module
//!
//! Questo modulo gestisce l'unico stato persistente locale: il contatore degli id.
//!
//! ## Responsabilità:
//! - Legge il valore del contatore dal file cache (`id.txt`)
//! - Scrive il nuovo valore in modo atomico (file temporaneo + rename)
//! - Distingue cache assente da cache corrotta, entrambe recuperate con una reconciliation scan
//!
//! ## Formato:
//! Il file contiene un solo intero in base 36 (minuscolo), la stessa radix
//! usata per le chiavi remote:
//! ```text
//! 2s
//! ```

use crate::error::{SupError, SupResult};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Radix used for every textual id, locally and remotely
pub const ID_RADIX: u32 = 36;

/// Encode an id as lowercase base-36
pub fn encode_id(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }

    let mut buf = Vec::new();
    while value > 0 {
        buf.push(DIGITS[(value % ID_RADIX as u64) as usize]);
        value /= ID_RADIX as u64;
    }
    buf.reverse();
    String::from_utf8_lossy(&buf).into_owned()
}

/// Decode a base-36 id (case-insensitive)
pub fn decode_id(text: &str) -> Option<u64> {
    if text.is_empty() || !text.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    u64::from_str_radix(text, ID_RADIX).ok()
}

/// The on-disk cache of the id counter
#[derive(Debug, Clone)]
pub struct IdCache {
    path: PathBuf,
}

impl IdCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the cached counter.
    ///
    /// `Ok(None)` when the file does not exist, `IdCacheCorrupt` when it is
    /// unreadable or does not hold a base-36 integer.
    pub async fn read(&self) -> SupResult<Option<u64>> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(SupError::IdCacheCorrupt(format!(
                    "cannot read {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        decode_id(content.trim()).map(Some).ok_or_else(|| {
            SupError::IdCacheCorrupt(format!(
                "{} does not contain a base-36 id: {:?}",
                self.path.display(),
                content.trim()
            ))
        })
    }

    /// Persist the counter atomically
    pub async fn write(&self, value: u64) -> SupResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        fs::write(&tmp_path, encode_id(value)).await?;
        if let Err(e) = fs::rename(&tmp_path, &self.path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }
        Ok(())
    }
}
