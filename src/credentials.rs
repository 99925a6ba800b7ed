//! # Credentials Module
//!
//! Legge le credenziali dell'object store da un file locale (`~/.sup`).
//!
//! Il file contiene coppie chiave/valore separate da spazi, tab, newline o `=`:
//! ```text
//! access_key_id = AKIA...
//! secret_access_key = ...
//! s3_endpoint = s3-eu-west-1.amazonaws.com
//! ```
//! I valori vengono trattati come opachi e non finiscono mai nei log.

use crate::error::{SupError, SupResult};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

/// Object store credentials
#[derive(Clone)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub endpoint: Option<String>,
    pub region: Option<String>,
}

impl Credentials {
    /// Parse whitespace/`=` delimited key-value pairs
    pub fn parse(content: &str) -> SupResult<Self> {
        let tokens: Vec<&str> = content
            .split(|c: char| c == '=' || c.is_whitespace())
            .filter(|t| !t.is_empty())
            .collect();

        if tokens.len() % 2 != 0 {
            return Err(SupError::Credentials(format!(
                "expected key/value pairs, found a dangling token ({} tokens)",
                tokens.len()
            )));
        }

        let mut values: HashMap<&str, &str> = tokens
            .chunks(2)
            .map(|pair| (pair[0], pair[1]))
            .collect();

        let mut required = |key: &str| {
            values
                .remove(key)
                .map(str::to_string)
                .ok_or_else(|| SupError::Credentials(format!("missing key: {}", key)))
        };
        let access_key_id = required("access_key_id")?;
        let secret_access_key = required("secret_access_key")?;

        Ok(Self {
            access_key_id,
            secret_access_key,
            endpoint: values.get("s3_endpoint").map(|s| s.to_string()),
            region: values.get("region").map(|s| s.to_string()),
        })
    }

    /// Read and parse a credentials file
    pub async fn from_file(path: &Path) -> SupResult<Self> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            SupError::Credentials(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &"<redacted>")
            .field("secret_access_key", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .finish()
    }
}
