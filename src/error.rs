//! # Error Types Module
//!
//! Questo modulo definisce tutti i tipi di errore custom della pipeline.
//!
//! ## Responsabilità:
//! - Definisce `SupError` enum per categorizzare tutti gli errori possibili
//! - Distingue errori per-file (il watch loop continua) da errori fatali
//! - Integra con `thiserror` per automatic error conversion
//!
//! ## Categorie di errori:
//! - `UnsupportedFormat`: estensione fuori dalla allow-list, il file viene saltato
//! - `Conversion` / `Resize`: tool esterno fallito, nessun artifact caricato
//! - `DimensionProbe`: non fatale, le dimensioni nei metadata vengono azzerate
//! - `RemoteScan`: impossibile enumerare il bucket, termina il processo
//! - `IdCacheCorrupt`: recuperato in modo trasparente con una reconciliation scan
//! - `Io`, `Store`, `Credentials`, `MissingDependency`, `Validation`
//!
//! ## Esempio:
//! ```rust,ignore
//! if !FileManager::is_supported_format(path) {
//!     return Err(SupError::UnsupportedFormat(path.display().to_string()));
//! }
//! ```

/// Custom error types for the upload pipeline
#[derive(thiserror::Error, Debug)]
pub enum SupError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Conversion error: {0}")]
    Conversion(String),

    #[error("Resize error: {0}")]
    Resize(String),

    #[error("Dimension probe error: {0}")]
    DimensionProbe(String),

    #[error("Remote scan error: {0}")]
    RemoteScan(String),

    #[error("Corrupt id cache: {0}")]
    IdCacheCorrupt(String),

    #[error("Object store error: {0}")]
    Store(String),

    #[error("Credentials error: {0}")]
    Credentials(String),

    #[error("Dependency missing: {0}")]
    MissingDependency(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl SupError {
    /// Errors after which no further id can be allocated safely.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SupError::RemoteScan(_))
    }
}

pub type SupResult<T> = Result<T, SupError>;
