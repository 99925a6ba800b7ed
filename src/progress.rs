//! # Session Statistics Module
//!
//! Statistiche cumulative di una sessione di watch.
//!
//! ## Statistiche tracciate:
//! - **uploaded**: screenshot pubblicati
//! - **skipped**: file ignorati (formato non supportato)
//! - **errors**: file falliti (conversione, resize, upload)
//! - **bytes_uploaded** / **original_bytes**: volume caricato e volume sorgente
//!
//! ## Esempio:
//! ```rust,ignore
//! let mut stats = SessionStats::new();
//! stats.add_uploaded(120_000, 48_000);
//! info!("{}", stats.format_summary());
//! ```

use crate::file_manager::FileManager;

/// Statistics tracker for a watch session
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SessionStats {
    pub files_processed: usize,
    pub uploaded: usize,
    pub skipped: usize,
    pub errors: usize,
    pub bytes_uploaded: u64,
    pub original_bytes: u64,
}

impl SessionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_uploaded(&mut self, original_size: u64, uploaded_size: u64) {
        self.files_processed += 1;
        self.uploaded += 1;
        self.original_bytes += original_size;
        self.bytes_uploaded += uploaded_size;
    }

    pub fn add_skipped(&mut self) {
        self.files_processed += 1;
        self.skipped += 1;
    }

    pub fn add_error(&mut self) {
        self.files_processed += 1;
        self.errors += 1;
    }

    /// Uploaded volume relative to the source volume
    pub fn upload_ratio_percent(&self) -> f64 {
        if self.original_bytes > 0 {
            (self.bytes_uploaded as f64 / self.original_bytes as f64) * 100.0
        } else {
            0.0
        }
    }

    pub fn format_summary(&self) -> String {
        format!(
            "Processed: {} files | Uploaded: {} | Skipped: {} | Errors: {} | Sent: {} \
             ({:.2}% of source)",
            self.files_processed,
            self.uploaded,
            self.skipped,
            self.errors,
            FileManager::format_size(self.bytes_uploaded),
            self.upload_ratio_percent()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let mut stats = SessionStats::new();
        stats.add_uploaded(100_000, 40_000);
        stats.add_uploaded(100_000, 60_000);
        stats.add_skipped();
        stats.add_error();

        assert_eq!(stats.files_processed, 4);
        assert_eq!(stats.uploaded, 2);
        assert_eq!(stats.upload_ratio_percent(), 50.0);
        assert!(stats
            .format_summary()
            .starts_with("Processed: 4 files | Uploaded: 2 | Skipped: 1 | Errors: 1"));
    }

    #[test]
    fn test_empty_session() {
        let stats = SessionStats::new();
        assert_eq!(stats.upload_ratio_percent(), 0.0);
        assert!(stats.format_summary().ends_with("(0.00% of source)"));
    }
}
