//! # Publisher Module
//!
//! Carica gli artifact di un `PipelineOutcome` ed esegue i side effect.
//!
//! ## Responsabilità:
//! - Upload parallelo di tutti gli artifact (chiavi uniche per id)
//! - Copia dell'URL negli appunti e notifica desktop, solo dopo un upload riuscito
//! - Rimozione dei file locali, salvo `keep_local`
//!
//! Clipboard e notifica sono best-effort: non falliscono mai la pubblicazione.

use crate::clipboard::ClipboardSink;
use crate::error::SupResult;
use crate::file_manager::FileManager;
use crate::notifier::Notifier;
use crate::object_store::ObjectStore;
use crate::pipeline::runner::PipelineOutcome;
use futures::future::try_join_all;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Title of every desktop notification
pub const NOTIFICATION_TITLE: &str = "Screenshot Uploader";

/// Uploads artifact sets and surfaces the resulting URL
pub struct Publisher {
    store: Arc<dyn ObjectStore>,
    notifier: Arc<dyn Notifier>,
    clipboard: Option<ClipboardSink>,
    keep_local: bool,
}

impl Publisher {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        notifier: Arc<dyn Notifier>,
        clipboard: Option<ClipboardSink>,
        keep_local: bool,
    ) -> Self {
        Self {
            store,
            notifier,
            clipboard,
            keep_local,
        }
    }

    /// Upload every artifact; returns the number of bytes sent
    pub async fn publish(&self, outcome: &PipelineOutcome) -> SupResult<u64> {
        let uploads = outcome.artifacts.iter().map(|artifact| async move {
            debug!(
                "Uploading {} -> {}",
                artifact.path.display(),
                self.store.describe(&artifact.key)
            );
            self.store
                .write(&artifact.key, &artifact.path, artifact.content_type)
                .await?;
            FileManager::file_size(&artifact.path).await
        });
        let sizes = try_join_all(uploads).await?;
        let bytes: u64 = sizes.iter().sum();

        info!(
            "uploaded {} ({}) to {}",
            outcome.text_id,
            FileManager::format_size(bytes),
            outcome.url
        );

        if let Some(ref clipboard) = self.clipboard {
            clipboard.copy(outcome.url.clone());
        }
        self.notifier
            .notify(NOTIFICATION_TITLE, &format!("URL: {}", outcome.url))
            .await;

        if !self.keep_local {
            let local: Vec<PathBuf> = outcome.artifacts.iter().map(|a| a.path.clone()).collect();
            FileManager::remove_files(&local).await;
        }

        Ok(bytes)
    }
}
