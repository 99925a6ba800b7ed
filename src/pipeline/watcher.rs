//! # Directory Watcher Module
//!
//! Sorgente degli eventi della pipeline, basata su `notify`.
//!
//! ## Responsabilità:
//! - Watcher nativo (`recommended_watcher`) oppure `PollWatcher` con `force_polling`
//! - Inoltra solo eventi `Create`/`Modify` di file con estensione nella allow-list
//! - Raggruppa i path in batch: dopo il primo path, tutto ciò che arriva entro
//!   la finestra di latenza finisce nello stesso batch (senza duplicati)
//!
//! Il callback di `notify` gira su un thread del watcher: i path passano al
//! runtime tokio tramite un canale unbounded.

use crate::error::{SupError, SupResult};
use crate::file_manager::FileManager;
use async_trait::async_trait;
use notify::{Event, EventKind, PollWatcher, RecursiveMode, Watcher};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::Instant;
use tracing::{debug, warn};

/// Anything delivering batches of changed paths
#[async_trait]
pub trait BatchSource: Send {
    /// Next batch; None once the source is exhausted
    async fn next_batch(&mut self, latency: Duration) -> Option<Vec<PathBuf>>;
}

/// Paths of allow-listed images touched by a create or modify event
fn image_paths(event: Event) -> Vec<PathBuf> {
    match event.kind {
        EventKind::Create(_) | EventKind::Modify(_) => event
            .paths
            .into_iter()
            .filter(|path| FileManager::is_supported_format(path))
            .collect(),
        _ => Vec::new(),
    }
}

fn forward(sender: &UnboundedSender<PathBuf>, result: notify::Result<Event>) {
    match result {
        Ok(event) => {
            for path in image_paths(event) {
                // Il receiver chiuso significa che la sessione è terminata
                let _ = sender.send(path);
            }
        }
        Err(e) => warn!("Watch error: {}", e),
    }
}

/// Groups incoming paths into latency-bounded batches
pub struct PathBatcher {
    receiver: UnboundedReceiver<PathBuf>,
}

impl PathBatcher {
    pub fn new(receiver: UnboundedReceiver<PathBuf>) -> Self {
        Self { receiver }
    }
}

#[async_trait]
impl BatchSource for PathBatcher {
    /// Wait for the first path, then collect until the window closes
    async fn next_batch(&mut self, latency: Duration) -> Option<Vec<PathBuf>> {
        let first = self.receiver.recv().await?;
        let deadline = Instant::now() + latency;

        let mut seen = HashSet::new();
        let mut batch = Vec::new();
        seen.insert(first.clone());
        batch.push(first);

        while let Ok(Some(path)) = tokio::time::timeout_at(deadline, self.receiver.recv()).await {
            if seen.insert(path.clone()) {
                batch.push(path);
            }
        }

        debug!("Batch of {} path(s)", batch.len());
        Some(batch)
    }
}

/// Recursive watch over the screenshot directory
pub struct DirectoryWatcher {
    // Il watcher deve restare vivo per tutta la sessione
    _watcher: Box<dyn Watcher + Send>,
    batcher: PathBatcher,
}

impl DirectoryWatcher {
    /// Start watching `root`; `force_polling` scans every `latency`
    pub fn new(root: &Path, latency: Duration, force_polling: bool) -> SupResult<Self> {
        let (sender, receiver) = mpsc::unbounded_channel();

        let handler = move |result: notify::Result<Event>| forward(&sender, result);

        let mut watcher: Box<dyn Watcher + Send> = if force_polling {
            let config = notify::Config::default().with_poll_interval(latency);
            Box::new(PollWatcher::new(handler, config).map_err(watch_error)?)
        } else {
            Box::new(notify::recommended_watcher(handler).map_err(watch_error)?)
        };

        watcher
            .watch(root, RecursiveMode::Recursive)
            .map_err(watch_error)?;
        debug!(
            "Watching {} ({})",
            root.display(),
            if force_polling { "polling" } else { "native events" }
        );

        Ok(Self {
            _watcher: watcher,
            batcher: PathBatcher::new(receiver),
        })
    }
}

#[async_trait]
impl BatchSource for DirectoryWatcher {
    async fn next_batch(&mut self, latency: Duration) -> Option<Vec<PathBuf>> {
        self.batcher.next_batch(latency).await
    }
}

fn watch_error(e: notify::Error) -> SupError {
    SupError::Io(std::io::Error::other(format!("filesystem watcher: {}", e)))
}
