//! # Watch Session Module
//!
//! Loop principale: riceve i batch dal watcher e distribuisce i file ai worker.
//!
//! ## Responsabilità:
//! - Filtra i path: output della pipeline, file spariti, file ancora a 0 byte,
//!   file con signature (size + mtime) già gestita in questa sessione
//! - Un task per file (`PipelineRunner::process` + `Publisher::publish`),
//!   limitato da un semaforo di `workers` permessi
//! - Ctrl-C: smette di accettare batch, attende i file in corso e stampa il riepilogo
//! - Errore fatale (`RemoteScan`): termina la sessione con errore
//!
//! ## Gestione concorrenza:
//! L'allocazione degli id è serializzata dal mutex dell'`IdAllocator`;
//! conversioni e upload di file diversi procedono in parallelo.

use crate::config::Config;
use crate::error::{SupError, SupResult};
use crate::file_manager::{FileManager, FileSignature};
use crate::pipeline::publisher::Publisher;
use crate::pipeline::runner::PipelineRunner;
use crate::pipeline::watcher::BatchSource;
use crate::progress::SessionStats;
use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Drives the pipeline from a batch source until shutdown
pub struct WatchSession {
    config: Arc<Config>,
    runner: Arc<PipelineRunner>,
    publisher: Arc<Publisher>,
    semaphore: Arc<Semaphore>,
    stats: Arc<Mutex<SessionStats>>,
    seen: HashMap<PathBuf, FileSignature>,
}

impl WatchSession {
    pub fn new(
        config: Arc<Config>,
        runner: Arc<PipelineRunner>,
        publisher: Arc<Publisher>,
    ) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.workers));
        Self {
            config,
            runner,
            publisher,
            semaphore,
            stats: Arc::new(Mutex::new(SessionStats::new())),
            seen: HashMap::new(),
        }
    }

    /// Run until the source is exhausted, `shutdown` resolves or a fatal error occurs
    pub async fn run<S, F>(&mut self, source: &mut S, shutdown: F) -> SupResult<SessionStats>
    where
        S: BatchSource + ?Sized,
        F: Future<Output = ()>,
    {
        let latency = self.config.latency();
        let (fatal_tx, mut fatal_rx) = mpsc::unbounded_channel::<SupError>();
        let mut tasks = JoinSet::new();
        let mut fatal = None;
        tokio::pin!(shutdown);

        info!("waiting for screenshots...");
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Interrupted, finishing {} in-flight file(s)", tasks.len());
                    break;
                }
                Some(e) = fatal_rx.recv() => {
                    fatal = Some(e);
                    break;
                }
                batch = source.next_batch(latency) => match batch {
                    Some(paths) => {
                        for path in self.admit(paths).await {
                            tasks.spawn(process_file(
                                path,
                                self.runner.clone(),
                                self.publisher.clone(),
                                self.semaphore.clone(),
                                self.stats.clone(),
                                fatal_tx.clone(),
                            ));
                        }
                    }
                    None => {
                        debug!("Event source closed");
                        break;
                    }
                },
            }

            while let Some(joined) = tasks.try_join_next() {
                log_join_error(joined);
            }
        }

        while let Some(joined) = tasks.join_next().await {
            log_join_error(joined);
        }

        let stats = self.stats();
        info!("{}", stats.format_summary());

        if fatal.is_none() {
            fatal = fatal_rx.try_recv().ok();
        }
        match fatal {
            Some(e) => Err(e),
            None => Ok(stats),
        }
    }

    /// Snapshot of the counters
    pub fn stats(&self) -> SessionStats {
        self.stats
            .lock()
            .map(|stats| stats.clone())
            .unwrap_or_default()
    }

    /// Drop paths that must not enter the pipeline
    async fn admit(&mut self, paths: Vec<PathBuf>) -> Vec<PathBuf> {
        let mut admitted = Vec::new();

        for path in paths {
            if self.runner.layout().contains(&path) {
                continue;
            }

            let signature = match FileManager::signature(&path).await {
                Ok(signature) => signature,
                Err(_) => {
                    debug!("{} disappeared, skipping", path.display());
                    continue;
                }
            };

            if signature.size == 0 {
                debug!("{} is still empty, waiting for data", path.display());
                continue;
            }

            if self.seen.get(&path) == Some(&signature) {
                debug!("{} already handled", path.display());
                continue;
            }
            self.seen.insert(path.clone(), signature);
            admitted.push(path);
        }

        admitted
    }
}

async fn process_file(
    path: PathBuf,
    runner: Arc<PipelineRunner>,
    publisher: Arc<Publisher>,
    semaphore: Arc<Semaphore>,
    stats: Arc<Mutex<SessionStats>>,
    fatal_tx: mpsc::UnboundedSender<SupError>,
) {
    // I permessi vengono rilasciati automaticamente quando il task finisce
    let _permit = match semaphore.acquire_owned().await {
        Ok(permit) => permit,
        Err(_) => return,
    };

    let result = match runner.process(&path).await {
        Ok(outcome) => match publisher.publish(&outcome).await {
            Ok(bytes) => FileResult::Uploaded(outcome.encoding.original_size, bytes),
            Err(e) => {
                error!("upload of {} failed: {}", outcome.text_id, e);
                FileResult::Failed
            }
        },
        Err(SupError::UnsupportedFormat(name)) => {
            warn!("Skipping unsupported file {}", name);
            FileResult::Skipped
        }
        Err(e) if e.is_fatal() => {
            error!("{}", e);
            let _ = fatal_tx.send(e);
            FileResult::Failed
        }
        Err(e) => {
            error!("{}: {}", display_name(&path), e);
            FileResult::Failed
        }
    };

    if let Ok(mut stats) = stats.lock() {
        match result {
            FileResult::Uploaded(original, sent) => stats.add_uploaded(original, sent),
            FileResult::Skipped => stats.add_skipped(),
            FileResult::Failed => stats.add_error(),
        }
    }
}

enum FileResult {
    Uploaded(u64, u64),
    Skipped,
    Failed,
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn log_join_error(joined: Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        error!("File task failed: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id_allocator::IdAllocator;
    use crate::pipeline::path_resolver::OutputLayout;
    use crate::pipeline::watcher::PathBatcher;
    use crate::state::IdCache;
    use crate::testing::{write_bytes, MemoryStore, RecordingNotifier, ScriptedToolchain};
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::sync::mpsc::UnboundedSender;

    struct Fixture {
        _temp_dir: TempDir,
        watch_dir: PathBuf,
        store: Arc<MemoryStore>,
        toolchain: Arc<ScriptedToolchain>,
        session: WatchSession,
        sender: UnboundedSender<PathBuf>,
        source: PathBatcher,
    }

    async fn fixture(store: MemoryStore) -> Fixture {
        fixture_with(store, ScriptedToolchain::converting("jpg", 100)).await
    }

    async fn fixture_with(store: MemoryStore, toolchain: ScriptedToolchain) -> Fixture {
        let temp_dir = TempDir::new().unwrap();
        let watch_dir = temp_dir.path().canonicalize().unwrap();
        let config = Arc::new(Config {
            watch_dir: watch_dir.clone(),
            bucket: "b".to_string(),
            latency: 0.01,
            workers: 2,
            ..Default::default()
        });
        let store = Arc::new(store);
        let toolchain = Arc::new(toolchain);

        let allocator = Arc::new(IdAllocator::new(
            IdCache::new(config.id_file_path()),
            store.clone(),
            "meta/",
            config.denied_ids.clone(),
        ));
        let mut layout = OutputLayout::new(config.resolved_proc_dir());
        layout.ensure_dirs().await.unwrap();
        let runner = Arc::new(PipelineRunner::new(
            config.clone(),
            allocator,
            toolchain.clone(),
            layout,
        ));
        let publisher = Arc::new(Publisher::new(
            store.clone(),
            Arc::new(RecordingNotifier::default()),
            None,
            false,
        ));

        let (sender, receiver) = mpsc::unbounded_channel();
        Fixture {
            _temp_dir: temp_dir,
            watch_dir,
            store,
            toolchain,
            session: WatchSession::new(config, runner, publisher),
            sender,
            source: PathBatcher::new(receiver),
        }
    }

    #[tokio::test]
    async fn test_session_uploads_every_new_file() {
        let mut fx = fixture(MemoryStore::default()).await;
        for name in ["one.png", "two.png"] {
            let path = fx.watch_dir.join(name);
            write_bytes(&path, 1_000).await;
            fx.sender.send(path).unwrap();
        }
        drop(fx.sender);

        let stats = fx
            .session
            .run(&mut fx.source, std::future::pending())
            .await
            .unwrap();

        assert_eq!(stats.uploaded, 2);
        assert_eq!(stats.errors, 0);
        let keys = fx.store.keys();
        assert!(keys.contains(&"1.jpg".to_string()));
        assert!(keys.contains(&"2.jpg".to_string()));
        assert!(keys.contains(&"meta/2.json".to_string()));
    }

    #[tokio::test]
    async fn test_session_filters_paths() {
        let mut fx = fixture(MemoryStore::default()).await;

        let own_output = fx.watch_dir.join("processed").join("9.jpg");
        write_bytes(&own_output, 500).await;
        let empty = fx.watch_dir.join("empty.png");
        write_bytes(&empty, 0).await;
        let missing = fx.watch_dir.join("gone.png");
        let real = fx.watch_dir.join("shot.png");
        write_bytes(&real, 1_000).await;

        for path in [&own_output, &empty, &missing, &real] {
            fx.sender.send(path.clone()).unwrap();
        }
        drop(fx.sender);

        let stats = fx
            .session
            .run(&mut fx.source, std::future::pending())
            .await
            .unwrap();

        assert_eq!(stats.files_processed, 1);
        let converted: Vec<String> = fx
            .toolchain
            .calls()
            .into_iter()
            .filter(|call| call.starts_with("convert"))
            .collect();
        assert_eq!(converted.len(), 1);
        assert!(converted[0].contains("shot.png"));
    }

    #[tokio::test]
    async fn test_same_signature_is_handled_once() {
        let mut fx = fixture(MemoryStore::default()).await;
        let path = fx.watch_dir.join("shot.png");
        write_bytes(&path, 1_000).await;

        assert_eq!(fx.session.admit(vec![path.clone()]).await.len(), 1);
        assert!(fx.session.admit(vec![path.clone()]).await.is_empty());

        // contenuto diverso: nuova signature
        write_bytes(&path, 2_000).await;
        assert_eq!(fx.session.admit(vec![path]).await.len(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_store_is_fatal() {
        let mut fx = fixture(MemoryStore::unreachable()).await;
        let path = fx.watch_dir.join("shot.png");
        write_bytes(&path, 1_000).await;
        fx.sender.send(path).unwrap();

        // il sender resta aperto: solo l'errore fatale può chiudere la sessione
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            fx.session.run(&mut fx.source, std::future::pending()),
        )
        .await
        .unwrap();

        assert!(matches!(result, Err(SupError::RemoteScan(_))));
        assert!(!fx.watch_dir.join("id.txt").exists());
    }

    #[tokio::test]
    async fn test_shutdown_stops_the_session() {
        let mut fx = fixture(MemoryStore::default()).await;

        let stats = fx
            .session
            .run(&mut fx.source, std::future::ready(()))
            .await
            .unwrap();

        assert_eq!(stats, SessionStats::new());
        assert!(fx.store.keys().is_empty());
    }

    #[tokio::test]
    async fn test_unsupported_files_are_skipped() {
        let mut fx = fixture(MemoryStore::default()).await;
        let path = fx.watch_dir.join("anim.gif");
        write_bytes(&path, 10).await;
        fx.sender.send(path).unwrap();
        drop(fx.sender);

        let stats = fx
            .session
            .run(&mut fx.source, std::future::pending())
            .await
            .unwrap();
        assert_eq!(stats.skipped, 1);
    }

    #[tokio::test]
    async fn test_file_task_runs_on_the_runtime() {
        let fx = fixture(MemoryStore::default()).await;
        let path = fx.watch_dir.join("shot.png");
        write_bytes(&path, 1_000).await;
        let (fatal_tx, _fatal_rx) = mpsc::unbounded_channel();

        tokio::spawn(process_file(
            path,
            fx.session.runner.clone(),
            fx.session.publisher.clone(),
            fx.session.semaphore.clone(),
            fx.session.stats.clone(),
            fatal_tx,
        ))
        .await
        .unwrap();

        assert_eq!(fx.session.stats().uploaded, 1);
        assert!(fx.store.keys().contains(&"1.jpg".to_string()));
    }

    #[tokio::test]
    async fn test_conversion_error_uploads_nothing() {
        let toolchain = ScriptedToolchain {
            fail_convert: true,
            ..Default::default()
        };
        let mut fx = fixture_with(MemoryStore::default(), toolchain).await;
        let id_file = fx.watch_dir.join("id.txt");
        tokio::fs::write(&id_file, "7\n").await.unwrap();
        let before = tokio::fs::read(&id_file).await.unwrap();

        let path = fx.watch_dir.join("shot.png");
        write_bytes(&path, 1_000).await;
        fx.sender.send(path).unwrap();
        drop(fx.sender);

        let stats = fx
            .session
            .run(&mut fx.source, std::future::pending())
            .await
            .unwrap();

        assert_eq!(stats.errors, 1);
        assert_eq!(stats.uploaded, 0);
        assert!(fx.store.keys().is_empty());
        assert_eq!(tokio::fs::read(&id_file).await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_shutdown_waits_for_in_flight_files() {
        let toolchain = ScriptedToolchain {
            convert_delay: Duration::from_millis(200),
            ..ScriptedToolchain::converting("jpg", 100)
        };
        let mut fx = fixture_with(MemoryStore::default(), toolchain).await;
        let path = fx.watch_dir.join("shot.png");
        write_bytes(&path, 1_000).await;
        fx.sender.send(path).unwrap();

        // Ctrl-C arriva mentre la conversione è in corso
        let toolchain = fx.toolchain.clone();
        let shutdown = async move {
            while !toolchain.calls().iter().any(|call| call.starts_with("convert")) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        };

        let stats = tokio::time::timeout(
            Duration::from_secs(5),
            fx.session.run(&mut fx.source, shutdown),
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(stats.uploaded, 1);
        assert!(fx.store.keys().contains(&"1.jpg".to_string()));
        let cache = tokio::fs::read_to_string(fx.watch_dir.join("id.txt")).await.unwrap();
        assert_eq!(cache.trim(), "1");
    }
}
