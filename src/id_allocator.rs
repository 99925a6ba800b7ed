//! # Id Allocator Module
//!
//! Proprietario unico della sequenza monotona degli id.
//!
//! ## Responsabilità:
//! - Restituisce l'id corrente dalla cache locale o, se assente/corrotta,
//!   con una reconciliation scan delle chiavi remote
//! - Alloca il prossimo id saltando le codifiche presenti nella deny-list
//! - Persiste il contatore solo al commit, dopo che gli artifact sono stati generati
//!
//! ## Concorrenza:
//! Tutto lo stato vive dietro un `tokio::sync::Mutex`: allocazione, commit e
//! abbandono sono sezioni critiche a singolo writer, anche con più file
//! processati in parallelo.
//!
//! ## Lease:
//! `allocate()` restituisce un `IdLease`. Il lease va chiuso con `commit()`
//! (contatore su disco = max(id, valore persistito)) oppure con `abandon()`
//! (il contatore in memoria torna indietro solo se nessun id successivo è
//! stato assegnato nel frattempo).

use crate::error::{SupError, SupResult};
use crate::file_manager::ImageFormat;
use crate::naming::PREVIEW_DIR;
use crate::object_store::ObjectStore;
use crate::state::{decode_id, encode_id, IdCache};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// An allocated but not yet committed id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdLease {
    pub id: u64,
    pub text: String,
    previous: u64,
}

#[derive(Debug, Default)]
struct CounterState {
    /// Highest id handed out in this process (or loaded value)
    current: Option<u64>,
    /// Value last written to the cache file
    persisted: u64,
}

/// Serialised owner of the id counter
pub struct IdAllocator {
    cache: IdCache,
    store: Arc<dyn ObjectStore>,
    scan_prefix: String,
    denied: HashSet<String>,
    state: Mutex<CounterState>,
}

impl IdAllocator {
    /// Create an allocator; `scan_prefix` is the remote namespace whose key
    /// basenames are ids (`meta/`, or `""` for the whole bucket)
    pub fn new<I, S>(
        cache: IdCache,
        store: Arc<dyn ObjectStore>,
        scan_prefix: impl Into<String>,
        denied: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            cache,
            store,
            scan_prefix: scan_prefix.into(),
            denied: denied
                .into_iter()
                .map(|s| s.as_ref().to_ascii_lowercase())
                .collect(),
            state: Mutex::new(CounterState::default()),
        }
    }

    /// Current counter value, loading it on first use
    pub async fn current_id(&self) -> SupResult<u64> {
        let mut state = self.state.lock().await;
        self.load(&mut state).await
    }

    /// Hand out the next id whose text is not denied
    pub async fn allocate(&self) -> SupResult<IdLease> {
        let mut state = self.state.lock().await;
        let previous = self.load(&mut state).await?;

        let mut candidate = previous;
        let text = loop {
            candidate = candidate
                .checked_add(1)
                .ok_or_else(|| SupError::Validation("id counter overflow".to_string()))?;
            let text = encode_id(candidate);
            if self.denied.contains(&text) {
                debug!("Skipping denied id {}", text);
                continue;
            }
            break text;
        };

        state.current = Some(candidate);
        info!("new image id: {} ({})", text, candidate);
        Ok(IdLease {
            id: candidate,
            text,
            previous,
        })
    }

    /// Persist the lease; this is the commit point of a pipeline run
    pub async fn commit(&self, lease: &IdLease) -> SupResult<()> {
        let mut state = self.state.lock().await;
        let value = lease.id.max(state.persisted);
        self.cache.write(value).await?;
        state.persisted = value;
        debug!("Committed id {} (cache = {})", lease.text, encode_id(value));
        Ok(())
    }

    /// Give the lease back without touching the cache file
    pub async fn abandon(&self, lease: &IdLease) {
        let mut state = self.state.lock().await;
        if state.current == Some(lease.id) {
            state.current = Some(lease.previous);
            debug!("Released id {}", lease.text);
        } else {
            debug!("Id {} left as a gap, later ids already handed out", lease.text);
        }
    }

    /// Ignore the local cache and recover the counter from the remote store
    pub async fn reconcile(&self) -> SupResult<u64> {
        let mut state = self.state.lock().await;
        let id = self.pull_last_id().await?;
        // Non si torna mai indietro rispetto agli id già assegnati in questo processo
        let id = id.max(state.current.unwrap_or(0));
        state.current = Some(id);
        state.persisted = id;
        Ok(id)
    }

    async fn load(&self, state: &mut CounterState) -> SupResult<u64> {
        if let Some(current) = state.current {
            return Ok(current);
        }

        let id = match self.cache.read().await {
            Ok(Some(id)) => id,
            Ok(None) => {
                debug!("No id cache at {}", self.cache.path().display());
                self.pull_last_id().await?
            }
            Err(e) => {
                debug!("error reading id file: {}", e);
                self.pull_last_id().await?
            }
        };

        state.current = Some(id);
        state.persisted = id;
        Ok(id)
    }

    /// Scan remote keys for the highest id and cache it
    async fn pull_last_id(&self) -> SupResult<u64> {
        info!("scanning {} for last id", self.store.describe(&self.scan_prefix));

        let keys = self
            .store
            .list(&self.scan_prefix)
            .await
            .map_err(|e| SupError::RemoteScan(e.to_string()))?;

        let id = keys
            .iter()
            .filter_map(|key| Self::id_from_key(&self.scan_prefix, key))
            .max()
            .unwrap_or(0);

        if let Err(e) = self.cache.write(id).await {
            warn!("Could not write id cache {}: {}", self.cache.path().display(), e);
        }
        info!("last id is {} ({})", encode_id(id), id);
        Ok(id)
    }

    /// Id encoded in a key written by the namer, e.g. `meta/2s.json` -> 100
    fn id_from_key(scan_prefix: &str, key: &str) -> Option<u64> {
        let id = Self::id_stem(scan_prefix, key).and_then(decode_id);
        if id.is_none() {
            debug!("Ignoring key without id: {}", key);
        }
        id
    }

    /// Under `meta/` only `<id>.json` counts; a whole-bucket scan accepts
    /// `<id>.<ext>` and `preview/<id>.<ext>` with a canonical image extension
    fn id_stem<'k>(scan_prefix: &str, key: &'k str) -> Option<&'k str> {
        let rest = key.strip_prefix(scan_prefix)?;
        let name = if scan_prefix.is_empty() {
            let preview_prefix = format!("{}/", PREVIEW_DIR);
            rest.strip_prefix(preview_prefix.as_str()).unwrap_or(rest)
        } else {
            rest
        };

        let (stem, ext) = name.rsplit_once('.')?;
        if stem.contains('/') {
            return None;
        }
        let named = if scan_prefix.is_empty() {
            ImageFormat::from_extension(ext).map(|format| format.extension()) == Some(ext)
        } else {
            ext == "json"
        };
        named.then_some(stem)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryStore;
    use std::path::Path;
    use tempfile::TempDir;

    fn allocator(dir: &Path, store: Arc<MemoryStore>) -> IdAllocator {
        IdAllocator::new(
            IdCache::new(dir.join("id.txt")),
            store,
            "meta/",
            ["meta", "fuck", "bitch"],
        )
    }

    #[test]
    fn test_id_from_key() {
        assert_eq!(IdAllocator::id_from_key("meta/", "meta/5.json"), Some(5));
        assert_eq!(IdAllocator::id_from_key("meta/", "meta/c.json"), Some(12));
        assert_eq!(IdAllocator::id_from_key("meta/", "meta/"), None);
        assert_eq!(IdAllocator::id_from_key("meta/", "meta/not-an-id.json"), None);
        assert_eq!(IdAllocator::id_from_key("meta/", "meta/5.png"), None);
    }

    #[test]
    fn test_whole_bucket_scan_only_counts_named_images() {
        assert_eq!(IdAllocator::id_from_key("", "a1.jpg"), Some(361));
        assert_eq!(IdAllocator::id_from_key("", "preview/10.png"), Some(36));
        assert_eq!(IdAllocator::id_from_key("", "7.bmp"), Some(7));

        assert_eq!(IdAllocator::id_from_key("", "index.html"), None);
        assert_eq!(IdAllocator::id_from_key("", "a1.jpeg"), None);
        assert_eq!(IdAllocator::id_from_key("", "assets/a1.jpg"), None);
        assert_eq!(IdAllocator::id_from_key("", "preview/old/a1.png"), None);
        assert_eq!(IdAllocator::id_from_key("", "meta/zz.json"), None);
    }

    #[tokio::test]
    async fn test_whole_bucket_reconciliation_ignores_foreign_objects() {
        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::with_keys([
            "index.html",
            "robots.txt",
            "c.jpg",
            "preview/c.jpg",
        ]));
        let allocator = IdAllocator::new(
            IdCache::new(temp_dir.path().join("id.txt")),
            store,
            "",
            ["meta"],
        );

        assert_eq!(allocator.current_id().await.unwrap(), 12);
    }

    #[tokio::test]
    async fn test_reconciliation_allocates_after_highest_remote_key() {
        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::with_keys(["meta/5.json", "meta/c.json"]));
        let allocator = allocator(temp_dir.path(), store);

        let lease = allocator.allocate().await.unwrap();
        assert_eq!(lease.id, 13);
        assert_eq!(lease.text, "d");
    }

    #[tokio::test]
    async fn test_reconciliation_parses_keys_in_base_36() {
        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::with_keys(["meta/5.json", "meta/12.json"]));
        let allocator = allocator(temp_dir.path(), store);

        let lease = allocator.allocate().await.unwrap();
        assert_eq!(lease.id, 39);
        assert_eq!(lease.text, "13");
    }

    #[tokio::test]
    async fn test_reconciliation_ignores_stale_local_cache() {
        let temp_dir = TempDir::new().unwrap();
        tokio::fs::write(temp_dir.path().join("id.txt"), "3").await.unwrap();
        let store = Arc::new(MemoryStore::with_keys(["meta/5.json", "meta/c.json"]));
        let allocator = allocator(temp_dir.path(), store);

        assert_eq!(allocator.reconcile().await.unwrap(), 12);
        assert_eq!(allocator.allocate().await.unwrap().id, 13);
    }

    #[tokio::test]
    async fn test_cached_value_is_used_without_scanning() {
        let temp_dir = TempDir::new().unwrap();
        tokio::fs::write(temp_dir.path().join("id.txt"), "z\n").await.unwrap();
        let store = Arc::new(MemoryStore::unreachable());
        let allocator = allocator(temp_dir.path(), store);

        assert_eq!(allocator.current_id().await.unwrap(), 35);
        assert_eq!(allocator.allocate().await.unwrap().text, "10");
    }

    #[tokio::test]
    async fn test_corrupt_cache_falls_back_to_scan() {
        let temp_dir = TempDir::new().unwrap();
        tokio::fs::write(temp_dir.path().join("id.txt"), "??").await.unwrap();
        let store = Arc::new(MemoryStore::with_keys(["meta/a.json"]));
        let allocator = allocator(temp_dir.path(), store);

        assert_eq!(allocator.current_id().await.unwrap(), 10);
        let raw = tokio::fs::read_to_string(temp_dir.path().join("id.txt")).await.unwrap();
        assert_eq!(raw, "a");
    }

    #[tokio::test]
    async fn test_empty_store_starts_at_zero() {
        let temp_dir = TempDir::new().unwrap();
        let allocator = allocator(temp_dir.path(), Arc::new(MemoryStore::default()));
        assert_eq!(allocator.current_id().await.unwrap(), 0);
        assert_eq!(allocator.allocate().await.unwrap().id, 1);
    }

    #[tokio::test]
    async fn test_unreachable_store_is_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let allocator = allocator(temp_dir.path(), Arc::new(MemoryStore::unreachable()));

        let err = allocator.allocate().await.unwrap_err();
        assert!(matches!(err, SupError::RemoteScan(_)));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_consecutive_allocations() {
        let temp_dir = TempDir::new().unwrap();
        let allocator = allocator(temp_dir.path(), Arc::new(MemoryStore::default()));

        let mut ids = Vec::new();
        for _ in 0..5 {
            let lease = allocator.allocate().await.unwrap();
            allocator.commit(&lease).await.unwrap();
            ids.push(lease.id);
        }
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        let raw = tokio::fs::read_to_string(temp_dir.path().join("id.txt")).await.unwrap();
        assert_eq!(raw, "5");
    }

    #[tokio::test]
    async fn test_denied_id_is_skipped() {
        let temp_dir = TempDir::new().unwrap();
        // "meta" = 1_045_630 in base 36
        tokio::fs::write(temp_dir.path().join("id.txt"), encode_id(1_045_629))
            .await
            .unwrap();
        let allocator = allocator(temp_dir.path(), Arc::new(MemoryStore::unreachable()));

        let lease = allocator.allocate().await.unwrap();
        assert_eq!(lease.id, 1_045_631);
        assert_eq!(lease.text, "metb");
        assert_ne!(lease.text, "meta");
    }

    #[tokio::test]
    async fn test_abandon_keeps_cache_untouched_and_reuses_id() {
        let temp_dir = TempDir::new().unwrap();
        let cache_path = temp_dir.path().join("id.txt");
        tokio::fs::write(&cache_path, "7").await.unwrap();
        let allocator = allocator(temp_dir.path(), Arc::new(MemoryStore::unreachable()));

        let lease = allocator.allocate().await.unwrap();
        assert_eq!(lease.id, 8);
        allocator.abandon(&lease).await;

        assert_eq!(tokio::fs::read(&cache_path).await.unwrap(), b"7");
        assert_eq!(allocator.allocate().await.unwrap().id, 8);
    }

    #[tokio::test]
    async fn test_abandon_after_later_allocation_leaves_gap() {
        let temp_dir = TempDir::new().unwrap();
        let allocator = allocator(temp_dir.path(), Arc::new(MemoryStore::default()));

        let first = allocator.allocate().await.unwrap();
        let second = allocator.allocate().await.unwrap();
        allocator.abandon(&first).await;
        allocator.commit(&second).await.unwrap();

        assert_eq!(allocator.allocate().await.unwrap().id, 3);
    }

    #[tokio::test]
    async fn test_commit_never_decreases_cache() {
        let temp_dir = TempDir::new().unwrap();
        let allocator = allocator(temp_dir.path(), Arc::new(MemoryStore::default()));

        let first = allocator.allocate().await.unwrap();
        let second = allocator.allocate().await.unwrap();
        allocator.commit(&second).await.unwrap();
        allocator.commit(&first).await.unwrap();

        let raw = tokio::fs::read_to_string(temp_dir.path().join("id.txt")).await.unwrap();
        assert_eq!(raw, "2");
    }

    #[tokio::test]
    async fn test_concurrent_allocations_are_unique() {
        let temp_dir = TempDir::new().unwrap();
        let allocator = Arc::new(allocator(temp_dir.path(), Arc::new(MemoryStore::default())));

        let mut handles = Vec::new();
        for _ in 0..32 {
            let allocator = allocator.clone();
            handles.push(tokio::spawn(async move {
                let lease = allocator.allocate().await.unwrap();
                allocator.commit(&lease).await.unwrap();
                lease.id
            }));
        }

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap());
        }
        ids.sort_unstable();
        assert_eq!(ids, (1..=32).collect::<Vec<u64>>());
    }
}
