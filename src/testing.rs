//! Fakes shared by the unit tests.

use crate::error::{SupError, SupResult};
use crate::notifier::Notifier;
use crate::object_store::ObjectStore;
use crate::toolchain::ImageToolchain;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

/// A recorded `ObjectStore::write`
#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    pub local_path: PathBuf,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// In-memory object store
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<BTreeMap<String, StoredObject>>,
    unreachable: bool,
}

impl MemoryStore {
    pub fn with_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let objects = keys
            .into_iter()
            .map(|key| {
                (
                    key.into(),
                    StoredObject {
                        local_path: PathBuf::new(),
                        content_type: None,
                        bytes: Vec::new(),
                    },
                )
            })
            .collect();
        Self {
            objects: Mutex::new(objects),
            unreachable: false,
        }
    }

    pub fn unreachable() -> Self {
        Self {
            objects: Mutex::new(BTreeMap::new()),
            unreachable: true,
        }
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    pub fn get(&self, key: &str) -> Option<StoredObject> {
        self.objects.lock().unwrap().get(key).cloned()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn write(
        &self,
        key: &str,
        local_path: &Path,
        content_type: Option<&str>,
    ) -> SupResult<()> {
        if self.unreachable {
            return Err(SupError::Store("connection refused".to_string()));
        }
        let bytes = tokio::fs::read(local_path).await?;
        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                local_path: local_path.to_path_buf(),
                content_type: content_type.map(str::to_string),
                bytes,
            },
        );
        Ok(())
    }

    async fn list(&self, prefix: &str) -> SupResult<Vec<String>> {
        if self.unreachable {
            return Err(SupError::Store("connection refused".to_string()));
        }
        Ok(self
            .objects
            .lock()
            .unwrap()
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }

    fn describe(&self, key: &str) -> String {
        format!("memory://{}", key)
    }
}

/// Toolchain that writes files of scripted sizes instead of running ImageMagick
#[derive(Default)]
pub struct ScriptedToolchain {
    /// Output size per target extension for `convert`
    pub convert_sizes: HashMap<String, usize>,
    pub fail_convert: bool,
    /// Time spent inside every `convert`
    pub convert_delay: Duration,
    pub fail_resize: bool,
    pub resize_size: usize,
    /// None = probing fails
    pub dimensions: Option<(u32, u32)>,
    pub calls: Mutex<Vec<String>>,
}

impl ScriptedToolchain {
    pub fn converting(ext: &str, size: usize) -> Self {
        let mut convert_sizes = HashMap::new();
        convert_sizes.insert(ext.to_string(), size);
        Self {
            convert_sizes,
            resize_size: 1000,
            dimensions: Some((1920, 1080)),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ImageToolchain for ScriptedToolchain {
    async fn convert(&self, source: &Path, target: &Path, quality: Option<u8>) -> SupResult<()> {
        self.record(format!(
            "convert {} {} {:?}",
            source.display(),
            target.display(),
            quality
        ));
        if !self.convert_delay.is_zero() {
            tokio::time::sleep(self.convert_delay).await;
        }
        if self.fail_convert {
            return Err(SupError::Conversion("convert exited with 1".to_string()));
        }
        let ext = target
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        let size = self.convert_sizes.get(ext).copied().unwrap_or(1);
        tokio::fs::write(target, vec![b'c'; size]).await?;
        Ok(())
    }

    async fn resize(
        &self,
        source: &Path,
        target: &Path,
        max_width: u32,
        max_height: u32,
        quality: Option<u8>,
    ) -> SupResult<()> {
        self.record(format!(
            "resize {} {} {}x{} {:?}",
            source.display(),
            target.display(),
            max_width,
            max_height,
            quality
        ));
        if self.fail_resize {
            return Err(SupError::Resize("convert exited with 1".to_string()));
        }
        tokio::fs::write(target, vec![b'p'; self.resize_size]).await?;
        Ok(())
    }

    async fn probe_dimensions(&self, path: &Path) -> SupResult<(u32, u32)> {
        self.record(format!("identify {}", path.display()));
        let is_preview = path
            .parent()
            .and_then(|p| p.file_name())
            .map(|name| name == "preview")
            .unwrap_or(false);
        match self.dimensions {
            Some((w, h)) if is_preview => Ok((w / 4, h / 4)),
            Some(dimensions) => Ok(dimensions),
            None => Err(SupError::DimensionProbe("identify not available".to_string())),
        }
    }
}

/// Notifier that records every message
#[derive(Default)]
pub struct RecordingNotifier {
    pub messages: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, title: &str, message: &str) {
        self.messages
            .lock()
            .unwrap()
            .push((title.to_string(), message.to_string()));
    }
}

/// Write `size` bytes to `path`
pub async fn write_bytes(path: &Path, size: usize) {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.unwrap();
    }
    tokio::fs::write(path, vec![b's'; size]).await.unwrap();
}
