//! # Artifact Naming Module
//!
//! Mappa un ID allocato e i file prodotti dalla pipeline nelle chiavi remote
//! e nei content type usati per l'upload.
//!
//! ## Schema chiavi:
//! - primaria: `<id>.<formato>`
//! - preview: `preview/<id>.<formato>`
//! - metadata: `meta/<id>.json`
//!
//! Le chiavi dipendono solo dall'ID e dal formato scelto, quindi ID unici
//! implicano chiavi uniche.

use crate::derivatives::Derivatives;
use crate::error::{SupError, SupResult};
use crate::image_processor::OptimizedEncoding;
use std::path::PathBuf;
use url::Url;

/// Remote namespace for previews
pub const PREVIEW_DIR: &str = "preview";
/// Remote namespace for metadata sidecars
pub const META_DIR: &str = "meta";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Primary,
    Preview,
    Metadata,
}

/// One local file and the remote key it is uploaded to
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub key: String,
    pub path: PathBuf,
    /// None means the upload omits the content-type header
    pub content_type: Option<&'static str>,
}

impl Artifact {
    fn new(kind: ArtifactKind, key: String, path: PathBuf) -> Self {
        let content_type = key
            .rsplit_once('.')
            .and_then(|(_, ext)| content_type_for(ext));
        Self {
            kind,
            key,
            path,
            content_type,
        }
    }
}

/// Every remote object produced for one source file
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactSet {
    pub primary: Artifact,
    pub preview: Option<Artifact>,
    pub metadata: Option<Artifact>,
}

impl ArtifactSet {
    pub fn iter(&self) -> impl Iterator<Item = &Artifact> {
        std::iter::once(&self.primary)
            .chain(self.preview.as_ref())
            .chain(self.metadata.as_ref())
    }

    pub fn get(&self, key: &str) -> Option<&Artifact> {
        self.iter().find(|artifact| artifact.key == key)
    }
}

pub struct ArtifactNamer;

impl ArtifactNamer {
    /// Build the artifact set for an allocated textual ID
    pub fn name_for(
        text_id: &str,
        encoding: &OptimizedEncoding,
        derivatives: &Derivatives,
    ) -> ArtifactSet {
        let primary = Artifact::new(
            ArtifactKind::Primary,
            format!("{}.{}", text_id, encoding.format.extension()),
            encoding.path.clone(),
        );

        let preview = derivatives.preview.as_ref().map(|preview| {
            Artifact::new(
                ArtifactKind::Preview,
                format!("{}/{}.{}", PREVIEW_DIR, text_id, preview.format.extension()),
                preview.path.clone(),
            )
        });

        let metadata = derivatives.metadata.as_ref().map(|metadata| {
            Artifact::new(
                ArtifactKind::Metadata,
                format!("{}/{}.json", META_DIR, text_id),
                metadata.path.clone(),
            )
        });

        ArtifactSet {
            primary,
            preview,
            metadata,
        }
    }
}

/// Fixed extension to content type mapping
pub fn content_type_for(extension: &str) -> Option<&'static str> {
    match extension.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "json" => Some("application/json"),
        _ => None,
    }
}

/// Join `key` onto `base_url`, keeping any path prefix of the base
pub fn public_url(base_url: &str, key: &str) -> SupResult<String> {
    let mut base = Url::parse(base_url)
        .map_err(|e| SupError::Validation(format!("invalid base URL {}: {}", base_url, e)))?;

    // Senza slash finale `join` sostituirebbe l'ultimo segmento
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }

    base.join(key.trim_start_matches('/'))
        .map(|url| url.to_string())
        .map_err(|e| SupError::Validation(format!("cannot join {} onto {}: {}", key, base_url, e)))
}
