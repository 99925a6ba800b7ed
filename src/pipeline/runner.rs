//! # Pipeline Runner Module
//!
//! Worker per l'elaborazione di un singolo screenshot.
//!
//! ## Flusso:
//! 1. Verifica estensione (`UnsupportedFormat` senza allocare id)
//! 2. Allocazione id (sezione critica dell'`IdAllocator`)
//! 3. `FormatOptimizer` -> `<proc>/<id>.<ext>`
//! 4. Preview opzionale -> `<proc>/preview/<id>.<ext>`
//! 5. Metadata opzionali -> `<proc>/meta/<id>.json`
//! 6. `ArtifactNamer` + URL pubblico
//! 7. Commit dell'id: da qui in poi l'id è consumato anche se l'upload fallisce
//!
//! Un errore prima del commit restituisce il lease all'allocatore e
//! rimuove i file locali già prodotti: il file della cache resta invariato.

use crate::config::Config;
use crate::derivatives::{DerivativeGenerator, Derivatives};
use crate::error::SupResult;
use crate::file_manager::{FileManager, ImageFormat};
use crate::id_allocator::{IdAllocator, IdLease};
use crate::image_processor::{FormatOptimizer, OptimizedEncoding};
use crate::naming::{public_url, ArtifactNamer, ArtifactSet};
use crate::pipeline::path_resolver::OutputLayout;
use crate::toolchain::ImageToolchain;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of a successful pipeline run, ready to be published
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub source: PathBuf,
    pub id: u64,
    pub text_id: String,
    pub encoding: OptimizedEncoding,
    pub derivatives: Derivatives,
    pub artifacts: ArtifactSet,
    pub url: String,
}

/// Orchestrates optimizer, derivatives, naming and id allocation for one file
pub struct PipelineRunner {
    config: Arc<Config>,
    allocator: Arc<IdAllocator>,
    optimizer: FormatOptimizer,
    derivatives: DerivativeGenerator,
    layout: OutputLayout,
    base_url: String,
}

impl PipelineRunner {
    pub fn new(
        config: Arc<Config>,
        allocator: Arc<IdAllocator>,
        toolchain: Arc<dyn ImageToolchain>,
        layout: OutputLayout,
    ) -> Self {
        let optimizer = FormatOptimizer::new(toolchain.clone(), config.jpeg_quality);
        let derivatives = DerivativeGenerator::new(toolchain);
        let base_url = config.resolved_base_url();
        Self {
            config,
            allocator,
            optimizer,
            derivatives,
            layout,
            base_url,
        }
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    /// Process a single source file up to (and including) the id commit
    pub async fn process(&self, source: &Path) -> SupResult<PipelineOutcome> {
        let source_format = FileManager::image_format(source)?;
        info!("new image: {}", source.display());

        let lease = self.allocator.allocate().await?;
        let mut produced: Vec<PathBuf> = Vec::new();

        match self.build(source, source_format, &lease, &mut produced).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                warn!("Processing {} failed: {}", source.display(), e);
                self.allocator.abandon(&lease).await;
                FileManager::remove_files(&produced).await;
                Err(e)
            }
        }
    }

    async fn build(
        &self,
        source: &Path,
        source_format: ImageFormat,
        lease: &IdLease,
        produced: &mut Vec<PathBuf>,
    ) -> SupResult<PipelineOutcome> {
        let encoding = self
            .optimizer
            .optimize(source, self.layout.proc_dir(), &lease.text)
            .await?;
        produced.push(encoding.path.clone());
        if encoding.converted(source_format) {
            debug!("{} converted to {}", source.display(), encoding.format);
        }

        let mut derivatives = Derivatives::default();

        if self.config.preview {
            let target = self.layout.preview_path(&lease.text, encoding.format);
            let preview = self
                .derivatives
                .generate_preview(
                    &encoding.path,
                    &target,
                    self.config.preview_width,
                    self.config.preview_height,
                    self.config.jpeg_quality,
                )
                .await;
            // Il tool può aver scritto un file parziale anche in caso di errore
            produced.push(target);
            derivatives.preview = Some(preview?);
        }

        if self.config.metadata {
            let target = self.layout.metadata_path(&lease.text);
            let metadata = self
                .derivatives
                .generate_metadata(&encoding, derivatives.preview.as_ref(), &target)
                .await;
            produced.push(target);
            derivatives.metadata = Some(metadata?);
        }

        let artifacts = ArtifactNamer::name_for(&lease.text, &encoding, &derivatives);
        let url = public_url(&self.base_url, &artifacts.primary.key)?;

        self.allocator.commit(lease).await?;

        Ok(PipelineOutcome {
            source: source.to_path_buf(),
            id: lease.id,
            text_id: lease.text.clone(),
            encoding,
            derivatives,
            artifacts,
            url,
        })
    }
}
