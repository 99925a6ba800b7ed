//! # Screenshot Uploader Library
//!
//! Questo è il modulo principale della libreria che espone tutte le API pubbliche.
//!
//! ## Responsabilità:
//! - Definisce la struttura modulare dell'applicazione
//! - Espone i tipi e le funzioni principali tramite re-exports
//! - Fornisce un'interfaccia pulita per il main.rs e per altri consumatori
//!
//! ## Architettura dei moduli:
//! - `config` / `credentials`: Configurazione a livelli e credenziali S3
//! - `error`: Tipi di errore custom, distinzione per-file / fatale
//! - `state` / `id_allocator`: Contatore id in base 36 con reconciliation scan
//! - `file_manager`: Allow-list dei formati e operazioni sui file
//! - `image_processor`: Scelta della codifica più compatta (PNG/JPEG)
//! - `derivatives`: Preview e sidecar JSON dei metadata
//! - `naming`: Chiavi remote, content type, URL pubblico
//! - `toolchain` / `platform` / `tool_resolver`: ImageMagick e tool esterni
//! - `object_store`: Client S3
//! - `notifier` / `clipboard`: Side effect desktop
//! - `pipeline`: Runner, publisher, watcher e sessione
//! - `progress`: Statistiche di sessione
//!
//! ## Utilizzo:
//! ```rust,ignore
//! use screenshot_uploader::{Config, PipelineRunner};
//!
//! let runner = PipelineRunner::new(config, allocator, toolchain, layout);
//! let outcome = runner.process(&path).await?;
//! publisher.publish(&outcome).await?;
//! ```

pub mod clipboard;
pub mod config;
pub mod credentials;
pub mod derivatives;
pub mod error;
pub mod file_manager;
pub mod id_allocator;
pub mod image_processor;
pub mod naming;
pub mod notifier;
pub mod object_store;
pub mod pipeline;
pub mod platform;
pub mod progress;
pub mod state;
pub mod tool_resolver;
pub mod toolchain;
pub mod utils;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use error::{SupError, SupResult};
pub use id_allocator::{IdAllocator, IdLease};
pub use image_processor::{FormatOptimizer, OptimizedEncoding};
pub use naming::{ArtifactNamer, ArtifactSet};
pub use pipeline::{PipelineOutcome, PipelineRunner, Publisher, WatchSession};
