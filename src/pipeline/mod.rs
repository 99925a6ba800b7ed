//! # Pipeline Module
//!
//! Modulo che separa le responsabilità della pipeline in sottomoduli:
//! - `runner`: elaborazione di un singolo file fino al commit dell'id
//! - `publisher`: upload degli artifact e side effect
//! - `session`: loop di watch con concorrenza limitata
//! - `watcher`: sorgente dei batch di path (`notify`)
//! - `path_resolver`: layout locale della directory processed

pub mod path_resolver;
pub mod publisher;
pub mod runner;
pub mod session;
pub mod watcher;

pub use path_resolver::OutputLayout;
pub use publisher::Publisher;
pub use runner::{PipelineOutcome, PipelineRunner};
pub use session::WatchSession;
pub use watcher::{BatchSource, DirectoryWatcher, PathBatcher};
