//! # Screenshot Uploader - Main Entry Point
//!
//! Questo è il punto di ingresso principale dell'applicazione.
//!
//! ## Responsabilità:
//! - Parsing degli argomenti della command line con `clap`
//! - Inizializzazione del sistema di logging con `tracing` (stdout o file)
//! - Costruzione della configurazione a livelli: default < `--config` < flag CLI
//! - Creazione dei collaboratori (S3, ImageMagick, notifiche, clipboard)
//! - Avvio della sessione di watch
//!
//! ## Flusso di esecuzione:
//! 1. Parsa gli argomenti CLI
//! 2. Configura il logging (INFO o DEBUG, `RUST_LOG` ha la precedenza)
//! 3. Costruisce e valida `Config`
//! 4. Legge le credenziali e crea il client S3
//! 5. Rileva ImageMagick
//! 6. Carica l'id corrente (reconciliation scan se la cache manca):
//!    errore fatale se il bucket non risponde
//! 7. Avvia watcher e sessione fino a Ctrl-C
//!
//! ## Esempio di utilizzo:
//! ```bash
//! sup watch ~/Screenshots shots.example.com --preview --jpeg-quality 85 --verbose
//! ```

use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use screenshot_uploader::clipboard::ClipboardSink;
use screenshot_uploader::credentials::Credentials;
use screenshot_uploader::id_allocator::IdAllocator;
use screenshot_uploader::naming::META_DIR;
use screenshot_uploader::notifier::select_notifier;
use screenshot_uploader::object_store::S3Store;
use screenshot_uploader::pipeline::{DirectoryWatcher, OutputLayout};
use screenshot_uploader::platform::PlatformCommands;
use screenshot_uploader::state::{encode_id, IdCache};
use screenshot_uploader::toolchain::MagickToolchain;
use screenshot_uploader::{Config, PipelineRunner, Publisher, WatchSession};

#[derive(Parser)]
#[command(name = "sup")]
#[command(about = "Watch a directory for screenshots and publish them to S3")]
struct Cli {
    /// Append logs to this file instead of stdout
    #[arg(long, global = true)]
    log: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Watch a directory and upload every new screenshot
    Watch(WatchArgs),
}

#[derive(ClapArgs)]
struct WatchArgs {
    /// Directory to watch
    path: PathBuf,

    /// Destination bucket
    bucket: String,

    /// JSON configuration file (CLI flags take precedence)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the merged configuration to this file and continue
    #[arg(long)]
    save_config: Option<PathBuf>,

    /// Directory for processed files, relative to the watched directory
    #[arg(long)]
    proc_dir: Option<PathBuf>,

    /// Event coalescing window in seconds
    #[arg(long)]
    latency: Option<f64>,

    /// Poll the directory instead of using native filesystem events
    #[arg(long)]
    force_polling: bool,

    /// Base URL of the uploaded files (default: http://<bucket>/)
    #[arg(long)]
    base_url: Option<String>,

    /// JPEG quality (1-100)
    #[arg(short = 'q', long)]
    jpeg_quality: Option<u8>,

    /// Directory containing the ImageMagick executables
    #[arg(long)]
    im_dir: Option<PathBuf>,

    /// Generate a downscaled preview
    #[arg(long)]
    preview: bool,

    /// Preview bounding box width
    #[arg(long)]
    preview_width: Option<u32>,

    /// Preview bounding box height
    #[arg(long)]
    preview_height: Option<u32>,

    /// Do not upload the JSON metadata sidecar
    #[arg(long)]
    no_metadata: bool,

    /// Do not send desktop notifications
    #[arg(long)]
    no_notify: bool,

    /// Do not copy the URL to the clipboard
    #[arg(long)]
    no_clipboard: bool,

    /// Keep local copies of the uploaded files
    #[arg(long, visible_alias = "save")]
    keep_local: bool,

    /// Number of files processed in parallel
    #[arg(short, long)]
    workers: Option<usize>,

    /// Credentials file (default: ~/.sup)
    #[arg(long)]
    credentials: Option<PathBuf>,

    /// Id cache file (default: <path>/id.txt)
    #[arg(long)]
    id_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log.as_deref())?;

    match cli.command {
        Command::Watch(args) => watch(args).await,
    }
}

fn init_logging(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Cannot open log file {}", path.display()))?;
            let subscriber = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        None => {
            let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }
    Ok(())
}

/// Defaults < config file < explicit flags
async fn build_config(args: &WatchArgs) -> Result<Config> {
    let mut config = match args.config {
        Some(ref path) => Config::from_file(path)
            .await
            .with_context(|| format!("Cannot load configuration from {}", path.display()))?,
        None => Config::default(),
    };

    config.watch_dir = args
        .path
        .canonicalize()
        .with_context(|| format!("Watch directory does not exist: {}", args.path.display()))?;
    config.bucket = args.bucket.clone();

    if let Some(ref proc_dir) = args.proc_dir {
        config.proc_dir = proc_dir.clone();
    }
    if let Some(latency) = args.latency {
        config.latency = latency;
    }
    if let Some(ref base_url) = args.base_url {
        config.base_url = Some(base_url.clone());
    }
    if let Some(quality) = args.jpeg_quality {
        config.jpeg_quality = quality;
    }
    if let Some(ref im_dir) = args.im_dir {
        config.im_dir = Some(im_dir.clone());
    }
    if let Some(width) = args.preview_width {
        config.preview_width = width;
    }
    if let Some(height) = args.preview_height {
        config.preview_height = height;
    }
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    if let Some(ref credentials) = args.credentials {
        config.credentials_file = Some(credentials.clone());
    }
    if let Some(ref id_file) = args.id_file {
        config.id_file = Some(id_file.clone());
    }

    config.force_polling |= args.force_polling;
    config.preview |= args.preview;
    config.keep_local |= args.keep_local;
    if args.no_metadata {
        config.metadata = false;
    }
    if args.no_notify {
        config.notify = false;
    }
    if args.no_clipboard {
        config.clipboard = false;
    }

    config.validate()?;
    Ok(config)
}

fn log_configuration(config: &Config) {
    info!("Watching: {}", config.watch_dir.display());
    info!("Bucket: {} ({})", config.bucket, config.resolved_base_url());
    info!("Processed directory: {}", config.resolved_proc_dir().display());
    info!("JPEG quality: {}", config.jpeg_quality);
    if config.preview {
        info!("Preview: {}x{}", config.preview_width, config.preview_height);
    }
    if !config.metadata {
        info!("Metadata sidecar disabled");
    }
    if config.keep_local {
        info!("Keeping local copies");
    }
    debug!(
        "Latency: {}s ({}), workers: {}",
        config.latency,
        if config.force_polling { "polling" } else { "native events" },
        config.workers
    );
}

async fn watch(args: WatchArgs) -> Result<()> {
    let config = build_config(&args).await?;
    if let Some(ref path) = args.save_config {
        config.save_to_file(path).await?;
        info!("Configuration saved to {}", path.display());
    }
    let config = Arc::new(config);
    log_configuration(&config);
    debug!("System: {}", PlatformCommands::system_info());

    let credentials_path = config.credentials_path()?;
    let credentials = Credentials::from_file(&credentials_path)
        .await
        .with_context(|| format!("Cannot read credentials from {}", credentials_path.display()))?;
    let store = Arc::new(S3Store::new(&config.bucket, &credentials).await?);

    let platform = PlatformCommands::new(config.im_dir.clone());
    let toolchain = Arc::new(MagickToolchain::detect(&platform)?);

    // Senza metadata non esistono chiavi `meta/`: si scansiona tutto il bucket
    let scan_prefix = if config.metadata {
        format!("{}/", META_DIR)
    } else {
        String::new()
    };
    let allocator = Arc::new(IdAllocator::new(
        IdCache::new(config.id_file_path()),
        store.clone(),
        scan_prefix,
        &config.denied_ids,
    ));
    match allocator.current_id().await {
        Ok(id) => info!("current id: {} ({})", encode_id(id), id),
        Err(e) => {
            error!("{}", e);
            return Err(e.into());
        }
    }

    let mut layout = OutputLayout::new(config.resolved_proc_dir());
    layout.ensure_dirs().await?;

    let runner = Arc::new(PipelineRunner::new(
        config.clone(),
        allocator,
        toolchain,
        layout,
    ));

    let notifier = select_notifier(config.notify, &platform);
    let clipboard = if config.clipboard {
        ClipboardSink::spawn()
    } else {
        None
    };
    let publisher = Arc::new(Publisher::new(store, notifier, clipboard, config.keep_local));

    let mut watcher =
        DirectoryWatcher::new(&config.watch_dir, config.latency(), config.force_polling)?;
    let mut session = WatchSession::new(config.clone(), runner, publisher);

    session
        .run(&mut watcher, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Cannot listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await?;

    Ok(())
}
