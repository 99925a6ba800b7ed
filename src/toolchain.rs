//! # Image Toolchain Module
//!
//! Astrazione sulle capability esterne di elaborazione immagini:
//! conversione di formato, resize "shrink only" e lettura dimensioni.
//!
//! ## Tool Strategy
//! **Priorità Tool (decrescente):**
//! 1. **magick** (ImageMagick 7.x) - `magick`, `magick identify`
//! 2. **convert** / **identify** (ImageMagick 6.x/legacy)
//! 3. **image crate** - solo per leggere le dimensioni dall'header, mai per convertire
//!
//! La pipeline dipende solo dal trait `ImageToolchain`, così i test possono
//! usare un'implementazione fake senza binari esterni installati.

use crate::args;
use crate::error::{SupError, SupResult};
use crate::platform::PlatformCommands;
use crate::utils::format_command;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Capability set required by the pipeline
#[async_trait]
pub trait ImageToolchain: Send + Sync {
    /// Convert `source` into the format implied by the extension of `target`.
    /// `quality` is only passed for JPEG targets.
    async fn convert(&self, source: &Path, target: &Path, quality: Option<u8>) -> SupResult<()>;

    /// Shrink `source` into the `max_width`x`max_height` box, never enlarging it.
    async fn resize(
        &self,
        source: &Path,
        target: &Path,
        max_width: u32,
        max_height: u32,
        quality: Option<u8>,
    ) -> SupResult<()>;

    /// Read (width, height) of an image.
    async fn probe_dimensions(&self, path: &Path) -> SupResult<(u32, u32)>;
}

/// Which ImageMagick generation was found
#[derive(Debug, Clone)]
enum MagickFlavor {
    /// ImageMagick 7: a single `magick` binary with subcommands
    Seven { magick: PathBuf },
    /// ImageMagick 6: separate `convert` and `identify`
    Six {
        convert: PathBuf,
        identify: Option<PathBuf>,
    },
}

/// `ImageToolchain` backed by ImageMagick command-line tools
#[derive(Debug, Clone)]
pub struct MagickToolchain {
    flavor: MagickFlavor,
}

impl MagickToolchain {
    /// Detect the best available ImageMagick installation
    pub fn detect(platform: &PlatformCommands) -> SupResult<Self> {
        if let Some(magick) = platform.get_tool_path(PlatformCommands::MAGICK) {
            info!("Using ImageMagick 7: {}", magick.display());
            return Ok(Self {
                flavor: MagickFlavor::Seven { magick },
            });
        }

        if let Some(convert) = platform.get_tool_path(PlatformCommands::CONVERT) {
            let identify = platform.get_tool_path(PlatformCommands::IDENTIFY);
            if identify.is_none() {
                warn!("identify not found, image dimensions will be read from file headers");
            }
            info!("Using ImageMagick 6: {}", convert.display());
            return Ok(Self {
                flavor: MagickFlavor::Six { convert, identify },
            });
        }

        Err(SupError::MissingDependency(
            "ImageMagick (magick or convert) not found; install it or pass --im-dir".to_string(),
        ))
    }

    /// Program and leading arguments for a conversion
    fn convert_command(&self) -> (&Path, Vec<String>) {
        match &self.flavor {
            MagickFlavor::Seven { magick } => (magick.as_path(), Vec::new()),
            MagickFlavor::Six { convert, .. } => (convert.as_path(), Vec::new()),
        }
    }

    /// Program and leading arguments for identify, if any
    fn identify_command(&self) -> Option<(&Path, Vec<String>)> {
        match &self.flavor {
            MagickFlavor::Seven { magick } => Some((magick.as_path(), args!["identify"])),
            MagickFlavor::Six { identify, .. } => {
                identify.as_deref().map(|identify| (identify, Vec::new()))
            }
        }
    }

    fn build_convert_args(source: &Path, target: &Path, quality: Option<u8>) -> Vec<String> {
        let mut args = args![source.to_string_lossy()];
        if let Some(quality) = quality {
            args.extend(args!["-quality", quality]);
        }
        args.push(target.to_string_lossy().to_string());
        args
    }

    fn build_resize_args(
        source: &Path,
        target: &Path,
        max_width: u32,
        max_height: u32,
        quality: Option<u8>,
    ) -> Vec<String> {
        // ">" riduce soltanto, non ingrandisce mai
        let geometry = format!("{}x{}>", max_width, max_height);
        let mut args = args![source.to_string_lossy(), "-resize", geometry];
        if let Some(quality) = quality {
            args.extend(args!["-quality", quality]);
        }
        args.push(target.to_string_lossy().to_string());
        args
    }

    /// Run a tool, returning its stdout on success
    async fn run_tool(program: &Path, args: &[String]) -> Result<Vec<u8>, String> {
        debug!("exec: {}", format_command(program, args));

        let output = Command::new(program)
            .args(args)
            .output()
            .await
            .map_err(|e| format!("failed to spawn {}: {}", program.display(), e))?;

        if output.status.success() {
            Ok(output.stdout)
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(format!(
                "{} exited with {}: {}",
                program.display(),
                output.status,
                stderr.trim()
            ))
        }
    }

    /// Parse the output of `identify -format "%w %h"`
    fn parse_dimensions(stdout: &[u8]) -> Option<(u32, u32)> {
        let text = String::from_utf8_lossy(stdout);
        let mut parts = text.split_whitespace();
        let width = parts.next()?.parse().ok()?;
        let height = parts.next()?.parse().ok()?;
        Some((width, height))
    }

    /// Header-only fallback using the `image` crate
    async fn probe_with_image_crate(path: &Path) -> SupResult<(u32, u32)> {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || image::image_dimensions(&path))
            .await
            .map_err(|e| SupError::DimensionProbe(format!("probe task failed: {}", e)))?
            .map_err(|e| SupError::DimensionProbe(e.to_string()))
    }
}

#[async_trait]
impl ImageToolchain for MagickToolchain {
    async fn convert(&self, source: &Path, target: &Path, quality: Option<u8>) -> SupResult<()> {
        let (program, mut args) = self.convert_command();
        args.extend(Self::build_convert_args(source, target, quality));

        Self::run_tool(program, &args)
            .await
            .map(|_| ())
            .map_err(SupError::Conversion)
    }

    async fn resize(
        &self,
        source: &Path,
        target: &Path,
        max_width: u32,
        max_height: u32,
        quality: Option<u8>,
    ) -> SupResult<()> {
        let (program, mut args) = self.convert_command();
        args.extend(Self::build_resize_args(
            source, target, max_width, max_height, quality,
        ));

        Self::run_tool(program, &args)
            .await
            .map(|_| ())
            .map_err(SupError::Resize)
    }

    async fn probe_dimensions(&self, path: &Path) -> SupResult<(u32, u32)> {
        if let Some((program, mut args)) = self.identify_command() {
            // [0]: solo il primo frame
            args.extend(args![
                "-format",
                "%w %h",
                format!("{}[0]", path.to_string_lossy())
            ]);
            match Self::run_tool(program, &args).await {
                Ok(stdout) => {
                    if let Some(dimensions) = Self::parse_dimensions(&stdout) {
                        debug!("Got dimensions {:?} for {}", dimensions, path.display());
                        return Ok(dimensions);
                    }
                    debug!("Unparseable identify output for {}", path.display());
                }
                Err(e) => debug!("identify failed: {}", e),
            }
        }

        Self::probe_with_image_crate(path).await
    }
}
