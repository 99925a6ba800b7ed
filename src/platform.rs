//! # Platform-specific utilities
//!
//! Questo modulo centralizza la logica cross-platform per i tool esterni:
//! nomi dei comandi ImageMagick e del meccanismo di notifica desktop
//! disponibile sul sistema operativo corrente.

use crate::tool_resolver::ToolPathResolver;
use std::path::PathBuf;

/// Desktop notification mechanisms known to the uploader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationBackend {
    /// `notify-send` (libnotify)
    LibNotify,
    /// `osascript -e 'display notification ...'`
    AppleScript,
    /// `notifu` balloon tips
    Notifu,
}

impl NotificationBackend {
    /// Backend native to the platform the binary was built for
    pub fn native() -> Self {
        if cfg!(target_os = "macos") {
            Self::AppleScript
        } else if cfg!(windows) {
            Self::Notifu
        } else {
            Self::LibNotify
        }
    }

    pub fn command(&self) -> &'static str {
        match self {
            Self::LibNotify => "notify-send",
            Self::AppleScript => "osascript",
            Self::Notifu => "notifu",
        }
    }
}

/// Platform-specific command manager with tool resolution
#[derive(Debug, Clone)]
pub struct PlatformCommands {
    tool_resolver: ToolPathResolver,
}

impl PlatformCommands {
    /// ImageMagick 7 entry point
    pub const MAGICK: &'static str = "magick";
    /// ImageMagick 6 converter
    pub const CONVERT: &'static str = "convert";
    /// ImageMagick 6 identify
    pub const IDENTIFY: &'static str = "identify";

    pub fn new(tools_dir: Option<PathBuf>) -> Self {
        Self {
            tool_resolver: ToolPathResolver::new(tools_dir),
        }
    }

    /// Get the resolved path to a tool
    pub fn get_tool_path(&self, base_name: &str) -> Option<PathBuf> {
        self.tool_resolver.resolve_tool(base_name)
    }

    /// Get system information for debugging
    pub fn system_info() -> SystemInfo {
        SystemInfo {
            os: std::env::consts::OS,
            arch: std::env::consts::ARCH,
            family: std::env::consts::FAMILY,
        }
    }
}

/// System information structure
#[derive(Debug, Clone)]
pub struct SystemInfo {
    pub os: &'static str,
    pub arch: &'static str,
    pub family: &'static str,
}

impl std::fmt::Display for SystemInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} ({})", self.os, self.arch, self.family)
    }
}
