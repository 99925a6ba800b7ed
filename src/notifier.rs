//! # Notifier Module
//!
//! Notifiche desktop best-effort. La variante viene scelta una sola volta
//! all'avvio in base alla piattaforma; un fallimento viene solo loggato.

use crate::platform::{NotificationBackend, PlatformCommands};
use crate::utils::{format_command, to_string_vec};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, warn};

/// Fire-and-forget user notification
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, title: &str, message: &str);
}

/// Notifier that does nothing (notifications disabled or no backend found)
pub struct SilentNotifier;

#[async_trait]
impl Notifier for SilentNotifier {
    async fn notify(&self, _title: &str, _message: &str) {}
}

/// Notifier running a platform command
pub struct CommandNotifier {
    backend: NotificationBackend,
    program: PathBuf,
}

impl CommandNotifier {
    pub fn new(backend: NotificationBackend, program: PathBuf) -> Self {
        Self { backend, program }
    }

    fn build_args(backend: NotificationBackend, title: &str, message: &str) -> Vec<String> {
        match backend {
            NotificationBackend::LibNotify => {
                to_string_vec(["--expire-time=2000", "--app-name=sup", title, message])
            }
            NotificationBackend::AppleScript => {
                let script = format!(
                    "display notification \"{}\" with title \"{}\"",
                    escape_applescript(message),
                    escape_applescript(title)
                );
                to_string_vec(["-e".to_string(), script])
            }
            NotificationBackend::Notifu => {
                to_string_vec(["/p", title, "/m", message, "/d", "2000", "/t", "info", "/q"])
            }
        }
    }
}

fn escape_applescript(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

#[async_trait]
impl Notifier for CommandNotifier {
    async fn notify(&self, title: &str, message: &str) {
        let args = Self::build_args(self.backend, title, message);
        debug!("exec: {}", format_command(&self.program, &args));

        match Command::new(&self.program).args(&args).status().await {
            Ok(status) if status.success() => {}
            Ok(status) => warn!("{} exited with {}", self.backend.command(), status),
            Err(e) => warn!("Failed to run {}: {}", self.backend.command(), e),
        }
    }
}

/// Pick the notifier once at startup
pub fn select_notifier(enabled: bool, platform: &PlatformCommands) -> Arc<dyn Notifier> {
    if !enabled {
        return Arc::new(SilentNotifier);
    }

    let backend = NotificationBackend::native();
    match platform.get_tool_path(backend.command()) {
        Some(program) => {
            debug!("Notifications via {}", program.display());
            Arc::new(CommandNotifier::new(backend, program))
        }
        None => {
            warn!("{} not found, notifications disabled", backend.command());
            Arc::new(SilentNotifier)
        }
    }
}
