//! # Clipboard Module
//!
//! Copia l'URL pubblico negli appunti. Il clipboard `arboard` vive su un
//! thread dedicato per tutta la sessione (su X11 il contenuto resta
//! disponibile solo finché il proprietario è vivo). Ogni errore viene
//! loggato e mai propagato.

use std::sync::mpsc;
use std::thread;
use tracing::{debug, warn};

/// Handle to the clipboard thread
#[derive(Clone)]
pub struct ClipboardSink {
    sender: mpsc::Sender<String>,
}

impl ClipboardSink {
    /// Start the clipboard thread; returns None when the thread cannot be spawned
    pub fn spawn() -> Option<Self> {
        let (sender, receiver) = mpsc::channel::<String>();

        let spawned = thread::Builder::new()
            .name("clipboard".to_string())
            .spawn(move || {
                let mut clipboard = None;
                for text in receiver {
                    if clipboard.is_none() {
                        match arboard::Clipboard::new() {
                            Ok(cb) => clipboard = Some(cb),
                            Err(e) => {
                                warn!("Clipboard unavailable: {}", e);
                                continue;
                            }
                        }
                    }
                    if let Some(cb) = clipboard.as_mut() {
                        match cb.set_text(text) {
                            Ok(()) => debug!("URL copied to clipboard"),
                            Err(e) => warn!("Failed to copy URL to clipboard: {}", e),
                        }
                    }
                }
            });

        match spawned {
            Ok(_) => Some(Self { sender }),
            Err(e) => {
                warn!("Failed to start clipboard thread: {}", e);
                None
            }
        }
    }

    /// Queue a text for the clipboard, never blocks
    pub fn copy(&self, text: impl Into<String>) {
        if self.sender.send(text.into()).is_err() {
            warn!("Clipboard thread is gone, URL not copied");
        }
    }
}
