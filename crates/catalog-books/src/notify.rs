//! User-facing notifications
//!
//! Operations report outcomes the UI should show (saved, deleted, rolled
//! back) through a `Notifier`. Emitting never blocks and never fails: a
//! notifier without a listener only logs.

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Success,
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: Level,
    pub message: String,
}

/// Sending half of the notification channel. Cheap to clone.
#[derive(Clone, Default)]
pub struct Notifier {
    tx: Option<mpsc::UnboundedSender<Notification>>,
}

impl Notifier {
    /// A notifier and the receiver the UI drains.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// A notifier that only logs.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn success(&self, message: impl Into<String>) {
        self.emit(Level::Success, message.into());
    }

    pub fn info(&self, message: impl Into<String>) {
        self.emit(Level::Info, message.into());
    }

    pub fn error(&self, message: impl Into<String>) {
        self.emit(Level::Error, message.into());
    }

    fn emit(&self, level: Level, message: String) {
        match level {
            Level::Error => warn!(%message, "notify"),
            _ => info!(%message, "notify"),
        }
        if let Some(tx) = &self.tx {
            if tx.send(Notification { level, message }).is_err() {
                debug!("notification receiver dropped");
            }
        }
    }
}
