//! Transient user notifications
//!
//! The dispatcher raises one [`Notice`] per notable frame that carries a
//! human-readable `message`. How it is surfaced (toast, terminal line, log
//! entry) is up to the [`Notifier`] implementation.

use serde::Serialize;

/// A user-visible notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    /// Event type that triggered the notice
    pub event_type: String,
    /// Message carried by the frame
    pub message: String,
}

/// Sink for transient notifications
pub trait Notifier: Send + Sync {
    /// Show a notification
    fn notify(&self, notice: &Notice);
}

impl<F> Notifier for F
where
    F: Fn(&Notice) + Send + Sync,
{
    fn notify(&self, notice: &Notice) {
        self(notice)
    }
}

/// Notifier that writes every notice to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: &Notice) {
        tracing::info!(
            event_type = %notice.event_type,
            "{}",
            notice.message
        );
    }
}
