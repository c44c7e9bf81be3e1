//! Frame dispatcher
//!
//! Turns one raw text frame into subscriber invocations: exact-type
//! subscribers first, then wildcard subscribers, each call isolated from
//! the others. Notable frames additionally raise a single notification.

use std::any::Any;
use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::envelope::{Envelope, WILDCARD};
use crate::notify::{Notice, Notifier};
use crate::registry::SubscriberRegistry;

/// Event types that raise a notification when they carry a `message`
pub fn default_notable_events() -> HashSet<String> {
    [
        "order_submitted",
        "order_confirmed",
        "order_updated",
        "order_cancelled",
        "order_completed",
        "access_request",
        "access_request_approved",
        "access_request_rejected",
        "wallet_update",
        "wallet_topup",
        "wallet_withdrawal",
        "chat_message",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// What happened to one frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The frame could not be decoded
    Malformed,
    /// The frame was protocol chatter (`pong`, `connected`)
    Internal,
    /// The frame was routed
    Delivered {
        /// Callbacks invoked
        invoked: usize,
        /// Callbacks that panicked
        failed: usize,
        /// Whether a notification was raised
        notified: bool,
    },
}

/// Routes decoded envelopes to the registry and the notifier
#[derive(Clone)]
pub struct Dispatcher {
    registry: SubscriberRegistry,
    notifier: Arc<dyn Notifier>,
    notable: Arc<HashSet<String>>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.registry)
            .field("notifier", &"<notifier>")
            .field("notable", &self.notable)
            .finish()
    }
}

impl Dispatcher {
    /// Create a dispatcher. An empty `notable` set disables notifications.
    pub fn new(
        registry: SubscriberRegistry,
        notifier: Arc<dyn Notifier>,
        notable: HashSet<String>,
    ) -> Self {
        Self {
            registry,
            notifier,
            notable: Arc::new(notable),
        }
    }

    /// The registry this dispatcher reads from
    pub fn registry(&self) -> &SubscriberRegistry {
        &self.registry
    }

    /// Decode and route one text frame
    pub fn dispatch(&self, text: &str) -> DispatchOutcome {
        match Envelope::decode(text) {
            Ok(envelope) => self.dispatch_envelope(&envelope),
            Err(e) => {
                debug!("Dropping malformed frame: {}", e);
                metrics::counter!("beacon_sync_frames_total", "outcome" => "malformed").increment(1);
                DispatchOutcome::Malformed
            }
        }
    }

    /// Route an already decoded envelope
    pub fn dispatch_envelope(&self, envelope: &Envelope) -> DispatchOutcome {
        if envelope.is_internal() {
            trace!("Internal frame: {}", envelope.event_type);
            metrics::counter!("beacon_sync_frames_total", "outcome" => "internal").increment(1);
            return DispatchOutcome::Internal;
        }

        let mut invoked = 0;
        let mut failed = 0;

        let targets = self
            .registry
            .snapshot(&envelope.event_type)
            .into_iter()
            .chain(self.registry.snapshot(WILDCARD));

        for entry in targets {
            // Released after the snapshot was taken (possibly by an earlier
            // callback for this very frame).
            if !entry.is_active() {
                continue;
            }
            invoked += 1;
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| entry.invoke(envelope))) {
                failed += 1;
                warn!(
                    "Subscriber for '{}' panicked: {}",
                    envelope.event_type,
                    panic_message(panic.as_ref())
                );
                metrics::counter!("beacon_sync_callback_panics_total").increment(1);
            }
        }

        let notified = self.notify_if_notable(envelope);

        metrics::counter!("beacon_sync_frames_total", "outcome" => "delivered").increment(1);
        debug!(
            event_type = %envelope.event_type,
            invoked,
            failed,
            notified,
            "Frame dispatched"
        );

        DispatchOutcome::Delivered {
            invoked,
            failed,
            notified,
        }
    }

    fn notify_if_notable(&self, envelope: &Envelope) -> bool {
        if !self.notable.contains(&envelope.event_type) {
            return false;
        }
        let Some(message) = envelope.message() else {
            return false;
        };

        let notice = Notice {
            event_type: envelope.event_type.clone(),
            message: message.to_string(),
        };
        if let Err(panic) = catch_unwind(AssertUnwindSafe(|| self.notifier.notify(&notice))) {
            warn!("Notifier panicked: {}", panic_message(panic.as_ref()));
        }
        metrics::counter!("beacon_sync_notifications_total").increment(1);
        true
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "<non-string panic>"
    }
}
