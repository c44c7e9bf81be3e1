//! Subscriber registry
//!
//! Maps event types (or [`WILDCARD`](crate::WILDCARD)) to independent
//! callback registrations. Every registration is handed back as a
//! [`Subscription`] guard; releasing the guard removes exactly that
//! registration and nothing else.

use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use crate::envelope::Envelope;

/// Callback invoked for every matching envelope
pub(crate) type Callback = Arc<dyn Fn(&Envelope) + Send + Sync>;

/// One registration
pub(crate) struct Entry {
    id: u64,
    active: AtomicBool,
    callback: Callback,
}

impl Entry {
    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub(crate) fn invoke(&self, envelope: &Envelope) {
        (self.callback)(envelope)
    }
}

#[derive(Default)]
struct RegistryInner {
    entries: DashMap<String, Vec<Arc<Entry>>>,
    next_id: AtomicU64,
}

impl RegistryInner {
    fn remove(&self, event_type: &str, id: u64) {
        let emptied = match self.entries.get_mut(event_type) {
            Some(mut list) => {
                list.retain(|entry| entry.id != id);
                list.is_empty()
            }
            None => false,
        };
        if emptied {
            self.entries.remove_if(event_type, |_, list| list.is_empty());
        }
    }
}

/// Concurrent registry of subscriptions keyed by event type
#[derive(Clone, Default)]
pub struct SubscriberRegistry {
    inner: Arc<RegistryInner>,
}

impl std::fmt::Debug for SubscriberRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberRegistry")
            .field("event_types", &self.event_types())
            .field("subscriptions", &self.len())
            .finish()
    }
}

impl SubscriberRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for `event_type`
    pub fn subscribe<F>(&self, event_type: impl Into<String>, callback: F) -> Subscription
    where
        F: Fn(&Envelope) + Send + Sync + 'static,
    {
        let event_type = event_type.into();
        let entry = Arc::new(Entry {
            id: self.inner.next_id.fetch_add(1, Ordering::Relaxed),
            active: AtomicBool::new(true),
            callback: Arc::new(callback),
        });

        self.inner
            .entries
            .entry(event_type.clone())
            .or_default()
            .push(Arc::clone(&entry));

        Subscription {
            registry: Arc::downgrade(&self.inner),
            event_type,
            entry,
            detached: false,
        }
    }

    /// Snapshot of the registrations for one key.
    ///
    /// The shard lock is released before returning, so callers may invoke
    /// the entries while other threads (or the callbacks themselves)
    /// subscribe and unsubscribe.
    pub(crate) fn snapshot(&self, event_type: &str) -> Vec<Arc<Entry>> {
        self.inner
            .entries
            .get(event_type)
            .map(|list| list.clone())
            .unwrap_or_default()
    }

    /// Number of live registrations for `event_type`
    pub fn subscriber_count(&self, event_type: &str) -> usize {
        self.inner
            .entries
            .get(event_type)
            .map(|list| list.len())
            .unwrap_or(0)
    }

    /// Keys with at least one registration
    pub fn event_types(&self) -> Vec<String> {
        self.inner
            .entries
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Total number of registrations
    pub fn len(&self) -> usize {
        self.inner.entries.iter().map(|entry| entry.value().len()).sum()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Handle for a single registration.
///
/// Dropping the guard unsubscribes; call [`Subscription::detach`] to keep
/// the callback registered for as long as the registry lives.
#[must_use = "dropping a Subscription unsubscribes it immediately"]
pub struct Subscription {
    registry: Weak<RegistryInner>,
    event_type: String,
    entry: Arc<Entry>,
    detached: bool,
}

impl Subscription {
    /// Remove this registration. Calling it again is a no-op.
    pub fn unsubscribe(&self) {
        if !self.entry.active.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(&self.event_type, self.entry.id);
        }
    }

    /// Whether the registration is still live
    pub fn is_active(&self) -> bool {
        self.entry.is_active()
    }

    /// Event type this subscription listens to
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// Give up the guard without unsubscribing
    pub fn detach(mut self) {
        self.detached = true;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if !self.detached {
            self.unsubscribe();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("event_type", &self.event_type)
            .field("id", &self.entry.id)
            .field("active", &self.is_active())
            .finish()
    }
}
