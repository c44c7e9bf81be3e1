//! `EventSync` facade
//!
//! The only type applications hold. Mutating calls enqueue a command for
//! the connection manager task and return immediately.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::connection::{Command, ConnectionManager, ConnectionStatus, ManagerSettings};
use crate::dispatcher::{default_notable_events, Dispatcher};
use crate::envelope::Envelope;
use crate::identity::{Endpoint, Identity};
use crate::notify::{Notifier, TracingNotifier};
use crate::registry::{SubscriberRegistry, Subscription};
use crate::transport::{Connector, WsConnector};

fn default_ws_path() -> String {
    "/ws".to_string()
}

/// Settings for one facade instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// HTTP API base the WebSocket endpoint is derived from
    pub api_base_url: Option<String>,
    /// WebSocket path on the API host
    #[serde(default = "default_ws_path")]
    pub ws_path: String,
    /// Period between `ping` frames while open
    pub keepalive_interval: Duration,
    /// Fixed delay before reconnecting after an unexpected close
    pub reconnect_delay: Duration,
    /// Raise notifications for notable frames
    pub notifications_enabled: bool,
    /// Event types that raise a notification
    pub notable_events: HashSet<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_base_url: None,
            ws_path: default_ws_path(),
            keepalive_interval: Duration::from_secs(25),
            reconnect_delay: Duration::from_secs(3),
            notifications_enabled: true,
            notable_events: default_notable_events(),
        }
    }
}

impl SyncConfig {
    fn endpoint(&self) -> Option<Endpoint> {
        let base = self.api_base_url.as_deref()?;
        match Endpoint::from_api_base(base, &self.ws_path) {
            Ok(endpoint) => Some(endpoint),
            Err(e) => {
                warn!("Ignoring API base '{}': {}", base, e);
                None
            }
        }
    }
}

/// Real-time event sync client
pub struct EventSync {
    registry: SubscriberRegistry,
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<ConnectionStatus>,
    task: Option<JoinHandle<()>>,
}

impl EventSync {
    /// Create a client backed by a real WebSocket that logs notifications.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: SyncConfig) -> Self {
        Self::with_transport(config, Arc::new(WsConnector), Arc::new(TracingNotifier))
    }

    /// Create a client with a custom connector and notifier
    pub fn with_transport(
        config: SyncConfig,
        connector: Arc<dyn Connector>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let registry = SubscriberRegistry::new();
        let notable = if config.notifications_enabled {
            config.notable_events.clone()
        } else {
            HashSet::new()
        };
        let dispatcher = Dispatcher::new(registry.clone(), notifier, notable);

        let settings = ManagerSettings {
            endpoint: config.endpoint(),
            keepalive_interval: config.keepalive_interval,
            reconnect_delay: config.reconnect_delay,
        };
        let handle = ConnectionManager::spawn(settings, connector, dispatcher);

        Self {
            registry,
            commands: handle.commands,
            status: handle.status,
            task: Some(handle.task),
        }
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            debug!("Connection manager already stopped");
        }
    }

    /// Bind `identity` and connect. Reconnects if the user or room
    /// changed; a locale-only change is announced on the live connection.
    pub fn connect(&self, identity: Identity) {
        self.send(Command::Connect(identity));
    }

    /// Switch the locale without reconnecting
    pub fn set_locale(&self, locale: impl Into<String>) {
        self.send(Command::SetLocale(locale.into()));
    }

    /// Close the connection intentionally; no reconnect follows
    pub fn disconnect(&self) {
        self.send(Command::Disconnect);
    }

    /// Disconnect and forget the identity (logout)
    pub fn clear_identity(&self) {
        self.send(Command::ClearIdentity);
    }

    /// Register `callback` for `event_type` (or [`WILDCARD`](crate::WILDCARD))
    pub fn subscribe<F>(&self, event_type: impl Into<String>, callback: F) -> Subscription
    where
        F: Fn(&Envelope) + Send + Sync + 'static,
    {
        self.registry.subscribe(event_type, callback)
    }

    /// Whether the transport is open
    pub fn is_connected(&self) -> bool {
        self.status().is_open()
    }

    /// Current connection status
    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    /// Receiver that observes every status change
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    /// The subscriber registry
    pub fn registry(&self) -> &SubscriberRegistry {
        &self.registry
    }

    /// Close the connection and wait for the manager task to finish
    pub async fn shutdown(mut self) {
        self.send(Command::Shutdown);
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Connection manager task failed: {}", e);
            }
        }
    }
}

impl Drop for EventSync {
    fn drop(&mut self) {
        if self.task.is_some() {
            self.send(Command::Shutdown);
        }
    }
}

impl std::fmt::Debug for EventSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSync")
            .field("status", &self.status())
            .field("registry", &self.registry)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SyncConfig::default();
        assert_eq!(config.ws_path, "/ws");
        assert_eq!(config.keepalive_interval, Duration::from_secs(25));
        assert_eq!(config.reconnect_delay, Duration::from_secs(3));
        assert!(config.notable_events.contains("order_submitted"));
        assert!(config.endpoint().is_none());
    }

    #[test]
    fn test_invalid_api_base_yields_no_endpoint() {
        let config = SyncConfig {
            api_base_url: Some("ftp://example.com".to_string()),
            ..SyncConfig::default()
        };
        assert!(config.endpoint().is_none());
    }

    #[tokio::test]
    async fn test_subscribe_without_connection() {
        let sync = EventSync::new(SyncConfig::default());
        let sub = sync.subscribe("order_submitted", |_| {});

        assert_eq!(sync.registry().subscriber_count("order_submitted"), 1);
        assert!(!sync.is_connected());
        assert_eq!(sync.status(), ConnectionStatus::Disconnected);

        drop(sub);
        assert!(sync.registry().is_empty());
        sync.shutdown().await;
    }
}
