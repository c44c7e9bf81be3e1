//! Beacon Sync - real-time event synchronization client
//!
//! Keeps one WebSocket connection to the admin backend alive, decodes the
//! server-pushed domain events and fans them out to any number of
//! independently registered subscribers. Callers never touch the socket:
//! they bind an identity, subscribe to event types and hold on to the
//! returned [`Subscription`] guards.
//!
//! ```no_run
//! use beacon_sync::{EventSync, Identity, Room, SyncConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = SyncConfig {
//!         api_base_url: Some("https://admin.example.com/api".to_string()),
//!         ..SyncConfig::default()
//!     };
//!     let sync = EventSync::new(config);
//!
//!     let _orders = sync.subscribe("order_submitted", |event| {
//!         println!("new order: {:?}", event.payload);
//!     });
//!
//!     sync.connect(Identity::new("42", Room::Admin).with_locale("en"));
//!     tokio::signal::ctrl_c().await.ok();
//!     sync.shutdown().await;
//! }
//! ```

mod client;
mod connection;
mod dispatcher;
mod envelope;
mod error;
mod identity;
mod notify;
mod registry;
mod transport;

pub use client::{EventSync, SyncConfig};
pub use connection::ConnectionStatus;
pub use dispatcher::{default_notable_events, DispatchOutcome, Dispatcher};
pub use envelope::{ClientFrame, Envelope, INTERNAL_EVENT_TYPES, WILDCARD};
pub use error::{SyncError, SyncResult, TransportError};
pub use identity::{Endpoint, Identity, IdentityChange, Room, SessionBinder};
pub use notify::{Notice, Notifier, TracingNotifier};
pub use registry::{SubscriberRegistry, Subscription};
pub use transport::{Connector, FrameSink, FrameStream, Transport, WsConnector};
