//! Wire envelope
//!
//! Inbound frames are JSON objects routed by their `type` field; every other
//! field is business payload and is handed to subscribers untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::SyncResult;

/// Subscription key that receives every non-internal event type.
pub const WILDCARD: &str = "*";

/// Protocol-internal types that never reach subscribers.
pub const INTERNAL_EVENT_TYPES: [&str; 2] = ["pong", "connected"];

/// A decoded inbound frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Event discriminator (e.g. `order_submitted`)
    #[serde(rename = "type")]
    pub event_type: String,
    /// All remaining fields, including `message` when present
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl Envelope {
    /// Build an envelope with an empty payload
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            payload: Map::new(),
        }
    }

    /// Attach a payload field
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    /// Decode a text frame
    pub fn decode(text: &str) -> SyncResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Human-readable message, if the frame carries a string `message`
    pub fn message(&self) -> Option<&str> {
        self.payload.get("message").and_then(Value::as_str)
    }

    /// Look up a payload field
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    /// Whether this frame is protocol chatter (`pong`, `connected`)
    pub fn is_internal(&self) -> bool {
        INTERNAL_EVENT_TYPES.contains(&self.event_type.as_str())
    }
}

/// Frames produced by this client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Keep-alive tick
    Ping,
    /// In-band locale switch on a live connection
    ChangeLanguage {
        /// New locale
        lang: String,
    },
}

impl ClientFrame {
    /// Serialize to a text frame
    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
