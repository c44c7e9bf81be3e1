//! Error types for the sync engine

/// Errors raised while building a connection target or decoding frames.
///
/// None of these escape the facade: the connection manager logs them and
/// stays disconnected, the dispatcher drops the offending frame.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Endpoint is not configured")]
    EndpointUnset,
    #[error("Invalid endpoint URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("Unsupported endpoint scheme: {0}")]
    UnsupportedScheme(String),
    #[error("Identity has no user id")]
    IncompleteIdentity,
    #[error("Malformed frame: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Transport-level failures. Every variant funnels into the same close path.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Connection closed")]
    Closed,
    #[error("Write timed out")]
    Timeout,
    #[error("Transport error: {0}")]
    Other(String),
}

pub type SyncResult<T> = std::result::Result<T, SyncError>;
