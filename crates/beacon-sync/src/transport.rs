//! Transport abstraction
//!
//! The connection manager only ever sees a [`Transport`]: a sink and a
//! stream of text frames. [`WsConnector`] provides them over a real
//! WebSocket; tests plug in an in-memory [`Connector`].

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::{future, Sink, SinkExt, Stream, StreamExt};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, trace};
use url::Url;

use crate::error::TransportError;

/// Outbound half of a transport
pub type FrameSink = Pin<Box<dyn Sink<String, Error = TransportError> + Send>>;

/// Inbound half of a transport. The stream ending means the peer closed.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String, TransportError>> + Send>>;

/// An established bidirectional text-frame channel
pub struct Transport {
    pub sink: FrameSink,
    pub stream: FrameStream,
}

impl Transport {
    pub fn new(sink: FrameSink, stream: FrameStream) -> Self {
        Self { sink, stream }
    }
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport").finish_non_exhaustive()
    }
}

/// Opens transports to a connection target
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Establish a transport to `url`
    async fn connect(&self, url: &Url) -> Result<Transport, TransportError>;
}

/// WebSocket connector backed by tokio-tungstenite
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &Url) -> Result<Transport, TransportError> {
        let (socket, response) = connect_async(url.as_str()).await?;
        debug!("WebSocket handshake completed: {}", response.status());

        let (write, read) = socket.split();

        let sink = write.with(|text: String| {
            future::ready(Ok::<_, TransportError>(Message::Text(text)))
        });

        let stream = read.filter_map(|message| {
            future::ready(match message {
                Ok(Message::Text(text)) => Some(Ok(text)),
                Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                    Ok(text) => Some(Ok(text)),
                    Err(_) => {
                        debug!("Ignoring non UTF-8 binary frame");
                        None
                    }
                },
                Ok(other) => {
                    trace!("Ignoring control frame: {:?}", other);
                    None
                }
                Err(e) => Some(Err(TransportError::from(e))),
            })
        });

        Ok(Transport::new(Box::pin(sink), Box::pin(stream)))
    }
}
