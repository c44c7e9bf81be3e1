#![allow(dead_code)]

use async_trait::async_trait;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use beacon_sync::{
    Connector, EventSync, Identity, Notice, Room, SyncConfig, Transport, TransportError,
};
use futures_util::{stream, Sink};
use tokio::sync::mpsc;
use url::Url;

pub const PING: &str = r#"{"type":"ping"}"#;

/// Outbound half handed to the client; records every frame written
struct RecordingSink {
    frames: Arc<Mutex<Vec<String>>>,
    live: Arc<AtomicBool>,
}

impl Sink<String> for RecordingSink {
    type Error = TransportError;

    fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        if self.live.load(Ordering::SeqCst) {
            Poll::Ready(Ok(()))
        } else {
            Poll::Ready(Err(TransportError::Closed))
        }
    }

    fn start_send(self: Pin<&mut Self>, item: String) -> Result<(), Self::Error> {
        self.frames.lock().unwrap().push(item);
        Ok(())
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.live.store(false, Ordering::SeqCst);
        Poll::Ready(Ok(()))
    }
}

impl Drop for RecordingSink {
    fn drop(&mut self) {
        self.live.store(false, Ordering::SeqCst);
    }
}

/// Server side of one accepted connection
struct MockConnection {
    url: Url,
    inbound: Option<mpsc::UnboundedSender<Result<String, TransportError>>>,
    outbound: Arc<Mutex<Vec<String>>>,
    live: Arc<AtomicBool>,
}

#[derive(Default)]
struct MockInner {
    attempts: Mutex<Vec<Url>>,
    connections: Mutex<Vec<MockConnection>>,
    fail_next: AtomicUsize,
    connect_delay: Mutex<Duration>,
    peak_open: AtomicUsize,
}

impl MockInner {
    fn open_count(&self) -> usize {
        self.connections
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.live.load(Ordering::SeqCst))
            .count()
    }
}

/// In-memory server that accepts connections from the client
#[derive(Clone, Default)]
pub struct MockServer {
    inner: Arc<MockInner>,
}

impl MockServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse the next `n` connection attempts
    pub fn fail_next_connects(&self, n: usize) {
        self.inner.fail_next.store(n, Ordering::SeqCst);
    }

    /// Delay every handshake by `delay`
    pub fn set_connect_delay(&self, delay: Duration) {
        *self.inner.connect_delay.lock().unwrap() = delay;
    }

    /// Connection attempts, successful or not
    pub fn connect_count(&self) -> usize {
        self.inner.attempts.lock().unwrap().len()
    }

    /// Accepted connections, open or closed
    pub fn connection_count(&self) -> usize {
        self.inner.connections.lock().unwrap().len()
    }

    /// Connections whose client side is still open
    pub fn open_count(&self) -> usize {
        self.inner.open_count()
    }

    /// Highest number of simultaneously open connections seen
    pub fn peak_open(&self) -> usize {
        self.inner.peak_open.load(Ordering::SeqCst)
    }

    pub fn attempt_url(&self, i: usize) -> Url {
        self.inner.attempts.lock().unwrap()[i].clone()
    }

    pub fn query(&self, i: usize, key: &str) -> Option<String> {
        self.attempt_url(i)
            .query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }

    pub fn is_live(&self, i: usize) -> bool {
        self.inner.connections.lock().unwrap()[i]
            .live
            .load(Ordering::SeqCst)
    }

    /// Frames the client wrote on connection `i`
    pub fn outbound(&self, i: usize) -> Vec<String> {
        self.inner.connections.lock().unwrap()[i]
            .outbound
            .lock()
            .unwrap()
            .clone()
    }

    pub fn pings(&self, i: usize) -> usize {
        self.outbound(i).iter().filter(|f| f.as_str() == PING).count()
    }

    pub fn total_pings(&self) -> usize {
        (0..self.connection_count()).map(|i| self.pings(i)).sum()
    }

    /// Frames other than pings written on connection `i`
    pub fn non_ping_frames(&self, i: usize) -> Vec<String> {
        self.outbound(i)
            .into_iter()
            .filter(|f| f.as_str() != PING)
            .collect()
    }

    /// Push a text frame to the client on connection `i`
    pub fn push(&self, i: usize, frame: &str) {
        let connections = self.inner.connections.lock().unwrap();
        if let Some(tx) = connections[i].inbound.as_ref() {
            let _ = tx.send(Ok(frame.to_string()));
        }
    }

    /// Push a frame on the most recent connection
    pub fn push_latest(&self, frame: &str) {
        let latest = self.connection_count() - 1;
        self.push(latest, frame);
    }

    /// Close connection `i` from the server side
    pub fn close(&self, i: usize) {
        self.inner.connections.lock().unwrap()[i].inbound.take();
    }

    /// Raise a transport error on connection `i`
    pub fn error(&self, i: usize) {
        let connections = self.inner.connections.lock().unwrap();
        if let Some(tx) = connections[i].inbound.as_ref() {
            let _ = tx.send(Err(TransportError::Other("connection reset".to_string())));
        }
    }

    pub fn connector(&self) -> Arc<dyn Connector> {
        Arc::new(self.clone())
    }
}

#[async_trait]
impl Connector for MockServer {
    async fn connect(&self, url: &Url) -> Result<Transport, TransportError> {
        self.inner.attempts.lock().unwrap().push(url.clone());

        let delay = *self.inner.connect_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let refused = self
            .inner
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(TransportError::Other("connection refused".to_string()));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let outbound = Arc::new(Mutex::new(Vec::new()));
        let live = Arc::new(AtomicBool::new(true));

        self.inner.connections.lock().unwrap().push(MockConnection {
            url: url.clone(),
            inbound: Some(tx),
            outbound: Arc::clone(&outbound),
            live: Arc::clone(&live),
        });
        let open = self.inner.open_count();
        self.inner.peak_open.fetch_max(open, Ordering::SeqCst);

        let sink = RecordingSink {
            frames: outbound,
            live,
        };
        let frames = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|frame| (frame, rx))
        });

        Ok(Transport::new(Box::pin(sink), Box::pin(frames)))
    }
}

/// Notices collected by the test notifier
pub type Notices = Arc<Mutex<Vec<Notice>>>;

pub struct Harness {
    pub sync: EventSync,
    pub server: MockServer,
    pub notices: Notices,
}

pub fn config() -> SyncConfig {
    SyncConfig {
        api_base_url: Some("https://admin.example.com/api".to_string()),
        ..SyncConfig::default()
    }
}

pub fn harness() -> Harness {
    harness_with(config())
}

pub fn harness_with(config: SyncConfig) -> Harness {
    let server = MockServer::new();
    let notices: Notices = Arc::new(Mutex::new(Vec::new()));
    let collected = Arc::clone(&notices);
    let sync = EventSync::with_transport(
        config,
        server.connector(),
        Arc::new(move |notice: &Notice| collected.lock().unwrap().push(notice.clone())),
    );
    Harness {
        sync,
        server,
        notices,
    }
}

pub fn admin(user_id: &str) -> Identity {
    Identity::new(user_id, Room::Admin)
}

/// Let the manager task drain its queues
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}
