//! Connection manager
//!
//! A single task owns the transport, the keep-alive interval and the
//! reconnect timer. Everything else talks to it through [`Command`]s, so
//! there is never more than one writer to any of that state.
//!
//! Every connect attempt and every intentional teardown bumps the
//! generation. Connect results and reconnect timers remember the
//! generation they were created under and are discarded once it moved on.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{future, SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, timeout, Instant, Interval, MissedTickBehavior, Sleep};
use tracing::{debug, info, warn};

use crate::dispatcher::Dispatcher;
use crate::envelope::ClientFrame;
use crate::error::{SyncError, TransportError};
use crate::identity::{Endpoint, Identity, IdentityChange, SessionBinder};
use crate::transport::{Connector, FrameSink, FrameStream, Transport};

/// Upper bound for a single outbound write or close
pub(crate) const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Lifecycle of the managed connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Open,
    Closing,
}

impl ConnectionStatus {
    pub fn is_open(&self) -> bool {
        matches!(self, ConnectionStatus::Open)
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Open => "open",
            ConnectionStatus::Closing => "closing",
        };
        f.write_str(s)
    }
}

/// Requests from the facade
#[derive(Debug)]
pub(crate) enum Command {
    Connect(Identity),
    SetLocale(String),
    Disconnect,
    ClearIdentity,
    Shutdown,
}

/// Timing and target settings for the manager
#[derive(Debug, Clone)]
pub(crate) struct ManagerSettings {
    pub endpoint: Option<Endpoint>,
    pub keepalive_interval: Duration,
    pub reconnect_delay: Duration,
}

/// Handles returned to the facade
pub(crate) struct ManagerHandle {
    pub commands: mpsc::UnboundedSender<Command>,
    pub status: watch::Receiver<ConnectionStatus>,
    pub task: JoinHandle<()>,
}

struct ConnectOutcome {
    generation: u64,
    locale: String,
    result: Result<Transport, TransportError>,
}

struct Link {
    sink: FrameSink,
    stream: FrameStream,
    /// Locale the server currently assumes for this transport
    locale: String,
}

struct PendingReconnect {
    generation: u64,
    sleep: Pin<Box<Sleep>>,
}

pub(crate) struct ConnectionManager {
    settings: ManagerSettings,
    connector: Arc<dyn Connector>,
    dispatcher: Dispatcher,
    binder: SessionBinder,
    status: watch::Sender<ConnectionStatus>,
    generation: u64,
    link: Option<Link>,
    keepalive: Option<Interval>,
    reconnect: Option<PendingReconnect>,
    connecting: Option<JoinHandle<()>>,
    outcomes_tx: mpsc::UnboundedSender<ConnectOutcome>,
    outcomes_rx: mpsc::UnboundedReceiver<ConnectOutcome>,
    commands: mpsc::UnboundedReceiver<Command>,
}

impl ConnectionManager {
    /// Spawn the manager task on the current runtime
    pub(crate) fn spawn(
        settings: ManagerSettings,
        connector: Arc<dyn Connector>,
        dispatcher: Dispatcher,
    ) -> ManagerHandle {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (outcomes_tx, outcomes_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Disconnected);

        let manager = Self {
            settings,
            connector,
            dispatcher,
            binder: SessionBinder::new(),
            status: status_tx,
            generation: 0,
            link: None,
            keepalive: None,
            reconnect: None,
            connecting: None,
            outcomes_tx,
            outcomes_rx,
            commands: commands_rx,
        };

        ManagerHandle {
            commands: commands_tx,
            status: status_rx,
            task: tokio::spawn(manager.run()),
        }
    }

    async fn run(mut self) {
        loop {
            tokio::select! {
                biased;

                command = self.commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command).await,
                },
                Some(outcome) = self.outcomes_rx.recv() => {
                    self.handle_outcome(outcome).await;
                }
                frame = next_frame(&mut self.link) => match frame {
                    Some(Ok(text)) => {
                        self.dispatcher.dispatch(&text);
                    }
                    Some(Err(e)) => self.handle_close(&format!("transport error: {}", e)).await,
                    None => self.handle_close("closed by server").await,
                },
                _ = next_tick(&mut self.keepalive) => {
                    self.send_or_close(ClientFrame::Ping).await;
                }
                generation = reconnect_due(&mut self.reconnect) => {
                    self.handle_reconnect_due(generation);
                }
            }
        }

        self.teardown("shutdown").await;
        debug!("Connection manager stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect(identity) => self.connect(identity).await,
            Command::SetLocale(locale) => self.set_locale(locale).await,
            Command::Disconnect => self.teardown("disconnect requested").await,
            Command::ClearIdentity => {
                self.teardown("identity cleared").await;
                self.binder.clear();
            }
            Command::Shutdown => {}
        }
    }

    /// Connection attempt in flight or transport open
    fn is_active(&self) -> bool {
        self.link.is_some() || self.connecting.is_some()
    }

    async fn connect(&mut self, identity: Identity) {
        if !identity.is_complete() {
            warn!("Not connecting: {}", SyncError::IncompleteIdentity);
            if self.binder.current().is_some() {
                self.teardown("identity cleared").await;
                self.binder.clear();
            }
            return;
        }

        match self.binder.bind(identity) {
            IdentityChange::Session => {
                if self.is_active() {
                    self.teardown("identity changed").await;
                }
                self.start_connect();
            }
            IdentityChange::Locale(locale) => {
                if self.link.is_some() {
                    self.announce_locale(locale).await;
                } else if !self.is_active() {
                    self.start_connect();
                }
            }
            IdentityChange::Unchanged => {
                if !self.is_active() {
                    self.start_connect();
                } else {
                    debug!("Already connected for this identity");
                }
            }
        }
    }

    async fn set_locale(&mut self, locale: String) {
        if !self.binder.set_locale(&locale) {
            debug!("Locale unchanged or no identity bound, ignoring '{}'", locale);
            return;
        }
        if self.link.is_some() {
            self.announce_locale(locale).await;
        }
    }

    /// Tell the live transport about a new locale
    async fn announce_locale(&mut self, locale: String) {
        let Some(link) = self.link.as_mut() else {
            return;
        };
        if link.locale == locale {
            return;
        }
        link.locale = locale.clone();
        info!("Switching locale to '{}'", locale);
        self.send_or_close(ClientFrame::ChangeLanguage { lang: locale })
            .await;
    }

    fn start_connect(&mut self) {
        self.reconnect = None;

        let Some(identity) = self.binder.current().cloned() else {
            return;
        };
        let Some(endpoint) = self.settings.endpoint.as_ref() else {
            warn!("Not connecting: {}", SyncError::EndpointUnset);
            return;
        };
        let target = match endpoint.target(&identity) {
            Ok(target) => target,
            Err(e) => {
                warn!("Not connecting: {}", e);
                return;
            }
        };

        self.generation += 1;
        let generation = self.generation;
        self.set_status(ConnectionStatus::Connecting);
        metrics::counter!("beacon_sync_connect_attempts_total").increment(1);
        info!(
            endpoint = %endpoint.base(),
            user_id = %identity.user_id,
            room = %identity.room,
            generation,
            "Connecting"
        );

        let connector = Arc::clone(&self.connector);
        let outcomes = self.outcomes_tx.clone();
        let locale = identity.locale;
        self.connecting = Some(tokio::spawn(async move {
            let result = connector.connect(&target).await;
            let _ = outcomes.send(ConnectOutcome {
                generation,
                locale,
                result,
            });
        }));
    }

    async fn handle_outcome(&mut self, outcome: ConnectOutcome) {
        if outcome.generation != self.generation {
            debug!(
                "Discarding connect result of generation {} (now {})",
                outcome.generation, self.generation
            );
            if let Ok(mut transport) = outcome.result {
                let _ = timeout(WRITE_TIMEOUT, transport.sink.close()).await;
            }
            return;
        }
        self.connecting = None;

        match outcome.result {
            Ok(transport) => {
                self.link = Some(Link {
                    sink: transport.sink,
                    stream: transport.stream,
                    locale: outcome.locale,
                });
                self.set_status(ConnectionStatus::Open);
                self.start_keepalive();
                metrics::counter!("beacon_sync_connections_opened_total").increment(1);
                metrics::gauge!("beacon_sync_connected").set(1.0);
                info!("Connection open");

                // The locale may have moved on while the handshake ran.
                if let Some(locale) = self.binder.locale().map(str::to_string) {
                    self.announce_locale(locale).await;
                }
            }
            Err(e) => self.handle_close(&format!("connect failed: {}", e)).await,
        }
    }

    fn start_keepalive(&mut self) {
        let period = self.settings.keepalive_interval;
        if period.is_zero() {
            warn!("Keep-alive disabled: interval is zero");
            self.keepalive = None;
            return;
        }
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.keepalive = Some(interval);
    }

    async fn send(&mut self, frame: &ClientFrame) -> Result<(), TransportError> {
        let link = self.link.as_mut().ok_or(TransportError::Closed)?;
        let text = frame.to_text()?;
        match timeout(WRITE_TIMEOUT, link.sink.send(text)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout),
        }
    }

    /// Write a frame; a failed write closes the transport
    async fn send_or_close(&mut self, frame: ClientFrame) {
        if let Err(e) = self.send(&frame).await {
            self.handle_close(&format!("write failed: {}", e)).await;
        }
    }

    /// The one path for every non-intentional close
    async fn handle_close(&mut self, reason: &str) {
        self.keepalive = None;
        self.connecting = None;

        if let Some(mut link) = self.link.take() {
            let _ = timeout(WRITE_TIMEOUT, link.sink.close()).await;
            metrics::counter!("beacon_sync_connections_closed_total", "reason" => "lost")
                .increment(1);
            metrics::gauge!("beacon_sync_connected").set(0.0);
        }
        self.set_status(ConnectionStatus::Disconnected);

        if self.binder.current().is_none() {
            warn!("Connection lost ({}), no identity to reconnect with", reason);
            return;
        }

        let delay = self.settings.reconnect_delay;
        warn!("Connection lost ({}), reconnecting in {:?}", reason, delay);
        metrics::counter!("beacon_sync_reconnects_scheduled_total").increment(1);
        self.reconnect = Some(PendingReconnect {
            generation: self.generation,
            sleep: Box::pin(sleep(delay)),
        });
    }

    fn handle_reconnect_due(&mut self, generation: u64) {
        self.reconnect = None;
        if generation != self.generation || self.is_active() {
            debug!("Dropping stale reconnect of generation {}", generation);
            return;
        }
        self.start_connect();
    }

    /// Intentional close: no reconnect follows
    async fn teardown(&mut self, reason: &str) {
        self.generation += 1;
        self.keepalive = None;
        self.reconnect = None;
        if let Some(task) = self.connecting.take() {
            task.abort();
        }

        if let Some(mut link) = self.link.take() {
            info!("Closing connection: {}", reason);
            self.set_status(ConnectionStatus::Closing);
            match timeout(WRITE_TIMEOUT, link.sink.close()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!("Error while closing transport: {}", e),
                Err(_) => debug!("Timed out closing transport"),
            }
            metrics::counter!("beacon_sync_connections_closed_total", "reason" => "intentional")
                .increment(1);
            metrics::gauge!("beacon_sync_connected").set(0.0);
        }
        self.set_status(ConnectionStatus::Disconnected);
    }

    fn set_status(&self, next: ConnectionStatus) {
        self.status.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                debug!("Status {} -> {}", current, next);
                *current = next;
                true
            }
        });
    }
}

async fn next_frame(link: &mut Option<Link>) -> Option<Result<String, TransportError>> {
    match link {
        Some(link) => link.stream.next().await,
        None => future::pending().await,
    }
}

async fn next_tick(keepalive: &mut Option<Interval>) {
    match keepalive {
        Some(interval) => {
            interval.tick().await;
        }
        None => future::pending().await,
    }
}

async fn reconnect_due(reconnect: &mut Option<PendingReconnect>) -> u64 {
    match reconnect {
        Some(pending) => {
            pending.sleep.as_mut().await;
            pending.generation
        }
        None => future::pending().await,
    }
}
