//! Connection supervisor.
//!
//! One driver task owns the connection and the reconnection timer. Host calls
//! are queued to it and never block; everything that happens is reported
//! through [`SupervisorStatus`] (a watch) and [`SyncEvent`]s (a broadcast).
//!
//! ```text
//! Disconnected --connect--> Connecting --open--> Connected
//!      ^                        ^                    |
//!      |                      timer            close / error
//!  disconnect                   |                    v
//!  (any state)             Reconnecting <--- attempts < max
//!                                                    |
//!                          FailedPermanently <-- attempts == max
//! ```

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Sleep;
use tracing::{debug, error, info, trace, warn};

use crate::config::SupervisorConfig;
use crate::error::{SyncError, TransportError};
use crate::metrics;
use crate::protocol::normalize;
use crate::store::SnapshotStore;
use crate::transport::{Connector, Link, LinkEvent};

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    /// Retries are exhausted. Only an explicit `connect()` leaves this state.
    FailedPermanently,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::FailedPermanently => "failed_permanently",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorStatus {
    pub state: ConnectionState,
    /// Reconnection attempts scheduled since the last successful open.
    pub reconnect_attempts: u32,
}

impl Default for SupervisorStatus {
    fn default() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            reconnect_attempts: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    StateChanged(ConnectionState),
    /// Emitted on every transition into (`true`) or out of (`false`) Connected.
    Connected(bool),
    Error(SyncError),
}

#[derive(Debug)]
enum Command {
    Connect,
    Disconnect,
    Send(String),
    Shutdown(oneshot::Sender<()>),
}

/// Handle to a running supervisor. Dropping it stops the driver.
pub struct Supervisor {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<SupervisorStatus>,
    events: broadcast::Sender<SyncEvent>,
    store: SnapshotStore,
    driver: Option<JoinHandle<()>>,
}

impl Supervisor {
    /// Starts the driver task in the `Disconnected` state. Must be called
    /// from within a tokio runtime.
    pub fn spawn(
        config: SupervisorConfig,
        connector: Arc<dyn Connector>,
        store: SnapshotStore,
    ) -> Self {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(SupervisorStatus::default());
        let (events_tx, _) = broadcast::channel(EVENT_CAPACITY);

        let driver = Driver {
            config,
            connector,
            store: store.clone(),
            commands: commands_rx,
            status: status_tx,
            events: events_tx.clone(),
            state: ConnectionState::Disconnected,
            attempts: 0,
            phase: Phase::Idle,
        };

        Self {
            commands: commands_tx,
            status: status_rx,
            events: events_tx,
            store,
            driver: Some(tokio::spawn(driver.run())),
        }
    }

    /// Starts a connection unless one is already open or being opened. While
    /// waiting to reconnect, cancels the wait and tries immediately.
    pub fn connect(&self) {
        let _ = self.commands.send(Command::Connect);
    }

    /// Closes the connection, cancels any pending retry and stays
    /// `Disconnected` until the next `connect()`. Safe from any state.
    pub fn disconnect(&self) {
        let _ = self.commands.send(Command::Disconnect);
    }

    /// Fire-and-forget. Serializes `payload` to JSON and queues it only while
    /// `Connected`; returns whether it was queued.
    pub fn send<T: Serialize + ?Sized>(&self, payload: &T) -> bool {
        if self.state() != ConnectionState::Connected {
            trace!(state = %self.state(), "dropping outbound payload");
            return false;
        }
        match serde_json::to_string(payload) {
            Ok(text) => self.commands.send(Command::Send(text)).is_ok(),
            Err(err) => {
                warn!(error = %err, "outbound payload is not serializable");
                false
            }
        }
    }

    pub fn status(&self) -> SupervisorStatus {
        *self.status.borrow()
    }

    pub fn state(&self) -> ConnectionState {
        self.status.borrow().state
    }

    pub fn watch_status(&self) -> watch::Receiver<SupervisorStatus> {
        self.status.clone()
    }

    pub fn events(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    /// Disconnects and waits for the driver to exit.
    pub async fn shutdown(mut self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.commands.send(Command::Shutdown(ack_tx)).is_ok() {
            let _ = ack_rx.await;
        }
        if let Some(driver) = self.driver.take() {
            let _ = driver.await;
        }
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        if let Some(driver) = self.driver.take() {
            driver.abort();
        }
    }
}

enum Phase {
    Idle,
    Connecting(BoxFuture<'static, Result<Link, TransportError>>),
    Connected(Link),
    Waiting(Pin<Box<Sleep>>),
}

enum Step {
    Command(Command),
    HostGone,
    Opened(Result<Link, TransportError>),
    Link(Option<LinkEvent>),
    RetryDue,
}

struct Driver {
    config: SupervisorConfig,
    connector: Arc<dyn Connector>,
    store: SnapshotStore,
    commands: mpsc::UnboundedReceiver<Command>,
    status: watch::Sender<SupervisorStatus>,
    events: broadcast::Sender<SyncEvent>,
    state: ConnectionState,
    attempts: u32,
    phase: Phase,
}

impl Driver {
    async fn run(mut self) {
        loop {
            // Commands win ties so a queued disconnect always beats a due timer.
            let step = match &mut self.phase {
                Phase::Idle => match self.commands.recv().await {
                    Some(command) => Step::Command(command),
                    None => Step::HostGone,
                },
                Phase::Connecting(attempt) => tokio::select! {
                    biased;
                    command = self.commands.recv() => command.map_or(Step::HostGone, Step::Command),
                    result = attempt => Step::Opened(result),
                },
                Phase::Connected(link) => tokio::select! {
                    biased;
                    command = self.commands.recv() => command.map_or(Step::HostGone, Step::Command),
                    event = link.recv() => Step::Link(event),
                },
                Phase::Waiting(timer) => tokio::select! {
                    biased;
                    command = self.commands.recv() => command.map_or(Step::HostGone, Step::Command),
                    () = timer.as_mut() => Step::RetryDue,
                },
            };

            match step {
                Step::Command(Command::Connect) => self.on_connect(),
                Step::Command(Command::Disconnect) => self.on_disconnect(),
                Step::Command(Command::Send(text)) => self.on_send(text),
                Step::Command(Command::Shutdown(ack)) => {
                    self.on_disconnect();
                    let _ = ack.send(());
                    break;
                }
                Step::HostGone => {
                    self.on_disconnect();
                    break;
                }
                Step::Opened(Ok(link)) => self.on_open(link),
                Step::Opened(Err(err)) => {
                    warn!(
                        url = %self.config.endpoint.url(),
                        error = %err,
                        "connection attempt failed"
                    );
                    metrics::TRANSPORT_ERRORS.inc();
                    self.emit(SyncEvent::Error(err.into()));
                    self.phase = Phase::Idle;
                    self.schedule_retry();
                }
                Step::Link(Some(LinkEvent::Frame(text))) => self.on_frame(&text),
                Step::Link(Some(LinkEvent::Failed(reason))) => {
                    warn!(error = %reason, "connection dropped");
                    metrics::TRANSPORT_ERRORS.inc();
                    self.emit(SyncEvent::Error(SyncError::Transport(reason)));
                    self.on_lost();
                }
                Step::Link(Some(LinkEvent::Closed(reason))) => {
                    info!(reason = reason.as_deref().unwrap_or(""), "connection closed by server");
                    self.on_lost();
                }
                Step::Link(None) => {
                    info!("connection ended");
                    self.on_lost();
                }
                Step::RetryDue => {
                    debug!(attempt = self.attempts, "retry timer fired");
                    self.start_attempt();
                }
            }
        }
        debug!("supervisor driver stopped");
    }

    fn on_connect(&mut self) {
        match self.state {
            ConnectionState::Connecting | ConnectionState::Connected => {
                trace!(state = %self.state, "connect ignored");
            }
            ConnectionState::Reconnecting => {
                debug!(attempt = self.attempts, "retry timer cancelled by connect");
                self.start_attempt();
            }
            ConnectionState::Disconnected | ConnectionState::FailedPermanently => {
                self.attempts = 0;
                self.start_attempt();
            }
        }
    }

    fn on_disconnect(&mut self) {
        let was_connected = self.state == ConnectionState::Connected;
        match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Connected(link) => link.close(),
            // Dropping an in-flight attempt or a pending timer cancels it.
            Phase::Connecting(_) | Phase::Waiting(_) | Phase::Idle => {}
        }
        self.attempts = 0;
        self.set_state(ConnectionState::Disconnected);
        if was_connected {
            self.emit(SyncEvent::Connected(false));
        }
    }

    fn on_send(&mut self, text: String) {
        match &self.phase {
            Phase::Connected(link) => {
                if !link.send(text) {
                    debug!("outbound frame dropped, link is closing");
                }
            }
            _ => trace!(state = %self.state, "outbound frame dropped"),
        }
    }

    fn on_open(&mut self, link: Link) {
        info!(url = %self.config.endpoint.url(), "connected");
        self.phase = Phase::Connected(link);
        self.attempts = 0;
        self.set_state(ConnectionState::Connected);
        self.emit(SyncEvent::Connected(true));
    }

    fn on_lost(&mut self) {
        self.phase = Phase::Idle;
        self.emit(SyncEvent::Connected(false));
        self.schedule_retry();
    }

    fn on_frame(&mut self, text: &str) {
        match normalize(text) {
            Ok(Some(update)) => {
                if self.store.apply(&update) {
                    metrics::record_frame(metrics::OUTCOME_APPLIED);
                    debug!(
                        match_id = %update.match_id,
                        fields = ?update.touched_fields(),
                        "update applied"
                    );
                } else {
                    metrics::record_frame(metrics::OUTCOME_UNKNOWN_MATCH);
                    debug!(match_id = %update.match_id, "update for unknown match dropped");
                }
            }
            Ok(None) => {
                metrics::record_frame(metrics::OUTCOME_IGNORED);
                trace!("frame carried no update");
            }
            Err(err) => {
                metrics::record_frame(metrics::OUTCOME_PARSE_ERROR);
                warn!(error = %err, "discarding malformed frame");
                self.emit(SyncEvent::Error(err.into()));
            }
        }
    }

    fn start_attempt(&mut self) {
        let connector = self.connector.clone();
        let endpoint = self.config.endpoint.clone();
        let limit = self.config.connect_timeout;
        let attempt = async move {
            tokio::time::timeout(limit, connector.connect(&endpoint))
                .await
                .unwrap_or_else(|_| Err(TransportError::TimedOut(limit)))
        }
        .boxed();
        self.phase = Phase::Connecting(attempt);
        self.set_state(ConnectionState::Connecting);
    }

    fn schedule_retry(&mut self) {
        let max = self.config.max_reconnect_attempts;
        if self.attempts >= max {
            error!(attempts = self.attempts, "reconnection attempts exhausted");
            self.phase = Phase::Idle;
            self.set_state(ConnectionState::FailedPermanently);
            self.emit(SyncEvent::Error(SyncError::PermanentFailure {
                attempts: self.attempts,
            }));
            return;
        }

        self.attempts += 1;
        let delay = self.config.backoff.delay(self.attempts);
        metrics::RECONNECT_ATTEMPTS.inc();
        info!(
            attempt = self.attempts,
            max,
            delay_ms = delay.as_millis() as u64,
            "scheduling reconnection"
        );
        self.phase = Phase::Waiting(Box::pin(tokio::time::sleep(delay)));
        self.set_state(ConnectionState::Reconnecting);
    }

    fn set_state(&mut self, next: ConnectionState) {
        let previous = std::mem::replace(&mut self.state, next);
        self.status.send_replace(SupervisorStatus {
            state: next,
            reconnect_attempts: self.attempts,
        });
        if previous != next {
            metrics::CONNECTION_TRANSITIONS
                .with_label_values(&[next.as_str()])
                .inc();
            debug!(from = %previous, to = %next, "connection state changed");
            self.emit(SyncEvent::StateChanged(next));
        }
    }

    fn emit(&self, event: SyncEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}
