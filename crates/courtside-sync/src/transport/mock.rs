//! In-memory connector for tests. Each connection attempt consumes the next
//! scripted outcome; accepted attempts hand a [`MockPeer`] to the test so it
//! can play the server side.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{mpsc, Mutex as AsyncMutex};

use super::{Connector, Link, LinkEvent};
use crate::endpoint::Endpoint;
use crate::error::TransportError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOutcome {
    Accept,
    Refuse(String),
    /// The attempt never resolves.
    Hang,
}

pub struct MockConnector {
    script: Mutex<VecDeque<MockOutcome>>,
    fallback: MockOutcome,
    attempts: AtomicUsize,
    urls: Mutex<Vec<String>>,
    peers_tx: mpsc::UnboundedSender<MockPeer>,
    peers_rx: AsyncMutex<mpsc::UnboundedReceiver<MockPeer>>,
}

impl MockConnector {
    /// Connector that refuses every attempt not covered by a script.
    pub fn new() -> Self {
        Self::with_fallback(MockOutcome::Refuse("connection refused".into()))
    }

    pub fn with_fallback(fallback: MockOutcome) -> Self {
        let (peers_tx, peers_rx) = mpsc::unbounded_channel();
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback,
            attempts: AtomicUsize::new(0),
            urls: Mutex::new(Vec::new()),
            peers_tx,
            peers_rx: AsyncMutex::new(peers_rx),
        }
    }

    pub fn script(self, outcomes: impl IntoIterator<Item = MockOutcome>) -> Self {
        self.push(outcomes);
        self
    }

    pub fn push(&self, outcomes: impl IntoIterator<Item = MockOutcome>) {
        self.script.lock().extend(outcomes);
    }

    /// Connection attempts made so far.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().clone()
    }

    /// Server side of the next accepted link, in acceptance order.
    pub async fn next_peer(&self) -> Option<MockPeer> {
        self.peers_rx.lock().await.recv().await
    }
}

impl Default for MockConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Link, TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().push(endpoint.url());
        let outcome = self
            .script
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        match outcome {
            MockOutcome::Accept => {
                let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
                let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
                let _ = self.peers_tx.send(MockPeer {
                    to_client: inbound_tx,
                    from_client: outbound_rx,
                });
                Ok(Link::new(outbound_tx, inbound_rx, None))
            }
            MockOutcome::Refuse(reason) => Err(TransportError::Refused(reason)),
            MockOutcome::Hang => std::future::pending().await,
        }
    }
}

/// The server end of one accepted mock link.
pub struct MockPeer {
    to_client: mpsc::UnboundedSender<LinkEvent>,
    from_client: mpsc::UnboundedReceiver<String>,
}

impl MockPeer {
    pub fn push_frame(&self, text: impl Into<String>) -> bool {
        self.to_client.send(LinkEvent::Frame(text.into())).is_ok()
    }

    pub fn push_json<T: Serialize + ?Sized>(&self, payload: &T) -> bool {
        match serde_json::to_string(payload) {
            Ok(text) => self.push_frame(text),
            Err(_) => false,
        }
    }

    pub fn close(&self, reason: Option<&str>) -> bool {
        self.to_client
            .send(LinkEvent::Closed(reason.map(str::to_owned)))
            .is_ok()
    }

    pub fn fail(&self, reason: impl Into<String>) -> bool {
        self.to_client.send(LinkEvent::Failed(reason.into())).is_ok()
    }

    /// Next frame the client sent, or `None` once the client dropped the link.
    pub async fn next_sent(&mut self) -> Option<String> {
        self.from_client.recv().await
    }

    /// Frames the client has sent that were not read yet.
    pub fn drain_sent(&mut self) -> Vec<String> {
        let mut sent = Vec::new();
        while let Ok(text) = self.from_client.try_recv() {
            sent.push(text);
        }
        sent
    }

    /// Whether the client side has dropped the link.
    pub fn is_released(&self) -> bool {
        self.to_client.is_closed()
    }
}
