//! Connection seam between the supervisor and the wire.
//!
//! A [`Connector`] opens one [`Link`] per attempt. The link is a pair of
//! channels fed by a pump task; the supervisor never touches the socket.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::endpoint::Endpoint;
use crate::error::TransportError;

pub mod mock;
pub mod websocket;

pub use websocket::WebSocketConnector;

/// What the remote side did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// One inbound text frame.
    Frame(String),
    /// The connection broke; no further events follow.
    Failed(String),
    /// The remote closed the connection, with its reason if it gave one.
    Closed(Option<String>),
}

#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Link, TransportError>;
}

/// An open connection. Dropping it tears the connection down.
#[derive(Debug)]
pub struct Link {
    outbound: mpsc::UnboundedSender<String>,
    inbound: mpsc::UnboundedReceiver<LinkEvent>,
    pump: Option<JoinHandle<()>>,
}

impl Link {
    pub fn new(
        outbound: mpsc::UnboundedSender<String>,
        inbound: mpsc::UnboundedReceiver<LinkEvent>,
        pump: Option<JoinHandle<()>>,
    ) -> Self {
        Self {
            outbound,
            inbound,
            pump,
        }
    }

    /// Queues one outbound text frame. Returns `false` once the pump is gone.
    pub fn send(&self, text: String) -> bool {
        self.outbound.send(text).is_ok()
    }

    /// Next event from the remote side. `None` means the pump ended without
    /// reporting why.
    pub async fn recv(&mut self) -> Option<LinkEvent> {
        self.inbound.recv().await
    }

    /// Graceful close: the pump flushes a close frame and exits on its own.
    pub fn close(mut self) {
        // Detach instead of aborting; dropping `outbound` tells the pump to close.
        self.pump.take();
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}
