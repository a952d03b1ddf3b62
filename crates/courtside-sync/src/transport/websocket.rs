use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};

use super::{Connector, Link, LinkEvent};
use crate::endpoint::Endpoint;
use crate::error::TransportError;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens the stream with `tokio-tungstenite`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Link, TransportError> {
        let url = endpoint.url();
        debug!(%url, "opening websocket");
        let (socket, response) = connect_async(url.as_str()).await?;
        debug!(%url, status = %response.status(), "websocket handshake complete");

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let pump = tokio::spawn(pump(socket, outbound_rx, inbound_tx));
        Ok(Link::new(outbound_tx, inbound_rx, Some(pump)))
    }
}

async fn pump(
    socket: Socket,
    mut outbound: mpsc::UnboundedReceiver<String>,
    inbound: mpsc::UnboundedSender<LinkEvent>,
) {
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            next = outbound.recv() => match next {
                Some(text) => {
                    if let Err(err) = sink.send(Message::Text(text)).await {
                        let _ = inbound.send(LinkEvent::Failed(err.to_string()));
                        return;
                    }
                }
                None => {
                    // Link closed locally.
                    let _ = sink.close().await;
                    return;
                }
            },
            message = stream.next() => {
                let event = match message {
                    Some(Ok(Message::Text(text))) => LinkEvent::Frame(text),
                    Some(Ok(Message::Binary(bytes))) => {
                        LinkEvent::Frame(String::from_utf8_lossy(&bytes).into_owned())
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let reason = frame
                            .map(|f| f.reason.into_owned())
                            .filter(|reason| !reason.is_empty());
                        let _ = inbound.send(LinkEvent::Closed(reason));
                        return;
                    }
                    Some(Ok(other)) => {
                        trace!(kind = ?other, "control frame");
                        continue;
                    }
                    Some(Err(err)) => {
                        let _ = inbound.send(LinkEvent::Failed(err.to_string()));
                        return;
                    }
                    None => {
                        let _ = inbound.send(LinkEvent::Closed(None));
                        return;
                    }
                };
                if inbound.send(event).is_err() {
                    return;
                }
            }
        }
    }
}
