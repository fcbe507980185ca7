//! Duplex text-frame transports. The executor only sees a pair of channels;
//! how frames travel is up to the [`Connector`].

use crate::error::ExecutorError;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

/// Both halves of an open connection. Dropping `outbound` closes the
/// connection; `inbound` yields `None` once the peer is gone.
pub struct Duplex {
    pub outbound: mpsc::UnboundedSender<String>,
    pub inbound: mpsc::UnboundedReceiver<String>,
}

#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self, url: &str) -> Result<Duplex, ExecutorError>;
}

/// Production transport over a WebSocket.
#[derive(Debug, Default, Clone, Copy)]
pub struct WebSocketConnector;

#[async_trait]
impl Connector for WebSocketConnector {
    async fn open(&self, url: &str) -> Result<Duplex, ExecutorError> {
        let (stream, _response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| ExecutorError::Connection(e.to_string()))?;
        let (mut sink, mut source) = stream.split();

        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
        let (in_tx, in_rx) = mpsc::unbounded_channel::<String>();

        tokio::spawn(async move {
            while let Some(text) = out_rx.recv().await {
                if let Err(e) = sink.send(Message::Text(text)).await {
                    debug!("WebSocket write failed: {}", e);
                    break;
                }
            }
            let _ = sink.close().await;
        });

        tokio::spawn(async move {
            while let Some(message) = source.next().await {
                match message {
                    Ok(Message::Text(text)) => {
                        if in_tx.send(text).is_err() {
                            break;
                        }
                    }
                    Ok(Message::Close(frame)) => {
                        debug!("WebSocket closed by peer: {:?}", frame);
                        break;
                    }
                    Ok(Message::Binary(_)) => warn!("Ignoring binary frame"),
                    Ok(_) => {}
                    Err(e) => {
                        warn!("WebSocket error: {}", e);
                        break;
                    }
                }
            }
        });

        Ok(Duplex {
            outbound: out_tx,
            inbound: in_rx,
        })
    }
}

/// Far side of an in-memory connection, handed to whoever plays the server.
pub struct ServerEnd {
    pub url: String,
    incoming: mpsc::UnboundedReceiver<String>,
    outgoing: mpsc::UnboundedSender<String>,
}

impl ServerEnd {
    /// Next frame the client sent, parsed as JSON. Unparseable frames are
    /// returned as JSON strings.
    pub async fn recv(&mut self) -> Option<Value> {
        let text = self.incoming.recv().await?;
        Some(serde_json::from_str(&text).unwrap_or(Value::String(text)))
    }

    pub fn send(&self, frame: &Value) -> bool {
        self.outgoing.send(frame.to_string()).is_ok()
    }

    pub fn send_raw(&self, text: &str) -> bool {
        self.outgoing.send(text.to_string()).is_ok()
    }

    /// Drop the connection from the server side.
    pub fn close(self) {}
}

/// In-process transport. Every `open` delivers a [`ServerEnd`] on the
/// backend channel returned by [`MemoryConnector::new`].
pub struct MemoryConnector {
    backend: mpsc::UnboundedSender<ServerEnd>,
}

impl MemoryConnector {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ServerEnd>) {
        let (backend, accepted) = mpsc::unbounded_channel();
        (Self { backend }, accepted)
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn open(&self, url: &str) -> Result<Duplex, ExecutorError> {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();

        let server = ServerEnd {
            url: url.to_string(),
            incoming: out_rx,
            outgoing: in_tx,
        };
        self.backend
            .send(server)
            .map_err(|_| ExecutorError::Connection("no backend listening".into()))?;

        Ok(Duplex {
            outbound: out_tx,
            inbound: in_rx,
        })
    }
}
