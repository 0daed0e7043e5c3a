//! Trait abstraction for the WebSocket transport to enable testing

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::trace;

use crate::error::{NavsatBridgeError, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Split socket halves: writer and close-watcher
pub type SocketPair = (Box<dyn SocketSink>, Box<dyn SocketSource>);

/// Dials the configured endpoint
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a socket; errors carry a human-readable reason for the retry log
    async fn connect(&self, url: &str) -> Result<SocketPair>;
}

/// Write half of an open socket
#[async_trait]
pub trait SocketSink: Send {
    /// Send one text frame
    async fn send(&mut self, text: String) -> Result<()>;

    /// Close the socket gracefully
    async fn close(&mut self);
}

/// Read half of an open socket
#[async_trait]
pub trait SocketSource: Send {
    /// Resolves once the peer closes the socket or the transport fails,
    /// with a human-readable reason
    async fn closed(&mut self) -> String;
}

/// Production transport backed by tokio-tungstenite
pub struct WsTransport;

impl WsTransport {
    pub fn new() -> Self {
        Self
    }
}

impl Default for WsTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn connect(&self, url: &str) -> Result<SocketPair> {
        let (stream, _response) = connect_async(url)
            .await
            .map_err(|e| NavsatBridgeError::Transport(format!("failed to open {}: {}", url, e)))?;

        let (sink, source) = stream.split();
        Ok((
            Box::new(WsSink { inner: sink }),
            Box::new(WsSource { inner: source }),
        ))
    }
}

struct WsSink {
    inner: SplitSink<WsStream, Message>,
}

#[async_trait]
impl SocketSink for WsSink {
    async fn send(&mut self, text: String) -> Result<()> {
        self.inner
            .send(Message::Text(text))
            .await
            .map_err(|e| NavsatBridgeError::Transport(format!("write failed: {}", e)))
    }

    async fn close(&mut self) {
        // Failures here mean the peer is already gone
        let _ = self.inner.send(Message::Close(None)).await;
        let _ = self.inner.close().await;
    }
}

struct WsSource {
    inner: SplitStream<WsStream>,
}

#[async_trait]
impl SocketSource for WsSource {
    async fn closed(&mut self) -> String {
        while let Some(item) = self.inner.next().await {
            match item {
                Ok(Message::Close(Some(frame))) => {
                    return format!("closed by server: {} ({})", frame.code, frame.reason);
                }
                Ok(Message::Close(None)) => return "closed by server".to_string(),
                // Inbound data is out of scope for this client
                Ok(other) => trace!("ignoring inbound frame ({} bytes)", other.len()),
                Err(e) => return format!("transport error: {}", e),
            }
        }
        "connection closed by server".to_string()
    }
}
