//! # NavSat Test Server
//!
//! Local WebSocket sink for smoke-testing the bridge without a real
//! rosbridge server: accepts connections, logs every message, and extracts
//! the GPS fields from publish operations.

use anyhow::Result;
use futures_util::StreamExt;
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "0.0.0.0:9090".to_string());
    let listener = TcpListener::bind(&addr).await?;
    info!("Test server listening on {}", addr);
    info!("Point the bridge at ws://<this-host>:{}", addr.rsplit(':').next().unwrap_or("9090"));
    info!("Press Ctrl+C to exit");

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    tokio::spawn(handle_client(stream, peer));
                }
                Err(e) => error!("Failed to accept connection: {}", e),
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    Ok(())
}

/// Handle one bridge connection until it closes
async fn handle_client(stream: TcpStream, peer: SocketAddr) {
    let mut socket = match accept_async(stream).await {
        Ok(socket) => socket,
        Err(e) => {
            warn!("WebSocket handshake with {} failed: {}", peer, e);
            return;
        }
    };
    info!("New connection from {}", peer);

    let mut message_count: u64 = 0;
    while let Some(item) = socket.next().await {
        match item {
            Ok(Message::Text(text)) => {
                message_count += 1;
                log_message(peer, message_count, &text);
            }
            Ok(Message::Close(_)) => {
                info!("Client {} disconnected", peer);
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("Error receiving from {}: {}", peer, e);
                break;
            }
        }
    }

    info!("Connection from {} closed after {} messages", peer, message_count);
}

/// Log one message, pretty-printing GPS fields from publish operations
fn log_message(peer: SocketAddr, count: u64, text: &str) {
    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(value) => {
            info!("Message #{} from {}: {}", count, peer, value);

            if value["op"] == "publish" {
                let msg = &value["msg"];
                if msg["latitude"].is_number() && msg["longitude"].is_number() {
                    info!(
                        "  GPS fix on {}: lat {} lon {} alt {} m",
                        value["topic"], msg["latitude"], msg["longitude"], msg["altitude"]
                    );
                }
            }
        }
        Err(_) => info!("Message #{} from {} (raw): {}", count, peer, text),
    }
}
