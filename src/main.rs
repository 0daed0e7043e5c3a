//! # NavSat Bridge
//!
//! Stream geolocation fixes from a mobile sensor source to a rosbridge server.
//!
//! The binary wires the publishing session to its external collaborators:
//! the sensor source is newline-delimited JSON on stdin, the status surface
//! is the log. Publishing starts automatically once the first connection is
//! established and resumes across reconnects.
//!
//! # Sensor input format
//!
//! ```text
//! {"kind":"fix","latitude":52.52,"longitude":13.405,"altitude":34.0,"accuracy":5.0}
//! {"kind":"battery","percent":80}
//! ```
//!
//! A fix without a capture timestamp is stamped on arrival.

use anyhow::Result;
use serde::Deserialize;
use std::sync::Arc;
use tokio::io::AsyncBufReadExt;
use tracing::{info, warn};

use navsat_bridge::config::Config;
use navsat_bridge::connection::transport::WsTransport;
use navsat_bridge::fix::PositionFix;
use navsat_bridge::service::state::ServiceState;
use navsat_bridge::service::wake::NoopWakeLock;
use navsat_bridge::service::BridgeService;

/// One line of sensor input from the external collaborator
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum SensorReading {
    Fix(PositionFix),
    Battery { percent: u8 },
}

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/default.toml".to_string());
    let config = Config::load(&config_path)?;

    // File logging when a directory is configured, console otherwise
    let env_filter = || {
        tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::INFO.into())
    };
    let _log_guard = if config.log.dir.is_empty() {
        tracing_subscriber::fmt().with_env_filter(env_filter()).init();
        None
    } else {
        let appender = tracing_appender::rolling::daily(&config.log.dir, "navsat-bridge.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        tracing_subscriber::fmt()
            .with_env_filter(env_filter())
            .with_writer(writer)
            .with_ansi(false)
            .init();
        Some(guard)
    };

    info!("NavSat Bridge v{} starting...", env!("CARGO_PKG_VERSION"));
    info!("Publishing {} to {}", config.server.topic, config.server.url);
    info!("Press Ctrl+C to exit");

    let service = BridgeService::spawn(
        config.session(),
        Arc::new(WsTransport::new()),
        Arc::new(NoopWakeLock),
    );
    let mut status_rx = service.status();
    service.start();

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();
    let mut stdin_open = true;
    let mut publishing_requested = false;

    loop {
        tokio::select! {
            changed = status_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = status_rx.borrow().clone();
                info!(
                    "Status: {} ({}), {} messages sent",
                    snapshot.state.label(),
                    snapshot.connection,
                    snapshot.sent_messages
                );

                if snapshot.state == ServiceState::Connected && !publishing_requested {
                    publishing_requested = true;
                    service.start_publishing();
                }
                if snapshot.state.is_terminal() {
                    break;
                }
            }

            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => handle_sensor_line(&service, &line),
                Ok(None) => {
                    info!("Sensor input closed, continuing on last known fix");
                    stdin_open = false;
                }
                Err(e) => {
                    warn!("Failed to read sensor input: {}", e);
                    stdin_open = false;
                }
            },

            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                service.stop();
            }
        }
    }

    let final_count = status_rx.borrow().sent_messages;
    service.join().await;
    info!("Total messages sent: {}", final_count);

    Ok(())
}

/// Parse one stdin line and feed it to the session
fn handle_sensor_line(service: &BridgeService, line: &str) {
    if line.trim().is_empty() {
        return;
    }
    match serde_json::from_str::<SensorReading>(line) {
        Ok(SensorReading::Fix(mut fix)) => {
            if fix.timestamp_ms == 0 {
                fix.timestamp_ms = chrono::Utc::now().timestamp_millis();
            }
            service.update_fix(fix);
        }
        Ok(SensorReading::Battery { percent }) => service.observe_battery(percent),
        Err(e) => warn!("Ignoring malformed sensor line: {}", e),
    }
}
