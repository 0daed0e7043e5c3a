//! # Connection Module
//!
//! Reconnecting WebSocket client for the rosbridge endpoint.
//!
//! This module handles:
//! - Opening the socket without blocking the caller
//! - Exponential backoff with jitter between attempts
//! - Surfacing opened / closed / failed events to the owning service
//! - Graceful disconnect that cancels pending retries

pub mod retry;
pub mod transport;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use transport::{SocketSink, SocketSource, Transport};

/// Connection lifecycle events delivered to the owning service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Socket opened; the attempt budget has been reset
    Opened,

    /// Socket lost abnormally; reconnection continues in the background
    Closed { reason: String },

    /// Retries exhausted; no further attempts will be made
    Failed { reason: String },
}

/// Endpoint and retry bounds for one session
#[derive(Debug, Clone)]
pub struct ConnectSettings {
    pub url: String,
    pub max_retry_attempts: u32,
    pub max_retry_delay: Duration,
}

/// Owns the single socket of a session and drives connect / retry / disconnect
///
/// At most one retry timer and one in-flight dial exist at any time; a new
/// `connect()` while a link is alive is rejected rather than stacked.
pub struct ConnectionManager {
    transport: Arc<dyn Transport>,
    settings: ConnectSettings,
    events_tx: mpsc::UnboundedSender<ConnectionEvent>,
    connected: Arc<AtomicBool>,
    epoch: Arc<AtomicU64>,
    link: Option<Link>,
}

struct Link {
    outbound_tx: mpsc::UnboundedSender<String>,
    cancel_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ConnectionManager {
    /// Create a manager and the event stream its owner consumes
    pub fn new(
        transport: Arc<dyn Transport>,
        settings: ConnectSettings,
    ) -> (Self, mpsc::UnboundedReceiver<ConnectionEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        (
            Self {
                transport,
                settings,
                events_tx,
                connected: Arc::new(AtomicBool::new(false)),
                epoch: Arc::new(AtomicU64::new(0)),
                link: None,
            },
            events_rx,
        )
    }

    /// Whether a live socket currently exists
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Begin attempt #1 asynchronously; returns immediately
    ///
    /// Returns `false` without side effect if already connected or a
    /// connection attempt is in flight.
    pub fn connect(&mut self) -> bool {
        if let Some(link) = &self.link {
            if !link.task.is_finished() {
                debug!("connect ignored: link already active");
                return false;
            }
        }

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let worker = LinkWorker {
            transport: Arc::clone(&self.transport),
            settings: self.settings.clone(),
            events_tx: self.events_tx.clone(),
            connected: Arc::clone(&self.connected),
            epoch: Arc::clone(&self.epoch),
            link_epoch: self.epoch.load(Ordering::SeqCst),
        };
        let task = tokio::spawn(worker.run(outbound_rx, cancel_rx));

        self.link = Some(Link {
            outbound_tx,
            cancel_tx,
            task,
        });
        true
    }

    /// Hand one message to the live socket
    ///
    /// Returns `true` only if a live socket exists and accepted the write.
    /// `false` while disconnected is not an error; the caller decides
    /// whether that is data loss.
    pub fn send(&self, message: String) -> bool {
        if !self.connected.load(Ordering::SeqCst) {
            return false;
        }
        match &self.link {
            Some(link) => link.outbound_tx.send(message).is_ok(),
            None => false,
        }
    }

    /// Cancel any pending retry, close a live socket gracefully, reset the
    /// attempt count
    ///
    /// Idempotent; no events are delivered after this returns.
    pub fn disconnect(&mut self) {
        // Bump the epoch first so late callbacks from this link are dropped
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);

        if let Some(link) = self.link.take() {
            let _ = link.cancel_tx.send(true);
            debug!("link cancelled");
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Background task owning the socket and the retry loop
struct LinkWorker {
    transport: Arc<dyn Transport>,
    settings: ConnectSettings,
    events_tx: mpsc::UnboundedSender<ConnectionEvent>,
    connected: Arc<AtomicBool>,
    epoch: Arc<AtomicU64>,
    link_epoch: u64,
}

enum PumpExit {
    Cancelled,
    Lost(String),
}

impl LinkWorker {
    /// Deliver an event unless this link has been cancelled in the meantime
    fn emit(&self, event: ConnectionEvent) {
        if self.epoch.load(Ordering::SeqCst) != self.link_epoch {
            debug!("suppressing event from cancelled link");
            return;
        }
        let _ = self.events_tx.send(event);
    }

    async fn run(
        self,
        mut outbound_rx: mpsc::UnboundedReceiver<String>,
        mut cancel_rx: watch::Receiver<bool>,
    ) {
        let mut attempt: u32 = 0;
        let mut last_failure = String::new();

        loop {
            let dialed = tokio::select! {
                _ = cancel_rx.changed() => return,
                dialed = self.transport.connect(&self.settings.url) => dialed,
            };

            match dialed {
                Ok((mut sink, mut source)) => {
                    attempt = 0;
                    self.connected.store(true, Ordering::SeqCst);
                    info!("Connected to {}", self.settings.url);
                    self.emit(ConnectionEvent::Opened);

                    let exit = pump(&mut sink, &mut source, &mut outbound_rx, &mut cancel_rx).await;
                    self.connected.store(false, Ordering::SeqCst);

                    match exit {
                        PumpExit::Cancelled => {
                            // Flush writes queued before the cancel so a
                            // trailing withdraw still reaches the server
                            while let Ok(text) = outbound_rx.try_recv() {
                                if sink.send(text).await.is_err() {
                                    break;
                                }
                            }
                            sink.close().await;
                            return;
                        }
                        PumpExit::Lost(reason) => {
                            warn!("Connection lost: {}", reason);
                            self.emit(ConnectionEvent::Closed {
                                reason: reason.clone(),
                            });
                            last_failure = reason;
                        }
                    }
                }
                Err(e) => {
                    // DNS, refusal, timeout: all flavors take the same path
                    debug!("Connection attempt failed: {}", e);
                    last_failure = e.to_string();
                }
            }

            if attempt >= self.settings.max_retry_attempts {
                self.emit(ConnectionEvent::Failed {
                    reason: format!(
                        "giving up after {} retries, last failure: {}",
                        attempt, last_failure
                    ),
                });
                return;
            }

            let delay = retry::jittered_delay(attempt, self.settings.max_retry_delay);
            attempt += 1;
            debug!(
                "Retrying in {:?} (attempt {}/{})",
                delay, attempt, self.settings.max_retry_attempts
            );
            tokio::select! {
                _ = cancel_rx.changed() => return,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

/// Forward queued writes and watch for remote close on an open socket
async fn pump(
    sink: &mut Box<dyn SocketSink>,
    source: &mut Box<dyn SocketSource>,
    outbound_rx: &mut mpsc::UnboundedReceiver<String>,
    cancel_rx: &mut watch::Receiver<bool>,
) -> PumpExit {
    loop {
        tokio::select! {
            _ = cancel_rx.changed() => return PumpExit::Cancelled,
            reason = source.closed() => return PumpExit::Lost(reason),
            queued = outbound_rx.recv() => match queued {
                Some(text) => {
                    if let Err(e) = sink.send(text).await {
                        return PumpExit::Lost(e.to_string());
                    }
                }
                None => return PumpExit::Cancelled,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use transport::mocks::MockTransport;

    fn test_settings(max_retry_attempts: u32) -> ConnectSettings {
        ConnectSettings {
            url: "ws://127.0.0.1:9090".to_string(),
            max_retry_attempts,
            // Small delays keep retry tests fast
            max_retry_delay: Duration::from_millis(10),
        }
    }

    async fn next_event(
        events_rx: &mut mpsc::UnboundedReceiver<ConnectionEvent>,
    ) -> ConnectionEvent {
        tokio::time::timeout(Duration::from_secs(2), events_rx.recv())
            .await
            .expect("timed out waiting for connection event")
            .expect("event stream closed")
    }

    #[tokio::test]
    async fn test_connect_emits_opened() {
        let transport = MockTransport::new();
        let (mut manager, mut events_rx) =
            ConnectionManager::new(transport.clone(), test_settings(3));

        assert!(manager.connect());
        assert_eq!(next_event(&mut events_rx).await, ConnectionEvent::Opened);
        assert!(manager.is_connected());
        assert_eq!(transport.dials(), 1);
    }

    #[tokio::test]
    async fn test_connect_while_in_flight_is_rejected() {
        let transport = MockTransport::new();
        transport.fail_all_dials(true);
        let (mut manager, _events_rx) =
            ConnectionManager::new(transport.clone(), test_settings(50));

        assert!(manager.connect());
        assert!(!manager.connect());
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let transport = MockTransport::new();
        transport.fail_next_dials(2);
        let (mut manager, mut events_rx) =
            ConnectionManager::new(transport.clone(), test_settings(5));

        manager.connect();
        assert_eq!(next_event(&mut events_rx).await, ConnectionEvent::Opened);
        assert_eq!(transport.dials(), 3);
    }

    #[tokio::test]
    async fn test_retries_exhausted_emits_failed() {
        let transport = MockTransport::new();
        transport.fail_all_dials(true);
        let (mut manager, mut events_rx) =
            ConnectionManager::new(transport.clone(), test_settings(2));

        manager.connect();
        match next_event(&mut events_rx).await {
            ConnectionEvent::Failed { reason } => {
                assert!(reason.contains("giving up after 2 retries"));
                assert!(reason.contains("connection refused"));
            }
            other => panic!("expected Failed, got {:?}", other),
        }
        // Initial attempt plus two retries
        assert_eq!(transport.dials(), 3);
        assert!(!manager.is_connected());
    }

    #[tokio::test]
    async fn test_abnormal_close_emits_closed_and_reconnects() {
        let transport = MockTransport::new();
        let (mut manager, mut events_rx) =
            ConnectionManager::new(transport.clone(), test_settings(3));

        manager.connect();
        assert_eq!(next_event(&mut events_rx).await, ConnectionEvent::Opened);

        transport.close_remote("going away");
        match next_event(&mut events_rx).await {
            ConnectionEvent::Closed { reason } => assert_eq!(reason, "going away"),
            other => panic!("expected Closed, got {:?}", other),
        }

        // The link keeps retrying and reopens on its own
        assert_eq!(next_event(&mut events_rx).await, ConnectionEvent::Opened);
        assert_eq!(transport.dials(), 2);
    }

    #[tokio::test]
    async fn test_open_resets_attempt_count() {
        // With a budget of one retry, a second failure cycle would surface
        // Failed unless the successful open in between reset the counter
        let transport = MockTransport::new();
        transport.fail_next_dials(1);
        let (mut manager, mut events_rx) =
            ConnectionManager::new(transport.clone(), test_settings(1));

        manager.connect();
        assert_eq!(next_event(&mut events_rx).await, ConnectionEvent::Opened);

        transport.close_remote("link flap");
        match next_event(&mut events_rx).await {
            ConnectionEvent::Closed { .. } => {}
            other => panic!("expected Closed, got {:?}", other),
        }
        assert_eq!(next_event(&mut events_rx).await, ConnectionEvent::Opened);
    }

    #[tokio::test]
    async fn test_send_while_disconnected_returns_false() {
        let transport = MockTransport::new();
        let (manager, _events_rx) = ConnectionManager::new(transport, test_settings(3));

        assert!(!manager.send("lost".to_string()));
    }

    #[tokio::test]
    async fn test_send_reaches_live_socket() {
        let transport = MockTransport::new();
        let (mut manager, mut events_rx) =
            ConnectionManager::new(transport.clone(), test_settings(3));

        manager.connect();
        assert_eq!(next_event(&mut events_rx).await, ConnectionEvent::Opened);

        assert!(manager.send("{\"op\":\"advertise\"}".to_string()));

        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while transport.sent_messages().is_empty() {
            assert!(tokio::time::Instant::now() < deadline, "message never written");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(transport.sent_messages(), vec!["{\"op\":\"advertise\"}"]);
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let transport = MockTransport::new();
        let (mut manager, mut events_rx) =
            ConnectionManager::new(transport.clone(), test_settings(3));

        manager.connect();
        assert_eq!(next_event(&mut events_rx).await, ConnectionEvent::Opened);

        manager.disconnect();
        manager.disconnect();
        assert!(!manager.is_connected());

        // Give the link task time to wind down; the socket closes at most once
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(transport.graceful_closes() <= 1);
        assert!(events_rx.try_recv().is_err(), "no events after disconnect");
    }

    #[tokio::test]
    async fn test_no_events_after_disconnect_during_retries() {
        let transport = MockTransport::new();
        transport.fail_all_dials(true);
        let (mut manager, mut events_rx) =
            ConnectionManager::new(transport.clone(), test_settings(2));

        manager.connect();
        manager.disconnect();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(events_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_connect_after_disconnect_starts_fresh() {
        let transport = MockTransport::new();
        let (mut manager, mut events_rx) =
            ConnectionManager::new(transport.clone(), test_settings(3));

        manager.connect();
        assert_eq!(next_event(&mut events_rx).await, ConnectionEvent::Opened);
        manager.disconnect();

        assert!(manager.connect());
        assert_eq!(next_event(&mut events_rx).await, ConnectionEvent::Opened);
    }

    #[tokio::test]
    async fn test_write_failure_routes_to_retry_path() {
        let transport = MockTransport::new();
        let (mut manager, mut events_rx) =
            ConnectionManager::new(transport.clone(), test_settings(3));

        manager.connect();
        assert_eq!(next_event(&mut events_rx).await, ConnectionEvent::Opened);

        transport.fail_writes(true);
        assert!(manager.send("doomed".to_string()));

        match next_event(&mut events_rx).await {
            ConnectionEvent::Closed { reason } => assert!(reason.contains("write failed")),
            other => panic!("expected Closed, got {:?}", other),
        }

        // Reconnection succeeds once writes recover
        transport.fail_writes(false);
        assert_eq!(next_event(&mut events_rx).await, ConnectionEvent::Opened);
    }
}
