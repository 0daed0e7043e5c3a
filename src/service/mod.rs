//! # Service Module
//!
//! The publishing session: composes the connection manager, publish
//! scheduler and battery guard behind a single-writer event loop.
//!
//! This module handles:
//! - External commands (start / stop / start-publishing / stop-publishing)
//! - Connection and battery events
//! - Executing state-machine effects against the owned components
//! - Publishing status snapshots toward the UI collaborator

pub mod battery;
pub mod scheduler;
pub mod state;
pub mod status;
pub mod wake;

use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::SessionConfig;
use crate::connection::transport::Transport;
use crate::connection::{ConnectSettings, ConnectionEvent, ConnectionManager};
use crate::fix::{PositionFix, SharedFix};
use crate::rosbridge::encoder;
use battery::{BatteryEvent, BatteryGuard};
use scheduler::PublishScheduler;
use state::{Effect, Event, ServiceState};
use status::StatusSnapshot;
use wake::WakeLock;

/// External commands accepted by a running session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
    StartPublishing,
    StopPublishing,
    BatteryObservation(u8),
}

/// Handle to one publishing session
///
/// Constructs its components at creation and tears them down when the
/// session reaches `Destroyed`; a new session requires a new instance.
pub struct BridgeService {
    cmd_tx: mpsc::UnboundedSender<Command>,
    status_rx: watch::Receiver<StatusSnapshot>,
    fix: SharedFix,
    task: JoinHandle<()>,
}

impl BridgeService {
    /// Create the session and spawn its event loop
    pub fn spawn(
        config: SessionConfig,
        transport: Arc<dyn Transport>,
        wake: Arc<dyn WakeLock>,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(StatusSnapshot::initial());
        let (tick_tx, tick_rx) = mpsc::unbounded_channel();
        let fix = SharedFix::new();

        let settings = ConnectSettings {
            url: config.url.clone(),
            max_retry_attempts: config.max_retry_attempts,
            max_retry_delay: config.max_retry_delay,
        };
        let (connection, conn_rx) = ConnectionManager::new(transport, settings);

        let runtime = SessionRuntime {
            battery: BatteryGuard::new(
                config.battery_warning_percent,
                config.battery_shutdown_percent,
            ),
            config,
            state: ServiceState::Initialized,
            connection,
            scheduler: PublishScheduler::new(),
            wake,
            wake_held: false,
            fix: fix.clone(),
            tick_tx,
            status_tx,
            snapshot: StatusSnapshot::initial(),
            resume_publishing: false,
        };
        let task = tokio::spawn(runtime.run(cmd_rx, conn_rx, tick_rx));

        Self {
            cmd_tx,
            status_rx,
            fix,
            task,
        }
    }

    /// Begin the session: acquire the wake hold and connect
    pub fn start(&self) {
        let _ = self.cmd_tx.send(Command::Start);
    }

    /// Stop the session and release all resources
    pub fn stop(&self) {
        let _ = self.cmd_tx.send(Command::Stop);
    }

    /// Announce the topic and begin periodic publishing
    pub fn start_publishing(&self) {
        let _ = self.cmd_tx.send(Command::StartPublishing);
    }

    /// Stop periodic publishing and withdraw the topic
    pub fn stop_publishing(&self) {
        let _ = self.cmd_tx.send(Command::StopPublishing);
    }

    /// Feed the latest position sample from the external sensor source
    pub fn update_fix(&self, fix: PositionFix) {
        self.fix.update(fix);
    }

    /// Feed one battery sample (0-100)
    pub fn observe_battery(&self, percent: u8) {
        let _ = self.cmd_tx.send(Command::BatteryObservation(percent));
    }

    /// Subscribe to status snapshots
    pub fn status(&self) -> watch::Receiver<StatusSnapshot> {
        self.status_rx.clone()
    }

    /// Wait for the session loop to finish
    pub async fn join(self) {
        let _ = self.task.await;
    }
}

/// The single writer of the session: all transitions run here
struct SessionRuntime {
    config: SessionConfig,
    state: ServiceState,
    connection: ConnectionManager,
    scheduler: PublishScheduler,
    battery: BatteryGuard,
    wake: Arc<dyn WakeLock>,
    wake_held: bool,
    fix: SharedFix,
    tick_tx: mpsc::UnboundedSender<PositionFix>,
    status_tx: watch::Sender<StatusSnapshot>,
    snapshot: StatusSnapshot,
    resume_publishing: bool,
}

impl SessionRuntime {
    async fn run(
        mut self,
        mut cmd_rx: mpsc::UnboundedReceiver<Command>,
        mut conn_rx: mpsc::UnboundedReceiver<ConnectionEvent>,
        mut tick_rx: mpsc::UnboundedReceiver<PositionFix>,
    ) {
        loop {
            tokio::select! {
                command = cmd_rx.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => {
                        // Owner dropped the handle: treat as a stop command
                        self.handle_command(Command::Stop);
                        break;
                    }
                },
                Some(event) = conn_rx.recv() => self.handle_connection_event(event),
                Some(fix) = tick_rx.recv() => self.handle_publish_tick(fix),
            }

            if self.state.is_terminal() {
                break;
            }
        }
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Start => self.handle_start(),
            Command::StartPublishing => self.handle_start_publishing(),
            Command::StopPublishing => self.handle_stop_publishing(),
            Command::Stop => self.handle_stop(),
            Command::BatteryObservation(level) => self.handle_battery(level),
        }
    }

    fn handle_start(&mut self) {
        self.apply(Event::StartRequested);
        if self.state != ServiceState::Starting {
            return;
        }

        match self.wake.acquire() {
            Ok(()) => {
                self.wake_held = true;
                self.apply(Event::StartupComplete);
            }
            Err(e) => {
                let reason = e.to_string();
                error!("Failed to acquire wake lock: {}", reason);
                self.set_connection_status(&reason);
                self.apply(Event::StartupFailed(reason));
            }
        }
    }

    fn handle_start_publishing(&mut self) {
        if self.state != ServiceState::Connected {
            warn!("start-publishing ignored in state {}", self.state);
            return;
        }
        self.apply(Event::StartPublishingRequested);
        self.apply(Event::AdvertiseSent);
    }

    fn handle_stop_publishing(&mut self) {
        if self.state != ServiceState::Publishing {
            warn!("stop-publishing ignored in state {}", self.state);
            return;
        }
        self.apply(Event::StopPublishingRequested);
        self.apply(Event::UnadvertiseSent);
    }

    fn handle_stop(&mut self) {
        // Leave the protocol clean: the withdraw must trail the publishes
        if self.state == ServiceState::Publishing {
            self.apply(Event::StopPublishingRequested);
            self.apply(Event::UnadvertiseSent);
        }
        self.apply(Event::StopRequested);
    }

    fn handle_battery(&mut self, level: u8) {
        let events = self.battery.observe(level);
        self.snapshot.battery_percent = Some(level);
        self.snapshot.battery_low = self.battery.is_low();
        self.push_status();

        for event in events {
            match event {
                BatteryEvent::Warning(level) => {
                    warn!("Battery low: {}%", level);
                }
                BatteryEvent::Critical(level) => {
                    warn!("Battery critically low ({}%), stopping session", level);
                    self.snapshot.battery_critical = true;
                    self.push_status();
                    if self.state != ServiceState::Initialized && !self.state.is_terminal() {
                        self.handle_stop();
                    }
                }
            }
        }
    }

    fn handle_connection_event(&mut self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Opened => {
                self.set_connection_status("Connected");
                self.apply(Event::SocketOpened);
                if self.state == ServiceState::Connected && self.resume_publishing {
                    self.resume_publishing = false;
                    info!("Resuming publishing after reconnect");
                    self.handle_start_publishing();
                }
            }
            ConnectionEvent::Closed { reason } => {
                self.set_connection_status(&format!("Connection lost: {}", reason));
                if matches!(
                    self.state,
                    ServiceState::Advertising | ServiceState::Publishing
                ) {
                    self.resume_publishing = true;
                }
                self.apply(Event::SocketLost(reason));
            }
            ConnectionEvent::Failed { reason } => {
                error!("Connection failed: {}", reason);
                self.set_connection_status(&reason);
                self.apply(Event::RetriesExhausted(reason));
            }
        }
    }

    fn handle_publish_tick(&mut self, fix: PositionFix) {
        if self.state != ServiceState::Publishing {
            // Tick queued behind a stop; the scheduler is already gone
            debug!("dropping publish tick in state {}", self.state);
            return;
        }

        match encoder::publish(&self.config.topic, &self.config.frame_id, &fix) {
            Ok(message) => {
                if self.connection.send(message) {
                    self.snapshot.sent_messages += 1;
                    self.snapshot.last_sent_ms = Some(chrono::Utc::now().timestamp_millis());
                    self.snapshot.last_fix = Some(fix);
                    self.push_status();
                } else {
                    // Single unsent fix; there is no outbound queue
                    warn!("Socket not connected, dropping position fix");
                }
            }
            Err(e) => error!("Failed to encode position fix: {}", e),
        }
    }

    /// Run one event through the transition function and execute its effects
    fn apply(&mut self, event: Event) {
        let transition = state::transition(self.state, &event);

        if transition.next != self.state {
            self.state = transition.next;
            info!("Service state: {}", self.state.label());
            self.snapshot.state = self.state;
            self.snapshot.state_label = self.state.label();
            self.push_status();
        }

        for effect in transition.effects {
            self.run_effect(effect);
        }
    }

    fn run_effect(&mut self, effect: Effect) {
        match effect {
            Effect::Connect => {
                self.set_connection_status(&format!("Connecting to {}", self.config.url));
                self.connection.connect();
            }
            Effect::SendAdvertise => match encoder::advertise(&self.config.topic) {
                Ok(message) => {
                    if !self.connection.send(message) {
                        warn!("Socket not connected, announce deferred to reconnect");
                    }
                }
                Err(e) => error!("Failed to encode announce: {}", e),
            },
            Effect::StartScheduler => {
                self.scheduler.start(
                    self.config.publish_interval,
                    Arc::new(self.fix.clone()),
                    self.tick_tx.clone(),
                );
            }
            Effect::StopScheduler => self.scheduler.stop(),
            Effect::SendUnadvertise => match encoder::unadvertise(&self.config.topic) {
                Ok(message) => {
                    if !self.connection.send(message) {
                        warn!("Socket not connected, withdraw dropped");
                    }
                }
                Err(e) => error!("Failed to encode withdraw: {}", e),
            },
            Effect::TeardownSession => {
                self.scheduler.stop();
                self.connection.disconnect();
                if self.wake_held {
                    self.wake.release();
                    self.wake_held = false;
                }
                self.set_connection_status(self.state.label());
            }
        }
    }

    fn set_connection_status(&mut self, text: &str) {
        self.snapshot.connection = text.to_string();
        self.push_status();
    }

    fn push_status(&self) {
        let _ = self.status_tx.send(self.snapshot.clone());
    }
}
