//! # Service State Machine
//!
//! The session lifecycle as an explicit transition function: every event
//! maps the current state to a next state plus a list of effects for the
//! service loop to execute. Keeping transitions pure makes the lifecycle
//! auditable and testable without sockets or timers.

use serde::Serialize;
use std::fmt;

/// Lifecycle state of one publishing session
///
/// `Error` and `Destroyed` are terminal; leaving them requires a new
/// session object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ServiceState {
    Initialized,
    Starting,
    Connecting,
    Connected,
    Advertising,
    Publishing,
    Unadvertising,
    Error,
    Destroyed,
}

impl ServiceState {
    /// Human-readable label for the status observer
    pub fn label(&self) -> &'static str {
        match self {
            ServiceState::Initialized => "Initialized",
            ServiceState::Starting => "Starting up",
            ServiceState::Connecting => "Connecting to server",
            ServiceState::Connected => "Connected",
            ServiceState::Advertising => "Announcing topic",
            ServiceState::Publishing => "Publishing position",
            ServiceState::Unadvertising => "Withdrawing topic",
            ServiceState::Error => "Stopped with error",
            ServiceState::Destroyed => "Stopped",
        }
    }

    /// No transition leaves a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, ServiceState::Error | ServiceState::Destroyed)
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Inputs to the state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// External start command
    StartRequested,
    /// Wake hold acquired, startup finished
    StartupComplete,
    /// Wake hold or another required resource unavailable
    StartupFailed(String),
    /// Socket opened
    SocketOpened,
    /// Socket lost abnormally while in use
    SocketLost(String),
    /// Connection retries exhausted
    RetriesExhausted(String),
    /// External start-publishing command
    StartPublishingRequested,
    /// Announce handed to the connection
    AdvertiseSent,
    /// External stop-publishing command
    StopPublishingRequested,
    /// Withdraw handed to the connection
    UnadvertiseSent,
    /// External stop command
    StopRequested,
}

/// Side effects the service loop executes after a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Begin the first connection attempt
    Connect,
    /// Encode and send the announce message
    SendAdvertise,
    /// Start the publish scheduler
    StartScheduler,
    /// Stop the publish scheduler
    StopScheduler,
    /// Encode and send the withdraw message
    SendUnadvertise,
    /// Release socket, scheduler and wake hold
    TeardownSession,
}

/// Result of applying one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub next: ServiceState,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn to(next: ServiceState, effects: Vec<Effect>) -> Self {
        Self { next, effects }
    }

    fn stay(current: ServiceState) -> Self {
        Self {
            next: current,
            effects: Vec::new(),
        }
    }
}

/// Apply one event to the current state
///
/// Unexpected events leave the state unchanged with no effects; terminal
/// states ignore everything.
pub fn transition(current: ServiceState, event: &Event) -> Transition {
    use Effect::*;
    use ServiceState::*;

    if current.is_terminal() {
        return Transition::stay(current);
    }

    match (current, event) {
        (Initialized, Event::StartRequested) => Transition::to(Starting, vec![]),

        (Starting, Event::StartupComplete) => Transition::to(Connecting, vec![Connect]),
        (Starting, Event::StartupFailed(_)) => Transition::to(Error, vec![TeardownSession]),

        (Connecting, Event::SocketOpened) => Transition::to(Connected, vec![]),
        (Connecting, Event::RetriesExhausted(_)) => Transition::to(Error, vec![TeardownSession]),

        (Connected, Event::StartPublishingRequested) => {
            Transition::to(Advertising, vec![SendAdvertise])
        }
        (Advertising, Event::AdvertiseSent) => Transition::to(Publishing, vec![StartScheduler]),

        (Publishing, Event::StopPublishingRequested) => {
            Transition::to(Unadvertising, vec![StopScheduler, SendUnadvertise])
        }
        (Unadvertising, Event::UnadvertiseSent) => Transition::to(Connected, vec![]),

        // Socket loss knocks any in-use state back to Connecting; the
        // connection keeps retrying on its own
        (Connected, Event::SocketLost(_)) => Transition::to(Connecting, vec![]),
        (Advertising | Publishing, Event::SocketLost(_)) => {
            Transition::to(Connecting, vec![StopScheduler])
        }

        (_, Event::StopRequested) => Transition::to(Destroyed, vec![TeardownSession]),

        _ => Transition::stay(current),
    }
}
