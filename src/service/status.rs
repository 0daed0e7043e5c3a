//! # Status Surface
//!
//! Snapshot published toward the external UI collaborator on every state
//! transition and telemetry update.

use serde::Serialize;

use super::state::ServiceState;
use crate::fix::PositionFix;

/// Everything a status consumer needs to render the session
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    /// Current lifecycle state
    pub state: ServiceState,

    /// Human-readable label for the current state
    pub state_label: &'static str,

    /// Human-readable connection status
    pub connection: String,

    /// Last known position fix
    pub last_fix: Option<PositionFix>,

    /// Messages accepted by the socket this session
    pub sent_messages: u64,

    /// Wall-clock time of the last accepted message, epoch milliseconds
    pub last_sent_ms: Option<i64>,

    /// Last observed battery level
    pub battery_percent: Option<u8>,

    /// Warning threshold reached
    pub battery_low: bool,

    /// Shutdown threshold reached
    pub battery_critical: bool,
}

impl StatusSnapshot {
    pub fn initial() -> Self {
        Self {
            state: ServiceState::Initialized,
            state_label: ServiceState::Initialized.label(),
            connection: ServiceState::Initialized.label().to_string(),
            last_fix: None,
            sent_messages: 0,
            last_sent_ms: None,
            battery_percent: None,
            battery_low: false,
            battery_critical: false,
        }
    }
}
