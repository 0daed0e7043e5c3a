//! # Battery Guard
//!
//! Watches battery observations against the configured warning and
//! shutdown thresholds.

/// Events raised by a battery observation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatteryEvent {
    /// Level dropped to or below the warning threshold (debounced)
    Warning(u8),
    /// Level is at or below the shutdown threshold; the session must stop
    Critical(u8),
}

/// Threshold watcher with a debounced warning
///
/// The warning fires once per excursion below the threshold and re-arms
/// only when the level rises strictly above it again. The critical event
/// fires on every observation at or below the shutdown threshold; a
/// threshold of 0 disables it.
pub struct BatteryGuard {
    warning_percent: u8,
    shutdown_percent: u8,
    level: Option<u8>,
    warned: bool,
}

impl BatteryGuard {
    pub fn new(warning_percent: u8, shutdown_percent: u8) -> Self {
        Self {
            warning_percent,
            shutdown_percent,
            level: None,
            warned: false,
        }
    }

    /// Last observed level, if any
    pub fn level(&self) -> Option<u8> {
        self.level
    }

    /// Whether the warning is currently latched
    pub fn is_low(&self) -> bool {
        self.warned
    }

    /// Feed one battery sample; returns the events it raises
    ///
    /// Warning and critical are independent: a single observation may
    /// raise both.
    pub fn observe(&mut self, level: u8) -> Vec<BatteryEvent> {
        self.level = Some(level);
        let mut events = Vec::new();

        if level <= self.warning_percent {
            if !self.warned {
                self.warned = true;
                events.push(BatteryEvent::Warning(level));
            }
        } else {
            self.warned = false;
        }

        if self.shutdown_percent > 0 && level <= self.shutdown_percent {
            events.push(BatteryEvent::Critical(level));
        }

        events
    }
}
