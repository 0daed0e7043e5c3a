//! # Position Fix Types
//!
//! The geolocation sample consumed by the publish scheduler, and the seam
//! through which the external sensor collaborator supplies it.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};

/// A single geolocation sample
///
/// Produced externally, consumed once per publish tick. An accuracy of 0
/// is legal and treated as zero variance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionFix {
    /// Latitude in degrees
    pub latitude: f64,

    /// Longitude in degrees
    pub longitude: f64,

    /// Altitude in meters
    pub altitude: f64,

    /// Horizontal accuracy in meters (>= 0)
    pub accuracy: f64,

    /// Capture timestamp in epoch milliseconds
    #[serde(default)]
    pub timestamp_ms: i64,

    /// Source of the sample (e.g. "gps", "network")
    #[serde(default = "default_provider")]
    pub provider: String,
}

fn default_provider() -> String {
    "gps".to_string()
}

/// Provider of the latest known position sample
///
/// The publish scheduler pulls from this on every tick; `None` means no
/// sample has arrived yet and the tick is skipped.
pub trait FixSource: Send + Sync {
    fn latest_fix(&self) -> Option<PositionFix>;
}

/// Shared latest-value cell fed by the external sensor stream
///
/// Writers replace the stored sample; readers always observe the most
/// recent one. Unsent samples are never queued.
#[derive(Clone, Default)]
pub struct SharedFix {
    inner: Arc<RwLock<Option<PositionFix>>>,
}

impl SharedFix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the latest known sample
    pub fn update(&self, fix: PositionFix) {
        let mut slot = match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *slot = Some(fix);
    }

    /// Read the latest known sample, if any
    pub fn get(&self) -> Option<PositionFix> {
        let slot = match self.inner.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        slot.clone()
    }
}

impl FixSource for SharedFix {
    fn latest_fix(&self) -> Option<PositionFix> {
        self.get()
    }
}
