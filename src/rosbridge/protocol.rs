//! # rosbridge Protocol Constants and Types
//!
//! Core wire definitions for the rosbridge pub/sub operations and the
//! `sensor_msgs/NavSatFix` message published on the position topic.

use serde::{Deserialize, Serialize};

/// rosbridge operation declaring intent to publish on a topic
pub const OP_ADVERTISE: &str = "advertise";

/// rosbridge operation carrying one published message
pub const OP_PUBLISH: &str = "publish";

/// rosbridge operation withdrawing intent to publish on a topic
pub const OP_UNADVERTISE: &str = "unadvertise";

/// ROS message type published on the position topic
pub const NAVSATFIX_TYPE: &str = "sensor_msgs/NavSatFix";

/// NavSatStatus: unaugmented fix acquired
pub const STATUS_FIX: i8 = 1;

/// NavSatStatus: positioning service is GPS
pub const SERVICE_GPS: u16 = 1;

/// Covariance is approximated from the reported horizontal accuracy
pub const COVARIANCE_TYPE_APPROXIMATED: u8 = 1;

/// Number of entries in the row-major 3x3 covariance matrix
pub const COVARIANCE_LEN: usize = 9;

/// ROS time split into whole seconds and remaining nanoseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stamp {
    pub secs: i64,
    pub nsecs: u32,
}

impl Stamp {
    /// Split an epoch-millisecond timestamp into ROS time
    ///
    /// Euclidean division keeps the nanosecond part non-negative even for
    /// timestamps before the epoch.
    pub fn from_epoch_ms(timestamp_ms: i64) -> Self {
        Self {
            secs: timestamp_ms.div_euclid(1000),
            nsecs: (timestamp_ms.rem_euclid(1000) as u32) * 1_000_000,
        }
    }
}

/// std_msgs/Header subset carried by NavSatFix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    pub frame_id: String,
    pub stamp: Stamp,
}

/// sensor_msgs/NavSatStatus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavSatStatus {
    pub status: i8,
    pub service: u16,
}

/// sensor_msgs/NavSatFix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavSatFix {
    pub header: Header,
    pub status: NavSatStatus,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub position_covariance: [f64; COVARIANCE_LEN],
    pub position_covariance_type: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_constants() {
        assert_eq!(OP_ADVERTISE, "advertise");
        assert_eq!(OP_PUBLISH, "publish");
        assert_eq!(OP_UNADVERTISE, "unadvertise");
        assert_eq!(NAVSATFIX_TYPE, "sensor_msgs/NavSatFix");
    }

    #[test]
    fn test_fix_status_constants() {
        // Fixed for this deployment: fix acquired, GPS service
        assert_eq!(STATUS_FIX, 1);
        assert_eq!(SERVICE_GPS, 1);
        assert_eq!(COVARIANCE_TYPE_APPROXIMATED, 1);
    }

    #[test]
    fn test_stamp_split() {
        let stamp = Stamp::from_epoch_ms(1_700_000_000_123);
        assert_eq!(stamp.secs, 1_700_000_000);
        assert_eq!(stamp.nsecs, 123_000_000);
    }

    #[test]
    fn test_stamp_split_whole_second() {
        let stamp = Stamp::from_epoch_ms(1_700_000_000_000);
        assert_eq!(stamp.secs, 1_700_000_000);
        assert_eq!(stamp.nsecs, 0);
    }

    #[test]
    fn test_stamp_split_negative_timestamp() {
        // -1 ms is 1 ms before the epoch: -1 s + 999 ms
        let stamp = Stamp::from_epoch_ms(-1);
        assert_eq!(stamp.secs, -1);
        assert_eq!(stamp.nsecs, 999_000_000);
    }
}
