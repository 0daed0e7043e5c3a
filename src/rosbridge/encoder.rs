//! # rosbridge Message Encoder
//!
//! Pure constructors for the three wire messages of a publishing session.
//! Identical inputs always produce identical output, so sessions can be
//! replayed and round-trip tested.

use serde::Serialize;

use super::protocol::*;
use crate::error::Result;
use crate::fix::PositionFix;

#[derive(Serialize)]
struct Advertise<'a> {
    op: &'a str,
    topic: &'a str,
    #[serde(rename = "type")]
    message_type: &'a str,
}

#[derive(Serialize)]
struct Publish<'a> {
    op: &'a str,
    topic: &'a str,
    msg: NavSatFix,
}

#[derive(Serialize)]
struct Unadvertise<'a> {
    op: &'a str,
    topic: &'a str,
}

/// Encode the message declaring intent to publish NavSatFix on `topic`
pub fn advertise(topic: &str) -> Result<String> {
    let message = Advertise {
        op: OP_ADVERTISE,
        topic,
        message_type: NAVSATFIX_TYPE,
    };
    Ok(serde_json::to_string(&message)?)
}

/// Encode one position fix as a rosbridge publish message
///
/// The capture timestamp is split into whole seconds and the remaining
/// sub-second part in nanoseconds. Status and service are fixed constants
/// for this deployment (fix acquired, GPS service). Position uncertainty
/// becomes a diagonal 3x3 covariance matrix built from `accuracy^2`.
///
/// # Examples
///
/// ```
/// use navsat_bridge::fix::PositionFix;
/// use navsat_bridge::rosbridge::encoder::publish;
///
/// let fix = PositionFix {
///     latitude: 52.5200,
///     longitude: 13.4050,
///     altitude: 34.0,
///     accuracy: 5.0,
///     timestamp_ms: 1_700_000_000_000,
///     provider: "gps".to_string(),
/// };
/// let message = publish("/phone/gps", "phone_gps", &fix).unwrap();
/// assert!(message.contains("\"op\":\"publish\""));
/// ```
pub fn publish(topic: &str, frame_id: &str, fix: &PositionFix) -> Result<String> {
    let message = Publish {
        op: OP_PUBLISH,
        topic,
        msg: NavSatFix {
            header: Header {
                frame_id: frame_id.to_string(),
                stamp: Stamp::from_epoch_ms(fix.timestamp_ms),
            },
            status: NavSatStatus {
                status: STATUS_FIX,
                service: SERVICE_GPS,
            },
            latitude: fix.latitude,
            longitude: fix.longitude,
            altitude: fix.altitude,
            position_covariance: covariance_from_accuracy(fix.accuracy),
            position_covariance_type: COVARIANCE_TYPE_APPROXIMATED,
        },
    };
    Ok(serde_json::to_string(&message)?)
}

/// Encode the message withdrawing intent to publish on `topic`
pub fn unadvertise(topic: &str) -> Result<String> {
    let message = Unadvertise {
        op: OP_UNADVERTISE,
        topic,
    };
    Ok(serde_json::to_string(&message)?)
}

/// Build the row-major 3x3 covariance matrix for a horizontal accuracy
///
/// Diagonal entries are `accuracy^2`, off-diagonal entries are 0. An
/// accuracy of 0 yields the zero matrix (zero variance).
pub fn covariance_from_accuracy(accuracy: f64) -> [f64; COVARIANCE_LEN] {
    let variance = accuracy * accuracy;
    let mut matrix = [0.0; COVARIANCE_LEN];
    matrix[0] = variance;
    matrix[4] = variance;
    matrix[8] = variance;
    matrix
}
