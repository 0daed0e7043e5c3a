//! # rosbridge Protocol Module
//!
//! Implementation of the rosbridge v2 pub/sub protocol subset used to
//! publish NavSatFix messages.
//!
//! This module handles:
//! - advertise / publish / unadvertise operation encoding
//! - NavSatFix message construction (stamp split, covariance matrix)
//! - Protocol constants for the GPS deployment

pub mod protocol;
pub mod encoder;
