//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Intervals are configured as minutes + seconds (the way the settings
//! collaborator edits them) and resolved to milliseconds for the session.

use serde::Deserialize;
use serde::de::Error;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::Result;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub publish: PublishConfig,
    pub connection: ConnectionConfig,
    pub battery: BatteryConfig,
    #[serde(default)]
    pub log: LogConfig,
}

/// rosbridge server endpoint configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_url")]
    pub url: String,

    #[serde(default = "default_topic")]
    pub topic: String,

    #[serde(default = "default_frame_id")]
    pub frame_id: String,
}

/// Publish cadence configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PublishConfig {
    #[serde(default)]
    pub interval_minutes: u64,

    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,
}

/// Reconnection configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ConnectionConfig {
    #[serde(default = "default_max_retry_attempts")]
    pub max_retry_attempts: u32,

    #[serde(default = "default_retry_delay_minutes")]
    pub retry_delay_minutes: u64,

    #[serde(default)]
    pub retry_delay_seconds: u64,
}

/// Battery safety thresholds
#[derive(Debug, Deserialize, Clone)]
pub struct BatteryConfig {
    #[serde(default = "default_warning_percent")]
    pub warning_percent: u8,

    /// Level at which the session is stopped; 0 disables the shutdown policy.
    #[serde(default = "default_shutdown_percent")]
    pub shutdown_percent: u8,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct LogConfig {
    /// Directory for rotating log files; empty means console logging only.
    #[serde(default)]
    pub dir: String,
}

// Default value functions
fn default_url() -> String { "ws://192.168.1.100:9090".to_string() }
fn default_topic() -> String { "/phone/gps".to_string() }
fn default_frame_id() -> String { "phone_gps".to_string() }

fn default_interval_seconds() -> u64 { 5 }

fn default_max_retry_attempts() -> u32 { 5 }
fn default_retry_delay_minutes() -> u64 { 1 }

fn default_warning_percent() -> u8 { 20 }
fn default_shutdown_percent() -> u8 { 5 }

/// Resolve a minutes + seconds pair to milliseconds
pub fn interval_total_ms(minutes: u64, seconds: u64) -> u64 {
    (minutes * 60 + seconds) * 1000
}

/// Validated, millisecond-resolved configuration bundle for one session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub url: String,
    pub topic: String,
    pub frame_id: String,
    pub publish_interval: Duration,
    pub max_retry_attempts: u32,
    pub max_retry_delay: Duration,
    pub battery_warning_percent: u8,
    pub battery_shutdown_percent: u8,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use navsat_bridge::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Total publish interval in milliseconds
    pub fn publish_interval_ms(&self) -> u64 {
        interval_total_ms(self.publish.interval_minutes, self.publish.interval_seconds)
    }

    /// Maximum reconnection backoff delay in milliseconds
    pub fn max_retry_delay_ms(&self) -> u64 {
        interval_total_ms(self.connection.retry_delay_minutes, self.connection.retry_delay_seconds)
    }

    /// Build the immutable per-session configuration bundle
    pub fn session(&self) -> SessionConfig {
        SessionConfig {
            url: self.server.url.clone(),
            topic: self.server.topic.clone(),
            frame_id: self.server.frame_id.clone(),
            publish_interval: Duration::from_millis(self.publish_interval_ms()),
            max_retry_attempts: self.connection.max_retry_attempts,
            max_retry_delay: Duration::from_millis(self.max_retry_delay_ms()),
            battery_warning_percent: self.battery.warning_percent,
            battery_shutdown_percent: self.battery.shutdown_percent,
        }
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    fn validate(&self) -> Result<()> {
        // Validate server endpoint
        if !self.server.url.starts_with("ws://") && !self.server.url.starts_with("wss://") {
            return Err(crate::error::NavsatBridgeError::Config(
                toml::de::Error::custom("server url must start with ws:// or wss://")
            ));
        }

        if !self.server.topic.starts_with('/') || self.server.topic.len() < 2 {
            return Err(crate::error::NavsatBridgeError::Config(
                toml::de::Error::custom("topic must start with / and must not be empty")
            ));
        }

        if self.server.frame_id.is_empty() {
            return Err(crate::error::NavsatBridgeError::Config(
                toml::de::Error::custom("frame_id cannot be empty")
            ));
        }

        // Validate publish cadence (total must be at least one second)
        if self.publish_interval_ms() == 0 {
            return Err(crate::error::NavsatBridgeError::Config(
                toml::de::Error::custom("publish interval must be greater than 0 seconds")
            ));
        }

        // Validate reconnection settings
        if self.connection.max_retry_attempts == 0 {
            return Err(crate::error::NavsatBridgeError::Config(
                toml::de::Error::custom("max_retry_attempts must be at least 1")
            ));
        }

        if self.max_retry_delay_ms() == 0 {
            return Err(crate::error::NavsatBridgeError::Config(
                toml::de::Error::custom("retry delay must be greater than 0 seconds")
            ));
        }

        // Validate battery thresholds
        if self.battery.warning_percent > 100 {
            return Err(crate::error::NavsatBridgeError::Config(
                toml::de::Error::custom("warning_percent must be between 0 and 100")
            ));
        }

        if self.battery.shutdown_percent > 100 {
            return Err(crate::error::NavsatBridgeError::Config(
                toml::de::Error::custom("shutdown_percent must be between 0 and 100")
            ));
        }

        // A warning at or below the shutdown level would never be seen
        if self.battery.shutdown_percent > 0
            && self.battery.warning_percent <= self.battery.shutdown_percent {
            return Err(crate::error::NavsatBridgeError::Config(
                toml::de::Error::custom("warning_percent must be greater than shutdown_percent (unless shutdown_percent is 0)")
            ));
        }

        Ok(())
    }
}
