//! # Configuration Management Module
//!
//! Persistent logger settings stored in platform-appropriate locations.
//! Handles loading, saving, providing defaults, and validating the values a
//! session needs before any resource is acquired.
//!
//! ## Storage Location
//! - macOS: ~/Library/Application Support/hygrolog/config.toml
//! - Linux: ~/.config/hygrolog/config.toml
//! - Windows: %APPDATA%\hygrolog\config.toml
//!
//! ## Why TOML
//! Human-readable format allows manual editing if needed. Serde provides
//! automatic serialization/deserialization.

use crate::channel::OverflowPolicy;
use crate::decoder::ProtocolVariant;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Serial port identity, e.g. "COM3" or "/dev/ttyUSB0"
    pub port: String,
    pub baud_rate: u32,
    /// Bounded serial read timeout; also bounds stop-signal latency
    pub read_timeout_ms: u64,
    /// Fixed wait between mid-session reconnect attempts
    pub reconnect_backoff_ms: u64,
    /// None retries forever (reference behavior); Some(n) escalates after n attempts
    pub max_reconnect_attempts: Option<u32>,
    /// Set the instrument clock from the host clock on each connect
    pub sync_clock_on_connect: bool,
    /// Sample channel capacity between the reader and the consumer
    pub channel_capacity: usize,
    pub overflow_policy: OverflowPolicy,
    /// Upper bound on a blocking channel push
    pub send_timeout_ms: u64,
    /// Points kept per live-view channel
    pub window_capacity: usize,
    /// Flush once this many records are buffered
    pub record_threshold: usize,
    /// Flush a non-empty buffer after this long since the last flush
    pub time_threshold_secs: u64,
    /// Consumer loop tick interval
    pub consumer_tick_ms: u64,
    /// Directory holding the per-day CSV files
    pub output_dir: PathBuf,
    /// Field layout of the active instrument variant.
    /// Kept last so the TOML serializer emits scalar keys before this table.
    pub protocol: ProtocolVariant,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: String::new(),
            baud_rate: 9600,
            protocol: ProtocolVariant::dual_channel(),
            read_timeout_ms: 1000,
            reconnect_backoff_ms: 1000,
            max_reconnect_attempts: None,
            sync_clock_on_connect: false,
            channel_capacity: 120,
            overflow_policy: OverflowPolicy::Block,
            send_timeout_ms: 1000,
            window_capacity: 300,
            record_threshold: 60,
            time_threshold_secs: 300,
            consumer_tick_ms: 1000,
            output_dir: PathBuf::from("."),
        }
    }
}

impl Config {
    /// Get the path to the config file
    fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        config_dir.join("hygrolog").join("config.toml")
    }

    /// Load config from file, or create default if it doesn't exist
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path();

        match fs::read_to_string(&path) {
            Ok(contents) => {
                let config = toml::from_str(&contents).map_err(ConfigError::ParseFailed)?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // File doesn't exist, create default
                let config = Self::default();
                config.save()?;
                Ok(config)
            }
            Err(e) => Err(ConfigError::ReadFailed(e)),
        }
    }

    /// Save config to file
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::config_path();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(ConfigError::WriteFailed)?;
        }

        let toml_string = toml::to_string_pretty(self).map_err(ConfigError::SerializeFailed)?;
        fs::write(&path, toml_string).map_err(ConfigError::WriteFailed)?;

        Ok(())
    }

    /// Fail-fast validation; a session refuses to start on the first problem.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port.trim().is_empty() {
            return Err(ConfigError::MissingPort);
        }

        let positive: [(&'static str, u64); 8] = [
            ("baud_rate", u64::from(self.baud_rate)),
            ("read_timeout_ms", self.read_timeout_ms),
            ("reconnect_backoff_ms", self.reconnect_backoff_ms),
            ("channel_capacity", self.channel_capacity as u64),
            ("window_capacity", self.window_capacity as u64),
            ("record_threshold", self.record_threshold as u64),
            ("time_threshold_secs", self.time_threshold_secs),
            ("consumer_tick_ms", self.consumer_tick_ms),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: "must be greater than zero".to_string(),
                });
            }
        }

        if self.protocol.min_fields == 0 {
            return Err(ConfigError::InvalidValue {
                field: "protocol.min_fields",
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}
