//! Configuration schema definitions.
//!
//! This module defines the structure of the configuration file using serde.
//! All configuration sections are defined here with appropriate defaults.

use super::error::{ConfigError, ConfigResult};
use crate::port::{
    Handshake, PortSettings, WriteTimeout, DEFAULT_DRAIN_CHUNK_SIZE, DEFAULT_WRITE_BUFFER_SIZE,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Port settings applied on open
    pub port: PortConfig,
    /// Write-timeout accuracy harness
    pub timing: TimingConfig,
    /// Hardware testing configuration
    pub testing: TestingConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Check values serde cannot constrain.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.port.baud_rate == 0 {
            return Err(ConfigError::out_of_range("port", "baud_rate", "must be positive"));
        }
        if self.port.write_buffer_size == 0 {
            return Err(ConfigError::out_of_range("port", "write_buffer_size", "must be positive"));
        }
        if self.port.drain_chunk_size == 0 {
            return Err(ConfigError::out_of_range("port", "drain_chunk_size", "must be positive"));
        }
        if self.port.line_poll_interval_ms == 0 {
            return Err(ConfigError::out_of_range(
                "port",
                "line_poll_interval_ms",
                "must be positive",
            ));
        }
        if self.timing.attempts == 0 {
            return Err(ConfigError::out_of_range("timing", "attempts", "must be positive"));
        }
        if !(self.timing.max_deviation > 0.0 && self.timing.max_deviation <= 1.0) {
            return Err(ConfigError::out_of_range("timing", "max_deviation", "must be in (0, 1]"));
        }
        Ok(())
    }
}

/// Port configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PortConfig {
    /// Baud rate used when opening real hardware
    pub baud_rate: u32,
    /// "none", "request_to_send", "xon_xoff" or "request_to_send_xon_xoff"
    pub handshake: Handshake,
    /// Write timeout in milliseconds; absent means block indefinitely
    pub write_timeout_ms: Option<u64>,
    /// Transmit buffer capacity in bytes
    pub write_buffer_size: usize,
    /// Bytes handed to the driver per drain step
    pub drain_chunk_size: usize,
    /// Line sampling period for drivers that cannot signal changes
    pub line_poll_interval_ms: u64,
    /// RTS level on open when no hardware handshake is active
    pub rts_enable: bool,
    /// Port aliases for convenience
    #[serde(default)]
    pub port_aliases: HashMap<String, String>,
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            handshake: Handshake::None,
            write_timeout_ms: None,
            write_buffer_size: DEFAULT_WRITE_BUFFER_SIZE,
            drain_chunk_size: DEFAULT_DRAIN_CHUNK_SIZE,
            line_poll_interval_ms: 1,
            rts_enable: false,
            port_aliases: HashMap::new(),
        }
    }
}

impl PortConfig {
    pub fn write_timeout(&self) -> WriteTimeout {
        WriteTimeout::from(self.write_timeout_ms)
    }

    /// Settings a port opens with under this configuration.
    pub fn to_settings(&self) -> PortSettings {
        PortSettings {
            baud_rate: self.baud_rate,
            handshake: self.handshake,
            write_timeout: self.write_timeout(),
            write_buffer_size: self.write_buffer_size,
            drain_chunk_size: self.drain_chunk_size,
            line_poll_interval: Duration::from_millis(self.line_poll_interval_ms),
            rts_enable: self.rts_enable,
        }
    }

    /// Resolve a port name through aliases
    pub fn resolve_port(&self, name: &str) -> String {
        self.port_aliases
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }
}

/// Write-timeout accuracy measurement section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Number of timed writes
    pub attempts: usize,
    /// Allowed relative deviation of the average from the configured timeout
    pub max_deviation: f64,
    /// Run one untimed write first
    pub warm_up: bool,
    /// Bytes written per attempt
    pub payload_len: usize,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            attempts: 5,
            max_deviation: 0.15,
            warm_up: true,
            payload_len: 14,
        }
    }
}

/// Hardware testing configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TestingConfig {
    /// Port under test
    pub port: Option<String>,
    /// Far end of the null-modem cable attached to `port`
    pub peer_port: Option<String>,
    /// Test baud rate
    pub baud: u32,
    /// Test timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for TestingConfig {
    fn default() -> Self {
        Self {
            port: None,
            peer_port: None,
            baud: 9600,
            timeout_ms: 2000,
        }
    }
}

impl TestingConfig {
    /// Get the test timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence
    pub level: String,
    /// Log format: "json", "pretty", "compact"
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format
    Json,
    /// Pretty format with colors
    #[default]
    Pretty,
    /// Compact format
    Compact,
}
