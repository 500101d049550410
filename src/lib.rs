//! Serial Flow Library
//!
//! Buffered, timeout-bounded serial writes gated by XON/XOFF and RTS/CTS
//! flow control.
//!
//! # Modules
//!
//! - `port`: the write engine, drivers and the `SerialPort` handle
//! - `timing`: write-timeout accuracy measurement
//! - `config`: Configuration management with TOML support
//! - `logging`: tracing subscriber setup
//! - `error`: Application-level error handling

pub mod config;
pub mod error;
pub mod logging;
pub mod port;
pub mod timing;

// Re-export commonly used types for convenience
pub use error::{AppError, AppResult};
pub use port::{
    AsyncPortWriter, BlockingPortWrapper, Handshake, HardwareDriver, MockDriver, PortError,
    PortSettings, PortSnapshot, SerialDriver, SerialPort, WriteTimeout, XOFF, XON,
};
pub use timing::{measure_write_timeout, TimingReport};

// Re-export config types
pub use config::{Config, ConfigError, ConfigLoader, ConfigResult};
