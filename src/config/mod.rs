//! Configuration module for serial-flow.
//!
//! This module provides TOML-based configuration with environment variable overrides.
//!
//! # Configuration Resolution
//!
//! Configuration is loaded from the following locations (in order of priority):
//!
//! 1. `SERIAL_FLOW_CONFIG` environment variable (explicit path)
//! 2. `./config.toml` (current directory)
//! 3. `~/.config/serial-flow/config.toml` (XDG on Linux/macOS)
//! 4. `%APPDATA%\serial-flow\config.toml` (Windows)
//! 5. Built-in defaults (no file required)
//!
//! # Environment Overrides
//!
//! The pattern is: `SERIAL_FLOW_<SECTION>_<KEY>`
//!
//! Examples:
//! - `SERIAL_FLOW_PORT_HANDSHAKE=xon_xoff`
//! - `SERIAL_FLOW_PORT_WRITE_TIMEOUT_MS=250` (`infinite` clears it)
//! - `SERIAL_FLOW_TESTING_PORT=/dev/ttyUSB0`
//!
//! Legacy test variables are also honoured: `TEST_PORT`, `TEST_PEER_PORT`,
//! `TEST_BAUD`.
//!
//! # Example
//!
//! ```rust,no_run
//! use serial_flow::config::ConfigLoader;
//!
//! let loader = ConfigLoader::load()?;
//! let settings = loader.config().port.to_settings();
//! println!("handshake: {}", settings.handshake);
//! # Ok::<(), serial_flow::config::ConfigError>(())
//! ```

mod error;
mod loader;
mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{
    get_default_config_dir, get_default_config_path, resolve_config_path, ConfigLoader,
};
pub use schema::{Config, LogFormat, LoggingConfig, PortConfig, TestingConfig, TimingConfig};
