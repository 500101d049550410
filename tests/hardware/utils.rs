//! Utility functions for hardware testing.
//!
//! Provides port discovery, fixture setup from the environment and timing
//! helpers.

use serial_flow::config::ConfigLoader;
use serial_flow::port::{Handshake, PortSettings, SerialPort, WriteTimeout};
use serialport::{available_ports, SerialPortInfo};
use std::time::{Duration, Instant};

/// Test port pair from the environment (`TEST_PORT`, `TEST_PEER_PORT`,
/// `TEST_BAUD`) or the `[testing]` config section.
pub struct TestPortConfig {
    pub port_name: String,
    pub peer_name: String,
    pub baud_rate: u32,
}

impl TestPortConfig {
    pub fn from_env() -> Option<Self> {
        let testing = ConfigLoader::with_defaults().into_config().testing;
        Some(TestPortConfig {
            port_name: testing.port?,
            peer_name: testing.peer_port?,
            baud_rate: testing.baud,
        })
    }

    pub fn settings(&self, handshake: Handshake, timeout: WriteTimeout) -> PortSettings {
        PortSettings {
            baud_rate: self.baud_rate,
            handshake,
            write_timeout: timeout,
            ..PortSettings::default()
        }
    }
}

/// Discover all available serial ports on the system.
pub fn discover_available_ports() -> Vec<SerialPortInfo> {
    available_ports().unwrap_or_default()
}

/// Print available ports for debugging.
pub fn print_available_ports() {
    let ports = discover_available_ports();

    if ports.is_empty() {
        println!("No serial ports detected on this system");
        return;
    }

    println!("Available serial ports ({}):", ports.len());
    for (idx, port) in ports.iter().enumerate() {
        println!("  {}. {} ({:?})", idx + 1, port.port_name, port.port_type);
    }
}

/// Timing helper for measuring operation duration.
pub struct TimingHelper {
    start: Instant,
    name: String,
}

impl TimingHelper {
    pub fn new(name: &str) -> Self {
        println!("⏱️  Starting: {}", name);
        TimingHelper {
            start: Instant::now(),
            name: name.to_string(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn finish(self) -> Duration {
        let elapsed = self.elapsed();
        println!("✅ Completed: {} in {:?}", self.name, elapsed);
        elapsed
    }
}

/// Both ends of a physical null-modem cable, opened.
pub struct HardwarePair {
    pub local: SerialPort,
    pub remote: SerialPort,
}

impl HardwarePair {
    /// Open the pair, or `None` (with a notice) when hardware is not configured.
    pub fn setup(handshake: Handshake, timeout: WriteTimeout) -> Option<Self> {
        let Some(config) = TestPortConfig::from_env() else {
            println!("⏭️  Skipping hardware test: TEST_PORT and TEST_PEER_PORT not set");
            print_available_ports();
            return None;
        };

        println!(
            "Setting up {} <-> {} at {} baud",
            config.port_name, config.peer_name, config.baud_rate
        );
        let local = SerialPort::with_settings(
            config.port_name.clone(),
            config.settings(handshake, timeout),
        );
        let remote = SerialPort::with_settings(
            config.peer_name.clone(),
            config.settings(Handshake::None, WriteTimeout::Infinite),
        );
        local.open().expect("open TEST_PORT");
        remote.open().expect("open TEST_PEER_PORT");
        Some(Self { local, remote })
    }
}
