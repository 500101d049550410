//! Core traits and value types for the serial write path.
//!
//! Defines the `SerialDriver` trait that lets both real serial hardware and the
//! in-memory null modem back a [`SerialPort`](super::SerialPort), together with
//! the handshake and timeout settings the engine runs on.

use super::error::PortError;
use super::lines::LineWaker;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Software flow-control byte that resumes transmission (DC1).
pub const XON: u8 = 0x11;

/// Software flow-control byte that pauses transmission (DC3).
pub const XOFF: u8 = 0x13;

/// Default transmit buffer capacity in bytes.
pub const DEFAULT_WRITE_BUFFER_SIZE: usize = 2048;

/// Default number of bytes handed to the driver per drain step.
pub const DEFAULT_DRAIN_CHUNK_SIZE: usize = 256;

/// Flow-control discipline applied to the transmit path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Handshake {
    /// No flow control; the gate is always open.
    #[default]
    None,
    /// Hardware RTS/CTS: transmit only while CTS is asserted.
    RequestToSend,
    /// Software XON/XOFF received in-band.
    #[serde(rename = "xon_xoff")]
    XOnXOff,
    /// Both hardware and software conditions must allow transmission.
    #[serde(rename = "request_to_send_xon_xoff")]
    RequestToSendXOnXOff,
}

impl Handshake {
    /// Whether CTS participates in the gate.
    pub fn uses_hardware(self) -> bool {
        matches!(self, Self::RequestToSend | Self::RequestToSendXOnXOff)
    }

    /// Whether inbound XON/XOFF participates in the gate.
    pub fn uses_software(self) -> bool {
        matches!(self, Self::XOnXOff | Self::RequestToSendXOnXOff)
    }
}

impl fmt::Display for Handshake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::RequestToSend => "request_to_send",
            Self::XOnXOff => "xon_xoff",
            Self::RequestToSendXOnXOff => "request_to_send_xon_xoff",
        };
        f.write_str(name)
    }
}

impl FromStr for Handshake {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        match normalized.as_str() {
            "none" => Ok(Self::None),
            "rts" | "request_to_send" => Ok(Self::RequestToSend),
            "xon_xoff" | "xonxoff" | "software" => Ok(Self::XOnXOff),
            "rts_xon_xoff" | "request_to_send_xon_xoff" => Ok(Self::RequestToSendXOnXOff),
            other => Err(PortError::config(format!("unknown handshake '{other}'"))),
        }
    }
}

/// Upper bound on how long a write may block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteTimeout {
    /// Block until the payload is queued or the port closes.
    #[default]
    Infinite,
    /// Block at most this long. Zero means fail instead of blocking: the
    /// write succeeds only if the whole payload fits in the buffer now and
    /// the gate is open, even when the gate is open but the buffer is short.
    Bounded(Duration),
}

impl WriteTimeout {
    pub fn from_millis(ms: u64) -> Self {
        Self::Bounded(Duration::from_millis(ms))
    }

    pub fn as_duration(self) -> Option<Duration> {
        match self {
            Self::Infinite => None,
            Self::Bounded(d) => Some(d),
        }
    }
}

impl From<Option<u64>> for WriteTimeout {
    fn from(ms: Option<u64>) -> Self {
        ms.map_or(Self::Infinite, Self::from_millis)
    }
}

impl fmt::Display for WriteTimeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Infinite => f.write_str("infinite"),
            Self::Bounded(d) => write!(f, "{}ms", d.as_millis()),
        }
    }
}

/// An inbound software flow-control byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ControlByte {
    XOn,
    XOff,
}

impl ControlByte {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            XON => Some(Self::XOn),
            XOFF => Some(Self::XOff),
            _ => None,
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            Self::XOn => XON,
            Self::XOff => XOFF,
        }
    }
}

/// Settings a port is opened with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortSettings {
    /// Baud rate used when opening real hardware.
    pub baud_rate: u32,
    pub handshake: Handshake,
    pub write_timeout: WriteTimeout,
    /// Transmit buffer capacity; writes larger than this are split.
    pub write_buffer_size: usize,
    /// Maximum bytes handed to the driver per drain step.
    pub drain_chunk_size: usize,
    /// Sampling period for drivers that cannot signal line changes.
    pub line_poll_interval: Duration,
    /// RTS level applied on open when the handshake does not own RTS.
    pub rts_enable: bool,
}

impl Default for PortSettings {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            handshake: Handshake::None,
            write_timeout: WriteTimeout::Infinite,
            write_buffer_size: DEFAULT_WRITE_BUFFER_SIZE,
            drain_chunk_size: DEFAULT_DRAIN_CHUNK_SIZE,
            line_poll_interval: Duration::from_millis(1),
            rts_enable: false,
        }
    }
}

impl PortSettings {
    pub fn validate(&self) -> Result<(), PortError> {
        if self.write_buffer_size == 0 {
            return Err(PortError::config("write_buffer_size must be positive"));
        }
        if self.drain_chunk_size == 0 {
            return Err(PortError::config("drain_chunk_size must be positive"));
        }
        if self.line_poll_interval.is_zero() {
            return Err(PortError::config("line_poll_interval must be positive"));
        }
        Ok(())
    }
}

/// The hardware collaborator behind a port.
///
/// Every method must be cheap and must not block for longer than a driver
/// tick. The engine owns flow control; drivers only move bytes and report
/// line levels.
pub trait SerialDriver: Send + fmt::Debug {
    /// Get the name/path of the underlying device.
    fn name(&self) -> &str;

    /// Hand bytes to the wire.
    ///
    /// Returns the number of bytes accepted; zero means "not now".
    fn transmit(&mut self, data: &[u8]) -> Result<usize, PortError>;

    /// Drive the RTS output line.
    fn set_rts(&mut self, level: bool) -> Result<(), PortError>;

    /// Sample the CTS input line.
    fn cts(&mut self) -> Result<bool, PortError>;

    /// Read whatever inbound bytes have arrived, without blocking.
    fn read_inbound(&mut self, buffer: &mut [u8]) -> Result<usize, PortError>;

    /// Register a waker to be invoked whenever CTS or inbound data changes.
    ///
    /// Returns `false` if the driver cannot signal changes; such drivers are
    /// sampled on the port's line poll interval instead.
    fn subscribe(&mut self, _waker: LineWaker) -> bool {
        false
    }

    /// Release the device.
    fn close(&mut self) -> Result<(), PortError> {
        Ok(())
    }
}
