//! Port-specific error types.
//!
//! Defines error types for serial port operations, separate from application-level
//! errors to maintain clean separation of concerns.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during serial port operations.
#[derive(Debug, Error)]
pub enum PortError {
    /// The specified serial port was not found on the system.
    #[error("Serial port not found: {0}")]
    NotFound(String),

    /// An I/O error occurred during port operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Port configuration failed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The write deadline elapsed before the payload could be queued.
    ///
    /// `queued` counts the prefix bytes of this write that were admitted into
    /// the transmit buffer before the deadline; they stay queued.
    #[error("Write timed out after {timeout:?} ({queued} byte(s) queued)")]
    Timeout { queued: usize, timeout: Duration },

    /// Attempted to open a port that's already open.
    #[error("Port is already open")]
    AlreadyOpen,

    /// Attempted to use a port that's not open.
    #[error("Port is not open")]
    NotOpen,

    /// The port was closed while the operation was waiting.
    #[error("Port was closed while the write was pending")]
    Closed,

    /// The caller passed an argument that violates the operation contract.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation is not permitted in the port's current state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A driver failure invalidated the port; it must be closed.
    #[error("Port faulted: {0}")]
    Faulted(String),

    /// A serialport-specific error occurred.
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),
}

impl PortError {
    /// Create a NotFound error from a port name.
    pub fn not_found(port_name: impl Into<String>) -> Self {
        Self::NotFound(port_name.into())
    }

    /// Create a Config error from a message.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a Timeout error for a write that queued `queued` bytes.
    pub fn timeout(queued: usize, timeout: Duration) -> Self {
        Self::Timeout { queued, timeout }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    /// Whether this is a write timeout (as opposed to closure or a fault).
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
