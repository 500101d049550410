//! Serial write path with flow control.
//!
//! Bytes written to a [`SerialPort`] are queued in a bounded transmit buffer
//! and drained to a [`SerialDriver`] by a background worker, gated by the
//! configured [`Handshake`]. Real hardware goes through [`HardwareDriver`];
//! tests and simulations use [`MockDriver`].

pub mod async_port;
pub mod buffer;
pub mod clock;
pub mod error;
pub mod gate;
pub mod lines;
pub mod mock;
pub mod scheduler;
pub mod serial_port;
pub mod sync_port;
pub mod traits;

pub use async_port::{AsyncPortWriter, BlockingPortWrapper};
pub use buffer::{DrainChunk, TransmitBuffer};
pub use clock::{Deadline, Stopwatch, TimeoutClock, WriteRequest};
pub use error::PortError;
pub use gate::{FlowControlGate, GateState};
pub use lines::{HandshakeLineController, LineEvent, LineWaker};
pub use mock::MockDriver;
pub use scheduler::{PortSnapshot, WriteScheduler};
pub use serial_port::SerialPort;
pub use sync_port::HardwareDriver;
pub use traits::*;
