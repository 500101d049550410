//! Mock serial driver for testing.
//!
//! Provides a `MockDriver` that simulates the wire without requiring actual
//! hardware. A driver can stand alone, with the test driving CTS and inbound
//! bytes directly, or be one end of a null-modem pair where each end's RTS
//! feeds the other's CTS and transmitted bytes arrive as the other's inbound.

use super::error::PortError;
use super::lines::LineWaker;
use super::traits::SerialDriver;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::{Arc, Weak};

/// Inner state of one mock end, protected by a mutex for interior mutability.
#[derive(Debug, Default)]
struct MockLineState {
    /// Bytes waiting to be read by the port.
    inbound: VecDeque<u8>,
    /// Every byte the port handed to the wire, in order.
    transmitted: Vec<u8>,
    /// One entry per successful transmit call.
    transmit_log: Vec<Vec<u8>>,
    rts: bool,
    cts: bool,
    /// Whether the next transmit should fail with an I/O error.
    fail_next_transmit: bool,
    /// While set, transmit accepts nothing (a stalled UART).
    transmit_paused: bool,
    closed: bool,
    waker: Option<LineWaker>,
    peer: Option<Weak<Mutex<MockLineState>>>,
}

/// Mock serial driver implementation for testing.
///
/// Clones share state, so a test keeps one clone to steer the lines while the
/// port owns another.
///
/// # Example
/// ```
/// use serial_flow::port::{Handshake, MockDriver, PortSettings, SerialPort, XOFF};
/// use std::time::Duration;
///
/// let (local, remote) = MockDriver::null_modem("COM1", "COM2");
///
/// let settings = PortSettings { handshake: Handshake::XOnXOff, ..PortSettings::default() };
/// let com1 = SerialPort::with_settings("COM1", settings);
/// let com2 = SerialPort::new("COM2");
/// com1.open_with(Box::new(local)).unwrap();
/// com2.open_with(Box::new(remote)).unwrap();
///
/// com2.write(&[XOFF]).unwrap();
/// assert!(com1.wait_for(|s| !s.gate_open, Duration::from_secs(1)));
/// ```
#[derive(Clone)]
pub struct MockDriver {
    /// The port name/identifier.
    name: String,
    state: Arc<Mutex<MockLineState>>,
}

impl MockDriver {
    /// Create a standalone mock driver with CTS deasserted.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(MockLineState::default())),
        }
    }

    /// Create two ends of a null-modem cable.
    pub fn null_modem(a: impl Into<String>, b: impl Into<String>) -> (Self, Self) {
        let first = Self::new(a);
        let second = Self::new(b);
        first.state.lock().peer = Some(Arc::downgrade(&second.state));
        second.state.lock().peer = Some(Arc::downgrade(&first.state));
        (first, second)
    }

    /// Drive this end's CTS input directly.
    pub fn set_cts(&self, level: bool) {
        let waker = {
            let mut state = self.state.lock();
            state.cts = level;
            state.waker.clone()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
    }

    /// Deliver bytes as if they had arrived from the far end.
    pub fn inject_inbound(&self, data: &[u8]) {
        let waker = {
            let mut state = self.state.lock();
            state.inbound.extend(data);
            state.waker.clone()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
    }

    /// Current RTS output level.
    pub fn rts(&self) -> bool {
        self.state.lock().rts
    }

    /// Get a copy of every byte transmitted so far.
    pub fn transmitted(&self) -> Vec<u8> {
        self.state.lock().transmitted.clone()
    }

    /// Get a copy of all transmit calls, one entry per call.
    pub fn transmit_log(&self) -> Vec<Vec<u8>> {
        self.state.lock().transmit_log.clone()
    }

    /// Set whether the next transmit should fail with an I/O error.
    pub fn set_fail_next_transmit(&self, fail: bool) {
        self.state.lock().fail_next_transmit = fail;
    }

    /// Stall or resume the simulated UART.
    pub fn set_transmit_paused(&self, paused: bool) {
        let waker = {
            let mut state = self.state.lock();
            state.transmit_paused = paused;
            state.waker.clone()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
    }

    /// Get the number of inbound bytes not yet read by the port.
    pub fn pending_inbound(&self) -> usize {
        self.state.lock().inbound.len()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Run `f` against the peer end, then wake it.
    ///
    /// Must be called without holding our own lock.
    fn with_peer(peer: Option<Weak<Mutex<MockLineState>>>, f: impl FnOnce(&mut MockLineState)) {
        let Some(peer) = peer.as_ref().and_then(Weak::upgrade) else {
            return;
        };
        let waker = {
            let mut peer = peer.lock();
            f(&mut peer);
            peer.waker.clone()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

impl SerialDriver for MockDriver {
    fn name(&self) -> &str {
        &self.name
    }

    fn transmit(&mut self, data: &[u8]) -> Result<usize, PortError> {
        let peer = {
            let mut state = self.state.lock();
            if state.closed {
                return Err(PortError::NotOpen);
            }
            if state.fail_next_transmit {
                state.fail_next_transmit = false;
                return Err(PortError::Io(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "simulated line failure",
                )));
            }
            if state.transmit_paused {
                return Ok(0);
            }
            state.transmitted.extend_from_slice(data);
            state.transmit_log.push(data.to_vec());
            state.peer.clone()
        };

        Self::with_peer(peer, |p| {
            if !p.closed {
                p.inbound.extend(data);
            }
        });
        Ok(data.len())
    }

    fn set_rts(&mut self, level: bool) -> Result<(), PortError> {
        let peer = {
            let mut state = self.state.lock();
            state.rts = level;
            state.peer.clone()
        };
        Self::with_peer(peer, |p| p.cts = level);
        Ok(())
    }

    fn cts(&mut self) -> Result<bool, PortError> {
        Ok(self.state.lock().cts)
    }

    fn read_inbound(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        let mut state = self.state.lock();
        let n = buffer.len().min(state.inbound.len());
        for (slot, byte) in buffer.iter_mut().zip(state.inbound.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn subscribe(&mut self, waker: LineWaker) -> bool {
        let mut state = self.state.lock();
        state.closed = false;
        state.waker = Some(waker);
        true
    }

    fn close(&mut self) -> Result<(), PortError> {
        let peer = {
            let mut state = self.state.lock();
            state.closed = true;
            state.waker = None;
            state.rts = false;
            state.inbound.clear();
            state.peer.clone()
        };
        // Dropping the port drops RTS on the cable.
        Self::with_peer(peer, |p| p.cts = false);
        Ok(())
    }
}

impl std::fmt::Debug for MockDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MockDriver")
            .field("name", &self.name)
            .field("rts", &state.rts)
            .field("cts", &state.cts)
            .field("pending_inbound", &state.inbound.len())
            .finish()
    }
}
