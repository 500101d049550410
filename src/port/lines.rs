//! Handshake line access.
//!
//! [`HandshakeLineController`] owns the [`SerialDriver`] and turns raw line
//! levels and inbound bytes into [`LineEvent`]s for the flow-control gate.

use super::error::PortError;
use super::traits::{ControlByte, SerialDriver, XOFF, XON};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

/// Size of the scratch buffer used to pull inbound bytes off the driver.
const INBOUND_SCRATCH_LEN: usize = 256;

/// Input to the flow-control gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEvent {
    /// CTS changed to the given level.
    Cts(bool),
    /// An XON or XOFF arrived in-band.
    Control(ControlByte),
}

/// Callback a driver fires when CTS or inbound data may have changed.
///
/// Cheap to clone. Waking only schedules a line sample; it never runs driver
/// code, so drivers may call it from any thread without holding their own
/// locks.
#[derive(Clone)]
pub struct LineWaker {
    wake: Arc<dyn Fn() + Send + Sync>,
}

impl LineWaker {
    pub fn new(wake: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            wake: Arc::new(wake),
        }
    }

    /// A waker that does nothing.
    pub fn noop() -> Self {
        Self::new(|| {})
    }

    pub fn wake(&self) {
        (self.wake)();
    }
}

impl fmt::Debug for LineWaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LineWaker").finish_non_exhaustive()
    }
}

/// Accessor for RTS, CTS and inbound control bytes on one driver.
#[derive(Debug)]
pub struct HandshakeLineController {
    driver: Box<dyn SerialDriver>,
    rts: bool,
    last_cts: Option<bool>,
    pending: VecDeque<ControlByte>,
    discarded_inbound: u64,
    scratch: Vec<u8>,
}

impl HandshakeLineController {
    pub fn new(driver: Box<dyn SerialDriver>) -> Self {
        Self {
            driver,
            rts: false,
            last_cts: None,
            pending: VecDeque::new(),
            discarded_inbound: 0,
            scratch: vec![0u8; INBOUND_SCRATCH_LEN],
        }
    }

    pub fn name(&self) -> &str {
        self.driver.name()
    }

    pub fn set_rts(&mut self, level: bool) -> Result<(), PortError> {
        self.driver.set_rts(level)?;
        self.rts = level;
        Ok(())
    }

    /// Last RTS level driven by this controller.
    pub fn rts(&self) -> bool {
        self.rts
    }

    pub fn get_cts(&mut self) -> Result<bool, PortError> {
        self.driver.cts()
    }

    /// Oldest XON/XOFF received and not yet consumed.
    pub fn poll_control_byte(&mut self) -> Result<Option<ControlByte>, PortError> {
        self.pull_inbound()?;
        Ok(self.pending.pop_front())
    }

    /// Collect every gate event since the previous sample, in arrival order.
    ///
    /// CTS is reported only on transitions (and always on the first sample).
    pub fn sample(&mut self) -> Result<Vec<LineEvent>, PortError> {
        let mut events = Vec::new();

        let cts = self.driver.cts()?;
        if self.last_cts != Some(cts) {
            self.last_cts = Some(cts);
            events.push(LineEvent::Cts(cts));
        }

        self.pull_inbound()?;
        events.extend(self.pending.drain(..).map(LineEvent::Control));
        Ok(events)
    }

    pub fn transmit(&mut self, data: &[u8]) -> Result<usize, PortError> {
        self.driver.transmit(data)
    }

    pub fn subscribe(&mut self, waker: LineWaker) -> bool {
        self.driver.subscribe(waker)
    }

    pub fn close(&mut self) -> Result<(), PortError> {
        self.driver.close()
    }

    /// Inbound bytes that were not flow-control bytes.
    pub fn discarded_inbound(&self) -> u64 {
        self.discarded_inbound
    }

    fn pull_inbound(&mut self) -> Result<(), PortError> {
        loop {
            let n = self.driver.read_inbound(&mut self.scratch)?;
            if n == 0 {
                return Ok(());
            }

            let mut controls = 0usize;
            for idx in memchr::memchr2_iter(XON, XOFF, &self.scratch[..n]) {
                if let Some(byte) = ControlByte::from_byte(self.scratch[idx]) {
                    self.pending.push_back(byte);
                    controls += 1;
                }
            }
            self.discarded_inbound += (n - controls) as u64;

            if n < self.scratch.len() {
                return Ok(());
            }
        }
    }
}
