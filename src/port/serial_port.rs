//! The port handle applications write through.
//!
//! A [`SerialPort`] is shared across threads (`&self` everywhere). Opening it
//! starts a session: a [`WriteScheduler`], the line controller owning the
//! driver, and a drain worker thread. Closing tears the session down and
//! releases any writer still blocked in it.

use super::error::PortError;
use super::lines::HandshakeLineController;
use super::scheduler::{run_drain_worker, DrainConfig, PortSnapshot, WriteScheduler};
use super::sync_port::HardwareDriver;
use super::traits::{Handshake, PortSettings, SerialDriver, WriteTimeout};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Everything that exists only while the port is open.
#[derive(Debug)]
struct Session {
    scheduler: WriteScheduler,
    lines: Arc<Mutex<HandshakeLineController>>,
    worker: Option<JoinHandle<()>>,
    handshake: Handshake,
}

/// A serial port with a buffered, flow-controlled write path.
///
/// # Example
/// ```
/// use serial_flow::port::{MockDriver, SerialPort};
///
/// let port = SerialPort::new("COM1");
/// port.open_with(Box::new(MockDriver::new("COM1")))?;
/// port.write(b"hello")?;
/// port.close()?;
/// # Ok::<(), serial_flow::port::PortError>(())
/// ```
#[derive(Debug)]
pub struct SerialPort {
    name: String,
    settings: Mutex<PortSettings>,
    session: Mutex<Option<Session>>,
}

impl SerialPort {
    /// A closed port with default settings.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_settings(name, PortSettings::default())
    }

    pub fn with_settings(name: impl Into<String>, settings: PortSettings) -> Self {
        Self {
            name: name.into(),
            settings: Mutex::new(settings),
            session: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Copy of the current settings.
    pub fn settings(&self) -> PortSettings {
        self.settings.lock().clone()
    }

    /// Open the named device through the OS serial stack.
    pub fn open(&self) -> Result<(), PortError> {
        if self.is_open() {
            return Err(PortError::AlreadyOpen);
        }
        let baud_rate = self.settings.lock().baud_rate;
        let driver = HardwareDriver::open(&self.name, baud_rate)?;
        self.open_with(Box::new(driver))
    }

    /// Open the port on top of an arbitrary driver.
    ///
    /// A failure leaves the port closed and the driver released.
    pub fn open_with(&self, driver: Box<dyn SerialDriver>) -> Result<(), PortError> {
        let mut slot = self.session.lock();
        if slot.is_some() {
            return Err(PortError::AlreadyOpen);
        }
        let settings = self.settings.lock().clone();
        settings.validate()?;

        let scheduler = WriteScheduler::new(settings.write_buffer_size, settings.handshake);
        let mut lines = HandshakeLineController::new(driver);
        let push = lines.subscribe(scheduler.waker());
        if let Err(e) = Self::prime_lines(&mut lines, &scheduler, &settings) {
            if let Err(close_err) = lines.close() {
                debug!("driver close after failed open: {}", close_err);
            }
            return Err(e);
        }
        let lines = Arc::new(Mutex::new(lines));

        let config = DrainConfig {
            chunk_size: settings.drain_chunk_size,
            poll_interval: (!push).then_some(settings.line_poll_interval),
            stall_backoff: settings.line_poll_interval,
        };
        let spawned = thread::Builder::new()
            .name(format!("{}-drain", self.name))
            .spawn({
                let scheduler = scheduler.clone();
                let lines = Arc::clone(&lines);
                move || run_drain_worker(scheduler, lines, config)
            });
        let worker = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                scheduler.close();
                if let Err(close_err) = lines.lock().close() {
                    debug!("driver close after failed open: {}", close_err);
                }
                return Err(PortError::Io(e));
            }
        };

        info!(
            port = %self.name,
            handshake = %settings.handshake,
            write_timeout = %settings.write_timeout,
            capacity = settings.write_buffer_size,
            push_lines = push,
            "port opened"
        );
        *slot = Some(Session {
            scheduler,
            lines,
            worker: Some(worker),
            handshake: settings.handshake,
        });
        Ok(())
    }

    /// Drive RTS for the session and seed the gate with the current lines.
    fn prime_lines(
        lines: &mut HandshakeLineController,
        scheduler: &WriteScheduler,
        settings: &PortSettings,
    ) -> Result<(), PortError> {
        let rts = settings.handshake.uses_hardware() || settings.rts_enable;
        lines.set_rts(rts)?;
        let events = lines.sample()?;
        scheduler.apply_line_events(&events);
        Ok(())
    }

    /// Close the port. Closing a closed port is a no-op.
    pub fn close(&self) -> Result<(), PortError> {
        let Some(mut session) = self.session.lock().take() else {
            return Ok(());
        };
        let dropped = session.scheduler.close();
        if let Some(worker) = session.worker.take() {
            if worker.join().is_err() {
                warn!(port = %self.name, "drain worker panicked");
            }
        }
        session.lines.lock().close()?;
        info!(port = %self.name, dropped, "port closed");
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.session.lock().is_some()
    }

    fn scheduler(&self) -> Result<WriteScheduler, PortError> {
        self.session
            .lock()
            .as_ref()
            .map(|s| s.scheduler.clone())
            .ok_or(PortError::NotOpen)
    }

    /// Write with the port's configured timeout.
    pub fn write(&self, data: &[u8]) -> Result<(), PortError> {
        self.write_with_timeout(data, self.write_timeout())
    }

    /// Queue `data`, blocking until it is committed or `timeout` elapses.
    pub fn write_with_timeout(&self, data: &[u8], timeout: WriteTimeout) -> Result<(), PortError> {
        self.scheduler()?.write(data, timeout)
    }

    /// Write `count` bytes of `data` starting at `offset`.
    pub fn write_range(&self, data: &[u8], offset: usize, count: usize) -> Result<(), PortError> {
        let end = offset
            .checked_add(count)
            .filter(|&end| end <= data.len())
            .ok_or_else(|| {
                PortError::invalid_argument(format!(
                    "range {offset}+{count} exceeds payload of {} byte(s)",
                    data.len()
                ))
            })?;
        self.write(&data[offset..end])
    }

    /// Bytes queued and not yet handed to the driver. Zero when closed.
    pub fn bytes_to_write(&self) -> usize {
        self.scheduler().map_or(0, |s| s.bytes_to_write())
    }

    /// Last CTS level seen by the engine. False when closed.
    pub fn cts_holding(&self) -> bool {
        self.scheduler().is_ok_and(|s| s.snapshot().cts_holding)
    }

    pub fn rts_enable(&self) -> bool {
        let lines = self.session.lock().as_ref().map(|s| Arc::clone(&s.lines));
        match lines {
            Some(lines) => lines.lock().rts(),
            None => self.settings.lock().rts_enable,
        }
    }

    /// Drive RTS directly. Not allowed while an open port runs a hardware
    /// handshake.
    pub fn set_rts_enable(&self, level: bool) -> Result<(), PortError> {
        let open = self
            .session
            .lock()
            .as_ref()
            .map(|s| (s.handshake, Arc::clone(&s.lines), s.scheduler.clone()));
        if let Some((handshake, lines, scheduler)) = open {
            if handshake.uses_hardware() {
                return Err(PortError::invalid_state(format!(
                    "RTS is owned by the {handshake} handshake"
                )));
            }
            lines.lock().set_rts(level)?;
            scheduler.mark_lines_dirty();
        }
        self.settings.lock().rts_enable = level;
        Ok(())
    }

    pub fn handshake(&self) -> Handshake {
        self.settings.lock().handshake
    }

    /// Change the handshake. Only allowed while closed.
    pub fn set_handshake(&self, handshake: Handshake) -> Result<(), PortError> {
        if self.is_open() {
            return Err(PortError::invalid_state(
                "handshake cannot change while the port is open",
            ));
        }
        self.settings.lock().handshake = handshake;
        Ok(())
    }

    pub fn write_timeout(&self) -> WriteTimeout {
        self.settings.lock().write_timeout
    }

    /// Applies to writes issued after the call.
    pub fn set_write_timeout(&self, timeout: WriteTimeout) {
        self.settings.lock().write_timeout = timeout;
    }

    /// Drop every queued byte; returns how many were dropped.
    pub fn discard_out_buffer(&self) -> Result<usize, PortError> {
        let dropped = self.scheduler()?.discard();
        debug!(port = %self.name, dropped, "output buffer discarded");
        Ok(dropped)
    }

    pub fn snapshot(&self) -> PortSnapshot {
        self.scheduler()
            .map_or_else(|_| PortSnapshot::closed(), |s| s.snapshot())
    }

    /// Block until `predicate` holds or `timeout` elapses.
    pub fn wait_for(&self, predicate: impl Fn(&PortSnapshot) -> bool, timeout: Duration) -> bool {
        match self.scheduler() {
            Ok(scheduler) => scheduler.wait_for(predicate, timeout),
            Err(_) => predicate(&PortSnapshot::closed()),
        }
    }
}

impl Drop for SerialPort {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            debug!(port = %self.name, "close on drop failed: {}", e);
        }
    }
}
