//! Hardware serial driver.
//!
//! Wraps the `serialport` crate's `SerialPort` trait as a [`SerialDriver`].
//! The device is opened with flow control disabled because the engine applies
//! RTS/CTS and XON/XOFF itself; the OS only moves bytes.

use super::error::PortError;
use super::traits::SerialDriver;
use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

/// Per-call I/O timeout. Keeps `transmit` and `read_inbound` within one
/// driver tick.
const DEVICE_IO_TIMEOUT: Duration = Duration::from_millis(1);

/// Driver over a real serial device.
pub struct HardwareDriver {
    /// The underlying serial port implementation.
    port: Box<dyn serialport::SerialPort>,
    /// The port name/path for identification.
    name: String,
}

impl HardwareDriver {
    /// Open a serial device at `baud_rate`, 8N1, no OS flow control.
    ///
    /// # Example
    /// ```no_run
    /// use serial_flow::port::HardwareDriver;
    ///
    /// let driver = HardwareDriver::open("/dev/ttyUSB0", 115_200)?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn open(port_name: &str, baud_rate: u32) -> Result<Self, PortError> {
        let port = serialport::new(port_name, baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .timeout(DEVICE_IO_TIMEOUT)
            .open()
            .map_err(|e| match e.kind() {
                serialport::ErrorKind::NoDevice
                | serialport::ErrorKind::Io(std::io::ErrorKind::NotFound) => {
                    PortError::not_found(port_name)
                }
                serialport::ErrorKind::InvalidInput => PortError::config(e.to_string()),
                _ => PortError::Serial(e),
            })?;

        Ok(Self {
            port,
            name: port_name.to_string(),
        })
    }
}

/// Timeouts and interrupted calls mean "nothing moved this tick".
fn is_transient(error: &std::io::Error) -> bool {
    matches!(
        error.kind(),
        ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
    )
}

impl SerialDriver for HardwareDriver {
    fn name(&self) -> &str {
        &self.name
    }

    fn transmit(&mut self, data: &[u8]) -> Result<usize, PortError> {
        match self.port.write(data) {
            Ok(n) => Ok(n),
            Err(e) if is_transient(&e) => Ok(0),
            Err(e) => Err(PortError::Io(e)),
        }
    }

    fn set_rts(&mut self, level: bool) -> Result<(), PortError> {
        self.port
            .write_request_to_send(level)
            .map_err(PortError::Serial)
    }

    fn cts(&mut self) -> Result<bool, PortError> {
        self.port.read_clear_to_send().map_err(PortError::Serial)
    }

    fn read_inbound(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        let available = self.port.bytes_to_read().map_err(PortError::Serial)? as usize;
        if available == 0 || buffer.is_empty() {
            return Ok(0);
        }
        let want = available.min(buffer.len());
        match self.port.read(&mut buffer[..want]) {
            Ok(n) => Ok(n),
            Err(e) if is_transient(&e) => Ok(0),
            Err(e) => Err(PortError::Io(e)),
        }
    }

    fn close(&mut self) -> Result<(), PortError> {
        self.port
            .clear(serialport::ClearBuffer::Output)
            .map_err(PortError::Serial)
    }
}

impl std::fmt::Debug for HardwareDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HardwareDriver")
            .field("name", &self.name)
            .field("baud_rate", &self.port.baud_rate())
            .finish()
    }
}
