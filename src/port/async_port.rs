//! Async facade over the blocking write path.
//!
//! Writes block by contract, so Tokio callers go through
//! [`BlockingPortWrapper`], which runs them on `tokio::task::spawn_blocking`
//! instead of stalling the runtime.

use super::error::PortError;
use super::serial_port::SerialPort;
use super::traits::WriteTimeout;
use async_trait::async_trait;
use std::sync::Arc;

/// Async trait for the serial write path.
#[async_trait]
pub trait AsyncPortWriter: Send + Sync {
    /// Write with the port's configured timeout.
    async fn write(&self, data: Vec<u8>) -> Result<(), PortError>;

    /// Write with an explicit timeout.
    async fn write_with_timeout(&self, data: Vec<u8>, timeout: WriteTimeout)
        -> Result<(), PortError>;

    /// Bytes queued and not yet handed to the driver.
    fn bytes_to_write(&self) -> usize;

    /// Get the name/path of this serial port.
    fn name(&self) -> &str;

    /// Close the port, releasing any pending writes.
    async fn close(&self) -> Result<(), PortError>;
}

/// Wrapper that provides an async interface for a [`SerialPort`].
///
/// # Example
/// ```
/// use serial_flow::port::{AsyncPortWriter, BlockingPortWrapper, MockDriver, SerialPort};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), serial_flow::port::PortError> {
/// let port = Arc::new(SerialPort::new("COM1"));
/// port.open_with(Box::new(MockDriver::new("COM1")))?;
///
/// let writer = BlockingPortWrapper::new(port);
/// writer.write(b"hello".to_vec()).await?;
/// writer.close().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct BlockingPortWrapper {
    inner: Arc<SerialPort>,
    /// Port name cached for quick access.
    name: String,
}

impl BlockingPortWrapper {
    pub fn new(port: Arc<SerialPort>) -> Self {
        let name = port.name().to_string();
        Self { inner: port, name }
    }

    /// The wrapped port, for the synchronous surface.
    pub fn port(&self) -> &Arc<SerialPort> {
        &self.inner
    }
}

fn join_error(e: tokio::task::JoinError) -> PortError {
    PortError::Io(std::io::Error::other(e))
}

#[async_trait]
impl AsyncPortWriter for BlockingPortWrapper {
    async fn write(&self, data: Vec<u8>) -> Result<(), PortError> {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || inner.write(&data))
            .await
            .map_err(join_error)?
    }

    async fn write_with_timeout(
        &self,
        data: Vec<u8>,
        timeout: WriteTimeout,
    ) -> Result<(), PortError> {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || inner.write_with_timeout(&data, timeout))
            .await
            .map_err(join_error)?
    }

    fn bytes_to_write(&self) -> usize {
        self.inner.bytes_to_write()
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn close(&self) -> Result<(), PortError> {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || inner.close())
            .await
            .map_err(join_error)?
    }
}
