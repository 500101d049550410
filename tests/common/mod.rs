//! Shared test utilities for serial-flow integration tests.
//!
//! This module provides common test infrastructure including:
//! - In-memory null-modem port pairs
//! - Helpers to hold and release the local transmitter from the far end
//! - Background writers for observing blocked writes

#![allow(dead_code)]

use serial_flow::port::{
    Handshake, MockDriver, PortError, PortSettings, PortSnapshot, SerialPort, WriteTimeout, XOFF,
    XON,
};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Upper bound for any state transition a test waits on.
pub const WAIT: Duration = Duration::from_secs(2);

/// Two ports joined by an in-memory null-modem cable.
///
/// `local` is the port under test; `remote` plays the receiving device and
/// runs without flow control so it can always signal.
pub struct NullModem {
    pub local: Arc<SerialPort>,
    pub remote: Arc<SerialPort>,
    pub local_driver: MockDriver,
    pub remote_driver: MockDriver,
}

impl NullModem {
    pub fn open(handshake: Handshake, timeout: WriteTimeout) -> Self {
        Self::open_with(PortSettings {
            handshake,
            write_timeout: timeout,
            ..PortSettings::default()
        })
    }

    pub fn open_with(settings: PortSettings) -> Self {
        let (local_driver, remote_driver) = MockDriver::null_modem("COM1", "COM2");
        let local = Arc::new(SerialPort::with_settings("COM1", settings));
        let remote = Arc::new(SerialPort::new("COM2"));
        remote
            .open_with(Box::new(remote_driver.clone()))
            .expect("open remote");
        local
            .open_with(Box::new(local_driver.clone()))
            .expect("open local");
        Self {
            local,
            remote,
            local_driver,
            remote_driver,
        }
    }

    /// Far end sends XOFF; returns once the local gate has closed.
    pub fn send_xoff(&self) {
        self.remote.write(&[XOFF]).expect("send XOFF");
        assert!(
            self.local.wait_for(|s| !s.gate_open, WAIT),
            "local gate did not close after XOFF"
        );
    }

    /// Far end sends XON.
    pub fn send_xon(&self) {
        self.remote.write(&[XON]).expect("send XON");
    }

    /// Far end raises or drops RTS, which is the local CTS.
    pub fn set_peer_rts(&self, level: bool) {
        self.remote.set_rts_enable(level).expect("drive peer RTS");
    }

    pub fn wait_local(&self, predicate: impl Fn(&PortSnapshot) -> bool) -> bool {
        self.local.wait_for(predicate, WAIT)
    }

    /// Wait until the local buffer has fully drained.
    pub fn wait_drained(&self) -> bool {
        self.wait_local(|s| s.bytes_to_write == 0)
    }

    /// Bytes the remote driver has received from the local port.
    pub fn received_by_remote(&self) -> Vec<u8> {
        self.local_driver.transmitted()
    }
}

/// Start a write on a background thread.
pub fn spawn_write(port: &Arc<SerialPort>, payload: Vec<u8>) -> JoinHandle<Result<(), PortError>> {
    let port = Arc::clone(port);
    thread::spawn(move || port.write(&payload))
}

/// Deterministic payload of `len` printable bytes, free of XON/XOFF.
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| b'A' + (i % 26) as u8).collect()
}
