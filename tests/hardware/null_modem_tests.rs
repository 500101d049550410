//! Flow control over a physical null-modem cable.
//!
//! # Running Hardware Tests
//!
//! ```bash
//! export TEST_PORT=/dev/ttyUSB0       # port under test
//! export TEST_PEER_PORT=/dev/ttyUSB1  # other end of the cable
//! export TEST_BAUD=9600               # optional, default: 9600
//!
//! cargo test --test integration_hardware -- --ignored --test-threads=1
//! ```

use super::utils::{HardwarePair, TimingHelper};
use serial_flow::config::TimingConfig;
use serial_flow::port::{Handshake, PortError, WriteTimeout, XOFF, XON};
use serial_flow::timing::measure_write_timeout;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(2);

fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| b'A' + (i % 26) as u8).collect()
}

#[test]
#[ignore] // Run with --ignored flag
fn test_hw_no_handshake_drains() {
    let Some(pair) = HardwarePair::setup(Handshake::None, WriteTimeout::from_millis(5_000)) else {
        return;
    };

    let timer = TimingHelper::new("no-handshake drain");
    pair.local.write(&payload(512)).unwrap();
    assert!(pair.local.wait_for(|s| s.bytes_to_write == 0, WAIT));
    timer.finish();
}

#[test]
#[ignore]
fn test_hw_rts_cts_block_and_release() {
    let Some(pair) = HardwarePair::setup(Handshake::RequestToSend, WriteTimeout::Infinite) else {
        return;
    };

    pair.remote.set_rts_enable(false).unwrap();
    assert!(pair.local.wait_for(|s| !s.cts_holding, WAIT));

    let err = pair
        .local
        .write_with_timeout(&payload(64), WriteTimeout::from_millis(200))
        .unwrap_err();
    assert!(err.is_timeout());
    assert_eq!(pair.local.bytes_to_write(), 64);

    pair.remote.set_rts_enable(true).unwrap();
    assert!(pair.local.wait_for(|s| s.cts_holding, WAIT));
    assert!(pair.local.wait_for(|s| s.bytes_to_write == 0, WAIT));
}

#[test]
#[ignore]
fn test_hw_xon_xoff_block_and_release() {
    let Some(pair) = HardwarePair::setup(Handshake::XOnXOff, WriteTimeout::from_millis(200))
    else {
        return;
    };

    pair.remote.write(&[XOFF]).unwrap();
    assert!(pair.local.wait_for(|s| !s.gate_open, WAIT));

    assert!(pair.local.write(&payload(32)).unwrap_err().is_timeout());
    assert!(pair.local.write(&payload(32)).unwrap_err().is_timeout());
    assert_eq!(pair.local.bytes_to_write(), 64);

    pair.remote.write(&[XON]).unwrap();
    assert!(pair.local.wait_for(|s| s.bytes_to_write == 0, WAIT));
}

#[test]
#[ignore]
fn test_hw_timeout_accuracy() {
    let Some(pair) = HardwarePair::setup(Handshake::XOnXOff, WriteTimeout::from_millis(250))
    else {
        return;
    };

    pair.remote.write(&[XOFF]).unwrap();
    assert!(pair.local.wait_for(|s| !s.gate_open, WAIT));

    let report = measure_write_timeout(&pair.local, &TimingConfig::default()).unwrap();
    println!("{report:?}");
    assert!(report.within_tolerance());
}

#[test]
#[ignore]
fn test_hw_close_releases_writer() {
    let Some(pair) = HardwarePair::setup(Handshake::XOnXOff, WriteTimeout::Infinite) else {
        return;
    };

    pair.remote.write(&[XOFF]).unwrap();
    assert!(pair.local.wait_for(|s| !s.gate_open, WAIT));

    std::thread::scope(|scope| {
        let writer = scope.spawn(|| pair.local.write(&payload(16)));
        assert!(pair.local.wait_for(|s| s.bytes_to_write == 16, WAIT));
        pair.local.close().unwrap();
        assert!(matches!(writer.join().unwrap(), Err(PortError::Closed)));
    });
}
