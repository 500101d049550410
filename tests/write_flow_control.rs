//! End-to-end behavior of the write path over an in-memory null modem.

mod common;

use common::{payload, spawn_write, NullModem, WAIT};
use pretty_assertions::assert_eq;
use serial_flow::port::{Handshake, PortError, PortSettings, SerialPort, WriteTimeout};
use std::thread;
use std::time::{Duration, Instant};

/// Long enough for a wrongly-unblocked writer to make progress.
const SETTLE: Duration = Duration::from_millis(50);

#[test]
fn test_no_handshake_never_blocks() {
    let modem = NullModem::open(Handshake::None, WriteTimeout::from_millis(5_000));
    let data = payload(10_000);

    modem.local.write(&data).unwrap();

    assert!(modem.wait_drained());
    assert_eq!(modem.received_by_remote(), data);
}

#[test]
fn test_no_handshake_ignores_inbound_xoff() {
    let modem = NullModem::open(Handshake::None, WriteTimeout::from_millis(5_000));
    modem.remote.write(&[serial_flow::port::XOFF]).unwrap();

    let deadline = Instant::now() + WAIT;
    while modem.remote.bytes_to_write() > 0 || modem.local_driver.pending_inbound() > 0 {
        assert!(Instant::now() < deadline, "XOFF never reached the local port");
        thread::sleep(Duration::from_millis(1));
    }
    thread::sleep(SETTLE);

    let snapshot = modem.local.snapshot();
    assert!(snapshot.gate_open);
    assert!(!snapshot.xoff_received);

    modem.local.write(&payload(8)).unwrap();
    assert!(modem.wait_drained());
}

#[test]
fn test_rts_blocks_until_peer_raises_rts() {
    let modem = NullModem::open(Handshake::RequestToSend, WriteTimeout::Infinite);
    assert!(modem.local_driver.rts(), "hardware handshake asserts RTS");
    assert!(!modem.local.cts_holding());

    let data = payload(100);
    let writer = spawn_write(&modem.local, data.clone());

    assert!(modem.wait_local(|s| s.bytes_to_write == 100));
    thread::sleep(SETTLE);
    assert_eq!(modem.local.bytes_to_write(), 100);
    assert!(!writer.is_finished());

    modem.set_peer_rts(true);
    writer.join().unwrap().unwrap();

    assert!(modem.wait_drained());
    assert!(modem.local.cts_holding());
    assert_eq!(modem.received_by_remote(), data);
}

#[test]
fn test_xoff_blocks_and_xon_releases() {
    let modem = NullModem::open(Handshake::XOnXOff, WriteTimeout::Infinite);
    modem.send_xoff();

    let data = payload(64);
    let writer = spawn_write(&modem.local, data.clone());

    assert!(modem.wait_local(|s| s.bytes_to_write == 64));
    thread::sleep(SETTLE);
    assert_eq!(modem.local.bytes_to_write(), 64);
    assert!(modem.received_by_remote().is_empty());

    modem.send_xon();
    writer.join().unwrap().unwrap();

    assert!(modem.wait_drained());
    assert_eq!(modem.received_by_remote(), data);
}

#[test]
fn test_combined_handshake_requires_both_conditions() {
    let modem = NullModem::open(Handshake::RequestToSendXOnXOff, WriteTimeout::Infinite);
    modem.set_peer_rts(true);
    assert!(modem.wait_local(|s| s.gate_open));

    modem.send_xoff();
    let writer = spawn_write(&modem.local, payload(16));
    assert!(modem.wait_local(|s| s.bytes_to_write == 16));

    // CTS drops before XON arrives: still blocked afterwards
    modem.set_peer_rts(false);
    assert!(modem.wait_local(|s| !s.cts_holding));
    modem.send_xon();
    assert!(modem.wait_local(|s| !s.xoff_received));
    thread::sleep(SETTLE);
    assert!(!modem.local.snapshot().gate_open);
    assert_eq!(modem.local.bytes_to_write(), 16);

    modem.set_peer_rts(true);
    writer.join().unwrap().unwrap();
    assert!(modem.wait_drained());
}

#[test]
fn test_blocked_writes_queue_additively() {
    let modem = NullModem::open(Handshake::XOnXOff, WriteTimeout::from_millis(100));
    modem.send_xoff();

    let first = payload(32);
    let second: Vec<u8> = first.iter().rev().copied().collect();

    let err = modem.local.write(&first).unwrap_err();
    assert!(matches!(err, PortError::Timeout { queued: 32, .. }));
    assert_eq!(modem.local.bytes_to_write(), 32);

    let err = modem.local.write(&second).unwrap_err();
    assert!(err.is_timeout());
    assert_eq!(modem.local.bytes_to_write(), 64);

    modem.send_xon();
    assert!(modem.wait_drained());
    assert_eq!(modem.received_by_remote(), [first, second].concat());
}

#[test]
fn test_close_releases_blocked_writer_with_closed() {
    let modem = NullModem::open(Handshake::XOnXOff, WriteTimeout::from_millis(10_000));
    modem.send_xoff();

    let writer = spawn_write(&modem.local, payload(8));
    assert!(modem.wait_local(|s| s.bytes_to_write == 8));

    let started = Instant::now();
    modem.local.close().unwrap();
    let result = writer.join().unwrap();

    assert!(matches!(result, Err(PortError::Closed)), "got {result:?}");
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(modem.local.bytes_to_write(), 0);
}

#[test]
fn test_write_requires_open_port() {
    let port = SerialPort::new("COM1");
    assert!(matches!(port.write(b"x"), Err(PortError::NotOpen)));

    let modem = NullModem::open(Handshake::None, WriteTimeout::Infinite);
    modem.local.close().unwrap();
    assert!(matches!(modem.local.write(b"x"), Err(PortError::NotOpen)));
}

#[test]
fn test_write_after_failed_open() {
    let port = SerialPort::new("/dev/serial_flow_missing_device");
    assert!(port.open().is_err());
    assert!(!port.is_open());
    assert!(matches!(port.write(b"x"), Err(PortError::NotOpen)));
}

#[test]
fn test_zero_timeout_fails_fast() {
    let modem = NullModem::open(Handshake::XOnXOff, WriteTimeout::from_millis(0));
    modem.send_xoff();

    let started = Instant::now();
    let err = modem.local.write(b"now").unwrap_err();
    assert!(err.is_timeout());
    assert!(started.elapsed() < Duration::from_millis(500));
}

#[test]
fn test_empty_write_succeeds_while_blocked() {
    let modem = NullModem::open(Handshake::XOnXOff, WriteTimeout::Infinite);
    modem.send_xoff();

    modem.local.write(&[]).unwrap();
    assert_eq!(modem.local.bytes_to_write(), 0);
}

#[test]
fn test_timeout_keeps_admitted_prefix_only() {
    let modem = NullModem::open_with(PortSettings {
        handshake: Handshake::XOnXOff,
        write_timeout: WriteTimeout::from_millis(50),
        write_buffer_size: 8,
        ..PortSettings::default()
    });
    modem.send_xoff();

    let data = payload(20);
    let err = modem.local.write(&data).unwrap_err();
    assert!(matches!(err, PortError::Timeout { queued: 8, .. }));
    assert_eq!(modem.local.bytes_to_write(), 8);

    modem.send_xon();
    assert!(modem.wait_drained());
    thread::sleep(SETTLE);
    assert_eq!(modem.received_by_remote(), data[..8].to_vec());
}

#[test]
fn test_large_write_flows_through_small_buffer() {
    let modem = NullModem::open_with(PortSettings {
        handshake: Handshake::XOnXOff,
        write_buffer_size: 16,
        drain_chunk_size: 4,
        ..PortSettings::default()
    });
    let data = payload(1_000);

    modem.local.write(&data).unwrap();
    assert!(modem.wait_drained());
    assert_eq!(modem.received_by_remote(), data);
}

#[test]
fn test_discard_makes_room_for_waiting_writer() {
    let modem = NullModem::open_with(PortSettings {
        handshake: Handshake::XOnXOff,
        write_buffer_size: 4,
        ..PortSettings::default()
    });
    modem.send_xoff();

    let stale = b"old!".to_vec();
    assert!(modem
        .local
        .write_with_timeout(&stale, WriteTimeout::from_millis(10))
        .unwrap_err()
        .is_timeout());

    let fresh = b"new!".to_vec();
    let writer = spawn_write(&modem.local, fresh.clone());
    thread::sleep(SETTLE);
    assert!(!writer.is_finished());

    assert_eq!(modem.local.discard_out_buffer().unwrap(), 4);
    assert!(modem.wait_local(|s| s.bytes_to_write == 4));

    modem.send_xon();
    writer.join().unwrap().unwrap();
    assert!(modem.wait_drained());
    assert_eq!(modem.received_by_remote(), fresh);
}

#[test]
fn test_concurrent_writes_do_not_interleave() {
    let modem = NullModem::open(Handshake::XOnXOff, WriteTimeout::Infinite);
    modem.send_xoff();

    let writers: Vec<_> = (b'a'..=b'd')
        .map(|letter| spawn_write(&modem.local, vec![letter; 100]))
        .collect();
    assert!(modem.wait_local(|s| s.bytes_to_write == 400));

    modem.send_xon();
    for writer in writers {
        writer.join().unwrap().unwrap();
    }
    assert!(modem.wait_drained());

    let received = modem.received_by_remote();
    assert_eq!(received.len(), 400);
    for run in received.chunks(100) {
        assert!(run.iter().all(|&b| b == run[0]), "interleaved run: {run:?}");
    }
}

#[test]
fn test_driver_failure_faults_port() {
    let modem = NullModem::open(Handshake::None, WriteTimeout::Infinite);
    modem.local_driver.set_fail_next_transmit(true);

    modem.local.write(b"doomed").unwrap();
    assert!(modem.wait_local(|s| s.faulted));

    assert!(matches!(
        modem.local.write(b"more"),
        Err(PortError::Faulted(_))
    ));
    modem.local.close().unwrap();
    assert!(matches!(modem.local.write(b"more"), Err(PortError::NotOpen)));
}

#[test]
fn test_write_range_validates_bounds() {
    let modem = NullModem::open(Handshake::None, WriteTimeout::Infinite);
    let data = b"0123456789";

    assert!(matches!(
        modem.local.write_range(data, 5, 6),
        Err(PortError::InvalidArgument(_))
    ));

    modem.local.write_range(data, 3, 4).unwrap();
    assert!(modem.wait_drained());
    assert_eq!(modem.received_by_remote(), b"3456".to_vec());
}

#[test]
fn test_cts_holding_follows_peer_rts() {
    let modem = NullModem::open(Handshake::None, WriteTimeout::Infinite);
    assert!(!modem.local.cts_holding());

    modem.set_peer_rts(true);
    assert!(modem.wait_local(|s| s.cts_holding));

    modem.set_peer_rts(false);
    assert!(modem.wait_local(|s| !s.cts_holding));
}

#[test]
fn test_handshake_owns_rts() {
    let modem = NullModem::open(Handshake::RequestToSend, WriteTimeout::Infinite);
    assert!(matches!(
        modem.local.set_rts_enable(false),
        Err(PortError::InvalidState(_))
    ));
    assert!(matches!(
        modem.local.set_handshake(Handshake::None),
        Err(PortError::InvalidState(_))
    ));

    // the peer sees our RTS as its CTS
    assert!(modem.remote.wait_for(|s| s.cts_holding, WAIT));
}

#[test]
fn test_write_timeout_change_applies_to_next_write() {
    let modem = NullModem::open(Handshake::XOnXOff, WriteTimeout::Infinite);
    modem.send_xoff();

    modem.local.set_write_timeout(WriteTimeout::from_millis(20));
    assert_eq!(modem.local.write_timeout(), WriteTimeout::from_millis(20));
    assert!(modem.local.write(b"x").unwrap_err().is_timeout());
}
