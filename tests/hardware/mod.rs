//! Hardware-specific tests requiring real serial devices.
//!
//! These tests are ignored by default and require actual hardware to run.
//! They should be run manually with the `--ignored` flag and the
//! `TEST_PORT` / `TEST_PEER_PORT` environment variables set.

pub mod null_modem_tests;
pub mod utils;
