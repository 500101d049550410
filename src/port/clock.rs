//! Monotonic deadlines for bounded writes.
//!
//! Built on [`Instant`], so wall-clock adjustments never stretch or shrink a
//! write timeout. Nothing here blocks.

use super::traits::WriteTimeout;
use std::time::{Duration, Instant};

/// Source of deadlines and elapsed-time measurements.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeoutClock;

impl TimeoutClock {
    pub fn now(&self) -> Instant {
        Instant::now()
    }

    /// Deadline `timeout` from now.
    pub fn deadline(&self, timeout: WriteTimeout) -> Deadline {
        Deadline::starting_at(self.now(), timeout)
    }

    /// Start measuring elapsed time.
    pub fn stopwatch(&self) -> Stopwatch {
        Stopwatch { started: self.now() }
    }
}

/// Point in time after which a write gives up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Option<Instant>,
    timeout: WriteTimeout,
}

impl Deadline {
    pub fn starting_at(start: Instant, timeout: WriteTimeout) -> Self {
        let at = timeout
            .as_duration()
            .map(|d| start.checked_add(d).unwrap_or(start + Duration::from_secs(86_400 * 365)));
        Self { at, timeout }
    }

    /// `None` for an infinite timeout.
    pub fn instant(&self) -> Option<Instant> {
        self.at
    }

    pub fn timeout(&self) -> WriteTimeout {
        self.timeout
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    pub fn is_expired_at(&self, now: Instant) -> bool {
        self.at.is_some_and(|at| now >= at)
    }

    /// Time left, `None` when unbounded.
    pub fn remaining(&self) -> Option<Duration> {
        self.at.map(|at| at.saturating_duration_since(Instant::now()))
    }
}

/// Elapsed-time measurement.
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    started: Instant,
}

impl Stopwatch {
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// One write call: its payload and the deadline it runs against.
#[derive(Debug, Clone, Copy)]
pub struct WriteRequest<'a> {
    pub payload: &'a [u8],
    pub submitted: Instant,
    pub deadline: Deadline,
}

impl<'a> WriteRequest<'a> {
    pub fn new(clock: &TimeoutClock, payload: &'a [u8], timeout: WriteTimeout) -> Self {
        let submitted = clock.now();
        Self {
            payload,
            submitted,
            deadline: Deadline::starting_at(submitted, timeout),
        }
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}
