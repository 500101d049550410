//! Write scheduling and the background drain worker.
//!
//! All mutable transmit state of a port (buffer, gate, status) lives behind a
//! single mutex. One condvar carries every change notification: bytes
//! admitted or drained, gate transitions, line wake-ups, close and faults.
//! Writers, the drain worker and `wait_for` observers all sleep on it, so a
//! change is seen by every party without any polling.
//!
//! Lock order: a line controller lock may be held while taking the engine
//! lock (driver wakers do this), never the other way round.

use super::buffer::{DrainChunk, TransmitBuffer};
use super::clock::{TimeoutClock, WriteRequest};
use super::error::PortError;
use super::gate::FlowControlGate;
use super::lines::{HandshakeLineController, LineEvent, LineWaker};
use super::traits::{Handshake, WriteTimeout};
use parking_lot::{Condvar, Mutex, MutexGuard};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
enum EngineStatus {
    Open,
    Closed,
    Faulted(String),
}

#[derive(Debug)]
struct EngineState {
    buffer: TransmitBuffer,
    gate: FlowControlGate,
    status: EngineStatus,
    /// A driver signalled that CTS or inbound data changed.
    lines_dirty: bool,
    /// Writers in arrival order; only the front one may admit bytes, so
    /// concurrent writes never interleave inside the buffer.
    admission_queue: VecDeque<u64>,
    next_ticket: u64,
}

impl EngineState {
    fn leave_queue(&mut self, ticket: u64) -> bool {
        match self.admission_queue.iter().position(|&t| t == ticket) {
            Some(idx) => {
                self.admission_queue.remove(idx);
                true
            }
            None => false,
        }
    }

    fn snapshot(&self) -> PortSnapshot {
        PortSnapshot {
            bytes_to_write: self.buffer.occupancy(),
            gate_open: self.gate.is_open(),
            cts_holding: self.gate.cts(),
            xoff_received: self.gate.software_blocked(),
            is_open: self.status == EngineStatus::Open,
            faulted: matches!(self.status, EngineStatus::Faulted(_)),
        }
    }
}

#[derive(Debug)]
struct Engine {
    state: Mutex<EngineState>,
    changed: Condvar,
}

/// Consistent view of a port's transmit state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PortSnapshot {
    pub bytes_to_write: usize,
    pub gate_open: bool,
    pub cts_holding: bool,
    pub xoff_received: bool,
    pub is_open: bool,
    pub faulted: bool,
}

impl PortSnapshot {
    /// Snapshot reported for a port that is not open.
    pub fn closed() -> Self {
        Self {
            bytes_to_write: 0,
            gate_open: false,
            cts_holding: false,
            xoff_received: false,
            is_open: false,
            faulted: false,
        }
    }
}

/// What the drain worker should do next.
#[derive(Debug)]
enum DrainStep {
    Transmit(DrainChunk),
    Resample,
    Stop,
}

/// Admits write requests into the transmit buffer under flow control.
///
/// Cloning yields another handle to the same engine.
#[derive(Debug, Clone)]
pub struct WriteScheduler {
    engine: Arc<Engine>,
    clock: TimeoutClock,
}

impl WriteScheduler {
    /// New open engine with an empty buffer. CTS starts low until the first
    /// line sample arrives.
    pub fn new(capacity: usize, handshake: Handshake) -> Self {
        Self {
            engine: Arc::new(Engine {
                state: Mutex::new(EngineState {
                    buffer: TransmitBuffer::new(capacity),
                    gate: FlowControlGate::new(handshake, false),
                    status: EngineStatus::Open,
                    lines_dirty: false,
                    admission_queue: VecDeque::new(),
                    next_ticket: 0,
                }),
                changed: Condvar::new(),
            }),
            clock: TimeoutClock,
        }
    }

    /// Queue `data`, blocking up to `timeout` for room and an open gate.
    pub fn write(&self, data: &[u8], timeout: WriteTimeout) -> Result<(), PortError> {
        self.submit(WriteRequest::new(&self.clock, data, timeout))
    }

    /// Run one write request to completion.
    ///
    /// The payload is split into capacity-sized chunks. Each chunk is admitted
    /// as room frees up and is committed once the gate is open. On timeout the
    /// admitted prefix stays queued and the rest is dropped.
    pub fn submit(&self, request: WriteRequest<'_>) -> Result<(), PortError> {
        let mut state = self.engine.state.lock();
        match &state.status {
            EngineStatus::Open => {}
            EngineStatus::Closed => return Err(PortError::NotOpen),
            EngineStatus::Faulted(reason) => return Err(PortError::Faulted(reason.clone())),
        }
        if request.is_empty() {
            return Ok(());
        }

        let ticket = state.next_ticket;
        state.next_ticket += 1;
        state.admission_queue.push_back(ticket);

        let result = self.run_request(&mut state, &request, ticket);
        if state.leave_queue(ticket) {
            self.engine.changed.notify_all();
        }
        result
    }

    fn run_request(
        &self,
        state: &mut MutexGuard<'_, EngineState>,
        request: &WriteRequest<'_>,
        ticket: u64,
    ) -> Result<(), PortError> {
        let capacity = state.buffer.capacity();
        let total = request.len();
        let mut queued = 0usize;

        for chunk in request.payload.chunks(capacity) {
            let mut admitted = 0usize;
            loop {
                match &state.status {
                    EngineStatus::Open => {}
                    EngineStatus::Closed => {
                        debug!(queued, "write released by close");
                        return Err(PortError::Closed);
                    }
                    EngineStatus::Faulted(reason) => {
                        return Err(PortError::Faulted(reason.clone()));
                    }
                }

                if admitted < chunk.len() && state.admission_queue.front() == Some(&ticket) {
                    let n = state.buffer.enqueue(&chunk[admitted..]);
                    if n > 0 {
                        admitted += n;
                        queued += n;
                        trace!(n, occupancy = state.buffer.occupancy(), "admitted");
                        if queued == total {
                            // Fully admitted: let the next writer in while we
                            // wait on the gate.
                            state.leave_queue(ticket);
                        }
                        self.engine.changed.notify_all();
                    }
                }

                if admitted == chunk.len() && state.gate.is_open() {
                    break;
                }

                if request.deadline.is_expired() {
                    let timeout = request.deadline.timeout().as_duration().unwrap_or_default();
                    debug!(
                        queued,
                        dropped = total - queued,
                        gate_open = state.gate.is_open(),
                        "write timed out after {:?}",
                        timeout
                    );
                    return Err(PortError::timeout(queued, timeout));
                }

                match request.deadline.instant() {
                    Some(at) => {
                        self.engine.changed.wait_until(state, at);
                    }
                    None => self.engine.changed.wait(state),
                }
            }
        }
        Ok(())
    }

    /// Feed line events into the gate and wake everyone on a transition.
    pub fn apply_line_events(&self, events: &[LineEvent]) {
        if events.is_empty() {
            return;
        }
        let mut state = self.engine.state.lock();
        for &event in events {
            if state.gate.apply(event) {
                debug!(?event, gate = ?state.gate.state(), "flow-control gate changed");
            }
        }
        self.engine.changed.notify_all();
    }

    /// Ask the drain worker to resample the lines now.
    pub fn mark_lines_dirty(&self) {
        let mut state = self.engine.state.lock();
        state.lines_dirty = true;
        self.engine.changed.notify_all();
    }

    /// Waker handed to drivers; holds only a weak reference to the engine.
    pub fn waker(&self) -> LineWaker {
        let engine = Arc::downgrade(&self.engine);
        LineWaker::new(move || {
            if let Some(engine) = engine.upgrade() {
                engine.state.lock().lines_dirty = true;
                engine.changed.notify_all();
            }
        })
    }

    pub fn bytes_to_write(&self) -> usize {
        self.engine.state.lock().buffer.occupancy()
    }

    pub fn snapshot(&self) -> PortSnapshot {
        self.engine.state.lock().snapshot()
    }

    /// Block until `predicate` holds for a snapshot or `timeout` elapses.
    ///
    /// Re-evaluated on every engine notification; returns the final verdict.
    /// A timeout too large to represent as an `Instant` waits without bound.
    pub fn wait_for(&self, predicate: impl Fn(&PortSnapshot) -> bool, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        let mut state = self.engine.state.lock();
        loop {
            if predicate(&state.snapshot()) {
                return true;
            }
            match deadline {
                Some(at) => {
                    if self.engine.changed.wait_until(&mut state, at).timed_out() {
                        return predicate(&state.snapshot());
                    }
                }
                None => self.engine.changed.wait(&mut state),
            }
        }
    }

    /// Drop every queued byte; returns the number dropped.
    pub fn discard(&self) -> usize {
        let mut state = self.engine.state.lock();
        let dropped = state.buffer.discard();
        self.engine.changed.notify_all();
        dropped
    }

    /// Mark the engine closed and release every waiter.
    pub fn close(&self) -> usize {
        let mut state = self.engine.state.lock();
        state.status = EngineStatus::Closed;
        let dropped = state.buffer.discard();
        self.engine.changed.notify_all();
        dropped
    }

    /// Invalidate the engine after a driver failure.
    pub fn fault(&self, error: &PortError) {
        let mut state = self.engine.state.lock();
        if state.status == EngineStatus::Open {
            warn!("port faulted: {}", error);
            state.status = EngineStatus::Faulted(error.to_string());
        }
        self.engine.changed.notify_all();
    }

    fn next_step(&self, max_chunk: usize, poll: Option<Duration>) -> DrainStep {
        let mut state = self.engine.state.lock();
        loop {
            if state.status != EngineStatus::Open {
                return DrainStep::Stop;
            }
            if state.lines_dirty {
                state.lines_dirty = false;
                return DrainStep::Resample;
            }
            if state.gate.is_open() {
                if let Some(chunk) = state.buffer.drain_chunk(max_chunk) {
                    return DrainStep::Transmit(chunk);
                }
            }
            match poll {
                Some(interval) => {
                    if self.engine.changed.wait_for(&mut state, interval).timed_out() {
                        return DrainStep::Resample;
                    }
                }
                None => self.engine.changed.wait(&mut state),
            }
        }
    }

    fn complete(&self, chunk: &DrainChunk, accepted: usize) {
        let mut state = self.engine.state.lock();
        let removed = state.buffer.complete(chunk, accepted);
        if removed > 0 {
            trace!(removed, occupancy = state.buffer.occupancy(), "drained");
            self.engine.changed.notify_all();
        }
    }

    /// Back off after the driver accepted nothing.
    fn stall(&self, backoff: Duration) {
        let mut state = self.engine.state.lock();
        if state.status == EngineStatus::Open && !state.lines_dirty {
            self.engine.changed.wait_for(&mut state, backoff);
        }
    }
}

/// Settings for the background drain worker.
#[derive(Debug, Clone, Copy)]
pub struct DrainConfig {
    pub chunk_size: usize,
    /// `None` when the driver pushes line changes through its waker.
    pub poll_interval: Option<Duration>,
    pub stall_backoff: Duration,
}

/// Body of the drain worker thread.
///
/// Samples the lines, feeds the gate, and hands queued bytes to the driver
/// while the gate is open. Exits when the engine closes or faults; a driver
/// error faults the engine.
pub fn run_drain_worker(
    scheduler: WriteScheduler,
    lines: Arc<Mutex<HandshakeLineController>>,
    config: DrainConfig,
) {
    debug!("drain worker started");
    loop {
        let sampled = lines.lock().sample();
        match sampled {
            Ok(events) => scheduler.apply_line_events(&events),
            Err(e) => {
                scheduler.fault(&e);
                break;
            }
        }

        match scheduler.next_step(config.chunk_size, config.poll_interval) {
            DrainStep::Stop => break,
            DrainStep::Resample => continue,
            DrainStep::Transmit(chunk) => {
                let sent = lines.lock().transmit(&chunk.bytes);
                match sent {
                    Ok(0) => scheduler.stall(config.stall_backoff),
                    Ok(accepted) => scheduler.complete(&chunk, accepted),
                    Err(e) => {
                        scheduler.fault(&e);
                        break;
                    }
                }
            }
        }
    }
    debug!("drain worker stopped");
}
