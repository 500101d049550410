//! Bounded FIFO of bytes awaiting transmission.

use std::collections::VecDeque;

/// Bytes copied off the front of a [`TransmitBuffer`] for the driver.
///
/// The chunk stays in the buffer until [`TransmitBuffer::complete`] reports
/// how much of it the driver accepted, so `occupancy()` only drops once bytes
/// really left.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrainChunk {
    pub bytes: Vec<u8>,
    epoch: u64,
}

/// Bounded, strictly ordered queue of pending transmit bytes.
#[derive(Debug)]
pub struct TransmitBuffer {
    queue: VecDeque<u8>,
    capacity: usize,
    /// Bumped on every discard so in-flight chunks cannot consume newer bytes.
    epoch: u64,
}

impl TransmitBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: VecDeque::with_capacity(capacity),
            capacity,
            epoch: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of bytes currently queued.
    pub fn occupancy(&self) -> usize {
        self.queue.len()
    }

    pub fn room(&self) -> usize {
        self.capacity - self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Append as many bytes as capacity allows; returns the accepted count.
    pub fn enqueue(&mut self, bytes: &[u8]) -> usize {
        let accepted = bytes.len().min(self.room());
        self.queue.extend(&bytes[..accepted]);
        accepted
    }

    /// Copy up to `max` bytes off the front without removing them.
    pub fn drain_chunk(&self, max: usize) -> Option<DrainChunk> {
        if self.queue.is_empty() || max == 0 {
            return None;
        }
        let len = max.min(self.queue.len());
        Some(DrainChunk {
            bytes: self.queue.iter().take(len).copied().collect(),
            epoch: self.epoch,
        })
    }

    /// Remove the first `accepted` bytes of `chunk` from the queue.
    ///
    /// Returns the number of bytes removed, which is zero when the buffer was
    /// discarded after the chunk was taken.
    pub fn complete(&mut self, chunk: &DrainChunk, accepted: usize) -> usize {
        if chunk.epoch != self.epoch {
            return 0;
        }
        let removed = accepted.min(chunk.bytes.len()).min(self.queue.len());
        self.queue.drain(..removed);
        removed
    }

    /// Drop everything queued; returns how many bytes were discarded.
    pub fn discard(&mut self) -> usize {
        let dropped = self.queue.len();
        self.queue.clear();
        self.epoch = self.epoch.wrapping_add(1);
        dropped
    }
}
