//! Outbound command queue.
//!
//! Telegrams issued while the link is not open wait here, already encoded,
//! and are written head-first when the link opens.

use std::collections::VecDeque;

use bytes::Bytes;

/// FIFO buffer of telegrams waiting for the link.
#[derive(Debug, Default)]
pub struct CommandQueue {
    pending: VecDeque<Bytes>,
}

impl CommandQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a telegram to the tail.
    pub fn enqueue(&mut self, telegram: Bytes) {
        self.pending.push_back(telegram);
    }

    /// Puts a telegram back at the head, ahead of everything queued.
    ///
    /// Used when a drained telegram could not be written.
    pub fn requeue_front(&mut self, telegram: Bytes) {
        self.pending.push_front(telegram);
    }

    /// Removes and returns the oldest telegram.
    pub fn pop_front(&mut self) -> Option<Bytes> {
        self.pending.pop_front()
    }

    /// Number of telegrams waiting.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns true if nothing is waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
