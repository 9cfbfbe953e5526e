//! Outbound frames waiting for a live connection.

use std::collections::VecDeque;

/// FIFO of unsent frames. Unbounded so user input is never dropped.
#[derive(Debug, Default)]
pub(crate) struct PendingQueue {
    frames: VecDeque<String>,
}

impl PendingQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn enqueue(&mut self, text: String) {
        self.frames.push_back(text);
    }

    /// Transmits queued frames in order through `transmit`, removing each
    /// one only after it was handed over. Stops at the first refusal and
    /// returns how many frames left the queue.
    pub(crate) fn drain_with<F>(&mut self, mut transmit: F) -> usize
    where
        F: FnMut(String) -> Result<(), String>,
    {
        let mut sent = 0;
        while let Some(front) = self.frames.front() {
            if transmit(front.clone()).is_err() {
                break;
            }
            self.frames.pop_front();
            sent += 1;
        }
        sent
    }

    pub(crate) fn len(&self) -> usize {
        self.frames.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.frames.clear();
    }
}
