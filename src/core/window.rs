//! Sliding window of derived detection labels.

use std::collections::VecDeque;
use serde::{Deserialize, Serialize};

/// Default number of labels handed to the classifiers
pub const WINDOW_SIZE: usize = 3;

/// Bounded FIFO of `{0,1}` labels.
///
/// Holds at most `2 * window_size` labels; each append past capacity evicts
/// the single oldest label.
#[derive(Debug, Clone)]
pub struct SlidingWindowBuffer {
    labels: VecDeque<u8>,
    window_size: usize,
}

impl SlidingWindowBuffer {
    pub fn new(window_size: usize) -> Self {
        let capacity = window_size * 2;
        Self {
            labels: VecDeque::with_capacity(capacity + 1),
            window_size,
        }
    }

    pub fn push(&mut self, label: u8) {
        self.labels.push_back(label);
        if self.labels.len() > self.capacity() {
            self.labels.pop_front();
        }
    }

    pub fn extend<I: IntoIterator<Item = u8>>(&mut self, labels: I) {
        for label in labels {
            self.push(label);
        }
    }

    /// Most recent `window_size` labels, oldest first
    pub fn window(&self) -> Option<Vec<u8>> {
        if self.labels.len() < self.window_size {
            return None;
        }
        let start = self.labels.len() - self.window_size;
        Some(self.labels.iter().skip(start).copied().collect())
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.window_size * 2
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn labels(&self) -> Vec<u8> {
        self.labels.iter().copied().collect()
    }

    pub fn status(&self) -> BufferStatus {
        BufferStatus {
            current_size: self.len(),
            capacity: self.capacity(),
            window_size: self.window_size,
            is_ready: self.len() >= self.window_size,
        }
    }
}

/// Buffer status information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferStatus {
    pub current_size: usize,
    pub capacity: usize,
    pub window_size: usize,
    pub is_ready: bool,
}
