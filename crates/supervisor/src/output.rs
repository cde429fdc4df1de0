//! Ring buffer of recent child output lines, redacted on the way in.

use flowforge_core::Redactor;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Bounded, shareable buffer of the most recent output lines.
///
/// Every line is passed through the redactor before it is stored, so no raw
/// secret ever sits in memory longer than the read that produced it.
#[derive(Clone)]
pub struct OutputRing {
    redactor: Redactor,
    lines: Arc<Mutex<VecDeque<String>>>,
    capacity: usize,
}

impl OutputRing {
    pub fn new(capacity: usize, redactor: Redactor) -> Self {
        Self {
            redactor,
            lines: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity: capacity.max(1),
        }
    }

    /// Redact and append one line, evicting the oldest when full.
    pub fn push(&self, line: &str) {
        let redacted = self.redactor.redact(line);
        let mut lines = self.lines.lock();
        if lines.len() == self.capacity {
            lines.pop_front();
        }
        lines.push_back(redacted);
    }

    /// Last `n` lines, oldest first.
    pub fn last(&self, n: usize) -> Vec<String> {
        let lines = self.lines.lock();
        let skip = lines.len().saturating_sub(n);
        lines.iter().skip(skip).cloned().collect()
    }

    /// Most recent line, if any.
    pub fn last_line(&self) -> Option<String> {
        self.lines.lock().back().cloned()
    }

    pub fn len(&self) -> usize {
        self.lines.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.lock().is_empty()
    }

    /// Drop all buffered lines (used between runs).
    pub fn clear(&self) {
        self.lines.lock().clear();
    }
}

#[cfg(test)]
#[path = "output_tests.rs"]
mod tests;
