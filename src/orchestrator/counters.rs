//! Completion counters shared by concurrent imports.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Completed and failed import counts for a single batch.
///
/// Each import updates exactly one counter, from whichever task finishes
/// it. Counts only ever grow.
#[derive(Debug, Default)]
pub struct BatchCounters {
    completed: AtomicUsize,
    failed: AtomicUsize,
}

impl BatchCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a successful import and returns the new completed count.
    pub fn record_completed(&self) -> usize {
        self.completed.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Records a failed import and returns the new failed count.
    pub fn record_failed(&self) -> usize {
        self.failed.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }
}
