//! Active-task gauge
//!
//! A single process-wide count of task units currently executing. Task
//! units never touch the counter directly; they hold a [`TaskGuard`] from
//! [`ActiveTasks::enter`] for the whole of their run, so the count drops
//! back when the unit returns, fails, panics or is cancelled.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Thread-safe count of running task units (cloneable, all clones share state)
#[derive(Clone, Debug, Default)]
pub struct ActiveTasks {
    count: Arc<AtomicUsize>,
}

impl ActiveTasks {
    /// Create a gauge starting at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one running unit
    pub fn increment(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }

    /// Remove one running unit
    ///
    /// A decrement at zero is refused and reported; the gauge never goes
    /// negative.
    pub fn decrement(&self) {
        let result = self
            .count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if result.is_err() {
            tracing::error!("Active task gauge decremented below zero; ignoring");
        }
    }

    /// Number of units running at this instant
    pub fn current(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// Count a unit as running until the returned guard is dropped
    pub fn enter(&self) -> TaskGuard {
        self.increment();
        TaskGuard {
            gauge: self.clone(),
        }
    }
}

/// Decrements the gauge exactly once when dropped
#[must_use = "the unit is only counted while the guard is alive"]
#[derive(Debug)]
pub struct TaskGuard {
    gauge: ActiveTasks,
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.gauge.decrement();
    }
}
