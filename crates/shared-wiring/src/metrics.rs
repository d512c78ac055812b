//! # Scheduler Metrics
//!
//! Lock-free counters kept per scheduler. Exported to Prometheus by the
//! telemetry crate through [`SchedulerMetricsSnapshot`].

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters updated by a scheduler's worker and by its input wires.
#[derive(Debug, Default)]
pub struct SchedulerMetrics {
    /// Tasks whose handler ran to completion.
    pub tasks_handled: AtomicU64,
    /// Tasks whose handler panicked.
    pub handler_panics: AtomicU64,
    /// Tasks consumed as no-ops while squelched.
    pub squelched_tasks: AtomicU64,
    /// Items refused by `offer` because the scheduler was full.
    pub tasks_rejected: AtomicU64,
}

impl SchedulerMetrics {
    pub fn record_handled(&self) {
        self.tasks_handled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_panic(&self) {
        self.handler_panics.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_squelched(&self) {
        self.squelched_tasks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.tasks_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter.
    pub fn snapshot(&self) -> SchedulerMetricsSnapshot {
        SchedulerMetricsSnapshot {
            tasks_handled: self.tasks_handled.load(Ordering::Relaxed),
            handler_panics: self.handler_panics.load(Ordering::Relaxed),
            squelched_tasks: self.squelched_tasks.load(Ordering::Relaxed),
            tasks_rejected: self.tasks_rejected.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerMetricsSnapshot {
    pub tasks_handled: u64,
    pub handler_panics: u64,
    pub squelched_tasks: u64,
    pub tasks_rejected: u64,
}
