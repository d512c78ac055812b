//! # Backpressure Counter
//!
//! Counts in-flight work for schedulers that have no queue of their own
//! (the pooled model hands tasks straight to rayon). Producers ramp on
//! before submitting and the task ramps off when it completes.

use crate::error::WiringError;
use parking_lot::{Condvar, Mutex};

/// A bounded counter of outstanding work items.
pub struct BackpressureCounter {
    state: Mutex<CounterState>,
    changed: Condvar,
    capacity: usize,
}

struct CounterState {
    count: usize,
    interrupt_epoch: u64,
}

impl BackpressureCounter {
    /// Create a counter that blocks `on_ramp` once `capacity` is reached.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(CounterState {
                count: 0,
                interrupt_epoch: 0,
            }),
            changed: Condvar::new(),
            capacity: capacity.max(1),
        }
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.state.lock().count
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Block until there is room, then increment.
    ///
    /// # Errors
    ///
    /// [`WiringError::Interrupted`] if interrupted while waiting.
    pub fn on_ramp(&self) -> Result<(), WiringError> {
        let mut state = self.state.lock();
        let epoch = state.interrupt_epoch;
        while state.count >= self.capacity {
            if state.interrupt_epoch != epoch {
                return Err(WiringError::Interrupted { operation: "on_ramp" });
            }
            self.changed.wait(&mut state);
        }
        state.count += 1;
        Ok(())
    }

    /// Increment only if there is room right now.
    pub fn attempt_on_ramp(&self) -> bool {
        let mut state = self.state.lock();
        if state.count >= self.capacity {
            return false;
        }
        state.count += 1;
        true
    }

    /// Increment unconditionally.
    pub fn force_on_ramp(&self) {
        self.state.lock().count += 1;
    }

    /// Decrement and wake anyone waiting for room or for the count to drain.
    pub fn off_ramp(&self) {
        let mut state = self.state.lock();
        state.count = state.count.saturating_sub(1);
        drop(state);
        self.changed.notify_all();
    }

    /// Block until the count reaches zero.
    ///
    /// # Errors
    ///
    /// [`WiringError::Interrupted`] if interrupted while waiting.
    pub fn wait_until_empty(&self) -> Result<(), WiringError> {
        let mut state = self.state.lock();
        let epoch = state.interrupt_epoch;
        while state.count > 0 {
            if state.interrupt_epoch != epoch {
                return Err(WiringError::Interrupted {
                    operation: "wait_until_empty",
                });
            }
            self.changed.wait(&mut state);
        }
        Ok(())
    }

    /// Wake every thread blocked in `on_ramp` or `wait_until_empty`.
    pub fn interrupt(&self) {
        self.state.lock().interrupt_epoch += 1;
        self.changed.notify_all();
    }
}
