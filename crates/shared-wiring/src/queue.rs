//! # Backpressure Queue
//!
//! Bounded FIFO that every scheduler queue and every async stage sits on.
//!
//! ## Admission
//!
//! | Operation | Full queue behaviour |
//! |-----------|----------------------|
//! | `put` | blocks until a slot frees up |
//! | `offer` | returns the item back immediately |
//! | `bypass_backpressure` | enqueues anyway (may exceed capacity) |
//!
//! `bypass_backpressure` is intentionally unbounded. It exists for
//! control-plane markers (shutdown, flush) that must never be dropped or
//! delayed behind data.
//!
//! ## Interruption
//!
//! [`BackpressureQueue::interrupt`] wakes every thread blocked in `put` or
//! `take` at the time of the call; each of them returns
//! [`WiringError::Interrupted`]. The queue itself stays usable.

use crate::error::WiringError;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::time::Duration;

/// Bounded multi-producer, multi-consumer FIFO with blocking and
/// non-blocking admission.
pub struct BackpressureQueue<T> {
    state: Mutex<QueueState<T>>,
    not_full: Condvar,
    not_empty: Condvar,
    capacity: usize,
}

struct QueueState<T> {
    items: VecDeque<T>,
    /// Slots handed out by `reserve`/`try_reserve` but not yet filled.
    reserved: usize,
    /// Bumped by `interrupt`; waiters compare against the value they saw
    /// when they started waiting.
    interrupt_epoch: u64,
}

impl<T> QueueState<T> {
    fn occupied(&self) -> usize {
        self.items.len() + self.reserved
    }
}

impl<T> BackpressureQueue<T> {
    /// Create a queue holding at most `capacity` items (minimum 1).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                reserved: 0,
                interrupt_epoch: 0,
            }),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
            capacity: capacity.max(1),
        }
    }

    /// Create a queue that never applies backpressure.
    #[must_use]
    pub fn unbounded() -> Self {
        Self::new(usize::MAX)
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of items currently waiting to be taken.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.lock().items.is_empty()
    }

    /// Block until capacity is available, then enqueue.
    ///
    /// # Errors
    ///
    /// [`WiringError::Interrupted`] if [`Self::interrupt`] is called while
    /// waiting. The item is not enqueued in that case.
    pub fn put(&self, item: T) -> Result<(), WiringError> {
        self.reserve()?.fill(item);
        Ok(())
    }

    /// Enqueue only if capacity is immediately available.
    ///
    /// # Errors
    ///
    /// Returns the item back when the queue is full.
    pub fn offer(&self, item: T) -> Result<(), T> {
        match self.try_reserve() {
            Some(slot) => {
                slot.fill(item);
                Ok(())
            }
            None => Err(item),
        }
    }

    /// Enqueue regardless of the current size.
    pub fn bypass_backpressure(&self, item: T) {
        self.state.lock().items.push_back(item);
        self.not_empty.notify_one();
    }

    /// Block until an item is available, then dequeue it.
    ///
    /// # Errors
    ///
    /// [`WiringError::Interrupted`] if [`Self::interrupt`] is called while
    /// waiting.
    pub fn take(&self) -> Result<T, WiringError> {
        let mut state = self.state.lock();
        let epoch = state.interrupt_epoch;
        loop {
            if let Some(item) = state.items.pop_front() {
                drop(state);
                self.not_full.notify_one();
                return Ok(item);
            }
            if state.interrupt_epoch != epoch {
                return Err(WiringError::Interrupted { operation: "take" });
            }
            self.not_empty.wait(&mut state);
        }
    }

    /// Dequeue an item, waiting at most `timeout`.
    ///
    /// # Errors
    ///
    /// [`WiringError::Interrupted`] if interrupted while waiting.
    pub fn take_timeout(&self, timeout: Duration) -> Result<Option<T>, WiringError> {
        let mut state = self.state.lock();
        let epoch = state.interrupt_epoch;
        loop {
            if let Some(item) = state.items.pop_front() {
                drop(state);
                self.not_full.notify_one();
                return Ok(Some(item));
            }
            if state.interrupt_epoch != epoch {
                return Err(WiringError::Interrupted { operation: "take" });
            }
            if self.not_empty.wait_for(&mut state, timeout).timed_out() {
                return Ok(None);
            }
        }
    }

    /// Dequeue an item if one is immediately available.
    pub fn poll(&self) -> Option<T> {
        let item = self.state.lock().items.pop_front();
        if item.is_some() {
            self.not_full.notify_one();
        }
        item
    }

    /// Block until a slot is free and reserve it.
    ///
    /// The slot counts against capacity until it is filled or dropped, which
    /// lets callers build the queued value only after admission.
    ///
    /// # Errors
    ///
    /// [`WiringError::Interrupted`] if interrupted while waiting.
    pub fn reserve(&self) -> Result<Slot<'_, T>, WiringError> {
        let mut state = self.state.lock();
        let epoch = state.interrupt_epoch;
        while state.occupied() >= self.capacity {
            if state.interrupt_epoch != epoch {
                return Err(WiringError::Interrupted { operation: "put" });
            }
            self.not_full.wait(&mut state);
        }
        state.reserved += 1;
        Ok(Slot {
            queue: self,
            armed: true,
        })
    }

    /// Reserve a slot only if one is immediately free.
    pub fn try_reserve(&self) -> Option<Slot<'_, T>> {
        let mut state = self.state.lock();
        if state.occupied() >= self.capacity {
            return None;
        }
        state.reserved += 1;
        Some(Slot {
            queue: self,
            armed: true,
        })
    }

    /// Wake every thread currently blocked in `put`, `reserve` or `take`.
    pub fn interrupt(&self) {
        self.state.lock().interrupt_epoch += 1;
        self.not_full.notify_all();
        self.not_empty.notify_all();
    }

    /// Remove and return everything currently queued.
    pub fn drain(&self) -> Vec<T> {
        let drained: Vec<T> = self.state.lock().items.drain(..).collect();
        self.not_full.notify_all();
        drained
    }

    fn release(&self, item: Option<T>) {
        let mut state = self.state.lock();
        state.reserved -= 1;
        match item {
            Some(item) => {
                state.items.push_back(item);
                drop(state);
                self.not_empty.notify_one();
            }
            None => {
                drop(state);
                self.not_full.notify_one();
            }
        }
    }
}

/// A reserved queue slot. Dropping it unfilled gives the capacity back.
pub struct Slot<'a, T> {
    queue: &'a BackpressureQueue<T>,
    armed: bool,
}

impl<T> Slot<'_, T> {
    /// Place the item into the reserved slot.
    pub fn fill(mut self, item: T) {
        self.armed = false;
        self.queue.release(Some(item));
    }
}

impl<T> Drop for Slot<'_, T> {
    fn drop(&mut self) {
        if self.armed {
            self.queue.release(None);
        }
    }
}
