//! # Task Schedulers
//!
//! A scheduler is a named processing stage. It owns any number of bound
//! input wires and exactly one primary output wire.
//!
//! ## Dispatch Models
//!
//! | Model | Runs on | Ordering |
//! |-------|---------|----------|
//! | `Direct` | caller's thread | call order, fully deterministic |
//! | `Sequential` | one dedicated worker thread | strict FIFO across all inputs |
//! | `Pooled` | shared rayon pool | none |
//!
//! ## Squelch
//!
//! While squelched, every task reaching the front of the scheduler is
//! consumed as a no-op: the handler is not called and nothing is forwarded.
//! The check happens immediately before the handler runs, so a handler is
//! never partially applied.

mod builder;
mod pooled;
mod sequential;

pub use builder::{
    SchedulerBuilder, SchedulerConfig, DEFAULT_CAPACITY, DEFAULT_SHUTDOWN_GRACE, UNLIMITED_CAPACITY,
};

use crate::counter::BackpressureCounter;
use crate::error::WiringError;
use crate::graph::WiringGraph;
use crate::metrics::{SchedulerMetrics, SchedulerMetricsSnapshot};
use crate::wires::{InputWire, OutputWire};
use pooled::PooledEngine;
use sequential::SequentialEngine;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{error, info};

/// Unit of work submitted by an input wire.
pub(crate) type Task = Box<dyn FnOnce() + Send + 'static>;

/// How a scheduler executes the work handed to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchModel {
    /// Inline on the calling thread. No queue, no backpressure.
    Direct,
    /// One dedicated worker thread draining a backpressure queue.
    #[default]
    Sequential,
    /// Shared thread pool, bounded by a backpressure counter.
    Pooled,
}

impl fmt::Display for DispatchModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchModel::Direct => write!(f, "direct"),
            DispatchModel::Sequential => write!(f, "sequential"),
            DispatchModel::Pooled => write!(f, "pooled"),
        }
    }
}

/// How a task is admitted into a scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Admission {
    /// Wait for capacity.
    Put,
    /// Ignore capacity.
    Inject,
}

/// Executes tasks and keeps the bookkeeping shared with worker threads.
pub(crate) struct Runner {
    name: String,
    squelched: AtomicBool,
    pending: AtomicUsize,
    metrics: SchedulerMetrics,
    on_ramp: Option<Arc<BackpressureCounter>>,
    off_ramp: Option<Arc<BackpressureCounter>>,
}

impl Runner {
    fn new(name: String) -> Self {
        Self {
            name,
            squelched: AtomicBool::new(false),
            pending: AtomicUsize::new(0),
            metrics: SchedulerMetrics::default(),
            on_ramp: None,
            off_ramp: None,
        }
    }

    fn with_ramps(
        mut self,
        on_ramp: Option<Arc<BackpressureCounter>>,
        off_ramp: Option<Arc<BackpressureCounter>>,
    ) -> Self {
        self.on_ramp = on_ramp;
        self.off_ramp = off_ramp;
        self
    }

    /// Count a task against the on-ramp before it reaches the engine.
    fn ramp_on(&self, admission: Admission) -> Result<(), WiringError> {
        match (&self.on_ramp, admission) {
            (None, _) => Ok(()),
            (Some(counter), Admission::Put) => counter.on_ramp(),
            (Some(counter), Admission::Inject) => {
                counter.force_on_ramp();
                Ok(())
            }
        }
    }

    fn try_ramp_on(&self) -> bool {
        self.on_ramp
            .as_ref()
            .is_none_or(|counter| counter.attempt_on_ramp())
    }

    /// Undo [`Runner::ramp_on`] for a task the engine refused before
    /// admitting it.
    pub(crate) fn refuse(&self) {
        if let Some(counter) = &self.on_ramp {
            counter.off_ramp();
        }
    }

    /// Must be called before the task becomes visible to a worker.
    pub(crate) fn admit(&self) {
        self.pending.fetch_add(1, Ordering::AcqRel);
    }

    /// Forget an admitted task that will never run.
    pub(crate) fn discard(&self) {
        self.release(false);
        self.pending.fetch_sub(1, Ordering::AcqRel);
    }

    pub(crate) fn run(&self, task: Task) {
        let ran = if self.squelched.load(Ordering::Acquire) {
            drop(task);
            self.metrics.record_squelched();
            false
        } else {
            match catch_unwind(AssertUnwindSafe(task)) {
                Ok(()) => {
                    self.metrics.record_handled();
                    true
                }
                Err(payload) => {
                    error!(
                        scheduler = %self.name,
                        panic = %panic_message(payload.as_ref()),
                        "Handler panicked, continuing with next task"
                    );
                    self.metrics.record_panic();
                    false
                }
            }
        };
        self.release(ran);
        self.pending.fetch_sub(1, Ordering::AcqRel);
    }

    /// A task leaving this scheduler releases the off-ramp. One that
    /// produced nothing also gives back the on-ramp count it took here,
    /// unless that count was just released as the off-ramp.
    fn release(&self, ran: bool) {
        if let Some(counter) = &self.off_ramp {
            counter.off_ramp();
        }
        if ran {
            return;
        }
        if let Some(counter) = &self.on_ramp {
            let same = self
                .off_ramp
                .as_ref()
                .is_some_and(|off| Arc::ptr_eq(off, counter));
            if !same {
                counter.off_ramp();
            }
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

enum Engine {
    Direct,
    Sequential(SequentialEngine),
    Pooled(PooledEngine),
}

/// Type-erased scheduler state shared by the scheduler handle, its input
/// wires and the wiring model.
pub(crate) struct SchedulerCore {
    runner: Arc<Runner>,
    model: DispatchModel,
    squelching_enabled: bool,
    flushing_enabled: bool,
    stopped: AtomicBool,
    engine: Engine,
}

impl SchedulerCore {
    pub(crate) fn name(&self) -> &str {
        self.runner.name()
    }

    fn ensure_running(&self) -> Result<(), WiringError> {
        if self.stopped.load(Ordering::Acquire) {
            return Err(WiringError::ShutDown {
                scheduler: self.name().to_string(),
            });
        }
        Ok(())
    }

    /// Submit a task, blocking for capacity under [`Admission::Put`].
    pub(crate) fn submit(&self, task: Task, admission: Admission) -> Result<(), WiringError> {
        self.ensure_running()?;
        self.runner.ramp_on(admission)?;
        match &self.engine {
            Engine::Direct => {
                self.runner.admit();
                self.runner.run(task);
                Ok(())
            }
            Engine::Sequential(engine) => engine.submit(&self.runner, task, admission),
            Engine::Pooled(engine) => engine.submit(&self.runner, task, admission),
        }
    }

    /// Submit only if capacity is available right now; hand the item back
    /// otherwise. `wrap` is called only after admission.
    pub(crate) fn try_submit<I>(&self, item: I, wrap: impl FnOnce(I) -> Task) -> Result<(), I> {
        if self.stopped.load(Ordering::Acquire) {
            return Err(item);
        }
        if !self.runner.try_ramp_on() {
            self.runner.metrics.record_rejected();
            return Err(item);
        }
        let result = match &self.engine {
            Engine::Direct => {
                self.runner.admit();
                self.runner.run(wrap(item));
                Ok(())
            }
            Engine::Sequential(engine) => engine.try_submit(&self.runner, item, wrap),
            Engine::Pooled(engine) => engine.try_submit(&self.runner, item, wrap),
        };
        if result.is_err() {
            self.runner.metrics.record_rejected();
        }
        result
    }

    fn flush(&self) -> Result<(), WiringError> {
        if !self.flushing_enabled {
            return Err(WiringError::FlushingDisabled {
                scheduler: self.name().to_string(),
            });
        }
        self.ensure_running()?;
        match &self.engine {
            Engine::Direct => Ok(()),
            Engine::Sequential(engine) => engine.flush(&self.runner),
            Engine::Pooled(engine) => engine.flush(),
        }
    }

    fn set_squelched(&self, squelched: bool) -> Result<(), WiringError> {
        if !self.squelching_enabled {
            return Err(WiringError::SquelchingDisabled {
                scheduler: self.name().to_string(),
            });
        }
        self.runner.squelched.store(squelched, Ordering::Release);
        info!(scheduler = %self.name(), squelched, "Squelch toggled");
        Ok(())
    }

    pub(crate) fn stop(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        match &self.engine {
            Engine::Direct => {}
            Engine::Sequential(engine) => engine.shutdown(&self.runner),
            Engine::Pooled(engine) => engine.shutdown(&self.runner),
        }
        info!(scheduler = %self.name(), model = %self.model, "Scheduler stopped");
    }
}

impl Drop for SchedulerCore {
    fn drop(&mut self) {
        if let Engine::Sequential(engine) = &self.engine {
            engine.release_worker();
        }
    }
}

/// Handle to a named processing stage producing values of type `OUT`.
pub struct TaskScheduler<OUT> {
    core: Arc<SchedulerCore>,
    output: OutputWire<OUT>,
}

impl<OUT> Clone for TaskScheduler<OUT> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
            output: self.output.clone(),
        }
    }
}

impl<OUT: Clone + Send + 'static> TaskScheduler<OUT> {
    pub(crate) fn new(core: Arc<SchedulerCore>, graph: Arc<WiringGraph>) -> Self {
        let output = OutputWire::attached(core.name(), graph);
        Self { core, output }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.core.name()
    }

    #[must_use]
    pub fn dispatch_model(&self) -> DispatchModel {
        self.core.model
    }

    /// Create a new, unbound input wire feeding this scheduler.
    pub fn build_input_wire<IN: Send + 'static>(&self, name: &str) -> InputWire<IN, OUT> {
        InputWire::new(name, Arc::clone(&self.core), self.output.clone())
    }

    /// The primary output wire. Values returned by transform handlers are
    /// forwarded here.
    #[must_use]
    pub fn output_wire(&self) -> &OutputWire<OUT> {
        &self.output
    }

    /// # Errors
    ///
    /// [`WiringError::SquelchingDisabled`] unless built with squelching.
    pub fn start_squelching(&self) -> Result<(), WiringError> {
        self.core.set_squelched(true)
    }

    /// # Errors
    ///
    /// [`WiringError::SquelchingDisabled`] unless built with squelching.
    pub fn stop_squelching(&self) -> Result<(), WiringError> {
        self.core.set_squelched(false)
    }

    #[must_use]
    pub fn is_squelched(&self) -> bool {
        self.core.runner.squelched.load(Ordering::Acquire)
    }

    /// Block until every task submitted before this call has been handled.
    ///
    /// # Errors
    ///
    /// - [`WiringError::FlushingDisabled`] unless built with flushing
    /// - [`WiringError::ShutDown`] if the scheduler stops first
    /// - [`WiringError::Interrupted`] if the wait is interrupted
    pub fn flush(&self) -> Result<(), WiringError> {
        self.core.flush()
    }

    /// Tasks queued or executing right now.
    #[must_use]
    pub fn unprocessed_task_count(&self) -> usize {
        self.core.runner.pending.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn metrics(&self) -> SchedulerMetricsSnapshot {
        self.core.runner.metrics.snapshot()
    }

    /// Stop the scheduler. Idempotent.
    pub fn stop(&self) {
        self.core.stop();
    }
}

impl<OUT> fmt::Debug for TaskScheduler<OUT> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskScheduler")
            .field("name", &self.core.name())
            .field("model", &self.core.model)
            .finish()
    }
}
