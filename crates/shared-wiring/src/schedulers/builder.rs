//! Scheduler configuration and builder.

use super::pooled::PooledEngine;
use super::sequential::SequentialEngine;
use super::{DispatchModel, Engine, Runner, SchedulerCore, TaskScheduler};
use crate::counter::BackpressureCounter;
use crate::error::WiringError;
use crate::graph::VertexKind;
use crate::model::WiringModel;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Default number of unhandled tasks a scheduler accepts before `put` blocks.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Capacity of a scheduler that never blocks `put`.
pub const UNLIMITED_CAPACITY: usize = usize::MAX;

/// Default time a stopping scheduler waits for its queue to drain.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_millis(100);

/// Per-scheduler settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub dispatch: DispatchModel,
    /// Unhandled task capacity. Ignored by `Direct`.
    /// [`UNLIMITED_CAPACITY`] never blocks.
    pub capacity: usize,
    pub squelching_enabled: bool,
    pub flushing_enabled: bool,
    pub shutdown_grace: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            dispatch: DispatchModel::Sequential,
            capacity: DEFAULT_CAPACITY,
            squelching_enabled: false,
            flushing_enabled: false,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }
}

/// Scheduler names end up in thread names and metric labels.
pub(crate) fn validate_name(name: &str) -> Result<(), WiringError> {
    let valid = !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(WiringError::InvalidName(name.to_string()))
    }
}

/// Builder obtained from [`WiringModel::scheduler_builder`].
#[must_use]
pub struct SchedulerBuilder<'a> {
    model: &'a WiringModel,
    name: String,
    config: SchedulerConfig,
    on_ramp: Option<Arc<BackpressureCounter>>,
    off_ramp: Option<Arc<BackpressureCounter>>,
}

impl<'a> SchedulerBuilder<'a> {
    pub(crate) fn new(model: &'a WiringModel, name: &str) -> Self {
        Self {
            model,
            name: name.to_string(),
            config: SchedulerConfig::default(),
            on_ramp: None,
            off_ramp: None,
        }
    }

    pub fn with_config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_dispatch(mut self, dispatch: DispatchModel) -> Self {
        self.config.dispatch = dispatch;
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.config.capacity = capacity;
        self
    }

    pub fn with_squelching(mut self, enabled: bool) -> Self {
        self.config.squelching_enabled = enabled;
        self
    }

    pub fn with_flushing(mut self, enabled: bool) -> Self {
        self.config.flushing_enabled = enabled;
        self
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.config.shutdown_grace = grace;
        self
    }

    /// Count every task submitted here against `counter`, on top of the
    /// scheduler's own capacity. `put` blocks while the counter is full,
    /// `offer` is refused and `inject` counts regardless.
    ///
    /// The count is held until a scheduler built with the same counter as
    /// its off-ramp finishes the task, so several schedulers can share one
    /// bound. A task dropped here without running releases it.
    pub fn with_on_ramp(mut self, counter: Arc<BackpressureCounter>) -> Self {
        self.on_ramp = Some(counter);
        self
    }

    /// Release one count on `counter` whenever a task leaves this
    /// scheduler, whether it ran, was squelched or was discarded.
    pub fn with_off_ramp(mut self, counter: Arc<BackpressureCounter>) -> Self {
        self.off_ramp = Some(counter);
        self
    }

    /// Use `counter` as both on-ramp and off-ramp.
    pub fn with_counter(self, counter: Arc<BackpressureCounter>) -> Self {
        self.with_on_ramp(Arc::clone(&counter)).with_off_ramp(counter)
    }

    /// Build the scheduler and register it with the model.
    ///
    /// # Errors
    ///
    /// - [`WiringError::InvalidName`] if the name is empty or contains
    ///   characters outside `[A-Za-z0-9_]`
    /// - [`WiringError::ThreadSpawn`] if a sequential worker cannot start
    pub fn build<OUT: Clone + Send + 'static>(self) -> Result<TaskScheduler<OUT>, WiringError> {
        validate_name(&self.name)?;

        let dispatch = if self.model.is_deterministic() {
            DispatchModel::Direct
        } else {
            self.config.dispatch
        };

        let runner = Arc::new(
            Runner::new(self.name.clone()).with_ramps(self.on_ramp.clone(), self.off_ramp.clone()),
        );
        let engine = match dispatch {
            DispatchModel::Direct => Engine::Direct,
            DispatchModel::Sequential => Engine::Sequential(SequentialEngine::start(
                Arc::clone(&runner),
                self.config.capacity,
                self.config.shutdown_grace,
            )?),
            DispatchModel::Pooled => Engine::Pooled(PooledEngine::new(
                self.model.pool()?,
                self.config.capacity,
                self.config.shutdown_grace,
            )),
        };

        let core = Arc::new(SchedulerCore {
            runner,
            model: dispatch,
            squelching_enabled: self.config.squelching_enabled,
            flushing_enabled: self.config.flushing_enabled,
            stopped: AtomicBool::new(false),
            engine,
        });
        self.model.register(Arc::clone(&core));
        let graph = self.model.shared_graph();
        graph.add_vertex(
            &self.name,
            VertexKind::Scheduler {
                dispatch: self.config.dispatch,
                capacity: self.config.capacity,
            },
        );

        info!(
            scheduler = %self.name,
            model = %dispatch,
            capacity = self.config.capacity,
            on_ramp = self.on_ramp.is_some(),
            off_ramp = self.off_ramp.is_some(),
            "Scheduler started"
        );
        Ok(TaskScheduler::new(core, graph))
    }
}
