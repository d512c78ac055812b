//! # Deduplicator Wiring
//!
//! Places an [`EventDeduplicator`] inside a wiring graph: one sequential,
//! squelchable, flushable scheduler with an input wire per operation.
//! Forwarded events leave on the scheduler's output wire.

use std::sync::Arc;

use parking_lot::Mutex;
use shared_types::{EventWindow, PlatformEvent};
use shared_wiring::{DispatchModel, InputWire, OutputWire, TaskScheduler, WiringModel};
use tracing::info;

use crate::domain::DedupConfig;
use crate::error::DedupError;
use crate::metrics::{DedupMetrics, DedupMetricsSnapshot};
use crate::ports::EventDeduplicationApi;
use crate::service::EventDeduplicator;

/// Name of the deduplication scheduler in the wiring graph.
pub const SCHEDULER_NAME: &str = "event_deduplicator";

#[derive(Clone)]
pub struct DeduplicatorWiring {
    scheduler: TaskScheduler<PlatformEvent>,
    state: Arc<Mutex<EventDeduplicator>>,
    event_input: InputWire<PlatformEvent, PlatformEvent>,
    window_input: InputWire<EventWindow, PlatformEvent>,
    clear_input: InputWire<(), PlatformEvent>,
    metrics: Arc<DedupMetrics>,
}

impl DeduplicatorWiring {
    /// Build the scheduler and bind its wires to `deduplicator`.
    ///
    /// # Errors
    ///
    /// - [`DedupError::InvalidConfig`] if `config` does not validate
    /// - [`DedupError::Wiring`] if the scheduler cannot be built
    pub fn build(
        model: &WiringModel,
        config: &DedupConfig,
        deduplicator: EventDeduplicator,
    ) -> Result<Self, DedupError> {
        config.validate()?;
        let scheduler: TaskScheduler<PlatformEvent> = model
            .scheduler_builder(SCHEDULER_NAME)
            .with_dispatch(DispatchModel::Sequential)
            .with_capacity(config.queue_capacity)
            .with_squelching(true)
            .with_flushing(true)
            .build()?;

        let metrics = deduplicator.metrics_handle();
        // Every handler runs on the scheduler's single worker, so the lock
        // is never contended.
        let shared = Arc::new(Mutex::new(deduplicator));

        let event_input = scheduler.build_input_wire::<PlatformEvent>("events");
        let dedup = Arc::clone(&shared);
        event_input.bind(move |event| dedup.lock().handle_event(event))?;

        let window_input = scheduler.build_input_wire::<EventWindow>("event_window");
        let dedup = Arc::clone(&shared);
        window_input.bind_consumer(move |window| dedup.lock().set_event_window(window))?;

        let clear_input = scheduler.build_input_wire::<()>("clear");
        let dedup = Arc::clone(&shared);
        clear_input.bind_consumer(move |()| dedup.lock().clear())?;

        info!(
            scheduler = SCHEDULER_NAME,
            model = %scheduler.dispatch_model(),
            capacity = config.queue_capacity,
            "Deduplicator wired"
        );

        Ok(Self {
            scheduler,
            state: shared,
            event_input,
            window_input,
            clear_input,
            metrics,
        })
    }

    /// Candidate events from gossip.
    pub fn event_input(&self) -> &InputWire<PlatformEvent, PlatformEvent> {
        &self.event_input
    }

    /// Window updates from consensus.
    pub fn window_input(&self) -> &InputWire<EventWindow, PlatformEvent> {
        &self.window_input
    }

    /// Clear instructions, injected on reconnect.
    pub fn clear_input(&self) -> &InputWire<(), PlatformEvent> {
        &self.clear_input
    }

    /// Deduplicated events.
    pub fn output_wire(&self) -> &OutputWire<PlatformEvent> {
        self.scheduler.output_wire()
    }

    pub fn scheduler(&self) -> &TaskScheduler<PlatformEvent> {
        &self.scheduler
    }

    pub fn metrics(&self) -> DedupMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Block until every event and window update submitted so far has been
    /// applied.
    pub fn flush(&self) -> Result<(), DedupError> {
        Ok(self.scheduler.flush()?)
    }

    /// Drain the squelched backlog, then clear the deduplicator and install
    /// `window`.
    ///
    /// The clear and window wires are no-ops while squelched, so the reset is
    /// applied directly. Squelched tasks never reach the deduplicator, which
    /// leaves it untouched until squelching stops.
    ///
    /// # Errors
    ///
    /// - [`DedupError::NotSquelched`] unless the scheduler is squelched
    /// - whatever [`flush`](Self::flush) reports
    pub fn reset_squelched(&self, window: EventWindow) -> Result<(), DedupError> {
        if !self.scheduler.is_squelched() {
            return Err(DedupError::NotSquelched);
        }
        self.flush()?;
        let mut dedup = self.state.lock();
        dedup.clear();
        dedup.set_event_window(window);
        Ok(())
    }
}

impl std::fmt::Debug for DeduplicatorWiring {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeduplicatorWiring")
            .field("scheduler", &self.scheduler)
            .finish()
    }
}
