//! # Intake Pipeline
//!
//! Builds the wiring graph every gossiped event travels through:
//!
//! ```text
//!  gossip_batches ──splitter──┐
//!                             ▼
//!  gossip ─────────► [event_intake] ──put──► [event_deduplicator] ──put──► [event_consumer] ──► sink
//!                                              ▲            ▲
//!                              event_window ───┘            └─── clear (bypass)
//! ```
//!
//! `event_intake` charges each event to its sender in the
//! [`PeerIntakeCounter`]. The deduplicator releases the charge for every
//! event it drops and `event_consumer` releases it once the sink has
//! taken the event.

use std::fmt;
use std::sync::Arc;

use qc_18_event_deduplication::{
    DedupError, DedupMetricsSnapshot, DeduplicatorWiring, EventDeduplicator, IntakeEventCounter,
    PeerIntakeCounter,
};
use quantum_telemetry::{observe_dedup, observe_task_scheduler, PrometheusDedupRecorder};
use shared_types::{EventWindow, PlatformEvent};
use shared_wiring::{
    Connection, InputWire, OutputWire, TaskScheduler, WiringDiagram, WiringError, WiringModel,
};
use thiserror::Error;
use tracing::{debug, info};

use crate::container::config::{ConfigError, NodeConfig};

/// Scheduler admitting gossiped events.
pub const INTAKE_SCHEDULER: &str = "event_intake";

/// Scheduler handing deduplicated events to the sink.
pub const CONSUMER_SCHEDULER: &str = "event_consumer";

/// Errors raised while building or driving the pipeline.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    #[error("Invalid node configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Wiring failure: {0}")]
    Wiring(#[from] WiringError),

    #[error("Deduplication failure: {0}")]
    Dedup(#[from] DedupError),
}

/// The intake → dedup → consumer graph and the model that owns it.
pub struct IntakePipeline {
    model: WiringModel,
    intake: TaskScheduler<PlatformEvent>,
    gossip: InputWire<PlatformEvent, PlatformEvent>,
    gossip_batches: OutputWire<Vec<PlatformEvent>>,
    dedup: DeduplicatorWiring,
    consumer: TaskScheduler<()>,
    connections: Vec<Connection>,
    intake_counter: Arc<PeerIntakeCounter>,
}

impl IntakePipeline {
    /// Build and connect every stage. Deduplicated events are handed to
    /// `sink` on the consumer stage's worker.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::Config`] if `config` does not validate
    /// - [`PipelineError::Wiring`] / [`PipelineError::Dedup`] if a stage
    ///   cannot be built
    pub fn build<F>(config: &NodeConfig, sink: F) -> Result<Self, PipelineError>
    where
        F: Fn(PlatformEvent) + Send + Sync + 'static,
    {
        config.validate()?;
        let model = WiringModel::new(config.wiring.clone());
        let intake_counter = Arc::new(PeerIntakeCounter::new());

        // Step 1: intake
        let intake: TaskScheduler<PlatformEvent> = model
            .scheduler_builder(INTAKE_SCHEDULER)
            .with_dispatch(config.intake.dispatch)
            .with_capacity(config.intake.capacity)
            .with_flushing(true)
            .build()?;
        let gossip = intake.build_input_wire::<PlatformEvent>("gossip");
        let counter = Arc::clone(&intake_counter);
        gossip.bind(move |event| {
            if let Some(peer) = event.sender {
                counter.event_entered(peer);
            }
            Some(event)
        })?;

        let gossip_batches = model.build_source::<Vec<PlatformEvent>>("gossip_batches");
        let mut connections = vec![gossip_batches
            .build_splitter("gossip_batch_splitter")
            .solder_to(&gossip)];

        // Step 2: deduplication
        let mut deduplicator = EventDeduplicator::new(&config.dedup)
            .with_intake_counter(Arc::clone(&intake_counter) as Arc<dyn IntakeEventCounter>);
        if config.telemetry.metrics_enabled {
            deduplicator = deduplicator.with_recorder(Arc::new(PrometheusDedupRecorder));
        }
        let dedup = DeduplicatorWiring::build(&model, &config.dedup, deduplicator)?;
        connections.push(intake.output_wire().solder_to(dedup.event_input()));

        // Step 3: consumer
        let consumer: TaskScheduler<()> = model
            .scheduler_builder(CONSUMER_SCHEDULER)
            .with_dispatch(config.downstream.dispatch)
            .with_capacity(config.downstream.capacity)
            .with_flushing(true)
            .build()?;
        let deduplicated = consumer.build_input_wire::<PlatformEvent>("deduplicated");
        let counter = Arc::clone(&intake_counter);
        deduplicated.bind_consumer(move |event: PlatformEvent| {
            let sender = event.sender;
            sink(event);
            if let Some(peer) = sender {
                counter.event_exited(peer);
            }
        })?;
        connections.push(dedup.output_wire().solder_to(&deduplicated));

        model.check_for_cyclical_backpressure()?;
        debug!(diagram = %model.generate_wiring_diagram(), "Intake wiring diagram");
        info!(
            schedulers = ?model.scheduler_names(),
            deterministic = model.is_deterministic(),
            "Intake pipeline wired"
        );

        Ok(Self {
            model,
            intake,
            gossip,
            gossip_batches,
            dedup,
            consumer,
            connections,
            intake_counter,
        })
    }

    /// Submit one event, blocking while the intake stage is full.
    pub fn submit(&self, event: PlatformEvent) -> Result<(), PipelineError> {
        Ok(self.gossip.put(event)?)
    }

    /// Submit one event without blocking. A full intake stage hands the
    /// event back.
    pub fn offer(&self, event: PlatformEvent) -> Result<(), PlatformEvent> {
        self.gossip.offer(event)
    }

    /// Submit a batch; its events enter the intake stage in order.
    pub fn submit_batch(&self, events: Vec<PlatformEvent>) {
        debug!(count = events.len(), "Submitting gossip batch");
        self.gossip_batches.forward(events);
    }

    /// Advance the deduplicator's event window.
    pub fn set_event_window(&self, window: EventWindow) -> Result<(), PipelineError> {
        Ok(self.dedup.window_input().put(window)?)
    }

    /// Block until everything submitted so far has passed every stage.
    pub fn flush(&self) -> Result<(), PipelineError> {
        self.intake.flush()?;
        self.dedup.flush()?;
        self.consumer.flush()?;
        Ok(())
    }

    /// The stage feeding the deduplicator.
    pub fn intake(&self) -> &TaskScheduler<PlatformEvent> {
        &self.intake
    }

    pub fn dedup(&self) -> &DeduplicatorWiring {
        &self.dedup
    }

    pub fn intake_counter(&self) -> &Arc<PeerIntakeCounter> {
        &self.intake_counter
    }

    pub fn dedup_metrics(&self) -> DedupMetricsSnapshot {
        self.dedup.metrics()
    }

    /// Events waiting in or passing through any stage.
    pub fn unprocessed(&self) -> usize {
        self.intake.unprocessed_task_count()
            + self.dedup.scheduler().unprocessed_task_count()
            + self.consumer.unprocessed_task_count()
    }

    /// Copy scheduler and dedup counters into the Prometheus registry.
    pub fn publish_metrics(&self) {
        observe_task_scheduler(&self.intake);
        observe_task_scheduler(self.dedup.scheduler());
        observe_task_scheduler(&self.consumer);
        observe_dedup(&self.dedup.metrics());
    }

    /// Mermaid flowchart of the pipeline's wiring.
    #[must_use]
    pub fn wiring_diagram(&self) -> WiringDiagram {
        self.model.generate_wiring_diagram()
    }

    /// Close every connection and stop every scheduler. Idempotent.
    pub fn shutdown(&self) {
        for connection in &self.connections {
            connection.close();
        }
        self.model.stop();
    }
}

impl fmt::Debug for IntakePipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntakePipeline")
            .field("schedulers", &self.model.scheduler_names())
            .field("connections", &self.connections)
            .finish()
    }
}
