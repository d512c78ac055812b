//! Event Deduplicator Service
//!
//! Orchestrates the observed-signature state and reports outcomes to the
//! intake counter and metrics ports. Not thread safe: one owner (a worker
//! thread or a sequential scheduler) drives it.

use std::sync::Arc;

use shared_types::{EventWindow, PlatformEvent};
use tracing::{debug, warn};

use crate::domain::{DedupConfig, DedupOutcome, ObservedEvents};
use crate::metrics::{DedupMetrics, DedupMetricsSnapshot, MetricsRecorder, NoOpMetrics};
use crate::ports::{EventDeduplicationApi, IntakeEventCounter, NoOpIntakeEventCounter};

/// Forwards each event at most once per (descriptor, signature) within the
/// non-ancient window.
pub struct EventDeduplicator {
    observed: ObservedEvents,
    window: EventWindow,
    intake: Arc<dyn IntakeEventCounter>,
    metrics: Arc<DedupMetrics>,
    recorder: Arc<dyn MetricsRecorder>,
}

impl EventDeduplicator {
    /// Create a deduplicator starting at the genesis window
    pub fn new(config: &DedupConfig) -> Self {
        let window = EventWindow::genesis(config.ancient_mode);
        Self {
            observed: ObservedEvents::new(&window),
            window,
            intake: Arc::new(NoOpIntakeEventCounter),
            metrics: Arc::new(DedupMetrics::new(config)),
            recorder: Arc::new(NoOpMetrics),
        }
    }

    /// Report dropped events to `intake`
    pub fn with_intake_counter(mut self, intake: Arc<dyn IntakeEventCounter>) -> Self {
        self.intake = intake;
        self
    }

    /// Mirror every metric update into `recorder`
    pub fn with_recorder(mut self, recorder: Arc<dyn MetricsRecorder>) -> Self {
        self.recorder = recorder;
        self
    }

    /// Shared handle to the built-in metrics, readable from other threads.
    pub fn metrics_handle(&self) -> Arc<DedupMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Number of descriptors currently recorded.
    pub fn tracked_descriptors(&self) -> usize {
        self.observed.len()
    }

    fn record(&self, update: impl Fn(&dyn MetricsRecorder)) {
        update(self.metrics.as_ref());
        update(self.recorder.as_ref());
    }

    fn exited(&self, event: &PlatformEvent) {
        if let Some(sender) = event.sender {
            self.intake.event_exited(sender);
        }
    }
}

impl EventDeduplicationApi for EventDeduplicator {
    fn handle_event(&mut self, event: PlatformEvent) -> Option<PlatformEvent> {
        match self.observed.observe(&event, &self.window) {
            DedupOutcome::Ancient => {
                self.record(|r| r.record_ancient());
                self.exited(&event);
                None
            }
            DedupOutcome::Duplicate => {
                self.record(|r| r.record_duplicate());
                self.exited(&event);
                None
            }
            DedupOutcome::DisparateSignature { signatures } => {
                debug!(
                    creator = %event.descriptor.creator,
                    descriptor = %event.descriptor,
                    signatures,
                    "Disparate signature for known event"
                );
                self.record(|r| {
                    r.record_disparate_signature();
                    r.record_forwarded();
                });
                Some(event)
            }
            DedupOutcome::Novel => {
                self.record(|r| r.record_forwarded());
                Some(event)
            }
        }
    }

    fn set_event_window(&mut self, window: EventWindow) {
        if window.ancient_mode != self.window.ancient_mode {
            warn!(
                current = ?self.window.ancient_mode,
                requested = ?window.ancient_mode,
                "Event window changed ancient mode"
            );
        }
        let evicted = self.observed.shift_window(&window);
        let tracked = self.observed.len();
        debug!(
            threshold = window.ancient_threshold,
            round = window.latest_consensus_round,
            evicted,
            tracked,
            "Event window shifted"
        );
        self.record(|r| r.record_window_shift(evicted, tracked));
        self.window = window;
    }

    fn clear(&mut self) {
        let dropped = self.observed.len();
        self.observed.clear();
        self.record(|r| r.record_window_shift(0, 0));
        debug!(dropped, "Deduplicator cleared");
    }

    fn event_window(&self) -> EventWindow {
        self.window
    }

    fn metrics(&self) -> DedupMetricsSnapshot {
        self.metrics.snapshot()
    }
}

impl std::fmt::Debug for EventDeduplicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDeduplicator")
            .field("window", &self.window)
            .field("tracked", &self.observed.len())
            .finish()
    }
}
