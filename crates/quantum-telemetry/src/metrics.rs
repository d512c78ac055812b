//! Prometheus metrics for the intake pipeline.
//!
//! All metrics follow the naming convention: `qc_<subsystem>_<metric>_<unit>`
//!
//! ## Metric Types
//!
//! - **Counter**: Monotonically increasing value (e.g., dedup_duplicates_total)
//! - **Gauge**: Value that can go up or down (e.g., wiring_unprocessed_tasks)

use lazy_static::lazy_static;
use prometheus::{Encoder, Gauge, IntCounter, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder};
use qc_18_event_deduplication::{DedupMetricsSnapshot, MetricsRecorder};
use shared_wiring::{SchedulerMetricsSnapshot, TaskScheduler};

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // EVENT DEDUPLICATION METRICS (Subsystem 18)
    // =========================================================================

    /// Events dropped as exact duplicates
    pub static ref DEDUP_DUPLICATES: IntCounter = IntCounter::new(
        "qc_dedup_duplicates_total",
        "Events dropped because descriptor and signature were already seen"
    ).expect("metric creation failed");

    /// Events forwarded with a new signature for a known descriptor
    pub static ref DEDUP_DISPARATE_SIGNATURES: IntCounter = IntCounter::new(
        "qc_dedup_disparate_signatures_total",
        "Events sharing a descriptor with an earlier event but carrying a different signature"
    ).expect("metric creation failed");

    /// Events dropped for being ancient
    pub static ref DEDUP_ANCIENT: IntCounter = IntCounter::new(
        "qc_dedup_ancient_discards_total",
        "Events dropped because they were below the ancient threshold"
    ).expect("metric creation failed");

    /// Events forwarded downstream
    pub static ref DEDUP_FORWARDED: IntCounter = IntCounter::new(
        "qc_dedup_forwarded_total",
        "Events forwarded by the deduplicator"
    ).expect("metric creation failed");

    /// Descriptors evicted by window shifts
    pub static ref DEDUP_EVICTED: IntCounter = IntCounter::new(
        "qc_dedup_evicted_total",
        "Descriptors evicted when the event window advanced"
    ).expect("metric creation failed");

    /// Descriptors tracked after the last window shift
    pub static ref DEDUP_TRACKED: IntGauge = IntGauge::new(
        "qc_dedup_tracked_descriptors",
        "Descriptors recorded by the deduplicator"
    ).expect("metric creation failed");

    /// Smoothed duplicate percentage
    pub static ref DEDUP_DUPLICATE_PERCENTAGE: Gauge = Gauge::new(
        "qc_dedup_duplicate_percentage",
        "Running average of the percentage of non-ancient events that were duplicates"
    ).expect("metric creation failed");

    /// Smoothed duplicate rate
    pub static ref DEDUP_DUPLICATES_PER_SECOND: Gauge = Gauge::new(
        "qc_dedup_duplicates_per_second",
        "Exponentially decaying rate of duplicate events"
    ).expect("metric creation failed");

    // =========================================================================
    // WIRING METRICS
    // =========================================================================

    /// Tasks queued or executing per scheduler
    pub static ref WIRING_UNPROCESSED: IntGaugeVec = IntGaugeVec::new(
        Opts::new("qc_wiring_unprocessed_tasks", "Tasks queued or executing"),
        &["scheduler"]
    ).expect("metric creation failed");

    /// Handled tasks per scheduler, sampled from the scheduler's counters
    pub static ref WIRING_HANDLED: IntGaugeVec = IntGaugeVec::new(
        Opts::new("qc_wiring_tasks_handled", "Tasks whose handler completed"),
        &["scheduler"]
    ).expect("metric creation failed");

    /// Handler panics per scheduler
    pub static ref WIRING_PANICS: IntGaugeVec = IntGaugeVec::new(
        Opts::new("qc_wiring_handler_panics", "Tasks whose handler panicked"),
        &["scheduler"]
    ).expect("metric creation failed");

    /// Tasks consumed while squelched
    pub static ref WIRING_SQUELCHED: IntGaugeVec = IntGaugeVec::new(
        Opts::new("qc_wiring_squelched_tasks", "Tasks consumed as no-ops while squelched"),
        &["scheduler"]
    ).expect("metric creation failed");

    /// Offers refused for lack of capacity
    pub static ref WIRING_REJECTED: IntGaugeVec = IntGaugeVec::new(
        Opts::new("qc_wiring_tasks_rejected", "Offers refused because the scheduler was full"),
        &["scheduler"]
    ).expect("metric creation failed");
}

/// Register all metrics with the global registry.
///
/// Calling it again is harmless.
pub fn register_metrics() -> Result<(), TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Deduplication
        Box::new(DEDUP_DUPLICATES.clone()),
        Box::new(DEDUP_DISPARATE_SIGNATURES.clone()),
        Box::new(DEDUP_ANCIENT.clone()),
        Box::new(DEDUP_FORWARDED.clone()),
        Box::new(DEDUP_EVICTED.clone()),
        Box::new(DEDUP_TRACKED.clone()),
        Box::new(DEDUP_DUPLICATE_PERCENTAGE.clone()),
        Box::new(DEDUP_DUPLICATES_PER_SECOND.clone()),
        // Wiring
        Box::new(WIRING_UNPROCESSED.clone()),
        Box::new(WIRING_HANDLED.clone()),
        Box::new(WIRING_PANICS.clone()),
        Box::new(WIRING_SQUELCHED.clone()),
        Box::new(WIRING_REJECTED.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }
    Ok(())
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Forwards deduplicator outcomes to the Prometheus counters.
#[derive(Debug, Default, Clone, Copy)]
pub struct PrometheusDedupRecorder;

impl MetricsRecorder for PrometheusDedupRecorder {
    fn record_duplicate(&self) {
        DEDUP_DUPLICATES.inc();
    }

    fn record_disparate_signature(&self) {
        DEDUP_DISPARATE_SIGNATURES.inc();
    }

    fn record_ancient(&self) {
        DEDUP_ANCIENT.inc();
    }

    fn record_forwarded(&self) {
        DEDUP_FORWARDED.inc();
    }

    fn record_window_shift(&self, evicted: usize, tracked: usize) {
        DEDUP_EVICTED.inc_by(evicted as u64);
        DEDUP_TRACKED.set(tracked as i64);
    }
}

/// Publish the smoothed dedup signals, which are only available from a
/// snapshot.
pub fn observe_dedup(snapshot: &DedupMetricsSnapshot) {
    DEDUP_DUPLICATE_PERCENTAGE.set(snapshot.duplicate_percentage);
    DEDUP_DUPLICATES_PER_SECOND.set(snapshot.duplicates_per_second);
}

/// Publish one scheduler's counters under its name.
pub fn observe_scheduler(name: &str, unprocessed: usize, snapshot: &SchedulerMetricsSnapshot) {
    let labels = &[name];
    WIRING_UNPROCESSED.with_label_values(labels).set(unprocessed as i64);
    WIRING_HANDLED.with_label_values(labels).set(snapshot.tasks_handled as i64);
    WIRING_PANICS.with_label_values(labels).set(snapshot.handler_panics as i64);
    WIRING_SQUELCHED.with_label_values(labels).set(snapshot.squelched_tasks as i64);
    WIRING_REJECTED.with_label_values(labels).set(snapshot.tasks_rejected as i64);
}

/// Convenience wrapper over [`observe_scheduler`].
pub fn observe_task_scheduler<OUT: Clone + Send + 'static>(scheduler: &TaskScheduler<OUT>) {
    observe_scheduler(
        scheduler.name(),
        scheduler.unprocessed_task_count(),
        &scheduler.metrics(),
    );
}
