//! Metrics for event deduplication
//!
//! Counters plus two smoothed signals: the percentage of non-ancient events
//! that were duplicates (exponential running average over samples) and
//! duplicates per second (exponentially decaying rate).
//!
//! ## Usage
//!
//! ```
//! use qc_18_event_deduplication::metrics::{DedupMetrics, MetricsRecorder};
//!
//! let metrics = DedupMetrics::default();
//! metrics.record_forwarded();
//! metrics.record_duplicate();
//! let snapshot = metrics.snapshot();
//! assert_eq!(snapshot.duplicates, 1);
//! ```

use crate::domain::DedupConfig;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Exponential moving average with a half life measured in samples.
#[derive(Debug, Clone)]
pub struct RunningAverage {
    alpha: f64,
    value: f64,
    initialized: bool,
}

impl RunningAverage {
    pub fn new(half_life: f64) -> Self {
        Self {
            alpha: 1.0 - 0.5f64.powf(1.0 / half_life),
            value: 0.0,
            initialized: false,
        }
    }

    pub fn update(&mut self, sample: f64) {
        if self.initialized {
            self.value += self.alpha * (sample - self.value);
        } else {
            self.value = sample;
            self.initialized = true;
        }
    }

    pub fn value(&self) -> f64 {
        self.value
    }
}

/// Events per second, each event's weight halving every `half_life`
/// seconds.
#[derive(Debug, Clone)]
pub struct DecayingRate {
    lambda: f64,
    weight: f64,
    last: Instant,
}

impl DecayingRate {
    pub fn new(half_life: f64) -> Self {
        Self {
            lambda: std::f64::consts::LN_2 / half_life,
            weight: 0.0,
            last: Instant::now(),
        }
    }

    fn decay_to(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last).as_secs_f64();
        self.weight *= (-self.lambda * elapsed).exp();
        self.last = now;
    }

    pub fn record(&mut self, now: Instant) {
        self.decay_to(now);
        self.weight += 1.0;
    }

    pub fn rate(&mut self, now: Instant) -> f64 {
        self.decay_to(now);
        self.weight * self.lambda
    }
}

/// Built-in deduplication metrics
#[derive(Debug)]
pub struct DedupMetrics {
    /// Events dropped because their signature was already recorded
    pub duplicates: AtomicU64,
    /// Events forwarded with a second or later signature for a descriptor
    pub disparate_signatures: AtomicU64,
    /// Events dropped for being ancient
    pub ancient_discards: AtomicU64,
    /// Events forwarded downstream
    pub forwarded: AtomicU64,
    /// Descriptors evicted by window shifts
    pub evicted: AtomicU64,
    /// Descriptors tracked as of the last window shift
    pub tracked: AtomicU64,
    duplicate_percentage: Mutex<RunningAverage>,
    duplicate_rate: Mutex<DecayingRate>,
}

impl DedupMetrics {
    pub fn new(config: &DedupConfig) -> Self {
        Self {
            duplicates: AtomicU64::new(0),
            disparate_signatures: AtomicU64::new(0),
            ancient_discards: AtomicU64::new(0),
            forwarded: AtomicU64::new(0),
            evicted: AtomicU64::new(0),
            tracked: AtomicU64::new(0),
            duplicate_percentage: Mutex::new(RunningAverage::new(
                config.duplicate_average_half_life,
            )),
            duplicate_rate: Mutex::new(DecayingRate::new(config.rate_half_life)),
        }
    }

    /// Smoothed percentage of non-ancient events that were duplicates.
    pub fn duplicate_percentage(&self) -> f64 {
        self.duplicate_percentage.lock().value()
    }

    pub fn duplicates_per_second(&self) -> f64 {
        self.duplicate_rate.lock().rate(Instant::now())
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> DedupMetricsSnapshot {
        DedupMetricsSnapshot {
            duplicates: self.duplicates.load(Ordering::Relaxed),
            disparate_signatures: self.disparate_signatures.load(Ordering::Relaxed),
            ancient_discards: self.ancient_discards.load(Ordering::Relaxed),
            forwarded: self.forwarded.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
            tracked: self.tracked.load(Ordering::Relaxed),
            duplicate_percentage: self.duplicate_percentage(),
            duplicates_per_second: self.duplicates_per_second(),
        }
    }
}

impl Default for DedupMetrics {
    fn default() -> Self {
        Self::new(&DedupConfig::default())
    }
}

/// Point-in-time metrics snapshot
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DedupMetricsSnapshot {
    pub duplicates: u64,
    pub disparate_signatures: u64,
    pub ancient_discards: u64,
    pub forwarded: u64,
    pub evicted: u64,
    pub tracked: u64,
    pub duplicate_percentage: f64,
    pub duplicates_per_second: f64,
}

/// Trait for custom metrics recording implementations
///
/// Implement this trait to export deduplication metrics to an external
/// system such as Prometheus.
pub trait MetricsRecorder: Send + Sync {
    /// A non-ancient event was dropped as a duplicate.
    fn record_duplicate(&self);

    /// An event was forwarded with a new signature for a known descriptor.
    fn record_disparate_signature(&self);

    /// An event was dropped for being ancient.
    fn record_ancient(&self);

    /// An event was forwarded downstream.
    fn record_forwarded(&self);

    /// The window moved; `evicted` descriptors were dropped and `tracked`
    /// remain.
    fn record_window_shift(&self, evicted: usize, tracked: usize);
}

/// No-op metrics recorder for when metrics are disabled
#[derive(Default)]
pub struct NoOpMetrics;

impl MetricsRecorder for NoOpMetrics {
    fn record_duplicate(&self) {}
    fn record_disparate_signature(&self) {}
    fn record_ancient(&self) {}
    fn record_forwarded(&self) {}
    fn record_window_shift(&self, _: usize, _: usize) {}
}

impl MetricsRecorder for DedupMetrics {
    fn record_duplicate(&self) {
        self.duplicates.fetch_add(1, Ordering::Relaxed);
        self.duplicate_percentage.lock().update(100.0);
        self.duplicate_rate.lock().record(Instant::now());
    }

    fn record_disparate_signature(&self) {
        self.disparate_signatures.fetch_add(1, Ordering::Relaxed);
    }

    fn record_ancient(&self) {
        self.ancient_discards.fetch_add(1, Ordering::Relaxed);
    }

    fn record_forwarded(&self) {
        self.forwarded.fetch_add(1, Ordering::Relaxed);
        self.duplicate_percentage.lock().update(0.0);
    }

    fn record_window_shift(&self, evicted: usize, tracked: usize) {
        self.evicted.fetch_add(evicted as u64, Ordering::Relaxed);
        self.tracked.store(tracked as u64, Ordering::Relaxed);
    }
}
