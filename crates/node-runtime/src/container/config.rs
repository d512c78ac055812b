//! # Node Configuration
//!
//! Configuration for the intake pipeline and runtime parameters.
//!
//! ## Environment Overrides
//!
//! | Variable | Field |
//! |----------|-------|
//! | `QC_POOL_THREADS` | `wiring.pool_threads` |
//! | `QC_DETERMINISTIC` | `wiring.deterministic` |
//! | `QC_INTAKE_DISPATCH` | `intake.dispatch` (`direct`, `sequential`, `pooled`) |
//! | `QC_INTAKE_CAPACITY` | `intake.capacity` |
//! | `QC_DEDUP_CAPACITY` | `dedup.queue_capacity` |
//! | `QC_ANCIENT_MODE` | `dedup.ancient_mode` (`generation`, `birth_round`) |
//! | `QC_DOWNSTREAM_DISPATCH` | `downstream.dispatch` |
//! | `QC_DOWNSTREAM_CAPACITY` | `downstream.capacity` |
//! | `QC_METRICS_INTERVAL_SECS` | `metrics_interval_secs` |
//!
//! Unparseable values are ignored with a warning and the default is kept.

use qc_18_event_deduplication::{DedupConfig, DedupError};
use quantum_telemetry::TelemetryConfig;
use serde::{Deserialize, Serialize};
use shared_types::AncientMode;
use shared_wiring::{DispatchModel, WiringConfig, DEFAULT_CAPACITY};
use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Default period between metric publications.
pub const DEFAULT_METRICS_INTERVAL_SECS: u64 = 10;

/// Complete node configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Thread pool and determinism of the wiring model.
    pub wiring: WiringConfig,
    /// Stage that accepts gossiped events.
    pub intake: StageConfig,
    /// Deduplication stage.
    pub dedup: DedupConfig,
    /// Stage receiving deduplicated events.
    pub downstream: StageConfig,
    /// Seconds between metric publications; `0` disables publishing.
    pub metrics_interval_secs: u64,
    /// Logging and metrics.
    pub telemetry: TelemetryConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            wiring: WiringConfig::default(),
            intake: StageConfig::default(),
            dedup: DedupConfig::default(),
            downstream: StageConfig::default(),
            metrics_interval_secs: DEFAULT_METRICS_INTERVAL_SECS,
            telemetry: TelemetryConfig::default(),
        }
    }
}

/// Dispatch model and queue capacity of one pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageConfig {
    pub dispatch: DispatchModel,
    pub capacity: usize,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            dispatch: DispatchModel::Sequential,
            capacity: DEFAULT_CAPACITY,
        }
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{stage} capacity cannot be 0")]
    ZeroCapacity { stage: &'static str },

    #[error("Invalid deduplication config: {0}")]
    Dedup(#[from] DedupError),
}

impl NodeConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self {
            telemetry: TelemetryConfig::from_lookup(&lookup),
            ..Self::default()
        };

        if let Some(threads) = parsed(&lookup, "QC_POOL_THREADS") {
            config.wiring.pool_threads = threads;
        }
        if let Some(v) = lookup("QC_DETERMINISTIC") {
            config.wiring.deterministic = parse_flag(&v);
        }

        if let Some(dispatch) = lookup("QC_INTAKE_DISPATCH").and_then(|v| parse_dispatch(&v)) {
            config.intake.dispatch = dispatch;
        }
        if let Some(capacity) = parsed(&lookup, "QC_INTAKE_CAPACITY") {
            config.intake.capacity = capacity;
        }

        if let Some(capacity) = parsed(&lookup, "QC_DEDUP_CAPACITY") {
            config.dedup.queue_capacity = capacity;
        }
        if let Some(mode) = lookup("QC_ANCIENT_MODE").and_then(|v| parse_ancient_mode(&v)) {
            config.dedup.ancient_mode = mode;
        }

        if let Some(dispatch) = lookup("QC_DOWNSTREAM_DISPATCH").and_then(|v| parse_dispatch(&v)) {
            config.downstream.dispatch = dispatch;
        }
        if let Some(capacity) = parsed(&lookup, "QC_DOWNSTREAM_CAPACITY") {
            config.downstream.capacity = capacity;
        }

        if let Some(secs) = parsed(&lookup, "QC_METRICS_INTERVAL_SECS") {
            config.metrics_interval_secs = secs;
        }

        config
    }

    /// Validate bounds before building the pipeline.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.intake.capacity == 0 {
            return Err(ConfigError::ZeroCapacity { stage: "intake" });
        }
        if self.downstream.capacity == 0 {
            return Err(ConfigError::ZeroCapacity { stage: "downstream" });
        }
        self.dedup.validate()?;
        Ok(())
    }

    /// Metric publication period, if enabled.
    pub fn metrics_interval(&self) -> Option<Duration> {
        (self.metrics_interval_secs > 0).then(|| Duration::from_secs(self.metrics_interval_secs))
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let value = lookup(key)?;
    match value.trim().parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            warn!(key, value = %value, "Ignoring unparseable configuration value");
            None
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes")
}

fn parse_dispatch(value: &str) -> Option<DispatchModel> {
    match value.trim().to_lowercase().as_str() {
        "direct" => Some(DispatchModel::Direct),
        "sequential" => Some(DispatchModel::Sequential),
        "pooled" => Some(DispatchModel::Pooled),
        other => {
            warn!(value = other, "Unknown dispatch model");
            None
        }
    }
}

fn parse_ancient_mode(value: &str) -> Option<AncientMode> {
    match value.trim().to_lowercase().as_str() {
        "generation" | "generation_threshold" => Some(AncientMode::GenerationThreshold),
        "birth_round" | "birth_round_threshold" => Some(AncientMode::BirthRoundThreshold),
        other => {
            warn!(value = other, "Unknown ancient mode");
            None
        }
    }
}
