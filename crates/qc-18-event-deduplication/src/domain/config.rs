//! Deduplicator configuration and validation
//!
//! # Example
//!
//! ```
//! use qc_18_event_deduplication::domain::DedupConfigBuilder;
//! use shared_types::AncientMode;
//!
//! let config = DedupConfigBuilder::new()
//!     .queue_capacity(4096)
//!     .ancient_mode(AncientMode::BirthRoundThreshold)
//!     .build()
//!     .unwrap();
//! assert_eq!(config.queue_capacity, 4096);
//! ```

use crate::error::DedupError;
use serde::{Deserialize, Serialize};
use shared_types::AncientMode;

/// Default capacity of the deduplicator's input queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 5_000;

/// Default half life, in samples, of the duplicate percentage average.
pub const DEFAULT_DUPLICATE_AVERAGE_HALF_LIFE: f64 = 10.0;

/// Default half life, in seconds, of the duplicates-per-second rate.
pub const DEFAULT_RATE_HALF_LIFE: f64 = 1.0;

/// Deduplicator configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Capacity of the queue feeding the deduplicator
    pub queue_capacity: usize,
    /// Ordering key compared against the ancient threshold
    pub ancient_mode: AncientMode,
    /// Half life of the duplicate percentage running average (samples)
    pub duplicate_average_half_life: f64,
    /// Half life of the duplicates-per-second rate (seconds)
    pub rate_half_life: f64,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            ancient_mode: AncientMode::default(),
            duplicate_average_half_life: DEFAULT_DUPLICATE_AVERAGE_HALF_LIFE,
            rate_half_life: DEFAULT_RATE_HALF_LIFE,
        }
    }
}

impl DedupConfig {
    /// Validate configuration bounds
    pub fn validate(&self) -> Result<(), DedupError> {
        if self.queue_capacity == 0 {
            return Err(DedupError::InvalidConfig("queue_capacity cannot be 0".to_string()));
        }

        let half_life = self.duplicate_average_half_life;
        if !(half_life.is_finite() && half_life > 0.0) {
            return Err(DedupError::InvalidConfig(format!(
                "duplicate_average_half_life must be positive, got {half_life}"
            )));
        }

        if !(self.rate_half_life.is_finite() && self.rate_half_life > 0.0) {
            return Err(DedupError::InvalidConfig(format!(
                "rate_half_life must be positive, got {}",
                self.rate_half_life
            )));
        }

        Ok(())
    }

    /// Builder-style method to set the queue capacity
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Builder-style method to set the ancient mode
    pub fn with_ancient_mode(mut self, mode: AncientMode) -> Self {
        self.ancient_mode = mode;
        self
    }
}

/// Builder for DedupConfig with validation
#[derive(Default)]
pub struct DedupConfigBuilder {
    queue_capacity: Option<usize>,
    ancient_mode: Option<AncientMode>,
    duplicate_average_half_life: Option<f64>,
    rate_half_life: Option<f64>,
}

impl DedupConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity);
        self
    }

    pub fn ancient_mode(mut self, mode: AncientMode) -> Self {
        self.ancient_mode = Some(mode);
        self
    }

    pub fn duplicate_average_half_life(mut self, samples: f64) -> Self {
        self.duplicate_average_half_life = Some(samples);
        self
    }

    pub fn rate_half_life(mut self, seconds: f64) -> Self {
        self.rate_half_life = Some(seconds);
        self
    }

    /// Build and validate the configuration
    ///
    /// Unset fields take their defaults.
    pub fn build(self) -> Result<DedupConfig, DedupError> {
        let defaults = DedupConfig::default();
        let config = DedupConfig {
            queue_capacity: self.queue_capacity.unwrap_or(defaults.queue_capacity),
            ancient_mode: self.ancient_mode.unwrap_or(defaults.ancient_mode),
            duplicate_average_half_life: self
                .duplicate_average_half_life
                .unwrap_or(defaults.duplicate_average_half_life),
            rate_half_life: self.rate_half_life.unwrap_or(defaults.rate_half_life),
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(DedupConfig::default().validate().is_ok());
    }

    #[test]
    fn test_builder_uses_defaults_for_unset_fields() {
        let config = DedupConfigBuilder::new()
            .ancient_mode(AncientMode::BirthRoundThreshold)
            .build()
            .unwrap();
        assert_eq!(config.ancient_mode, AncientMode::BirthRoundThreshold);
        assert_eq!(config.queue_capacity, DEFAULT_QUEUE_CAPACITY);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let result = DedupConfigBuilder::new().queue_capacity(0).build();
        assert!(matches!(result, Err(DedupError::InvalidConfig(_))));
    }

    #[test]
    fn test_non_positive_half_life_rejected() {
        assert!(DedupConfigBuilder::new()
            .duplicate_average_half_life(0.0)
            .build()
            .is_err());
        assert!(DedupConfigBuilder::new()
            .rate_half_life(f64::NAN)
            .build()
            .is_err());
    }

    #[test]
    fn test_partial_config_deserializes_with_defaults() {
        let config: DedupConfig =
            serde_json::from_str(r#"{"ancient_mode":"birth_round_threshold"}"#).unwrap();
        assert_eq!(config.ancient_mode, AncientMode::BirthRoundThreshold);
        assert_eq!(config.rate_half_life, DEFAULT_RATE_HALF_LIFE);
    }
}
