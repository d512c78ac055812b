//! Domain layer: pure deduplication state, no I/O

pub mod config;
pub mod observed;
pub mod sequence_map;

pub use config::{
    DedupConfig, DedupConfigBuilder, DEFAULT_DUPLICATE_AVERAGE_HALF_LIFE, DEFAULT_QUEUE_CAPACITY,
    DEFAULT_RATE_HALF_LIFE,
};
pub use observed::{DedupOutcome, ObservedEvents};
pub use sequence_map::SequenceMap;
