//! # QC-18 Event Deduplication
//!
//! First consumer of the wiring runtime in the gossip intake pipeline. Drops
//! events already observed (same descriptor, same signature) within the
//! current non-ancient window, and events that are already ancient.
//!
//! ## Architecture
//!
//! This crate follows Hexagonal Architecture (Ports & Adapters):
//!
//! - **Domain Layer** (`domain/`): Pure state, no I/O
//!   - `SequenceMap`: map with a sliding lower bound on key sequence
//!   - `ObservedEvents`: descriptor to signature-set bookkeeping
//!   - `DedupConfig` / `DedupConfigBuilder`: configuration with validation
//!
//! - **Ports Layer** (`ports/`): Trait definitions
//!   - `EventDeduplicationApi`: Driving port
//!   - `IntakeEventCounter`: Driven port (per-peer intake accounting)
//!
//! - **Service Layer** (`service/`): Orchestration
//!   - `EventDeduplicator`: Implements `EventDeduplicationApi`
//!
//! - **Adapters Layer** (`adapters/`): Runtime connections
//!   - `AsyncEventDeduplicator`: dedicated worker thread with flush barrier
//!   - `DeduplicatorWiring`: sequential scheduler with event/window/clear wires
//!   - `PeerIntakeCounter`: per-peer `IntakeEventCounter`
//!
//! ## Invariants
//!
//! - An event below the ancient threshold is never recorded.
//! - A (descriptor, signature) pair is forwarded at most once while the
//!   descriptor stays non-ancient.
//! - A new signature for a known descriptor is forwarded and counted as a
//!   disparate signature, not as a duplicate.
//! - Shifting the window evicts in time proportional to the evicted entries.
//!
//! ## Usage Example
//!
//! ```
//! use qc_18_event_deduplication::{DedupConfig, EventDeduplicationApi, EventDeduplicator};
//! use shared_types::{EventDescriptor, NodeId, PlatformEvent};
//!
//! let mut dedup = EventDeduplicator::new(&DedupConfig::default());
//! let descriptor = EventDescriptor::new([1u8; 32], NodeId(0), 3, 1);
//! let event = PlatformEvent::new(descriptor, vec![0xAB; 64]);
//!
//! assert!(dedup.handle_event(event.clone()).is_some());
//! assert!(dedup.handle_event(event).is_none());
//! ```

pub mod adapters;
pub mod domain;
pub mod error;
pub mod metrics;
pub mod ports;
pub mod service;

pub use adapters::{AsyncEventDeduplicator, DeduplicatorWiring, PeerIntakeCounter};
pub use domain::{DedupConfig, DedupConfigBuilder, DedupOutcome, ObservedEvents, SequenceMap};
pub use error::DedupError;
pub use metrics::{DedupMetrics, DedupMetricsSnapshot, MetricsRecorder, NoOpMetrics};
pub use ports::{EventDeduplicationApi, IntakeEventCounter, NoOpIntakeEventCounter};
pub use service::EventDeduplicator;
