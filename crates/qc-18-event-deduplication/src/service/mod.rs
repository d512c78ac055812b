//! Service Layer
//!
//! Orchestrates domain state and reports outcomes through the ports.

pub mod deduplicator;

pub use deduplicator::EventDeduplicator;
