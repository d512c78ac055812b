//! Cross-crate integration tests.

pub mod backpressure;
pub mod deduplication;
pub mod notifications;
pub mod pipeline;
pub mod wiring;
