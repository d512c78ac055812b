//! Adapters layer: connections to the wiring runtime and the node

pub mod async_wrapper;
pub mod intake_counter;
pub mod wiring;

pub use async_wrapper::AsyncEventDeduplicator;
pub use intake_counter::PeerIntakeCounter;
pub use wiring::{DeduplicatorWiring, SCHEDULER_NAME};
