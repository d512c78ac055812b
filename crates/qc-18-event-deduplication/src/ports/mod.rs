//! Ports layer: trait definitions for hexagonal architecture

pub mod inbound;
pub mod outbound;

pub use inbound::EventDeduplicationApi;
pub use outbound::{IntakeEventCounter, NoOpIntakeEventCounter};
