//! # Error Types
//!
//! Defines state enums shared across the intake pipeline crates.

/// Node operational states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Normal operation.
    Running,
    /// Reconnecting to the network; intake stages are squelched.
    Reconnecting,
    /// Shutting down; schedulers are being stopped.
    Stopping,
}
