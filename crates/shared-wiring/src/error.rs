//! Error types for the wiring runtime

use thiserror::Error;

/// Errors raised by wires, queues and schedulers.
///
/// Capacity exhaustion is not an error: `offer` hands the rejected item back
/// to the caller instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WiringError {
    #[error("Input wire {wire} is already bound to a handler")]
    AlreadyBound { wire: String },

    #[error("Input wire {wire} has no bound handler")]
    Unbound { wire: String },

    #[error("Interrupted while blocked in {operation}")]
    Interrupted { operation: &'static str },

    #[error("Illegal scheduler name {0:?}: only [A-Za-z0-9_] allowed")]
    InvalidName(String),

    #[error("Scheduler {scheduler} was not built with squelching enabled")]
    SquelchingDisabled { scheduler: String },

    #[error("Scheduler {scheduler} was not built with flushing enabled")]
    FlushingDisabled { scheduler: String },

    #[error("Scheduler {scheduler} has been shut down")]
    ShutDown { scheduler: String },

    #[error("Failed to start worker thread: {0}")]
    ThreadSpawn(String),

    #[error("Backpressure cycle through {}", .vertices.join(" -> "))]
    CyclicalBackpressure { vertices: Vec<String> },
}
