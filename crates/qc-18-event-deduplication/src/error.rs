//! Error types for the Event Deduplication subsystem

use shared_wiring::WiringError;
use thiserror::Error;

/// Errors that can occur in the Event Deduplication subsystem.
///
/// Duplicate and ancient events are not errors; they are counted and
/// dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DedupError {
    #[error("Invalid deduplicator configuration: {0}")]
    InvalidConfig(String),

    #[error("Deduplicator has been shut down")]
    ShutDown,

    #[error("Interrupted while waiting on the deduplicator queue")]
    Interrupted,

    #[error("Deduplicator must be squelched before it is reset")]
    NotSquelched,

    #[error("Wiring error: {0}")]
    Wiring(WiringError),
}

impl From<WiringError> for DedupError {
    fn from(err: WiringError) -> Self {
        match err {
            WiringError::Interrupted { .. } => DedupError::Interrupted,
            WiringError::ShutDown { .. } => DedupError::ShutDown,
            other => DedupError::Wiring(other),
        }
    }
}
