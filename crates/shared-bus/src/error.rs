//! Error types for the notification engine.

use crate::notification::ListenerConfig;
use thiserror::Error;

/// Errors raised by the engine itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotificationError {
    #[error("Listener class {class} is registered as {registered:?}, not {requested:?}")]
    ConfigMismatch {
        class: &'static str,
        registered: ListenerConfig,
        requested: ListenerConfig,
    },

    #[error("Dispatcher for {class} has been shut down")]
    ShutDown { class: &'static str },

    #[error("Listener of ordered class {class} dispatched to its own class")]
    Reentrant { class: &'static str },

    #[error("Failed to start dispatcher worker for {class}: {reason}")]
    WorkerSpawn { class: &'static str, reason: String },
}

/// A single listener's failure to handle a notification.
///
/// Recorded in the dispatch result; never propagated to the publisher.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ListenerError {
    #[error("Listener failed: {0}")]
    Failed(String),

    #[error("Listener panicked: {0}")]
    Panicked(String),
}

impl ListenerError {
    pub fn failed(reason: impl Into<String>) -> Self {
        ListenerError::Failed(reason.into())
    }
}
