//! Listener trait.

use crate::error::ListenerError;

/// Receives notifications of type `N`.
///
/// Implemented for every `Fn(&N) -> Result<(), ListenerError>` closure.
pub trait Listener<N>: Send + Sync + 'static {
    /// # Errors
    ///
    /// Any error is recorded against this listener in the dispatch result.
    fn notify(&self, notification: &N) -> Result<(), ListenerError>;
}

impl<N, F> Listener<N> for F
where
    F: Fn(&N) -> Result<(), ListenerError> + Send + Sync + 'static,
{
    fn notify(&self, notification: &N) -> Result<(), ListenerError> {
        self(notification)
    }
}
