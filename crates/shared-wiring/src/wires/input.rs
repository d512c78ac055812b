//! Input wires.

use super::{OutputWire, Sink};
use crate::error::WiringError;
use crate::schedulers::{Admission, SchedulerCore};
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::{debug, error};

type Handler<IN> = Arc<dyn Fn(IN) + Send + Sync>;

/// Typed sink into a scheduler.
///
/// Cloning is cheap and every clone feeds the same handler.
pub struct InputWire<IN, OUT> {
    inner: Arc<InputInner<IN, OUT>>,
}

struct InputInner<IN, OUT> {
    name: String,
    core: Arc<SchedulerCore>,
    output: OutputWire<OUT>,
    handler: OnceLock<Handler<IN>>,
}

impl<IN, OUT> Clone for InputWire<IN, OUT> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<IN: Send + 'static, OUT: Clone + Send + 'static> InputWire<IN, OUT> {
    pub(crate) fn new(name: &str, core: Arc<SchedulerCore>, output: OutputWire<OUT>) -> Self {
        Self {
            inner: Arc::new(InputInner {
                name: name.to_string(),
                core,
                output,
                handler: OnceLock::new(),
            }),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    #[must_use]
    pub fn scheduler_name(&self) -> &str {
        self.inner.core.name()
    }

    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.inner.handler.get().is_some()
    }

    /// Bind a transform handler. `Some` results are forwarded to the
    /// scheduler's output wire, `None` forwards nothing.
    ///
    /// # Errors
    ///
    /// [`WiringError::AlreadyBound`] if a handler is already bound.
    pub fn bind<F>(&self, handler: F) -> Result<(), WiringError>
    where
        F: Fn(IN) -> Option<OUT> + Send + Sync + 'static,
    {
        let output = self.inner.output.clone();
        self.set_handler(Arc::new(move |item| {
            if let Some(result) = handler(item) {
                output.forward(result);
            }
        }))
    }

    /// Bind a handler that forwards nothing.
    ///
    /// # Errors
    ///
    /// [`WiringError::AlreadyBound`] if a handler is already bound.
    pub fn bind_consumer<F>(&self, handler: F) -> Result<(), WiringError>
    where
        F: Fn(IN) + Send + Sync + 'static,
    {
        self.set_handler(Arc::new(handler))
    }

    fn set_handler(&self, handler: Handler<IN>) -> Result<(), WiringError> {
        self.inner.handler.set(handler).map_err(|_| {
            error!(
                scheduler = %self.scheduler_name(),
                wire = %self.inner.name,
                "Handler already bound"
            );
            WiringError::AlreadyBound {
                wire: self.qualified_name(),
            }
        })
    }

    fn handler(&self) -> Result<Handler<IN>, WiringError> {
        self.inner
            .handler
            .get()
            .cloned()
            .ok_or_else(|| WiringError::Unbound {
                wire: self.qualified_name(),
            })
    }

    fn qualified_name(&self) -> String {
        format!("{}.{}", self.scheduler_name(), self.inner.name)
    }

    /// Blocking admission into the scheduler.
    ///
    /// # Errors
    ///
    /// - [`WiringError::Unbound`] if no handler is bound
    /// - [`WiringError::ShutDown`] if the scheduler has stopped
    /// - [`WiringError::Interrupted`] if the wait for capacity is interrupted
    pub fn put(&self, item: IN) -> Result<(), WiringError> {
        let handler = self.handler()?;
        self.inner
            .core
            .submit(Box::new(move || handler(item)), Admission::Put)
    }

    /// Non-blocking admission.
    ///
    /// # Errors
    ///
    /// Hands the item back if the scheduler is full, stopped, or the wire
    /// is unbound.
    pub fn offer(&self, item: IN) -> Result<(), IN> {
        let Ok(handler) = self.handler() else {
            debug!(wire = %self.qualified_name(), "Offer to unbound wire refused");
            return Err(item);
        };
        self.inner
            .core
            .try_submit(item, move |item| Box::new(move || handler(item)))
    }

    /// Admission that ignores backpressure.
    ///
    /// # Errors
    ///
    /// - [`WiringError::Unbound`] if no handler is bound
    /// - [`WiringError::ShutDown`] if the scheduler has stopped
    pub fn inject(&self, item: IN) -> Result<(), WiringError> {
        let handler = self.handler()?;
        self.inner
            .core
            .submit(Box::new(move || handler(item)), Admission::Inject)
    }
}

impl<IN: Send + 'static, OUT: Clone + Send + 'static> Sink<IN> for InputWire<IN, OUT> {
    fn name(&self) -> &str {
        &self.inner.name
    }

    fn vertex(&self) -> &str {
        self.scheduler_name()
    }

    fn put(&self, item: IN) -> Result<(), WiringError> {
        InputWire::put(self, item)
    }

    fn offer(&self, item: IN) -> Result<(), IN> {
        InputWire::offer(self, item)
    }

    fn inject(&self, item: IN) -> Result<(), WiringError> {
        InputWire::inject(self, item)
    }
}

impl<IN, OUT> fmt::Debug for InputWire<IN, OUT> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputWire")
            .field("scheduler", &self.inner.core.name())
            .field("name", &self.inner.name)
            .field("bound", &self.inner.handler.get().is_some())
            .finish()
    }
}
