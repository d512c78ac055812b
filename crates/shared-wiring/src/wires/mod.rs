//! # Wires
//!
//! Typed edges of the wiring graph.
//!
//! - [`InputWire`]: sink into a scheduler, bound once to a handler
//! - [`OutputWire`]: fan-out source, soldered to sinks with an
//!   [`AdmissionPolicy`] per [`Connection`]
//! - [`StageWire`]: scheduler-less filter, splitter or transformer

mod input;
mod output;
mod stage;

pub use input::InputWire;
pub use output::{AdmissionPolicy, Connection, OutputWire, PolicyKind};
pub use stage::{Filter, Splitter, Stage, StageKind, StageWire, Transformer};

use crate::error::WiringError;

/// Anything an output wire can deliver into.
pub trait Sink<T>: Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Graph vertex the sink belongs to.
    fn vertex(&self) -> &str {
        self.name()
    }

    /// Blocking admission.
    fn put(&self, item: T) -> Result<(), WiringError>;

    /// Non-blocking admission. The item is handed back if refused.
    fn offer(&self, item: T) -> Result<(), T>;

    /// Admission that ignores backpressure.
    fn inject(&self, item: T) -> Result<(), WiringError>;
}
