//! # Shared Wiring
//!
//! Concurrent dataflow runtime the intake pipeline is assembled from.
//!
//! ## Components
//!
//! | Layer | Types |
//! |-------|-------|
//! | Queueing | [`BackpressureQueue`], [`BackpressureCounter`] |
//! | Edges | [`InputWire`], [`OutputWire`], [`Connection`], [`AdmissionPolicy`] |
//! | Stages | [`Filter`], [`Splitter`], [`Transformer`], [`StageWire`] |
//! | Execution | [`TaskScheduler`], [`DispatchModel`], [`SchedulerBuilder`] |
//! | Lifecycle | [`WiringModel`] |
//! | Introspection | [`WiringGraph`], [`WiringDiagram`] |
//!
//! ## Example
//!
//! ```rust
//! use shared_wiring::{DispatchModel, TaskScheduler, WiringConfig, WiringModel};
//!
//! let model = WiringModel::new(WiringConfig::default());
//! let doubler: TaskScheduler<u64> = model
//!     .scheduler_builder("doubler")
//!     .with_dispatch(DispatchModel::Direct)
//!     .build()
//!     .unwrap();
//!
//! let input = doubler.build_input_wire::<u64>("numbers");
//! input.bind(|n| Some(n * 2)).unwrap();
//! input.put(21).unwrap();
//! model.stop();
//! ```

pub mod counter;
pub mod error;
pub mod graph;
pub mod metrics;
pub mod model;
pub mod queue;
pub mod schedulers;
pub mod wires;

pub use counter::BackpressureCounter;
pub use error::WiringError;
pub use graph::{Vertex, VertexKind, WiringDiagram, WiringGraph};
pub use metrics::{SchedulerMetrics, SchedulerMetricsSnapshot};
pub use model::{WiringConfig, WiringModel};
pub use queue::{BackpressureQueue, Slot};
pub use schedulers::{
    DispatchModel, SchedulerBuilder, SchedulerConfig, TaskScheduler, DEFAULT_CAPACITY,
    DEFAULT_SHUTDOWN_GRACE, UNLIMITED_CAPACITY,
};
pub use wires::{
    AdmissionPolicy, Connection, Filter, InputWire, OutputWire, PolicyKind, Sink, Splitter, Stage,
    StageKind, StageWire, Transformer,
};
