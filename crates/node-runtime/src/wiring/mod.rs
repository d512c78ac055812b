//! # Pipeline Wiring
//!
//! Connects the intake, deduplication and consumer stages on one
//! [`shared_wiring::WiringModel`]. See [`pipeline`] for the graph.

pub mod pipeline;

pub use pipeline::{IntakePipeline, PipelineError, CONSUMER_SCHEDULER, INTAKE_SCHEDULER};
