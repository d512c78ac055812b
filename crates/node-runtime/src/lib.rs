//! # Node Runtime Library
//!
//! This library exposes the internal modules of the node runtime for testing.
//! The main entry point is the `main.rs` binary.
//!
//! ## Modules
//!
//! - `container/` - node configuration loaded from the environment
//! - `wiring/` - intake → dedup → consumer pipeline on the wiring runtime
//! - `handlers/` - notification listeners (reconnect)
//! - `runtime` - [`NodeRuntime`], owner of the pipeline and the engine

pub mod container;
pub mod handlers;
pub mod runtime;
pub mod wiring;

pub use container::{ConfigError, NodeConfig, StageConfig};
pub use runtime::NodeRuntime;
pub use wiring::{IntakePipeline, PipelineError};
