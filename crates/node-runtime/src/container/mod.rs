//! # Node Container
//!
//! Configuration the node is assembled from.

pub mod config;

pub use config::{ConfigError, NodeConfig, StageConfig};
