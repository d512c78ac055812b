//! # Quantum-Chain Benchmarks
//!
//! Throughput benchmarks for the wiring runtime and the dedup stage.
//! Driven by `benches/pipeline_benchmarks.rs`.

pub mod dedup;
pub mod queue;
