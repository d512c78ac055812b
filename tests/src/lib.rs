//! # Quantum-Chain Test Suite
//!
//! Unified test crate containing:
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── benchmarks/       # Throughput benchmarks driven by benches/
//! │   ├── queue.rs
//! │   └── dedup.rs
//! │
//! └── integration/      # Cross-crate behaviour
//!     ├── backpressure.rs
//!     ├── wiring.rs
//!     ├── notifications.rs
//!     ├── deduplication.rs
//!     └── pipeline.rs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p qc-tests
//!
//! # By category
//! cargo test -p qc-tests integration::deduplication::
//!
//! # Benchmarks
//! cargo bench -p qc-tests
//! ```

#![allow(unused_variables)]
#![allow(unused_imports)]
#![allow(dead_code)]

pub mod benchmarks;
pub mod fixtures;
pub mod integration;
