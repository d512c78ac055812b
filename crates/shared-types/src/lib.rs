//! # Shared Types Crate
//!
//! This crate contains the event entities exchanged between the gossip
//! intake, deduplication and consensus stages.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: All cross-crate types are defined here.
//! - **Immutable Identity**: An `EventDescriptor` never changes once built;
//!   stages forward events, they do not mutate them.

pub mod entities;
pub mod errors;

pub use entities::*;
pub use errors::*;
