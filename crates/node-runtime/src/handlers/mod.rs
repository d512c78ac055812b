//! # Event Handlers
//!
//! Notification listeners acting on the pipeline.

pub mod reconnect;

pub use reconnect::{ReconnectListener, ReconnectListeners, ReconnectNotification, ReconnectPhase};
