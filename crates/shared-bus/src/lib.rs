//! # Shared Bus - Notification Engine
//!
//! In-process fan-out from notification producers to dynamically
//! registered listeners, grouped by listener class.
//!
//! ## Dispatch Matrix
//!
//! | Mode | Order | Listeners run | Order guarantee |
//! |------|-------|---------------|-----------------|
//! | `Sync` | `Ordered` | caller's thread, under the class lock | creation order |
//! | `Sync` | `Unordered` | caller's thread | none across callers |
//! | `Async` | `Ordered` | class worker, via sequence heap | creation order |
//! | `Async` | `Unordered` | class worker | enqueue order |
//!
//! Order is guaranteed within one listener class only. Each class keeps
//! its own sequence counter, starting at 1.
//!
//! ## Failure Isolation
//!
//! A listener returning an error or panicking is recorded in the
//! [`DispatchResult`] and logged. The remaining listeners still run and
//! nothing propagates to the publisher.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod listener;
pub mod notification;

pub use dispatcher::{DispatchFuture, DispatchResult, Dispatcher, ListenerFailure, PendingDispatch};
pub use engine::NotificationEngine;
pub use error::{ListenerError, NotificationError};
pub use listener::Listener;
pub use notification::{
    DispatchMode, ListenerClass, ListenerConfig, ListenerId, Notification, NotificationMeta,
    OrderMode,
};
