//! # Notifications and Listener Classes
//!
//! A listener class groups listeners that receive the same notification
//! type. Each class is served by one dispatcher whose dispatch and order
//! modes are fixed by the [`ListenerConfig`] given at first registration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

/// Where listeners run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// On the dispatching thread, before `dispatch` returns.
    #[default]
    Sync,
    /// On the class's worker thread.
    Async,
}

/// Whether listeners observe notifications in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderMode {
    #[default]
    Ordered,
    Unordered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ListenerConfig {
    pub dispatch_mode: DispatchMode,
    pub order_mode: OrderMode,
}

impl ListenerConfig {
    pub const SYNC_ORDERED: Self = Self::new(DispatchMode::Sync, OrderMode::Ordered);
    pub const SYNC_UNORDERED: Self = Self::new(DispatchMode::Sync, OrderMode::Unordered);
    pub const ASYNC_ORDERED: Self = Self::new(DispatchMode::Async, OrderMode::Ordered);
    pub const ASYNC_UNORDERED: Self = Self::new(DispatchMode::Async, OrderMode::Unordered);

    #[must_use]
    pub const fn new(dispatch_mode: DispatchMode, order_mode: OrderMode) -> Self {
        Self {
            dispatch_mode,
            order_mode,
        }
    }

    #[must_use]
    pub fn is_async(&self) -> bool {
        self.dispatch_mode == DispatchMode::Async
    }

    #[must_use]
    pub fn is_ordered(&self) -> bool {
        self.order_mode == OrderMode::Ordered
    }
}

/// Metadata carried by every notification.
#[derive(Debug, Clone)]
pub struct NotificationMeta {
    sequence: OnceLock<u64>,
    created_at: Instant,
}

impl NotificationMeta {
    #[must_use]
    pub fn new() -> Self {
        Self {
            sequence: OnceLock::new(),
            created_at: Instant::now(),
        }
    }

    /// Sequence assigned by the dispatcher, if dispatched.
    #[must_use]
    pub fn sequence(&self) -> Option<u64> {
        self.sequence.get().copied()
    }

    /// Assign `sequence` unless one is already set. Returns the sequence in
    /// effect afterwards.
    pub fn stamp(&self, sequence: u64) -> u64 {
        *self.sequence.get_or_init(|| sequence)
    }

    #[must_use]
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    #[must_use]
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }
}

impl Default for NotificationMeta {
    fn default() -> Self {
        Self::new()
    }
}

pub trait Notification: Send + Sync + 'static {
    fn meta(&self) -> &NotificationMeta;

    fn sequence(&self) -> Option<u64> {
        self.meta().sequence()
    }
}

/// Marker type naming a group of listeners.
///
/// ```rust
/// use shared_bus::{ListenerClass, Notification, NotificationMeta};
///
/// struct StatusChanged {
///     meta: NotificationMeta,
///     healthy: bool,
/// }
///
/// impl Notification for StatusChanged {
///     fn meta(&self) -> &NotificationMeta {
///         &self.meta
///     }
/// }
///
/// struct StatusListeners;
///
/// impl ListenerClass for StatusListeners {
///     type Notification = StatusChanged;
///     const NAME: &'static str = "status";
/// }
/// ```
pub trait ListenerClass: 'static {
    type Notification: Notification;

    const NAME: &'static str;
}

/// Handle returned by registration, used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub(crate) u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}
