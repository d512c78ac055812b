//! # Notification Engine
//!
//! Registry mapping each listener class to its dispatcher. Dispatchers are
//! created on first registration with the configuration supplied there;
//! later registrations for the same class must ask for the same
//! configuration.

use crate::dispatcher::{DispatchFuture, DispatchResult, Dispatcher};
use crate::error::NotificationError;
use crate::listener::Listener;
use crate::notification::{ListenerClass, ListenerConfig, ListenerId, Notification};
use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Operations the engine needs without knowing the notification type.
trait ErasedDispatcher: Send + Sync {
    fn remove_listener(&self, id: ListenerId) -> bool;
    fn clear(&self) -> usize;
    fn shutdown(&self);
}

impl<N: Notification> ErasedDispatcher for Dispatcher<N> {
    fn remove_listener(&self, id: ListenerId) -> bool {
        Dispatcher::remove_listener(self, id)
    }

    fn clear(&self) -> usize {
        Dispatcher::clear(self)
    }

    fn shutdown(&self) {
        Dispatcher::shutdown(self);
    }
}

#[derive(Clone)]
struct DispatcherEntry {
    erased: Arc<dyn ErasedDispatcher>,
    typed: Arc<dyn Any + Send + Sync>,
}

pub struct NotificationEngine {
    dispatchers: RwLock<HashMap<TypeId, DispatcherEntry>>,
    next_listener: AtomicU64,
    open: AtomicBool,
}

impl NotificationEngine {
    #[must_use]
    pub fn new() -> Self {
        Self {
            dispatchers: RwLock::new(HashMap::new()),
            next_listener: AtomicU64::new(1),
            open: AtomicBool::new(true),
        }
    }

    /// Register a listener for class `L`.
    ///
    /// # Errors
    ///
    /// - [`NotificationError::ConfigMismatch`] if `L` already has a
    ///   dispatcher with a different configuration
    /// - [`NotificationError::ShutDown`] after [`Self::shutdown`]
    /// - [`NotificationError::WorkerSpawn`] if an async worker cannot start
    pub fn register<L, T>(
        &self,
        config: ListenerConfig,
        listener: T,
    ) -> Result<ListenerId, NotificationError>
    where
        L: ListenerClass,
        T: Listener<L::Notification>,
    {
        if !self.open.load(Ordering::Acquire) {
            return Err(NotificationError::ShutDown { class: L::NAME });
        }
        let dispatcher = self.dispatcher_or_create::<L>(config)?;
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        dispatcher.add_listener(id, Arc::new(listener));
        debug!(class = L::NAME, listener = %id, "Listener registered");
        Ok(id)
    }

    fn dispatcher_or_create<L: ListenerClass>(
        &self,
        config: ListenerConfig,
    ) -> Result<Arc<Dispatcher<L::Notification>>, NotificationError> {
        let dispatcher = match self.dispatcher::<L>() {
            Some(existing) => existing,
            None => {
                let mut dispatchers = self.dispatchers.write();
                let entry = match dispatchers.entry(TypeId::of::<L>()) {
                    Entry::Occupied(occupied) => occupied.get().clone(),
                    Entry::Vacant(vacant) => {
                        let created =
                            Arc::new(Dispatcher::<L::Notification>::new(L::NAME, config)?);
                        info!(class = L::NAME, config = ?config, "Listener class mapped");
                        vacant
                            .insert(DispatcherEntry {
                                erased: created.clone(),
                                typed: created,
                            })
                            .clone()
                    }
                };
                downcast::<L>(&entry).ok_or(NotificationError::ShutDown { class: L::NAME })?
            }
        };

        if dispatcher.config() != config {
            return Err(NotificationError::ConfigMismatch {
                class: L::NAME,
                registered: dispatcher.config(),
                requested: config,
            });
        }
        Ok(dispatcher)
    }

    /// The dispatcher serving class `L`, if any listener was ever registered.
    #[must_use]
    pub fn dispatcher<L: ListenerClass>(&self) -> Option<Arc<Dispatcher<L::Notification>>> {
        let entry = self.dispatchers.read().get(&TypeId::of::<L>())?.clone();
        downcast::<L>(&entry)
    }

    /// Deliver a notification to every listener of class `L`.
    ///
    /// A class without a dispatcher has no listeners; the future resolves
    /// immediately with an empty result.
    pub fn dispatch<L: ListenerClass>(&self, notification: L::Notification) -> DispatchFuture {
        match self.dispatcher::<L>() {
            Some(dispatcher) => dispatcher.dispatch(notification),
            None => DispatchFuture::ready(L::NAME, DispatchResult::default()),
        }
    }

    /// Remove one listener, whichever class it belongs to.
    pub fn unregister(&self, id: ListenerId) -> bool {
        let removed = self
            .dispatchers
            .read()
            .values()
            .any(|entry| entry.erased.remove_listener(id));
        if removed {
            debug!(listener = %id, "Listener unregistered");
        }
        removed
    }

    /// Remove every listener of every class. Dispatchers and their
    /// configurations stay.
    pub fn unregister_all(&self) {
        let removed: usize = self
            .dispatchers
            .read()
            .values()
            .map(|entry| entry.erased.clear())
            .sum();
        debug!(removed, "All listeners unregistered");
    }

    #[must_use]
    pub fn class_count(&self) -> usize {
        self.dispatchers.read().len()
    }

    /// Drain and stop every dispatcher. Idempotent.
    pub fn shutdown(&self) {
        if !self.open.swap(false, Ordering::AcqRel) {
            return;
        }
        let entries: Vec<DispatcherEntry> = self.dispatchers.read().values().cloned().collect();
        for entry in &entries {
            entry.erased.shutdown();
        }
        info!(classes = entries.len(), "Notification engine shut down");
    }
}

impl Default for NotificationEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn downcast<L: ListenerClass>(entry: &DispatcherEntry) -> Option<Arc<Dispatcher<L::Notification>>> {
    Arc::clone(&entry.typed)
        .downcast::<Dispatcher<L::Notification>>()
        .ok()
}
