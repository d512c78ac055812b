//! # Reconnect Handler
//!
//! While the node reconnects it receives a state snapshot and must ignore
//! whatever gossip still trickles in. The handler squelches the dedup
//! stage when reconnect starts. On completion, still squelched, it drains
//! the upstream stages and the squelched backlog, then clears the
//! deduplicator and installs the snapshot's event window. Only then is the
//! squelch lifted, so no event queued during the reconnect survives it.
//!
//! Registered as a `SYNC`/`ORDERED` class so a completion can never
//! overtake the start it belongs to.

use std::sync::Arc;

use qc_18_event_deduplication::{DeduplicatorWiring, PeerIntakeCounter};
use shared_bus::{
    Listener, ListenerClass, ListenerConfig, ListenerError, ListenerId, Notification,
    NotificationEngine, NotificationError, NotificationMeta,
};
use shared_types::{EventWindow, PlatformEvent};
use shared_wiring::TaskScheduler;
use tracing::info;

/// Reconnect lifecycle step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectPhase {
    Started,
    /// Snapshot loaded; `window` is the snapshot's event window.
    Completed { window: EventWindow },
}

#[derive(Debug, Clone)]
pub struct ReconnectNotification {
    meta: NotificationMeta,
    pub phase: ReconnectPhase,
}

impl ReconnectNotification {
    pub fn started() -> Self {
        Self {
            meta: NotificationMeta::new(),
            phase: ReconnectPhase::Started,
        }
    }

    pub fn completed(window: EventWindow) -> Self {
        Self {
            meta: NotificationMeta::new(),
            phase: ReconnectPhase::Completed { window },
        }
    }
}

impl Notification for ReconnectNotification {
    fn meta(&self) -> &NotificationMeta {
        &self.meta
    }
}

/// Listener class for reconnect notifications.
pub struct ReconnectListeners;

impl ListenerClass for ReconnectListeners {
    type Notification = ReconnectNotification;
    const NAME: &'static str = "reconnect";
}

/// Squelches and restores the dedup stage around a reconnect.
pub struct ReconnectListener {
    dedup: DeduplicatorWiring,
    upstream: Vec<TaskScheduler<PlatformEvent>>,
    intake_counter: Arc<PeerIntakeCounter>,
}

impl ReconnectListener {
    pub fn new(dedup: &DeduplicatorWiring, intake_counter: Arc<PeerIntakeCounter>) -> Self {
        Self {
            dedup: dedup.clone(),
            upstream: Vec::new(),
            intake_counter,
        }
    }

    /// Flush `scheduler` before the dedup stage on completion. It must feed
    /// the dedup stage and support flushing.
    #[must_use]
    pub fn with_upstream(mut self, scheduler: &TaskScheduler<PlatformEvent>) -> Self {
        self.upstream.push(scheduler.clone());
        self
    }

    /// Register on `engine` under [`ReconnectListeners`].
    pub fn register(self, engine: &NotificationEngine) -> Result<ListenerId, NotificationError> {
        engine.register::<ReconnectListeners, _>(ListenerConfig::SYNC_ORDERED, self)
    }

    fn on_started(&self) -> Result<(), ListenerError> {
        let scheduler = self.dedup.scheduler();
        scheduler.start_squelching().map_err(failed)?;
        info!(scheduler = %scheduler.name(), "Reconnect started, dedup squelched");
        Ok(())
    }

    fn on_completed(&self, window: EventWindow) -> Result<(), ListenerError> {
        for upstream in &self.upstream {
            upstream.flush().map_err(failed)?;
        }
        self.dedup.reset_squelched(window).map_err(failed)?;
        // Squelched events never reached a stage that releases them.
        self.intake_counter.reset();
        let scheduler = self.dedup.scheduler();
        scheduler.stop_squelching().map_err(failed)?;
        info!(
            scheduler = %scheduler.name(),
            ancient_threshold = window.ancient_threshold,
            "Reconnect complete, dedup cleared"
        );
        Ok(())
    }
}

impl Listener<ReconnectNotification> for ReconnectListener {
    fn notify(&self, notification: &ReconnectNotification) -> Result<(), ListenerError> {
        match notification.phase {
            ReconnectPhase::Started => self.on_started(),
            ReconnectPhase::Completed { window } => self.on_completed(window),
        }
    }
}

fn failed(error: impl std::fmt::Display) -> ListenerError {
    ListenerError::failed(error.to_string())
}
