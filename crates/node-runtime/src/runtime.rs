//! # Node Runtime
//!
//! Owns the intake pipeline and the notification engine.
//!
//! ## Startup Sequence
//!
//! 1. Validate configuration
//! 2. Build the intake pipeline (intake → dedup → consumer)
//! 3. Register the reconnect listener
//! 4. Signal ready
//!
//! Shutdown runs in reverse: listeners first, then the pipeline.

use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::RwLock;
use shared_bus::{DispatchResult, NotificationEngine};
use shared_types::{EventWindow, NodeState, PlatformEvent};
use tracing::{info, warn};

use crate::container::NodeConfig;
use crate::handlers::{ReconnectListener, ReconnectListeners, ReconnectNotification};
use crate::wiring::IntakePipeline;

/// The main node runtime.
pub struct NodeRuntime {
    config: NodeConfig,
    pipeline: Arc<IntakePipeline>,
    notifications: NotificationEngine,
    state: RwLock<NodeState>,
}

impl NodeRuntime {
    /// Build every component. `sink` receives deduplicated events.
    pub fn new<F>(config: NodeConfig, sink: F) -> Result<Self>
    where
        F: Fn(PlatformEvent) + Send + Sync + 'static,
    {
        info!("Creating Quantum-Chain node runtime");

        // Step 1: configuration
        config.validate().context("Invalid node configuration")?;

        // Step 2: pipeline
        let pipeline = IntakePipeline::build(&config, sink)
            .context("Failed to build intake pipeline")?;
        let pipeline = Arc::new(pipeline);

        // Step 3: listeners
        let notifications = NotificationEngine::new();
        let listener =
            ReconnectListener::new(pipeline.dedup(), Arc::clone(pipeline.intake_counter()))
                .with_upstream(pipeline.intake());
        let id = listener
            .register(&notifications)
            .context("Failed to register reconnect listener")?;
        info!(listener = %id, "Reconnect listener registered");

        Ok(Self {
            config,
            pipeline,
            notifications,
            state: RwLock::new(NodeState::Running),
        })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn pipeline(&self) -> &Arc<IntakePipeline> {
        &self.pipeline
    }

    pub fn state(&self) -> NodeState {
        *self.state.read()
    }

    /// Squelch deduplication until [`Self::complete_reconnect`].
    ///
    /// Blocks until the listeners have run; call from a blocking context.
    pub fn begin_reconnect(&self) -> Result<DispatchResult> {
        let result = self.announce(ReconnectNotification::started())?;
        *self.state.write() = NodeState::Reconnecting;
        Ok(result)
    }

    /// Clear deduplication, install `window` and resume.
    ///
    /// Blocks until the listeners have run; call from a blocking context.
    pub fn complete_reconnect(&self, window: EventWindow) -> Result<DispatchResult> {
        let result = self.announce(ReconnectNotification::completed(window))?;
        *self.state.write() = NodeState::Running;
        Ok(result)
    }

    fn announce(&self, notification: ReconnectNotification) -> Result<DispatchResult> {
        let phase = notification.phase;
        let result = self
            .notifications
            .dispatch::<ReconnectListeners>(notification)
            .wait()
            .context("Reconnect dispatch failed")?;
        if !result.is_success() {
            warn!(?phase, failures = result.failure_count(), "Reconnect listener failed");
        }
        Ok(result)
    }

    /// Stop listeners, then the pipeline. Idempotent.
    pub fn shutdown(&self) {
        *self.state.write() = NodeState::Stopping;
        info!("Shutting down node runtime");
        self.notifications.shutdown();
        self.pipeline.shutdown();
        info!("Node runtime stopped");
    }
}

impl std::fmt::Debug for NodeRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRuntime")
            .field("state", &self.state())
            .field("pipeline", &self.pipeline)
            .finish()
    }
}
