//! # Quantum-Chain Node Runtime
//!
//! The main entry point for the Quantum-Chain node.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (from env)
//! 2. Initialize telemetry (logging, Prometheus registry)
//! 3. Build the intake pipeline and register listeners
//! 4. Publish pipeline metrics on an interval
//! 5. Wait for Ctrl+C, then shut down in reverse order

use std::sync::Arc;

use anyhow::{Context, Result};
use node_runtime::{NodeConfig, NodeRuntime};
use quantum_telemetry::init_telemetry;
use tracing::{debug, info};

#[tokio::main]
async fn main() -> Result<()> {
    let config = NodeConfig::from_env();
    let _telemetry = init_telemetry(&config.telemetry).context("Failed to initialize telemetry")?;

    info!("===========================================");
    info!("  Quantum-Chain Node Runtime v{}", env!("CARGO_PKG_VERSION"));
    info!("===========================================");
    info!(
        pool_threads = config.wiring.pool_threads,
        deterministic = config.wiring.deterministic,
        intake = %config.intake.dispatch,
        dedup_capacity = config.dedup.queue_capacity,
        "Configuration loaded"
    );

    let runtime = NodeRuntime::new(config, |event| {
        debug!(
            creator = event.descriptor.creator.0,
            generation = event.descriptor.generation,
            "Event accepted"
        );
    })?;

    let metrics_task = runtime.config().metrics_interval().map(|period| {
        let pipeline = Arc::clone(runtime.pipeline());
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                pipeline.publish_metrics();
            }
        })
    });

    info!("Node is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown signal received");

    if let Some(task) = metrics_task {
        task.abort();
    }
    // Scheduler shutdown joins worker threads.
    tokio::task::spawn_blocking(move || runtime.shutdown())
        .await
        .context("Shutdown task failed")?;
    Ok(())
}
