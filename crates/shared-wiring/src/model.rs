//! # Wiring Model
//!
//! Lifecycle owner for a graph of schedulers. It hands out scheduler
//! builders, owns the thread pool shared by every pooled scheduler and
//! stops all schedulers in build order on [`WiringModel::stop`].
//!
//! Everything built through the model is recorded in its [`WiringGraph`],
//! which backs [`WiringModel::check_for_cyclical_backpressure`] and
//! [`WiringModel::generate_wiring_diagram`].

use crate::error::WiringError;
use crate::graph::{VertexKind, WiringDiagram, WiringGraph};
use crate::schedulers::{SchedulerBuilder, SchedulerCore};
use crate::wires::OutputWire;
use parking_lot::Mutex;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};
use tracing::{error, info};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WiringConfig {
    /// Threads in the shared pool. `0` lets rayon pick one per core.
    pub pool_threads: usize,
    /// Build every scheduler as `Direct`, regardless of what it asks for.
    pub deterministic: bool,
}

pub struct WiringModel {
    config: WiringConfig,
    pool: OnceLock<Arc<ThreadPool>>,
    schedulers: Mutex<Vec<Arc<SchedulerCore>>>,
    graph: Arc<WiringGraph>,
}

impl WiringModel {
    #[must_use]
    pub fn new(config: WiringConfig) -> Self {
        Self {
            config,
            pool: OnceLock::new(),
            schedulers: Mutex::new(Vec::new()),
            graph: Arc::new(WiringGraph::default()),
        }
    }

    /// Start describing a scheduler named `name`.
    pub fn scheduler_builder(&self, name: &str) -> SchedulerBuilder<'_> {
        SchedulerBuilder::new(self, name)
    }

    #[must_use]
    pub fn is_deterministic(&self) -> bool {
        self.config.deterministic
    }

    #[must_use]
    pub fn config(&self) -> &WiringConfig {
        &self.config
    }

    /// Names of every scheduler built so far, in build order.
    #[must_use]
    pub fn scheduler_names(&self) -> Vec<String> {
        self.schedulers
            .lock()
            .iter()
            .map(|core| core.name().to_string())
            .collect()
    }

    /// A free-standing output wire recorded as a source vertex, for data
    /// entering the graph from outside any scheduler.
    pub fn build_source<T: Clone + Send + 'static>(&self, name: &str) -> OutputWire<T> {
        self.graph.add_vertex(name, VertexKind::Source);
        OutputWire::attached(name, Arc::clone(&self.graph))
    }

    #[must_use]
    pub fn graph(&self) -> &WiringGraph {
        &self.graph
    }

    pub(crate) fn shared_graph(&self) -> Arc<WiringGraph> {
        Arc::clone(&self.graph)
    }

    /// Every loop of blocking connections through a bounded scheduler.
    #[must_use]
    pub fn backpressure_cycles(&self) -> Vec<Vec<String>> {
        self.graph.backpressure_cycles()
    }

    /// Fail if any loop of blocking connections runs through a bounded
    /// scheduler. Such a loop deadlocks once its queues fill.
    ///
    /// # Errors
    ///
    /// [`WiringError::CyclicalBackpressure`] naming the first such loop.
    pub fn check_for_cyclical_backpressure(&self) -> Result<(), WiringError> {
        let cycles = self.backpressure_cycles();
        for cycle in &cycles {
            error!(vertices = ?cycle, "Cyclical backpressure detected");
        }
        match cycles.into_iter().next() {
            Some(vertices) => Err(WiringError::CyclicalBackpressure { vertices }),
            None => Ok(()),
        }
    }

    /// Mermaid flowchart of everything built so far.
    #[must_use]
    pub fn generate_wiring_diagram(&self) -> WiringDiagram {
        self.graph.diagram()
    }

    /// The shared pool, created on first use.
    pub(crate) fn pool(&self) -> Result<Arc<ThreadPool>, WiringError> {
        if let Some(pool) = self.pool.get() {
            return Ok(Arc::clone(pool));
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(self.config.pool_threads)
            .thread_name(|i| format!("wiring-pool-{i}"))
            .build()
            .map_err(|e| WiringError::ThreadSpawn(e.to_string()))?;
        // A racing builder may have won; its pool is kept and ours dropped.
        Ok(Arc::clone(self.pool.get_or_init(|| Arc::new(pool))))
    }

    pub(crate) fn register(&self, core: Arc<SchedulerCore>) {
        self.schedulers.lock().push(core);
    }

    /// Stop every scheduler in build order. Idempotent.
    pub fn stop(&self) {
        let schedulers: Vec<Arc<SchedulerCore>> = self.schedulers.lock().clone();
        info!(count = schedulers.len(), "Stopping wiring model");
        for core in schedulers {
            core.stop();
        }
    }
}

impl Default for WiringModel {
    fn default() -> Self {
        Self::new(WiringConfig::default())
    }
}
