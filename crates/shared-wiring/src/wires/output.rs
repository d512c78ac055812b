//! Output wires, admission policies and connections.

use super::stage::{Filter, Splitter, Stage, StageWire, Transformer};
use super::Sink;
use crate::graph::{VertexKind, WiringGraph};
use parking_lot::RwLock;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// How a connection admits items into its target.
pub enum AdmissionPolicy<T> {
    /// Block until the target has capacity.
    Put,
    /// Do not block. Refused items are handed to the callback.
    Offer(Arc<dyn Fn(T) + Send + Sync>),
    /// Ignore the target's capacity.
    Bypass,
}

impl<T> AdmissionPolicy<T> {
    /// `Offer` with the given rejection handler.
    pub fn offer<F>(on_reject: F) -> Self
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        AdmissionPolicy::Offer(Arc::new(on_reject))
    }

    #[must_use]
    pub fn kind(&self) -> PolicyKind {
        match self {
            AdmissionPolicy::Put => PolicyKind::Put,
            AdmissionPolicy::Offer(_) => PolicyKind::Offer,
            AdmissionPolicy::Bypass => PolicyKind::Bypass,
        }
    }
}

impl<T> Clone for AdmissionPolicy<T> {
    fn clone(&self) -> Self {
        match self {
            AdmissionPolicy::Put => AdmissionPolicy::Put,
            AdmissionPolicy::Offer(on_reject) => AdmissionPolicy::Offer(Arc::clone(on_reject)),
            AdmissionPolicy::Bypass => AdmissionPolicy::Bypass,
        }
    }
}

impl<T> fmt::Debug for AdmissionPolicy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind())
    }
}

/// Admission policy without its payload, for logging and introspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    Put,
    Offer,
    Bypass,
}

struct ConnectionState {
    source: String,
    target: String,
    target_vertex: String,
    policy: PolicyKind,
    closed: AtomicBool,
    delivered: AtomicU64,
    rejected: AtomicU64,
    failed: AtomicU64,
}

/// One soldered edge. Closing it stops all further delivery.
#[derive(Clone)]
pub struct Connection {
    state: Arc<ConnectionState>,
}

impl Connection {
    /// Stop delivering along this edge. Closing twice is a no-op.
    pub fn close(&self) {
        if !self.state.closed.swap(true, Ordering::AcqRel) {
            debug!(
                source = %self.state.source,
                target = %self.state.target,
                "Connection closed"
            );
        }
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.closed.load(Ordering::Acquire)
    }

    /// Items admitted into the target so far.
    #[must_use]
    pub fn throughput(&self) -> u64 {
        self.state.delivered.load(Ordering::Relaxed)
    }

    /// Items refused under the `Offer` policy.
    #[must_use]
    pub fn rejected(&self) -> u64 {
        self.state.rejected.load(Ordering::Relaxed)
    }

    /// Items the target failed to admit (unbound, stopped, interrupted).
    #[must_use]
    pub fn failed(&self) -> u64 {
        self.state.failed.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn policy(&self) -> PolicyKind {
        self.state.policy
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.state.source
    }

    /// Name of the sink soldered to. For an input wire this is the wire,
    /// not its scheduler.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.state.target
    }

    /// Graph vertex the target belongs to.
    #[must_use]
    pub fn target_vertex(&self) -> &str {
        &self.state.target_vertex
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("source", &self.state.source)
            .field("target", &self.state.target)
            .field("policy", &self.state.policy)
            .field("closed", &self.is_closed())
            .field("throughput", &self.throughput())
            .finish()
    }
}

struct Edge<T> {
    sink: Arc<dyn Sink<T>>,
    policy: AdmissionPolicy<T>,
    state: Arc<ConnectionState>,
}

impl<T: 'static> Edge<T> {
    fn deliver(&self, item: T) {
        let result = match &self.policy {
            AdmissionPolicy::Put => self.sink.put(item),
            AdmissionPolicy::Bypass => self.sink.inject(item),
            AdmissionPolicy::Offer(on_reject) => match self.sink.offer(item) {
                Ok(()) => Ok(()),
                Err(item) => {
                    self.state.rejected.fetch_add(1, Ordering::Relaxed);
                    debug!(
                        source = %self.state.source,
                        target = %self.state.target,
                        "Offer rejected by full target"
                    );
                    on_reject(item);
                    return;
                }
            },
        };
        match result {
            Ok(()) => {
                self.state.delivered.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.state.failed.fetch_add(1, Ordering::Relaxed);
                warn!(
                    source = %self.state.source,
                    target = %self.state.target,
                    policy = ?self.state.policy,
                    error = %e,
                    "Delivery failed"
                );
            }
        }
    }
}

/// Typed fan-out source.
pub struct OutputWire<T> {
    inner: Arc<OutputInner<T>>,
}

struct OutputInner<T> {
    name: String,
    /// Set when built through a wiring model; connections are recorded here.
    graph: Option<Arc<WiringGraph>>,
    /// Copy-on-write so `forward` never holds the lock while delivering.
    edges: RwLock<Arc<Vec<Arc<Edge<T>>>>>,
}

impl<T> Clone for OutputWire<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + 'static> OutputWire<T> {
    /// A free-standing output wire, not owned by any scheduler and not
    /// recorded in any wiring graph.
    pub fn new(name: &str) -> Self {
        Self::with_graph(name, None)
    }

    /// An output wire whose connections are recorded in `graph`. The caller
    /// records the vertex.
    pub(crate) fn attached(name: &str, graph: Arc<WiringGraph>) -> Self {
        Self::with_graph(name, Some(graph))
    }

    fn with_graph(name: &str, graph: Option<Arc<WiringGraph>>) -> Self {
        Self {
            inner: Arc::new(OutputInner {
                name: name.to_string(),
                graph,
                edges: RwLock::new(Arc::new(Vec::new())),
            }),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Connect to `target` with the given policy.
    pub fn solder<S>(&self, target: &S, policy: AdmissionPolicy<T>) -> Connection
    where
        S: Sink<T> + Clone,
    {
        self.solder_sink(Arc::new(target.clone()), policy)
    }

    /// Connect to `target` with [`AdmissionPolicy::Put`].
    pub fn solder_to<S>(&self, target: &S) -> Connection
    where
        S: Sink<T> + Clone,
    {
        self.solder(target, AdmissionPolicy::Put)
    }

    fn solder_sink(&self, sink: Arc<dyn Sink<T>>, policy: AdmissionPolicy<T>) -> Connection {
        let state = Arc::new(ConnectionState {
            source: self.inner.name.clone(),
            target: sink.name().to_string(),
            target_vertex: sink.vertex().to_string(),
            policy: policy.kind(),
            closed: AtomicBool::new(false),
            delivered: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        });
        debug!(
            source = %state.source,
            target = %state.target,
            policy = ?state.policy,
            "Soldered"
        );

        let edge = Arc::new(Edge {
            sink,
            policy,
            state: Arc::clone(&state),
        });
        let mut edges = self.inner.edges.write();
        let mut next: Vec<Arc<Edge<T>>> = edges
            .iter()
            .filter(|e| !e.state.closed.load(Ordering::Acquire))
            .cloned()
            .collect();
        next.push(edge);
        *edges = Arc::new(next);
        drop(edges);

        let connection = Connection { state };
        if let Some(graph) = &self.inner.graph {
            graph.add_connection(connection.clone());
        }
        connection
    }

    /// Deliver `item` to every open connection, in solder order.
    pub fn forward(&self, item: T) {
        let edges = Arc::clone(&self.inner.edges.read());
        let open: Vec<&Arc<Edge<T>>> = edges
            .iter()
            .filter(|e| !e.state.closed.load(Ordering::Acquire))
            .collect();
        if let Some((last, rest)) = open.split_last() {
            for edge in rest {
                edge.deliver(item.clone());
            }
            last.deliver(item);
        }
    }

    /// Number of connections that have not been closed.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.inner
            .edges
            .read()
            .iter()
            .filter(|e| !e.state.closed.load(Ordering::Acquire))
            .count()
    }

    /// Insert a stage between this wire and whatever is soldered to the
    /// returned wire. A stage built from a recorded wire is recorded too.
    pub fn build_stage<U, S>(&self, name: &str, stage: S) -> OutputWire<U>
    where
        U: Clone + Send + 'static,
        S: Stage<T, U>,
    {
        let output = match &self.inner.graph {
            Some(graph) => {
                graph.add_vertex(name, VertexKind::Stage(stage.kind()));
                OutputWire::attached(name, Arc::clone(graph))
            }
            None => OutputWire::new(name),
        };
        let stage_wire = StageWire::with_output(name, stage, output);
        let output = stage_wire.output_wire().clone();
        self.solder_sink(Arc::new(stage_wire), AdmissionPolicy::Put);
        output
    }

    /// Only items matching `predicate` pass.
    pub fn build_filter<F>(&self, name: &str, predicate: F) -> OutputWire<T>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.build_stage(name, Filter::new(predicate))
    }

    /// Every item is reshaped by `transform`.
    pub fn build_transformer<U, F>(&self, name: &str, transform: F) -> OutputWire<U>
    where
        U: Clone + Send + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        self.build_stage(name, Transformer::new(transform))
    }
}

impl<T: Clone + Send + 'static> OutputWire<Vec<T>> {
    /// Each list is delivered as its individual elements, in order.
    pub fn build_splitter(&self, name: &str) -> OutputWire<T> {
        self.build_stage(name, Splitter::default())
    }
}

impl<T> fmt::Debug for OutputWire<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputWire")
            .field("name", &self.inner.name)
            .field("edges", &self.inner.edges.read().len())
            .finish()
    }
}
