//! # Wiring Graph
//!
//! Every scheduler, stage and source built through a [`WiringModel`] is
//! recorded as a vertex, and every connection soldered from one of their
//! output wires as an edge. The record is used to find cycles that can
//! deadlock on backpressure and to render the graph as a Mermaid flowchart.
//!
//! ## Backpressure Cycles
//!
//! A blocking `put` into a bounded scheduler waits for capacity. If the
//! scheduler's own output can reach that `put` again through blocking edges
//! only, a full queue stalls the whole loop. An edge blocks when its policy
//! is [`PolicyKind::Put`] and its target is a bounded scheduler or a stage,
//! since stages deliver inline and inherit the backpressure behind them.
//! A loop is broken by any `Offer` or `Bypass` edge, or by an unbounded
//! scheduler on it.
//!
//! [`WiringModel`]: crate::model::WiringModel

use crate::schedulers::{DispatchModel, UNLIMITED_CAPACITY};
use crate::wires::{Connection, PolicyKind, StageKind};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;

/// What a vertex of the wiring graph is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexKind {
    /// A task scheduler, with the dispatch model and capacity it was built
    /// with.
    Scheduler {
        dispatch: DispatchModel,
        capacity: usize,
    },
    /// A filter, splitter or transformer.
    Stage(StageKind),
    /// A free-standing output wire.
    Source,
}

impl VertexKind {
    /// Whether a blocking put into this vertex can wait for capacity.
    ///
    /// The requested dispatch model counts, so a deterministic model that
    /// runs everything inline reports the same cycles as a threaded one.
    #[must_use]
    pub fn is_bounded(&self) -> bool {
        match self {
            VertexKind::Scheduler { dispatch, capacity } => {
                *dispatch != DispatchModel::Direct && *capacity != UNLIMITED_CAPACITY
            }
            VertexKind::Stage(_) | VertexKind::Source => false,
        }
    }

    fn passes_backpressure(&self) -> bool {
        self.is_bounded() || matches!(self, VertexKind::Stage(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vertex {
    pub name: String,
    pub kind: VertexKind,
}

/// Vertices and connections recorded by one wiring model.
#[derive(Default)]
pub struct WiringGraph {
    vertices: Mutex<Vec<Vertex>>,
    connections: Mutex<Vec<Connection>>,
}

impl WiringGraph {
    /// Record a vertex. A name seen before keeps its first kind.
    pub(crate) fn add_vertex(&self, name: &str, kind: VertexKind) {
        let mut vertices = self.vertices.lock();
        if vertices.iter().all(|v| v.name != name) {
            vertices.push(Vertex {
                name: name.to_string(),
                kind,
            });
        }
    }

    pub(crate) fn add_connection(&self, connection: Connection) {
        self.connections.lock().push(connection);
    }

    /// Every vertex, in build order.
    #[must_use]
    pub fn vertices(&self) -> Vec<Vertex> {
        self.vertices.lock().clone()
    }

    /// Connections that have not been closed, in solder order.
    #[must_use]
    pub fn connections(&self) -> Vec<Connection> {
        self.connections
            .lock()
            .iter()
            .filter(|c| !c.is_closed())
            .cloned()
            .collect()
    }

    /// Each loop that can deadlock on backpressure, as vertex names in
    /// build order.
    #[must_use]
    pub fn backpressure_cycles(&self) -> Vec<Vec<String>> {
        let vertices = self.vertices();
        let index: HashMap<&str, usize> = vertices
            .iter()
            .enumerate()
            .map(|(i, v)| (v.name.as_str(), i))
            .collect();

        let mut adjacency = vec![Vec::new(); vertices.len()];
        for connection in self.connections() {
            if connection.policy() != PolicyKind::Put {
                continue;
            }
            let (Some(&from), Some(&to)) = (
                index.get(connection.source()),
                index.get(connection.target_vertex()),
            ) else {
                continue;
            };
            if vertices[to].kind.passes_backpressure() {
                adjacency[from].push(to);
            }
        }

        let mut cycles: Vec<Vec<String>> = StronglyConnected::find(&adjacency)
            .into_iter()
            .filter(|component| {
                let first = component[0];
                let looped = component.len() > 1 || adjacency[first].contains(&first);
                looped && component.iter().any(|&v| vertices[v].kind.is_bounded())
            })
            .map(|mut component| {
                component.sort_unstable();
                component
                    .into_iter()
                    .map(|v| vertices[v].name.clone())
                    .collect()
            })
            .collect();
        cycles.sort();
        cycles
    }

    /// Snapshot of the graph, rendered as a Mermaid flowchart by `Display`.
    #[must_use]
    pub fn diagram(&self) -> WiringDiagram {
        WiringDiagram {
            vertices: self.vertices(),
            connections: self.connections(),
            cycles: self.backpressure_cycles(),
        }
    }
}

impl fmt::Debug for WiringGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WiringGraph")
            .field("vertices", &self.vertices.lock().len())
            .field("connections", &self.connections.lock().len())
            .finish()
    }
}

/// Tarjan's algorithm over an adjacency list of vertex indices.
struct StronglyConnected<'a> {
    adjacency: &'a [Vec<usize>],
    index: Vec<Option<usize>>,
    low: Vec<usize>,
    on_stack: Vec<bool>,
    stack: Vec<usize>,
    next: usize,
    components: Vec<Vec<usize>>,
}

impl<'a> StronglyConnected<'a> {
    fn find(adjacency: &'a [Vec<usize>]) -> Vec<Vec<usize>> {
        let n = adjacency.len();
        let mut search = Self {
            adjacency,
            index: vec![None; n],
            low: vec![0; n],
            on_stack: vec![false; n],
            stack: Vec::new(),
            next: 0,
            components: Vec::new(),
        };
        for v in 0..n {
            if search.index[v].is_none() {
                search.visit(v);
            }
        }
        search.components
    }

    fn visit(&mut self, v: usize) {
        self.index[v] = Some(self.next);
        self.low[v] = self.next;
        self.next += 1;
        self.stack.push(v);
        self.on_stack[v] = true;

        let adjacency = self.adjacency;
        for &w in &adjacency[v] {
            match self.index[w] {
                None => {
                    self.visit(w);
                    self.low[v] = self.low[v].min(self.low[w]);
                }
                Some(index) if self.on_stack[w] => {
                    self.low[v] = self.low[v].min(index);
                }
                Some(_) => {}
            }
        }

        if self.index[v] == Some(self.low[v]) {
            let mut component = Vec::new();
            while let Some(w) = self.stack.pop() {
                self.on_stack[w] = false;
                component.push(w);
                if w == v {
                    break;
                }
            }
            self.components.push(component);
        }
    }
}

/// Mermaid flowchart of a wiring graph. Vertices on a backpressure cycle
/// are drawn with the `cycle` class.
#[derive(Debug, Clone)]
pub struct WiringDiagram {
    vertices: Vec<Vertex>,
    connections: Vec<Connection>,
    cycles: Vec<Vec<String>>,
}

impl WiringDiagram {
    #[must_use]
    pub fn cycles(&self) -> &[Vec<String>] {
        &self.cycles
    }
}

impl fmt::Display for WiringDiagram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "flowchart LR")?;
        for vertex in &self.vertices {
            let id = mermaid_id(&vertex.name);
            let name = mermaid_label(&vertex.name);
            match vertex.kind {
                VertexKind::Scheduler { dispatch, capacity } => {
                    let bound = if vertex.kind.is_bounded() {
                        capacity.to_string()
                    } else {
                        "unbounded".to_string()
                    };
                    writeln!(f, "    {id}[\"{name}<br/>{dispatch} {bound}\"]")?;
                }
                VertexKind::Stage(kind) => {
                    let kind = format!("{kind:?}").to_lowercase();
                    writeln!(f, "    {id}{{{{\"{name}<br/>{kind}\"}}}}")?;
                }
                VertexKind::Source => writeln!(f, "    {id}([\"{name}\"])")?,
            }
        }

        for connection in &self.connections {
            let arrow = match connection.policy() {
                PolicyKind::Put => "-->",
                PolicyKind::Offer => "-.->",
                PolicyKind::Bypass => "==>",
            };
            let source = mermaid_id(connection.source());
            let target = mermaid_id(connection.target_vertex());
            if connection.target() == connection.target_vertex() {
                writeln!(f, "    {source} {arrow} {target}")?;
            } else {
                let wire = mermaid_label(connection.target());
                writeln!(f, "    {source} {arrow}|\"{wire}\"| {target}")?;
            }
        }

        if !self.cycles.is_empty() {
            writeln!(f, "    classDef cycle stroke:#d00,stroke-width:3px")?;
            for cycle in &self.cycles {
                let ids: Vec<String> = cycle.iter().map(|name| mermaid_id(name)).collect();
                writeln!(f, "    class {} cycle", ids.join(","))?;
            }
        }
        Ok(())
    }
}

/// Mermaid ids are restricted to word characters.
fn mermaid_id(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

fn mermaid_label(name: &str) -> String {
    name.replace('"', "#quot;")
}
