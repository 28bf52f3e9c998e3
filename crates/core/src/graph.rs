//! Graph store for the program dependence graph
//!
//! Uses `petgraph::StableGraph` as the vertex arena so that `parent` and
//! adjacency references are plain `NodeIndex` values instead of owning
//! pointers. A side map from string ids to indices supports the id-based
//! API that the parser and resolver work with.

use petgraph::stable_graph::{NodeIndex, StableGraph};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Fatal graph-store errors. Unresolved references are not errors and are
/// dropped by the edge finalizer; these abort the run.
#[derive(Debug, Error)]
pub enum GraphError {
    /// A vertex was inserted whose `parent` is not in the graph.
    #[error("vertex {child} references parent {parent} which is not in the graph")]
    DanglingParent { child: String, parent: String },

    /// An edge endpoint does not name a vertex in the graph.
    #[error("vertex {0} not in graph")]
    MissingEndpoint(String),

    /// An exporter was invoked on a graph with no vertices.
    #[error("graph is empty; parse a source tree first")]
    EmptyGraph,
}

/// A zero-based source position (row, column).
///
/// Displays as `(row, column)`, which is the form embedded in gv `xlabel`s
/// and in the node-feature CSV.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Point {
    pub row: usize,
    pub column: usize,
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.column)
    }
}

impl From<tree_sitter::Point> for Point {
    fn from(p: tree_sitter::Point) -> Self {
        Point {
            row: p.row,
            column: p.column,
        }
    }
}

/// Syntactic category of a vertex.
///
/// The variants cover the grammar kinds the resolver dispatches on; every
/// other named tree-sitter kind is carried verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VertexKind {
    Module,
    FunctionDefinition,
    ClassDefinition,
    Call,
    Assignment,
    Identifier,
    AliasedImport,
    DottedName,
    Attribute,
    BinaryOperator,
    Lambda,
    Other(String),
}

impl VertexKind {
    /// Maps a tree-sitter grammar kind to a `VertexKind`.
    pub fn from_grammar(kind: &str) -> Self {
        match kind {
            "module" => VertexKind::Module,
            "function_definition" => VertexKind::FunctionDefinition,
            "class_definition" => VertexKind::ClassDefinition,
            "call" => VertexKind::Call,
            "assignment" => VertexKind::Assignment,
            "identifier" => VertexKind::Identifier,
            "aliased_import" => VertexKind::AliasedImport,
            "dotted_name" => VertexKind::DottedName,
            "attribute" => VertexKind::Attribute,
            "binary_operator" => VertexKind::BinaryOperator,
            "lambda" => VertexKind::Lambda,
            other => VertexKind::Other(other.to_string()),
        }
    }

    /// The grammar kind string this variant stands for.
    pub fn as_str(&self) -> &str {
        match self {
            VertexKind::Module => "module",
            VertexKind::FunctionDefinition => "function_definition",
            VertexKind::ClassDefinition => "class_definition",
            VertexKind::Call => "call",
            VertexKind::Assignment => "assignment",
            VertexKind::Identifier => "identifier",
            VertexKind::AliasedImport => "aliased_import",
            VertexKind::DottedName => "dotted_name",
            VertexKind::Attribute => "attribute",
            VertexKind::BinaryOperator => "binary_operator",
            VertexKind::Lambda => "lambda",
            VertexKind::Other(s) => s,
        }
    }

    /// Whether recursing below this vertex enters a new lexical scope:
    /// function and class bodies, lambdas, and comprehensions.
    pub fn opens_scope(&self) -> bool {
        matches!(
            self,
            VertexKind::FunctionDefinition | VertexKind::ClassDefinition | VertexKind::Lambda
        ) || self.as_str().contains("comprehension")
    }
}

/// A vertex of the dependence graph: one named node of a concrete syntax
/// tree, or a module root.
#[derive(Debug, Clone)]
pub struct Vertex {
    /// Globally unique label, immutable after insertion.
    pub id: String,
    /// Syntactic category.
    pub kind: VertexKind,
    /// Source span start.
    pub start: Point,
    /// Source span end.
    pub end: Point,
    /// Surface text: set for named leaves, the operator token for
    /// `binary_operator`, the full dotted surface for `attribute`.
    pub text: Option<String>,
    /// Set only on `identifier` vertices.
    pub var_name: Option<String>,
    /// Syntactic parent, if any. Module roots have none.
    pub parent: Option<NodeIndex>,
}

impl Vertex {
    pub fn new(id: impl Into<String>, kind: VertexKind, start: Point, end: Point) -> Self {
        Vertex {
            id: id.into(),
            kind,
            start,
            end,
            text: None,
            var_name: None,
            parent: None,
        }
    }

    /// Surface text, or `""` when none was recorded.
    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }

    /// Variable name, or `""` for non-identifier vertices.
    pub fn var_name(&self) -> &str {
        self.var_name.as_deref().unwrap_or("")
    }
}

/// The program dependence graph.
///
/// Directed; edges carry a weight. Syntactic parent→child edges form a
/// rooted tree per source file, and the resolver adds semantic edges on
/// top of them. Vertex iteration follows insertion order.
pub struct Graph {
    /// The underlying stable arena (private to enforce encapsulation).
    inner: StableGraph<Vertex, f64>,
    /// Maps vertex ids to arena indices.
    ids: HashMap<String, NodeIndex>,
}

impl Graph {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self {
            inner: StableGraph::new(),
            ids: HashMap::new(),
        }
    }

    /// Insert a vertex, keyed by its id.
    ///
    /// Fails with [`GraphError::DanglingParent`] when the vertex names a
    /// parent that is not already in the graph.
    pub fn add_vertex(&mut self, vertex: Vertex) -> Result<NodeIndex, GraphError> {
        if let Some(parent) = vertex.parent {
            if !self.inner.contains_node(parent) {
                return Err(GraphError::DanglingParent {
                    child: vertex.id.clone(),
                    parent: format!("#{}", parent.index()),
                });
            }
        }
        let id = vertex.id.clone();
        let index = self.inner.add_node(vertex);
        self.ids.insert(id, index);
        Ok(index)
    }

    /// Insert a directed edge between two vertices named by id.
    ///
    /// Re-adding an existing `(from, to)` pair overwrites its weight without
    /// duplicating the entry. With `bi`, the reverse edge is inserted too.
    pub fn add_edge(
        &mut self,
        from: &str,
        to: &str,
        weight: f64,
        bi: bool,
    ) -> Result<(), GraphError> {
        let from_idx = self
            .index_of(from)
            .ok_or_else(|| GraphError::MissingEndpoint(from.to_string()))?;
        let to_idx = self
            .index_of(to)
            .ok_or_else(|| GraphError::MissingEndpoint(to.to_string()))?;
        self.inner.update_edge(from_idx, to_idx, weight);
        if bi {
            self.inner.update_edge(to_idx, from_idx, weight);
        }
        Ok(())
    }

    /// Edge insertion by arena index; used on the parser hot path where
    /// both indices are already at hand.
    pub fn add_edge_indices(
        &mut self,
        from: NodeIndex,
        to: NodeIndex,
        weight: f64,
    ) -> Result<(), GraphError> {
        if !self.inner.contains_node(from) {
            return Err(GraphError::MissingEndpoint(format!("#{}", from.index())));
        }
        if !self.inner.contains_node(to) {
            return Err(GraphError::MissingEndpoint(format!("#{}", to.index())));
        }
        self.inner.update_edge(from, to, weight);
        Ok(())
    }

    /// Look up a vertex by id.
    pub fn get_vertex(&self, id: &str) -> Option<&Vertex> {
        self.index_of(id).and_then(|idx| self.inner.node_weight(idx))
    }

    /// Look up a vertex's syntactic parent by the child's id.
    pub fn get_parent(&self, id: &str) -> Option<&Vertex> {
        let vertex = self.get_vertex(id)?;
        vertex.parent.and_then(|idx| self.inner.node_weight(idx))
    }

    /// Arena index for an id.
    pub fn index_of(&self, id: &str) -> Option<NodeIndex> {
        self.ids.get(id).copied()
    }

    /// Vertex by arena index.
    pub fn vertex(&self, index: NodeIndex) -> Option<&Vertex> {
        self.inner.node_weight(index)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains_key(id)
    }

    /// Number of vertices in the graph.
    pub fn vertex_count(&self) -> usize {
        self.inner.node_count()
    }

    /// All vertex ids in insertion order.
    pub fn vertex_ids(&self) -> Vec<&str> {
        // With no removals, StableGraph indices are allocated in insertion
        // order, so index order is insertion order.
        self.inner
            .node_indices()
            .filter_map(|idx| self.inner.node_weight(idx))
            .map(|v| v.id.as_str())
            .collect()
    }

    /// Iterate vertices in insertion order.
    pub fn vertices(&self) -> impl Iterator<Item = &Vertex> {
        self.inner
            .node_indices()
            .filter_map(|idx| self.inner.node_weight(idx))
    }

    /// Outgoing neighbors of a vertex, in edge-insertion order.
    pub fn neighbors(&self, id: &str) -> Vec<&Vertex> {
        let Some(index) = self.index_of(id) else {
            return Vec::new();
        };
        // petgraph walks outgoing edges newest-first; reverse to recover
        // insertion order, which is child order for syntactic edges.
        let mut targets: Vec<NodeIndex> = self.inner.edges(index).map(|e| e.target()).collect();
        targets.reverse();
        targets
            .into_iter()
            .filter_map(|idx| self.inner.node_weight(idx))
            .collect()
    }

    /// Outgoing neighbors with their edge weights, in edge-insertion order.
    pub fn neighbors_weighted(&self, id: &str) -> Vec<(&Vertex, f64)> {
        let Some(index) = self.index_of(id) else {
            return Vec::new();
        };
        let mut edges: Vec<(NodeIndex, f64)> = self
            .inner
            .edges(index)
            .map(|e| (e.target(), *e.weight()))
            .collect();
        edges.reverse();
        edges
            .into_iter()
            .filter_map(|(idx, w)| self.inner.node_weight(idx).map(|v| (v, w)))
            .collect()
    }

    /// All vertices reachable from `id` over outgoing edges, pre-order.
    ///
    /// Intended for syntactic trees; cycles are not detected.
    pub fn descendants(&self, id: &str) -> Vec<&Vertex> {
        let mut out = Vec::new();
        for neighbor in self.neighbors(id) {
            out.push(neighbor);
            out.extend(self.descendants(&neighbor.id));
        }
        out
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}
