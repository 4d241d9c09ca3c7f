//! Fluent construction of workflow graphs.
//!
//! Validation happens in two phases: argument-level checks are recorded as
//! each call is made (empty ids, duplicate registrations), and structural
//! checks run in [`GraphBuilder::build`]. A failed build aggregates every
//! collected error into one [`GraphError`] report, so a partial graph never
//! reaches the executor.

use std::sync::Arc;

use miette::Diagnostic;
use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;

use super::definition::GraphDefinition;
use super::edge::{Edge, EdgeGuard};
use crate::node::Node;
use crate::state::WorkflowState;
use crate::utils::id_generator::IdGenerator;

/// Graph construction failure carrying every collected violation.
#[derive(Debug, Error, Diagnostic)]
pub enum GraphError {
    #[error("graph '{name}' failed validation: {}", .errors.join("; "))]
    #[diagnostic(
        code(filament::graph::invalid),
        help("Fix every listed violation; none are ignored at build time.")
    )]
    Invalid { name: String, errors: Vec<String> },
}

impl GraphError {
    /// The individual violation messages.
    #[must_use]
    pub fn errors(&self) -> &[String] {
        match self {
            GraphError::Invalid { errors, .. } => errors,
        }
    }
}

/// Builder for [`GraphDefinition`] with fork/join sugar.
///
/// # Examples
///
/// ```rust
/// use filament::graph::GraphBuilder;
/// use filament::node::PassthroughNode;
///
/// let graph = GraphBuilder::new("triage")
///     .add_node(PassthroughNode::new("intake"))
///     .add_node(PassthroughNode::new("classify"))
///     .add_node(PassthroughNode::new("archive"))
///     .add_edge("intake", "classify")
///     .add_edge("classify", "archive")
///     .build()
///     .unwrap();
///
/// assert_eq!(graph.entry_node_id(), "intake");
/// assert_eq!(graph.exit_node_ids(), ["archive".to_string()]);
/// ```
pub struct GraphBuilder {
    name: String,
    nodes: FxHashMap<String, Arc<dyn Node>>,
    node_order: Vec<String>,
    edges: Vec<Edge>,
    entry_node_id: Option<String>,
    exit_node_ids: Option<Vec<String>>,
    errors: Vec<String>,
}

impl GraphBuilder {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: FxHashMap::default(),
            node_order: Vec::new(),
            edges: Vec::new(),
            entry_node_id: None,
            exit_node_ids: None,
            errors: Vec::new(),
        }
    }

    /// Registers a node under its own id.
    ///
    /// An empty id or a duplicate registration is recorded as an error and
    /// surfaced at build time.
    #[must_use]
    pub fn add_node(self, node: impl Node + 'static) -> Self {
        self.add_arc_node(Arc::new(node))
    }

    /// Registers an already-shared node.
    #[must_use]
    pub fn add_arc_node(mut self, node: Arc<dyn Node>) -> Self {
        let id = node.id().to_string();
        if id.is_empty() {
            self.errors.push("node with empty id rejected".to_string());
            return self;
        }
        if self.nodes.contains_key(&id) {
            self.errors.push(format!("duplicate node id '{id}'"));
            return self;
        }
        self.node_order.push(id.clone());
        self.nodes.insert(id, node);
        self
    }

    /// Adds an unconditional edge.
    #[must_use]
    pub fn add_edge(self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.connect(Edge::new(source, target))
    }

    /// Adds an edge taken only when `predicate` holds on the current state.
    #[must_use]
    pub fn add_edge_when<F>(
        self,
        source: impl Into<String>,
        target: impl Into<String>,
        predicate: F,
    ) -> Self
    where
        F: Fn(&WorkflowState) -> bool + Send + Sync + 'static,
    {
        self.connect(Edge::when(source, target, predicate))
    }

    /// Adds a fully specified edge (label, guard).
    #[must_use]
    pub fn connect(mut self, edge: Edge) -> Self {
        if edge.source.is_empty() || edge.target.is_empty() {
            self.errors
                .push("edge with empty endpoint rejected".to_string());
            return self;
        }
        self.edges.push(edge);
        self
    }

    /// Fans out from `source` to every target, one unconditional edge each,
    /// in the given order.
    #[must_use]
    pub fn fork<I, S>(mut self, source: &str, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for target in targets {
            self = self.connect(Edge::new(source, target));
        }
        self
    }

    /// Fans out from `source` with a guard per target, paired positionally.
    #[must_use]
    pub fn fork_guarded<I, S>(mut self, source: &str, branches: I) -> Self
    where
        I: IntoIterator<Item = (S, EdgeGuard)>,
        S: Into<String>,
    {
        for (target, guard) in branches {
            self = self.connect(Edge::new(source, target).with_guard(guard));
        }
        self
    }

    /// Fans out from `source` with an edge label per target, paired
    /// positionally.
    #[must_use]
    pub fn fork_labeled<I, S, L>(mut self, source: &str, branches: I) -> Self
    where
        I: IntoIterator<Item = (S, L)>,
        S: Into<String>,
        L: Into<String>,
    {
        for (target, label) in branches {
            self = self.connect(Edge::new(source, target).with_label(label));
        }
        self
    }

    /// Fans in to `target` from every source, one unconditional edge each.
    #[must_use]
    pub fn join<I, S>(mut self, target: &str, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for source in sources {
            self = self.connect(Edge::new(source, target));
        }
        self
    }

    /// Overrides the entry node. Defaults to the first registered node.
    #[must_use]
    pub fn with_entry(mut self, entry: impl Into<String>) -> Self {
        self.entry_node_id = Some(entry.into());
        self
    }

    /// Overrides the exit set. Defaults to the nodes with no outgoing edges.
    #[must_use]
    pub fn with_exits<I, S>(mut self, exits: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exit_node_ids = Some(exits.into_iter().map(Into::into).collect());
        self
    }

    /// Resolves defaults, runs structural validation, and returns either
    /// the definition or every collected error at once.
    pub fn build(self) -> Result<GraphDefinition, GraphError> {
        let entry = self
            .entry_node_id
            .or_else(|| self.node_order.first().cloned())
            .unwrap_or_default();

        let exits = match self.exit_node_ids {
            Some(explicit) => {
                // Set semantics with stable order.
                let mut seen = FxHashSet::default();
                explicit
                    .into_iter()
                    .filter(|id| seen.insert(id.clone()))
                    .collect()
            }
            None => {
                // Never-guarded edges are structurally dead; a node whose
                // only outgoing edges can never fire is still an exit.
                let with_outgoing: FxHashSet<&str> = self
                    .edges
                    .iter()
                    .filter(|e| !e.guard.is_never())
                    .map(|e| e.source.as_str())
                    .collect();
                self.node_order
                    .iter()
                    .filter(|id| !with_outgoing.contains(id.as_str()))
                    .cloned()
                    .collect()
            }
        };

        let graph = GraphDefinition::from_parts(
            IdGenerator::new().graph_id(),
            self.name.clone(),
            self.nodes,
            self.node_order,
            self.edges,
            entry,
            exits,
        );

        let mut errors = self.errors;
        errors.extend(graph.validate().iter().cloned());
        if errors.is_empty() {
            Ok(graph)
        } else {
            Err(GraphError::Invalid {
                name: self.name,
                errors,
            })
        }
    }
}
