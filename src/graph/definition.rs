//! The validated, immutable graph the executor traverses.

use std::sync::{Arc, OnceLock};

use rustc_hash::{FxHashMap, FxHashSet};

use super::edge::Edge;
use super::validation;
use crate::node::Node;

/// A workflow graph: a node registry, an ordered edge list, one entry node,
/// and a set of exit nodes.
///
/// Definitions are produced by [`GraphBuilder`](super::GraphBuilder) and are
/// read-only afterwards. Validation results are computed once and cached.
pub struct GraphDefinition {
    id: String,
    name: String,
    nodes: FxHashMap<String, Arc<dyn Node>>,
    node_order: Vec<String>,
    edges: Vec<Edge>,
    entry_node_id: String,
    exit_node_ids: Vec<String>,
    validation: OnceLock<Vec<String>>,
}

impl GraphDefinition {
    pub(super) fn from_parts(
        id: String,
        name: String,
        nodes: FxHashMap<String, Arc<dyn Node>>,
        node_order: Vec<String>,
        edges: Vec<Edge>,
        entry_node_id: String,
        exit_node_ids: Vec<String>,
    ) -> Self {
        Self {
            id,
            name,
            nodes,
            node_order,
            edges,
            entry_node_id,
            exit_node_ids,
            validation: OnceLock::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Node ids in insertion order.
    #[must_use]
    pub fn node_ids(&self) -> &[String] {
        &self.node_order
    }

    /// Looks up a node implementation by id.
    #[must_use]
    pub fn node(&self, node_id: &str) -> Option<&Arc<dyn Node>> {
        self.nodes.get(node_id)
    }

    #[must_use]
    pub fn contains_node(&self, node_id: &str) -> bool {
        self.nodes.contains_key(node_id)
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.node_order.len()
    }

    /// All edges in insertion order.
    #[must_use]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    #[must_use]
    pub fn entry_node_id(&self) -> &str {
        &self.entry_node_id
    }

    /// Exit nodes in a stable order; the run completes when all of them have
    /// executed.
    #[must_use]
    pub fn exit_node_ids(&self) -> &[String] {
        &self.exit_node_ids
    }

    /// Outgoing edges of `node_id` in insertion order.
    pub fn outgoing<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.source == node_id)
    }

    /// Incoming edges of `node_id` in insertion order.
    pub fn incoming<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.target == node_id)
    }

    /// BFS closure of nodes reachable from `from`, ignoring guards.
    ///
    /// The start node itself is included.
    #[must_use]
    pub fn reachable(&self, from: &str) -> FxHashSet<String> {
        let mut visited: FxHashSet<String> = FxHashSet::default();
        if !self.nodes.contains_key(from) {
            return visited;
        }
        let mut queue = std::collections::VecDeque::from([from.to_string()]);
        visited.insert(from.to_string());
        while let Some(current) = queue.pop_front() {
            for edge in self.outgoing(&current) {
                if visited.insert(edge.target.clone()) {
                    queue.push_back(edge.target.clone());
                }
            }
        }
        visited
    }

    /// Runs structural validation, caching the result after the first call.
    ///
    /// Returns one message per violation; an empty slice means the graph is
    /// valid. All rules are checked, none short-circuit.
    pub fn validate(&self) -> &[String] {
        self.validation
            .get_or_init(|| validation::validate_graph(self))
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }
}

impl std::fmt::Debug for GraphDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphDefinition")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("nodes", &self.node_order)
            .field("edges", &self.edges.len())
            .field("entry", &self.entry_node_id)
            .field("exits", &self.exit_node_ids)
            .finish()
    }
}
