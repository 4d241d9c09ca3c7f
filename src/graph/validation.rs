//! Structural validation rules for graph definitions.
//!
//! All violations are collected into one report; nothing short-circuits.
//! Cycle detection runs on the graph with `Never`-guarded edges elided:
//! a back edge that can statically never fire does not make the graph
//! cyclic from the scheduler's perspective. Ordinary predicates are treated
//! as potentially true.

use rustc_hash::{FxHashMap, FxHashSet};

use super::definition::GraphDefinition;

pub(super) fn validate_graph(graph: &GraphDefinition) -> Vec<String> {
    let mut errors = Vec::new();

    if graph.node_count() == 0 {
        errors.push("graph has no nodes".to_string());
    }

    if graph.node_count() > 0 && !graph.contains_node(graph.entry_node_id()) {
        errors.push(format!(
            "entry node '{}' is not in the node map",
            graph.entry_node_id()
        ));
    }

    for exit in graph.exit_node_ids() {
        if !graph.contains_node(exit) {
            errors.push(format!("exit node '{exit}' is not in the node map"));
        }
    }

    for edge in graph.edges() {
        if !graph.contains_node(&edge.source) {
            errors.push(format!(
                "edge '{}' -> '{}' references unknown source node",
                edge.source, edge.target
            ));
        }
        if !graph.contains_node(&edge.target) {
            errors.push(format!(
                "edge '{}' -> '{}' references unknown target node",
                edge.source, edge.target
            ));
        }
    }

    if graph.contains_node(graph.entry_node_id()) {
        let reachable = graph.reachable(graph.entry_node_id());
        for node_id in graph.node_ids() {
            if !reachable.contains(node_id) {
                errors.push(format!(
                    "node '{node_id}' is not reachable from entry '{}'",
                    graph.entry_node_id()
                ));
            }
        }
    }

    errors.extend(find_cycles(graph));
    errors
}

/// DFS cycle detection with an explicit recursion stack.
///
/// Each discovered cycle is reported once, with the back-edge path spelled
/// out (`a -> b -> c -> a`).
fn find_cycles(graph: &GraphDefinition) -> Vec<String> {
    // Adjacency with Never-guarded edges removed.
    let mut adjacency: FxHashMap<&str, Vec<&str>> = FxHashMap::default();
    for edge in graph.edges() {
        if edge.guard.is_never() {
            continue;
        }
        if graph.contains_node(&edge.source) && graph.contains_node(&edge.target) {
            adjacency
                .entry(edge.source.as_str())
                .or_default()
                .push(edge.target.as_str());
        }
    }

    let mut errors = Vec::new();
    let mut visited: FxHashSet<&str> = FxHashSet::default();
    let mut on_stack: FxHashSet<&str> = FxHashSet::default();
    let mut stack: Vec<&str> = Vec::new();

    for start in graph.node_ids() {
        if !visited.contains(start.as_str()) {
            dfs(
                start.as_str(),
                &adjacency,
                &mut visited,
                &mut on_stack,
                &mut stack,
                &mut errors,
            );
        }
    }
    errors
}

fn dfs<'a>(
    node: &'a str,
    adjacency: &FxHashMap<&'a str, Vec<&'a str>>,
    visited: &mut FxHashSet<&'a str>,
    on_stack: &mut FxHashSet<&'a str>,
    stack: &mut Vec<&'a str>,
    errors: &mut Vec<String>,
) {
    visited.insert(node);
    on_stack.insert(node);
    stack.push(node);

    if let Some(targets) = adjacency.get(node) {
        for &target in targets {
            if on_stack.contains(target) {
                // Back edge: report the path from the first occurrence of
                // `target` on the stack, closed by the back edge itself.
                let from = stack.iter().position(|&n| n == target).unwrap_or(0);
                let mut path: Vec<&str> = stack[from..].to_vec();
                path.push(target);
                errors.push(format!("cycle detected: {}", path.join(" -> ")));
            } else if !visited.contains(target) {
                dfs(target, adjacency, visited, on_stack, stack, errors);
            }
        }
    }

    stack.pop();
    on_stack.remove(node);
}
