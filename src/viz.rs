//! Textual graph export: Graphviz DOT and Mermaid.
//!
//! Both emitters escape embedded quotes and line breaks and deduplicate
//! identical edges, so generated documents stay syntactically valid whatever
//! the node names contain.

use rustc_hash::FxHashSet;

use crate::graph::GraphDefinition;

fn dot_escape(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "")
}

fn mermaid_escape(text: &str) -> String {
    text.replace('"', "#quot;").replace(['\n', '\r'], " ")
}

/// Mermaid identifiers allow fewer characters than node ids do.
fn mermaid_id(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Renders the graph as a `digraph` document, left-to-right, box-shaped
/// nodes labelled by node name, with rank hints for the entry and exits.
#[must_use]
pub fn to_dot(graph: &GraphDefinition) -> String {
    let mut out = String::new();
    out.push_str(&format!("digraph \"{}\" {{\n", dot_escape(graph.name())));
    out.push_str("    rankdir=LR;\n");
    out.push_str("    node [shape=box];\n");

    for node_id in graph.node_ids() {
        let label = graph
            .node(node_id)
            .map(|n| n.name().to_string())
            .unwrap_or_else(|| node_id.clone());
        out.push_str(&format!(
            "    \"{}\" [label=\"{}\"];\n",
            dot_escape(node_id),
            dot_escape(&label)
        ));
    }

    out.push_str(&format!(
        "    {{ rank=source; \"{}\"; }}\n",
        dot_escape(graph.entry_node_id())
    ));
    if !graph.exit_node_ids().is_empty() {
        out.push_str("    { rank=sink;");
        for exit in graph.exit_node_ids() {
            out.push_str(&format!(" \"{}\";", dot_escape(exit)));
        }
        out.push_str(" }\n");
    }

    let mut emitted: FxHashSet<(String, String, Option<String>)> = FxHashSet::default();
    for edge in graph.edges() {
        let key = (edge.source.clone(), edge.target.clone(), edge.label.clone());
        if !emitted.insert(key) {
            continue;
        }
        match &edge.label {
            Some(label) => out.push_str(&format!(
                "    \"{}\" -> \"{}\" [label=\"{}\"];\n",
                dot_escape(&edge.source),
                dot_escape(&edge.target),
                dot_escape(label)
            )),
            None => out.push_str(&format!(
                "    \"{}\" -> \"{}\";\n",
                dot_escape(&edge.source),
                dot_escape(&edge.target)
            )),
        }
    }

    out.push_str("}\n");
    out
}

/// Renders the graph as a `flowchart TD` document with `id("label")` nodes
/// and `src -->|label| tgt` edges.
#[must_use]
pub fn to_mermaid(graph: &GraphDefinition) -> String {
    let mut out = String::from("flowchart TD\n");

    for node_id in graph.node_ids() {
        let label = graph
            .node(node_id)
            .map(|n| n.name().to_string())
            .unwrap_or_else(|| node_id.clone());
        out.push_str(&format!(
            "    {}(\"{}\")\n",
            mermaid_id(node_id),
            mermaid_escape(&label)
        ));
    }

    let mut emitted: FxHashSet<(String, String, Option<String>)> = FxHashSet::default();
    for edge in graph.edges() {
        let key = (edge.source.clone(), edge.target.clone(), edge.label.clone());
        if !emitted.insert(key) {
            continue;
        }
        match &edge.label {
            Some(label) => out.push_str(&format!(
                "    {} -->|{}| {}\n",
                mermaid_id(&edge.source),
                mermaid_escape(label),
                mermaid_id(&edge.target)
            )),
            None => out.push_str(&format!(
                "    {} --> {}\n",
                mermaid_id(&edge.source),
                mermaid_id(&edge.target)
            )),
        }
    }

    out
}
