//! JSON-patch-style diffs between two state snapshots.
//!
//! Only fields that changed appear in the diff. Paths cover the
//! caller-visible surface of the state: `/step`, `/status`,
//! `/currentNodeId`, `/data/<key>`, `/messages`, `/error`. An append-only
//! message change is emitted as a single `add` op carrying the appended
//! suffix; any other message change falls back to a full `replace`.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::state::WorkflowState;

/// Patch operation kind, serialized lowercase like JSON Patch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchKind {
    Add,
    Replace,
    Remove,
}

/// One `{op, path, value}` record of a state diff.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchOp {
    pub op: PatchKind,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub value: Option<Value>,
}

impl PatchOp {
    fn add(path: impl Into<String>, value: Value) -> Self {
        Self {
            op: PatchKind::Add,
            path: path.into(),
            value: Some(value),
        }
    }

    fn replace(path: impl Into<String>, value: Value) -> Self {
        Self {
            op: PatchKind::Replace,
            path: path.into(),
            value: Some(value),
        }
    }

    fn remove(path: impl Into<String>) -> Self {
        Self {
            op: PatchKind::Remove,
            path: path.into(),
            value: None,
        }
    }
}

fn diff_optional(ops: &mut Vec<PatchOp>, path: &str, before: Option<&str>, after: Option<&str>) {
    match (before, after) {
        (None, Some(value)) => ops.push(PatchOp::add(path, json!(value))),
        (Some(_), None) => ops.push(PatchOp::remove(path)),
        (Some(a), Some(b)) if a != b => ops.push(PatchOp::replace(path, json!(b))),
        _ => {}
    }
}

/// Computes the patch document turning `before` into `after`.
///
/// Snapshot bookkeeping fields (`id`, `updatedAt`) are not part of the diff.
pub fn diff_states(before: &WorkflowState, after: &WorkflowState) -> Vec<PatchOp> {
    let mut ops = Vec::new();

    if before.step != after.step {
        ops.push(PatchOp::replace("/step", json!(after.step)));
    }

    if before.status != after.status {
        let value = serde_json::to_value(after.status).unwrap_or(Value::Null);
        ops.push(PatchOp::replace("/status", value));
    }

    diff_optional(
        &mut ops,
        "/currentNodeId",
        before.current_node_id.as_deref(),
        after.current_node_id.as_deref(),
    );

    for (key, value) in &after.data {
        match before.data.get(key) {
            None => ops.push(PatchOp::add(format!("/data/{key}"), value.clone())),
            Some(prev) if prev != value => {
                ops.push(PatchOp::replace(format!("/data/{key}"), value.clone()));
            }
            _ => {}
        }
    }
    for key in before.data.keys() {
        if !after.data.contains_key(key) {
            ops.push(PatchOp::remove(format!("/data/{key}")));
        }
    }

    if before.messages != after.messages {
        let appended = after.messages.len() > before.messages.len()
            && after.messages[..before.messages.len()] == before.messages[..];
        if appended {
            let suffix = &after.messages[before.messages.len()..];
            let value = serde_json::to_value(suffix).unwrap_or(Value::Null);
            ops.push(PatchOp::add("/messages", value));
        } else {
            let value = serde_json::to_value(&after.messages).unwrap_or(Value::Null);
            ops.push(PatchOp::replace("/messages", value));
        }
    }

    diff_optional(
        &mut ops,
        "/error",
        before.error.as_deref(),
        after.error.as_deref(),
    );

    ops
}
