//! Immutable workflow state for the Filament execution engine.
//!
//! [`WorkflowState`] is the central snapshot type: every mutator returns a
//! fresh value with a fresh snapshot id, leaving the original untouched.
//! Nodes receive a snapshot, compute, and hand back a derived snapshot; the
//! executor owns the "current" state and is the only writer.
//!
//! # Examples
//!
//! ```rust
//! use filament::state::{WorkflowState, WorkflowStatus};
//! use serde_json::json;
//!
//! let initial = WorkflowState::new("wf-orders", "thread-1");
//! let routed = initial.with_data("route", json!("express"));
//!
//! // The original is untouched; the derived snapshot has its own id.
//! assert!(initial.data.is_empty());
//! assert_eq!(routed.data.get("route"), Some(&json!("express")));
//! assert_ne!(initial.id, routed.id);
//! assert_eq!(routed.status, WorkflowStatus::Running);
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::message::Message;
use crate::utils::id_generator::IdGenerator;

/// Terminal and non-terminal lifecycle states of a workflow execution.
///
/// Serialized as the variant name (`"Running"`, `"Completed"`, ...).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkflowStatus {
    /// Execution in progress; the state may still be replaced.
    Running,
    /// Every exit node completed.
    Completed,
    /// At least one exit node did not complete.
    Failed,
    /// Cooperative cancellation ended the run before the exits completed.
    Cancelled,
}

impl WorkflowStatus {
    /// Returns `true` for `Completed`, `Failed`, and `Cancelled`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, WorkflowStatus::Running)
    }
}

/// Immutable snapshot of a workflow at a specific step.
///
/// Field order is part of the canonical serialized form used for hashing
/// (see [`crate::events::hashing`]); `data` uses a `BTreeMap` so map keys
/// serialize in sorted order.
///
/// Invariants upheld by the engine:
/// - once `status` is terminal the snapshot is never replaced again;
/// - `error` is only set alongside `Failed` or `Cancelled`;
/// - `step` is non-decreasing across the snapshots of one execution.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowState {
    /// Unique per snapshot; every mutator assigns a fresh one.
    pub id: String,
    /// Logical workflow this snapshot belongs to.
    pub workflow_id: String,
    /// Conversation scope grouping executions that share message history.
    pub thread_id: String,
    /// Incremented on each successful node exit.
    pub step: u64,
    /// Arbitrary keyed values; keys unique, insertion order irrelevant.
    pub data: BTreeMap<String, Value>,
    /// Append-only conversation history; order is semantic.
    pub messages: Vec<Message>,
    /// Node most recently entered, if any.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub current_node_id: Option<String>,
    pub status: WorkflowStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Short failure reason; set only with a terminal failure status.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

impl WorkflowState {
    /// Creates a fresh `Running` snapshot at step 0 with empty data and
    /// message channels.
    #[must_use]
    pub fn new(workflow_id: impl Into<String>, thread_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: IdGenerator::new().state_id(),
            workflow_id: workflow_id.into(),
            thread_id: thread_id.into(),
            step: 0,
            data: BTreeMap::new(),
            messages: Vec::new(),
            current_node_id: None,
            status: WorkflowStatus::Running,
            created_at: now,
            updated_at: now,
            error: None,
        }
    }

    /// Creates a builder for assembling an initial state with data and
    /// messages in one expression.
    ///
    /// ```rust
    /// use filament::state::WorkflowState;
    /// use serde_json::json;
    ///
    /// let state = WorkflowState::builder("wf-demo")
    ///     .thread("thread-7")
    ///     .user_message("summarize the incident")
    ///     .data("priority", json!("high"))
    ///     .build();
    ///
    /// assert_eq!(state.messages.len(), 1);
    /// assert_eq!(state.data.len(), 1);
    /// ```
    #[must_use]
    pub fn builder(workflow_id: impl Into<String>) -> WorkflowStateBuilder {
        WorkflowStateBuilder::new(workflow_id)
    }

    fn derive(&self) -> Self {
        let mut next = self.clone();
        next.id = IdGenerator::new().state_id();
        next.updated_at = Utc::now();
        next
    }

    /// Returns a new snapshot with `key` set to `value`.
    #[must_use]
    pub fn with_data(&self, key: impl Into<String>, value: Value) -> Self {
        let mut next = self.derive();
        next.data.insert(key.into(), value);
        next
    }

    /// Returns a new snapshot with `message` appended.
    #[must_use]
    pub fn with_message(&self, message: Message) -> Self {
        let mut next = self.derive();
        next.messages.push(message);
        next
    }

    /// Returns a new snapshot at the given step.
    #[must_use]
    pub fn with_step(&self, step: u64) -> Self {
        let mut next = self.derive();
        next.step = step;
        next
    }

    /// Returns a new snapshot recording the node most recently entered.
    #[must_use]
    pub fn with_current_node(&self, node_id: impl Into<String>) -> Self {
        let mut next = self.derive();
        next.current_node_id = Some(node_id.into());
        next
    }

    /// Returns a new snapshot with the given status.
    #[must_use]
    pub fn with_status(&self, status: WorkflowStatus) -> Self {
        let mut next = self.derive();
        next.status = status;
        next
    }

    /// Returns a new snapshot carrying a short failure reason.
    #[must_use]
    pub fn with_error(&self, error: impl Into<String>) -> Self {
        let mut next = self.derive();
        next.error = Some(error.into());
        next
    }

    /// Convenience accessor for a data value.
    #[must_use]
    pub fn data_value(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Returns the most recent message, if any.
    #[must_use]
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }
}

/// Fluent builder for initial [`WorkflowState`] values.
#[derive(Debug)]
pub struct WorkflowStateBuilder {
    workflow_id: String,
    thread_id: Option<String>,
    data: BTreeMap<String, Value>,
    messages: Vec<Message>,
}

impl WorkflowStateBuilder {
    fn new(workflow_id: impl Into<String>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            thread_id: None,
            data: BTreeMap::new(),
            messages: Vec::new(),
        }
    }

    /// Sets the conversation thread id. Defaults to a generated id.
    #[must_use]
    pub fn thread(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }

    /// Adds a data entry to the initial state.
    #[must_use]
    pub fn data(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    /// Appends an initial user message.
    #[must_use]
    pub fn user_message(mut self, content: impl Into<String>) -> Self {
        self.messages.push(Message::user(content));
        self
    }

    /// Appends an initial system message.
    #[must_use]
    pub fn system_message(mut self, content: impl Into<String>) -> Self {
        self.messages.push(Message::system(content));
        self
    }

    /// Appends an arbitrary message.
    #[must_use]
    pub fn message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    /// Builds the initial `Running` snapshot at step 0.
    #[must_use]
    pub fn build(self) -> WorkflowState {
        let ids = IdGenerator::new();
        let thread_id = self.thread_id.unwrap_or_else(|| ids.thread_id());
        let mut state = WorkflowState::new(self.workflow_id, thread_id);
        state.data = self.data;
        state.messages = self.messages;
        state
    }
}
