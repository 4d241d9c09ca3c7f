//! The state-transition event taxonomy.
//!
//! Serialized form is discriminated by an `eventType` field carrying the
//! variant name, with the common payload fields inlined alongside it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state::WorkflowState;
use crate::utils::id_generator::IdGenerator;

/// Discriminant of a [`StateEvent`], for filtering without matching payloads.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    NodeEntered,
    NodeExited,
    NodeError,
    WorkflowCompleted,
    WorkflowFailed,
}

/// Payload fields shared by every event variant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventBody {
    /// Opaque unique event id.
    pub id: String,
    pub execution_id: String,
    /// Absent on workflow-terminal events.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub node_id: Option<String>,
    /// State snapshot at the moment of the event.
    pub state: WorkflowState,
    pub timestamp: DateTime<Utc>,
    /// Hash of the previously emitted event; absent on the first event.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub previous_hash: Option<String>,
}

impl EventBody {
    fn new(
        execution_id: impl Into<String>,
        node_id: Option<String>,
        state: WorkflowState,
        previous_hash: Option<String>,
    ) -> Self {
        Self {
            id: IdGenerator::new().event_id(),
            execution_id: execution_id.into(),
            node_id,
            state,
            timestamp: Utc::now(),
            previous_hash,
        }
    }
}

/// One observability event per state transition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "eventType")]
pub enum StateEvent {
    /// A node began executing.
    NodeEntered(EventBody),
    /// A node finished successfully; the carried state is the committed one.
    NodeExited(EventBody),
    /// A node failed or threw.
    NodeError {
        #[serde(flatten)]
        body: EventBody,
        error: String,
        #[serde(rename = "stackTrace")]
        stack_trace: String,
    },
    /// Terminal: every exit node completed.
    WorkflowCompleted(EventBody),
    /// Terminal: the run did not complete all exit nodes.
    WorkflowFailed {
        #[serde(flatten)]
        body: EventBody,
        error: String,
    },
}

impl StateEvent {
    /// Factory for [`StateEvent::NodeEntered`] with a fresh id and timestamp.
    #[must_use]
    pub fn node_entered(
        execution_id: impl Into<String>,
        node_id: impl Into<String>,
        state: WorkflowState,
        previous_hash: Option<String>,
    ) -> Self {
        StateEvent::NodeEntered(EventBody::new(
            execution_id,
            Some(node_id.into()),
            state,
            previous_hash,
        ))
    }

    /// Factory for [`StateEvent::NodeExited`].
    #[must_use]
    pub fn node_exited(
        execution_id: impl Into<String>,
        node_id: impl Into<String>,
        state: WorkflowState,
        previous_hash: Option<String>,
    ) -> Self {
        StateEvent::NodeExited(EventBody::new(
            execution_id,
            Some(node_id.into()),
            state,
            previous_hash,
        ))
    }

    /// Factory for [`StateEvent::NodeError`].
    #[must_use]
    pub fn node_error(
        execution_id: impl Into<String>,
        node_id: impl Into<String>,
        state: WorkflowState,
        error: impl Into<String>,
        stack_trace: impl Into<String>,
        previous_hash: Option<String>,
    ) -> Self {
        StateEvent::NodeError {
            body: EventBody::new(execution_id, Some(node_id.into()), state, previous_hash),
            error: error.into(),
            stack_trace: stack_trace.into(),
        }
    }

    /// Factory for [`StateEvent::WorkflowCompleted`].
    #[must_use]
    pub fn workflow_completed(
        execution_id: impl Into<String>,
        state: WorkflowState,
        previous_hash: Option<String>,
    ) -> Self {
        StateEvent::WorkflowCompleted(EventBody::new(execution_id, None, state, previous_hash))
    }

    /// Factory for [`StateEvent::WorkflowFailed`].
    #[must_use]
    pub fn workflow_failed(
        execution_id: impl Into<String>,
        state: WorkflowState,
        error: impl Into<String>,
        previous_hash: Option<String>,
    ) -> Self {
        StateEvent::WorkflowFailed {
            body: EventBody::new(execution_id, None, state, previous_hash),
            error: error.into(),
        }
    }

    /// The shared payload of any variant.
    #[must_use]
    pub fn body(&self) -> &EventBody {
        match self {
            StateEvent::NodeEntered(body)
            | StateEvent::NodeExited(body)
            | StateEvent::WorkflowCompleted(body) => body,
            StateEvent::NodeError { body, .. } | StateEvent::WorkflowFailed { body, .. } => body,
        }
    }

    pub(crate) fn body_mut(&mut self) -> &mut EventBody {
        match self {
            StateEvent::NodeEntered(body)
            | StateEvent::NodeExited(body)
            | StateEvent::WorkflowCompleted(body) => body,
            StateEvent::NodeError { body, .. } | StateEvent::WorkflowFailed { body, .. } => body,
        }
    }

    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            StateEvent::NodeEntered(_) => EventKind::NodeEntered,
            StateEvent::NodeExited(_) => EventKind::NodeExited,
            StateEvent::NodeError { .. } => EventKind::NodeError,
            StateEvent::WorkflowCompleted(_) => EventKind::WorkflowCompleted,
            StateEvent::WorkflowFailed { .. } => EventKind::WorkflowFailed,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.body().id
    }

    #[must_use]
    pub fn execution_id(&self) -> &str {
        &self.body().execution_id
    }

    #[must_use]
    pub fn node_id(&self) -> Option<&str> {
        self.body().node_id.as_deref()
    }

    /// The state snapshot carried by this event.
    #[must_use]
    pub fn state(&self) -> &WorkflowState {
        &self.body().state
    }

    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.body().timestamp
    }

    #[must_use]
    pub fn previous_hash(&self) -> Option<&str> {
        self.body().previous_hash.as_deref()
    }

    /// Whether this is one of the two workflow-terminal variants.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StateEvent::WorkflowCompleted(_) | StateEvent::WorkflowFailed { .. }
        )
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            StateEvent::NodeError { .. } | StateEvent::WorkflowFailed { .. }
        )
    }

    /// The error text on `NodeError`/`WorkflowFailed`, `None` otherwise.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            StateEvent::NodeError { error, .. } | StateEvent::WorkflowFailed { error, .. } => {
                Some(error)
            }
            _ => None,
        }
    }
}
