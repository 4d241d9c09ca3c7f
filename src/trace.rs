//! Introspection over an execution's ordered event log.
//!
//! A [`RunTrace`] wraps the events of one execution and answers analytical
//! questions after (or during) the run: which nodes ran, for how long, what
//! failed, and in what order. Traces are usually folded from a drained
//! [`EventStream`](crate::events::EventStream) via [`RunTrace::from_events`].

use chrono::{DateTime, Duration, Utc};
use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::events::{EventKind, StateEvent};

/// One paired `NodeEntered`/`NodeExited` span.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeExecution {
    pub node_id: String,
    pub entered_at: DateTime<Utc>,
    pub exited_at: DateTime<Utc>,
}

impl NodeExecution {
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.exited_at - self.entered_at
    }
}

/// Compact view of a `NodeError` event.
#[derive(Clone, Debug, PartialEq)]
pub struct TraceError {
    pub node_id: String,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

/// Aggregate statistics derived from a trace.
#[derive(Clone, Debug, Default)]
pub struct TraceStats {
    pub total_events: usize,
    pub error_count: usize,
    /// Completed executions per node id.
    pub executions_per_node: FxHashMap<String, usize>,
    pub average_duration: Option<Duration>,
    pub longest: Option<NodeExecution>,
    pub shortest: Option<NodeExecution>,
    /// Node ids in the order they were entered.
    pub execution_path: Vec<String>,
}

/// The ordered event log of one execution, with analytical queries.
#[derive(Clone, Debug)]
pub struct RunTrace {
    pub execution_id: String,
    pub workflow_id: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub events: Vec<StateEvent>,
    pub metadata: FxHashMap<String, Value>,
}

impl RunTrace {
    /// An empty trace opened now.
    #[must_use]
    pub fn new(execution_id: impl Into<String>, workflow_id: impl Into<String>) -> Self {
        Self {
            execution_id: execution_id.into(),
            workflow_id: workflow_id.into(),
            started_at: Utc::now(),
            completed_at: None,
            events: Vec::new(),
            metadata: FxHashMap::default(),
        }
    }

    /// Folds a drained event sequence into a trace.
    ///
    /// Returns `None` for an empty sequence. Identity and timing come from
    /// the first event; `completed_at` from the terminal event if present.
    #[must_use]
    pub fn from_events(events: Vec<StateEvent>) -> Option<Self> {
        let first = events.first()?;
        let mut trace = Self {
            execution_id: first.execution_id().to_string(),
            workflow_id: first.state().workflow_id.clone(),
            started_at: first.timestamp(),
            completed_at: None,
            events: Vec::new(),
            metadata: FxHashMap::default(),
        };
        for event in events {
            trace.push(event);
        }
        Some(trace)
    }

    /// Appends an event, closing the trace if it is terminal.
    pub fn push(&mut self, event: StateEvent) {
        if event.is_terminal() {
            self.completed_at = Some(event.timestamp());
        }
        self.events.push(event);
    }

    /// Elapsed time: to the terminal event if present, else to now.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.completed_at.unwrap_or_else(Utc::now) - self.started_at
    }

    /// Whether a `WorkflowCompleted` event is present.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.events
            .iter()
            .any(|e| e.kind() == EventKind::WorkflowCompleted)
    }

    /// Pairs each `NodeEntered` with the next `NodeExited` on the same node
    /// id; entries without a matching exit are discarded.
    #[must_use]
    pub fn node_executions(&self) -> Vec<NodeExecution> {
        let mut executions = Vec::new();
        for (i, event) in self.events.iter().enumerate() {
            let StateEvent::NodeEntered(body) = event else {
                continue;
            };
            let Some(node_id) = body.node_id.as_deref() else {
                continue;
            };
            let exit = self.events[i + 1..].iter().find(|candidate| {
                candidate.kind() == EventKind::NodeExited && candidate.node_id() == Some(node_id)
            });
            if let Some(exit) = exit {
                executions.push(NodeExecution {
                    node_id: node_id.to_string(),
                    entered_at: body.timestamp,
                    exited_at: exit.timestamp(),
                });
            }
        }
        executions
    }

    /// All `NodeError` records in a compact view.
    #[must_use]
    pub fn errors(&self) -> Vec<TraceError> {
        self.events
            .iter()
            .filter_map(|event| match event {
                StateEvent::NodeError { body, error, .. } => Some(TraceError {
                    node_id: body.node_id.clone().unwrap_or_default(),
                    error: error.clone(),
                    timestamp: body.timestamp,
                }),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.events.iter().any(StateEvent::is_error)
    }

    /// Completed without any error events.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.is_completed() && !self.has_errors()
    }

    /// Events touching the given node.
    #[must_use]
    pub fn events_for_node(&self, node_id: &str) -> Vec<&StateEvent> {
        self.events
            .iter()
            .filter(|e| e.node_id() == Some(node_id))
            .collect()
    }

    /// Events of one kind.
    #[must_use]
    pub fn events_of_kind(&self, kind: EventKind) -> Vec<&StateEvent> {
        self.events.iter().filter(|e| e.kind() == kind).collect()
    }

    /// Events within `[from, to]`, inclusive.
    #[must_use]
    pub fn events_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Vec<&StateEvent> {
        self.events
            .iter()
            .filter(|e| e.timestamp() >= from && e.timestamp() <= to)
            .collect()
    }

    /// Derives aggregate statistics over the whole trace.
    #[must_use]
    pub fn analyze(&self) -> TraceStats {
        let executions = self.node_executions();

        let mut executions_per_node: FxHashMap<String, usize> = FxHashMap::default();
        for execution in &executions {
            *executions_per_node
                .entry(execution.node_id.clone())
                .or_insert(0) += 1;
        }

        let average_duration = if executions.is_empty() {
            None
        } else {
            let total_ms: i64 = executions
                .iter()
                .map(|e| e.duration().num_milliseconds())
                .sum();
            Some(Duration::milliseconds(total_ms / executions.len() as i64))
        };

        let longest = executions
            .iter()
            .max_by_key(|e| e.duration())
            .cloned();
        let shortest = executions
            .iter()
            .min_by_key(|e| e.duration())
            .cloned();

        let execution_path = self
            .events
            .iter()
            .filter(|e| e.kind() == EventKind::NodeEntered)
            .filter_map(|e| e.node_id().map(str::to_string))
            .collect();

        TraceStats {
            total_events: self.events.len(),
            error_count: self.errors().len(),
            executions_per_node,
            average_duration,
            longest,
            shortest,
            execution_path,
        }
    }
}
