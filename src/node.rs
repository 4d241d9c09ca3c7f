//! The node contract: the executable unit a workflow graph is made of.
//!
//! A [`Node`] receives the current [`WorkflowState`] snapshot and a
//! cancellation token, performs its work, and returns a [`NodeResult`]. Hard
//! failures are returned as `Err(NodeError)`; soft failures as a
//! [`NodeOutcome::Failure`] result. Both surface as `NodeError` events on the
//! execution's stream.
//!
//! # Examples
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use filament::node::{Node, NodeError, NodeResult};
//! use filament::state::WorkflowState;
//! use tokio_util::sync::CancellationToken;
//!
//! struct Uppercase;
//!
//! #[async_trait]
//! impl Node for Uppercase {
//!     fn id(&self) -> &str {
//!         "uppercase"
//!     }
//!
//!     async fn execute(
//!         &self,
//!         state: WorkflowState,
//!         _cancel: CancellationToken,
//!     ) -> Result<NodeResult, NodeError> {
//!         let text = state
//!             .data_value("text")
//!             .and_then(|v| v.as_str())
//!             .ok_or(NodeError::MissingInput { what: "text" })?;
//!         let out = state.with_data("text", serde_json::json!(text.to_uppercase()));
//!         Ok(NodeResult::success(self.id(), out))
//!     }
//! }
//! ```

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::state::WorkflowState;

/// Fatal errors a node can raise during execution.
///
/// The executor reports every variant as a `NodeError` event. Variants that
/// classify as transient (see [`NodeError::is_transient`]) are eligible for
/// retry when a retry policy is configured.
#[derive(Debug, Error, Diagnostic)]
pub enum NodeError {
    /// Expected input data is missing from the state snapshot.
    #[error("missing expected input: {what}")]
    #[diagnostic(
        code(filament::node::missing_input),
        help("Check that an upstream node produced the required data key.")
    )]
    MissingInput { what: &'static str },

    /// External provider or service error.
    #[error("provider error ({provider}): {message}")]
    #[diagnostic(code(filament::node::provider))]
    Provider {
        provider: &'static str,
        message: String,
    },

    /// The node body exceeded its timeout budget.
    #[error("node '{node_id}' timed out after {elapsed_ms} ms")]
    #[diagnostic(
        code(filament::node::timeout),
        help("Raise the node timeout or tag the node as LLM-bearing for the longer budget.")
    )]
    Timeout { node_id: String, elapsed_ms: u64 },

    /// Cooperative cancellation reached the node before it finished.
    #[error("node '{node_id}' was cancelled")]
    #[diagnostic(code(filament::node::cancelled))]
    Cancelled { node_id: String },

    /// The node's circuit breaker is open; the body was not invoked.
    #[error("circuit breaker open for tag '{tag}'")]
    #[diagnostic(
        code(filament::node::circuit_open),
        help("The breaker re-probes after its recovery timeout elapses.")
    )]
    CircuitOpen { tag: String },

    /// I/O failure inside the node body.
    #[error(transparent)]
    #[diagnostic(code(filament::node::io))]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failure.
    #[error(transparent)]
    #[diagnostic(code(filament::node::serde_json))]
    Serde(#[from] serde_json::Error),

    /// Input validation failed.
    #[error("validation failed: {0}")]
    #[diagnostic(code(filament::node::validation))]
    ValidationFailed(String),

    /// Anything else.
    #[error("{0}")]
    #[diagnostic(code(filament::node::other))]
    Other(String),
}

impl NodeError {
    /// Whether this error is worth retrying: timeouts, I/O failures, and
    /// messages that look like transient network conditions.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            NodeError::Timeout { .. } | NodeError::Io(_) => true,
            NodeError::Provider { message, .. } | NodeError::Other(message) => {
                let lower = message.to_ascii_lowercase();
                lower.contains("timed out")
                    || lower.contains("timeout")
                    || lower.contains("connection reset")
                    || lower.contains("connection refused")
                    || lower.contains("temporarily unavailable")
            }
            _ => false,
        }
    }
}

/// How a node run ended, tagged by `outcome` in serialized form.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all_fields = "camelCase")]
pub enum NodeOutcome {
    /// The node produced a derived state for the executor to commit.
    Success { output_state: WorkflowState },
    /// The node failed softly; `error` optionally carries detail.
    Failure {
        reason: String,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        error: Option<String>,
    },
    /// The node declined to run.
    Skipped { reason: String },
}

/// The result of one node invocation.
///
/// The `execution_id` is stamped by the executor when the result is
/// collected; node code leaves it empty.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeResult {
    pub node_id: String,
    pub execution_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub outcome: NodeOutcome,
}

impl NodeResult {
    /// A successful result carrying the derived output state.
    #[must_use]
    pub fn success(node_id: impl Into<String>, output_state: WorkflowState) -> Self {
        Self {
            node_id: node_id.into(),
            execution_id: String::new(),
            timestamp: Utc::now(),
            outcome: NodeOutcome::Success { output_state },
        }
    }

    /// A soft failure with a short reason.
    #[must_use]
    pub fn failure(node_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            execution_id: String::new(),
            timestamp: Utc::now(),
            outcome: NodeOutcome::Failure {
                reason: reason.into(),
                error: None,
            },
        }
    }

    /// A soft failure carrying extra error detail.
    #[must_use]
    pub fn failure_with_detail(
        node_id: impl Into<String>,
        reason: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            execution_id: String::new(),
            timestamp: Utc::now(),
            outcome: NodeOutcome::Failure {
                reason: reason.into(),
                error: Some(error.into()),
            },
        }
    }

    /// A declined run.
    #[must_use]
    pub fn skipped(node_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            execution_id: String::new(),
            timestamp: Utc::now(),
            outcome: NodeOutcome::Skipped {
                reason: reason.into(),
            },
        }
    }

    /// Returns a copy stamped with the owning execution's id.
    #[must_use]
    pub(crate) fn stamped(mut self, execution_id: &str) -> Self {
        self.execution_id = execution_id.to_string();
        self
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, NodeOutcome::Success { .. })
    }

    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, NodeOutcome::Failure { .. })
    }

    /// The derived state on success, `None` otherwise.
    #[must_use]
    pub fn output_state(&self) -> Option<&WorkflowState> {
        match &self.outcome {
            NodeOutcome::Success { output_state } => Some(output_state),
            _ => None,
        }
    }
}

/// An executable vertex of a workflow graph.
///
/// Implementations should be stateless and cheap to share; the executor holds
/// them behind `Arc` and may invoke the same node across retries and runs.
/// `input_keys`/`output_keys` are advisory documentation of the data keys a
/// node reads and writes; the executor does not enforce them.
#[async_trait]
pub trait Node: Send + Sync {
    /// Unique identifier of this node within its graph.
    fn id(&self) -> &str;

    /// Human-readable name; defaults to the id.
    fn name(&self) -> &str {
        self.id()
    }

    /// Runs the node against the given snapshot.
    ///
    /// Implementations must respect `cancel` across their own await points
    /// and must not swallow it.
    async fn execute(
        &self,
        state: WorkflowState,
        cancel: CancellationToken,
    ) -> Result<NodeResult, NodeError>;

    /// Data keys this node reads. Advisory.
    fn input_keys(&self) -> Vec<String> {
        Vec::new()
    }

    /// Data keys this node writes. Advisory.
    fn output_keys(&self) -> Vec<String> {
        Vec::new()
    }

    /// Whether this node fronts an LLM call; such nodes get the longer
    /// `llm_node_timeout` budget.
    fn is_llm(&self) -> bool {
        false
    }

    /// Tag keying this node into the circuit-breaker registry, if any.
    fn breaker_tag(&self) -> Option<&str> {
        None
    }
}

/// Identity node: succeeds with the input state unchanged.
///
/// Useful as a join point, a placeholder stage, or a test fixture.
#[derive(Clone, Debug)]
pub struct PassthroughNode {
    id: String,
}

impl PassthroughNode {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

#[async_trait]
impl Node for PassthroughNode {
    fn id(&self) -> &str {
        &self.id
    }

    async fn execute(
        &self,
        state: WorkflowState,
        _cancel: CancellationToken,
    ) -> Result<NodeResult, NodeError> {
        Ok(NodeResult::success(&self.id, state))
    }
}

type FnNodeBody =
    dyn Fn(WorkflowState) -> BoxFuture<'static, Result<NodeResult, NodeError>> + Send + Sync;

/// Closure-backed node for ad-hoc stages and tests.
///
/// The closure does not receive the cancellation token; bodies that need
/// cooperative cancellation should implement [`Node`] directly.
pub struct FnNode {
    id: String,
    name: String,
    body: Arc<FnNodeBody>,
}

impl FnNode {
    pub fn new<F, Fut>(id: impl Into<String>, body: F) -> Self
    where
        F: Fn(WorkflowState) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<NodeResult, NodeError>> + Send + 'static,
    {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            body: Arc::new(move |state| Box::pin(body(state))),
        }
    }

    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl std::fmt::Debug for FnNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnNode").field("id", &self.id).finish()
    }
}

#[async_trait]
impl Node for FnNode {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(
        &self,
        state: WorkflowState,
        _cancel: CancellationToken,
    ) -> Result<NodeResult, NodeError> {
        (self.body)(state).await
    }
}
