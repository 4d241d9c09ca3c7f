//! Execution requests and tunable executor options.

use std::sync::Arc;
use std::time::Duration;

use super::breaker::CircuitBreakerRegistry;
use super::retry::RetryPolicy;
use crate::graph::GraphDefinition;
use crate::state::WorkflowState;
use crate::utils::id_generator::IdGenerator;

/// Tunables governing one execution.
///
/// Defaults: 4 concurrent nodes, 30 s per node, 120 s for LLM-tagged nodes,
/// stop on first error, no retries, no circuit breakers.
#[derive(Clone, Debug)]
pub struct ExecutorOptions {
    /// Ceiling on concurrently running node bodies.
    pub max_concurrency: usize,
    /// Per-node deadline.
    pub node_timeout: Duration,
    /// Deadline for nodes advertising themselves as LLM-bearing.
    pub llm_node_timeout: Duration,
    /// When `true`, a node failure does not cancel the rest of the run.
    pub continue_on_error: bool,
    /// Optional retry policy for transient node failures.
    pub retry: Option<RetryPolicy>,
    /// Optional circuit-breaker registry consulted by breaker-tagged nodes.
    pub breakers: Option<Arc<CircuitBreakerRegistry>>,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            node_timeout: Duration::from_secs(30),
            llm_node_timeout: Duration::from_secs(120),
            continue_on_error: false,
            retry: None,
            breakers: None,
        }
    }
}

impl ExecutorOptions {
    #[must_use]
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    #[must_use]
    pub fn with_node_timeout(mut self, node_timeout: Duration) -> Self {
        self.node_timeout = node_timeout;
        self
    }

    #[must_use]
    pub fn with_llm_node_timeout(mut self, llm_node_timeout: Duration) -> Self {
        self.llm_node_timeout = llm_node_timeout;
        self
    }

    #[must_use]
    pub fn with_continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    #[must_use]
    pub fn with_breakers(mut self, breakers: Arc<CircuitBreakerRegistry>) -> Self {
        self.breakers = Some(breakers);
        self
    }
}

/// Everything needed to run one graph once.
#[derive(Clone, Debug)]
pub struct ExecutionRequest {
    pub execution_id: String,
    pub workflow_id: String,
    pub thread_id: String,
    pub graph: Arc<GraphDefinition>,
    pub initial_state: WorkflowState,
    pub options: ExecutorOptions,
}

impl ExecutionRequest {
    /// Builds a request with a generated execution id; workflow and thread
    /// ids come from the initial state.
    #[must_use]
    pub fn new(graph: Arc<GraphDefinition>, initial_state: WorkflowState) -> Self {
        Self {
            execution_id: IdGenerator::new().execution_id(),
            workflow_id: initial_state.workflow_id.clone(),
            thread_id: initial_state.thread_id.clone(),
            graph,
            initial_state,
            options: ExecutorOptions::default(),
        }
    }

    #[must_use]
    pub fn with_execution_id(mut self, execution_id: impl Into<String>) -> Self {
        self.execution_id = execution_id.into();
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: ExecutorOptions) -> Self {
        self.options = options;
        self
    }
}
