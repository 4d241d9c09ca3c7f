//! The scheduling loop that drives a graph to completion.
//!
//! One spawned scheduler task owns the current state and the frontier; node
//! bodies run on their own tasks under the concurrency gate. Only the
//! scheduler commits successful outputs, so every commit's snapshot derives
//! from a well-defined predecessor even when node bodies overlap.
//!
//! Ordering guarantees upheld here:
//! - per node: `NodeEntered` strictly precedes `NodeExited`/`NodeError`;
//! - outgoing edges are evaluated only after the node's `NodeExited`;
//! - the terminal `WorkflowCompleted`/`WorkflowFailed` is the last event,
//!   and it goes out even when the state store fails mid-run.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use miette::Diagnostic;
use rustc_hash::FxHashSet;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use super::breaker::CircuitBreakerRegistry;
use super::options::{ExecutionRequest, ExecutorOptions};
use super::retry::RetryPolicy;
use crate::events::{EventEmitter, EventStream, StateEvent};
use crate::graph::GraphDefinition;
use crate::node::{Node, NodeError, NodeOutcome, NodeResult};
use crate::state::{WorkflowState, WorkflowStatus};
use crate::store::{StateStore, StoreError};

/// Executor-level failures. Node-level failures are reported as events, not
/// as `Err` values.
#[derive(Debug, Error, Diagnostic)]
pub enum ExecutorError {
    /// The graph failed structural validation; nothing was executed.
    #[error("graph failed validation: {}", .errors.join("; "))]
    #[diagnostic(
        code(filament::executor::invalid_graph),
        help("Build the graph through GraphBuilder::build to catch this earlier.")
    )]
    InvalidGraph { errors: Vec<String> },

    #[error(transparent)]
    #[diagnostic(code(filament::executor::store))]
    Store(#[from] StoreError),

    #[error("scheduler task join error: {0}")]
    #[diagnostic(code(filament::executor::join))]
    Join(#[from] tokio::task::JoinError),
}

/// A running execution: its event stream, a cancellation handle, and the
/// scheduler task's join handle.
pub struct ExecutionHandle {
    events: EventStream,
    cancel: CancellationToken,
    join: JoinHandle<Result<WorkflowState, ExecutorError>>,
}

impl ExecutionHandle {
    /// The ordered event stream of this execution.
    #[must_use]
    pub fn events(&self) -> &EventStream {
        &self.events
    }

    /// Requests cooperative cancellation of the whole run. In-flight nodes
    /// receive the signal; the terminal event is still emitted.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Waits for the run to finish and returns the final state.
    ///
    /// Dropping the embedded stream is fine; emission failures after that
    /// are ignored by the scheduler.
    pub async fn join(self) -> Result<WorkflowState, ExecutorError> {
        self.join.await?
    }

    /// Splits the handle into the stream and the join handle, for callers
    /// that consume events and the result on different tasks.
    #[must_use]
    pub fn into_parts(
        self,
    ) -> (
        EventStream,
        CancellationToken,
        JoinHandle<Result<WorkflowState, ExecutorError>>,
    ) {
        (self.events, self.cancel, self.join)
    }
}

/// Runs validated graphs and persists every committed snapshot.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use filament::executor::{ExecutionRequest, ParallelExecutor};
/// use filament::graph::GraphBuilder;
/// use filament::node::PassthroughNode;
/// use filament::state::WorkflowState;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let graph = Arc::new(
///     GraphBuilder::new("demo")
///         .add_node(PassthroughNode::new("only"))
///         .build()?,
/// );
/// let executor = ParallelExecutor::in_memory();
/// let request = ExecutionRequest::new(graph, WorkflowState::new("wf", "t"));
/// let final_state = executor.run_to_completion(request).await?;
/// assert_eq!(final_state.step, 1);
/// # Ok(())
/// # }
/// ```
pub struct ParallelExecutor {
    store: Arc<dyn StateStore>,
}

impl ParallelExecutor {
    #[must_use]
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    /// An executor over a fresh volatile store.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(crate::store::InMemoryStateStore::new()))
    }

    #[must_use]
    pub fn store(&self) -> Arc<dyn StateStore> {
        Arc::clone(&self.store)
    }

    /// Starts an execution and returns immediately with its handle.
    ///
    /// Events are pushed into the handle's stream as they are generated,
    /// never buffered to the end of the run. Must be called from within a
    /// tokio runtime.
    #[instrument(skip(self, request), fields(execution_id = %request.execution_id))]
    pub fn execute(&self, request: ExecutionRequest) -> Result<ExecutionHandle, ExecutorError> {
        let errors = request.graph.validate();
        if !errors.is_empty() {
            return Err(ExecutorError::InvalidGraph {
                errors: errors.to_vec(),
            });
        }

        let (tx, rx) = flume::unbounded();
        let emitter = Arc::new(EventEmitter::new(tx));
        let cancel = CancellationToken::new();
        let store = Arc::clone(&self.store);
        let run_cancel = cancel.clone();
        let join = tokio::spawn(run_graph(request, store, emitter, run_cancel));

        Ok(ExecutionHandle {
            events: EventStream::new(rx),
            cancel,
            join,
        })
    }

    /// Convenience wrapper: drains the event stream internally and returns
    /// the final state carried on the terminal event.
    #[instrument(skip(self, request), fields(execution_id = %request.execution_id))]
    pub async fn run_to_completion(
        &self,
        request: ExecutionRequest,
    ) -> Result<WorkflowState, ExecutorError> {
        let handle = self.execute(request)?;
        let (events, _cancel, join) = handle.into_parts();
        let drained = events.collect().await;
        let final_state = join.await??;
        debug_assert!(drained.last().is_some_and(StateEvent::is_terminal));
        Ok(final_state)
    }
}

/// Result of one node task, committed by the scheduler on join.
struct TaskOutcome {
    node_id: String,
    result: Result<NodeResult, NodeError>,
}

fn emit_or_log(emitter: &EventEmitter, event: StateEvent) {
    if let Err(err) = emitter.emit(event) {
        tracing::debug!(error = %err, "event emission failed; stream consumer gone");
    }
}

/// Renders an error and its source chain, innermost last.
fn error_chain(err: &NodeError) -> String {
    let mut rendered = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        rendered.push_str("\ncaused by: ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}

fn enqueue_enabled_edges(
    graph: &GraphDefinition,
    node_id: &str,
    state: &WorkflowState,
    seen: &mut FxHashSet<String>,
    frontier: &mut VecDeque<String>,
) {
    for edge in graph.outgoing(node_id) {
        if !edge.is_enabled(state) {
            continue;
        }
        if seen.contains(&edge.target) {
            continue;
        }
        seen.insert(edge.target.clone());
        frontier.push_back(edge.target.clone());
    }
}

async fn run_graph(
    request: ExecutionRequest,
    store: Arc<dyn StateStore>,
    emitter: Arc<EventEmitter>,
    cancel: CancellationToken,
) -> Result<WorkflowState, ExecutorError> {
    let ExecutionRequest {
        execution_id,
        graph,
        initial_state,
        options,
        ..
    } = request;
    let max_concurrency = options.max_concurrency.max(1);

    let mut current = initial_state;
    // A failing store must not break the stream contract: the caller always
    // sees exactly one terminal event, store errors included.
    if let Err(err) = store.save(current.clone()).await {
        let reason = format!("state store save failed: {err}");
        let failed = current
            .with_status(WorkflowStatus::Failed)
            .with_error(reason.clone());
        emit_or_log(
            &emitter,
            StateEvent::workflow_failed(execution_id.as_str(), failed, reason, None),
        );
        return Err(err.into());
    }

    let semaphore = Arc::new(Semaphore::new(max_concurrency));
    let mut frontier: VecDeque<String> = VecDeque::new();
    let mut seen: FxHashSet<String> = FxHashSet::default();
    let mut completed: FxHashSet<String> = FxHashSet::default();
    let mut inflight: JoinSet<TaskOutcome> = JoinSet::new();
    let mut last_error: Option<String> = None;
    let mut failure_observed = false;
    let mut store_failure: Option<StoreError> = None;

    frontier.push_back(graph.entry_node_id().to_string());
    seen.insert(graph.entry_node_id().to_string());

    loop {
        // Launch ready nodes while capacity remains. Cancellation stops new
        // dequeues; anything already in flight drains below.
        while !cancel.is_cancelled() && inflight.len() < max_concurrency {
            let Some(node_id) = frontier.pop_front() else {
                break;
            };
            if completed.contains(&node_id) {
                continue;
            }
            let Some(node) = graph.node(&node_id) else {
                // Unreachable on a validated graph.
                tracing::warn!(node = %node_id, "frontier references unknown node; skipping");
                continue;
            };
            spawn_node_task(
                &mut inflight,
                Arc::clone(node),
                current.clone(),
                &execution_id,
                &options,
                Arc::clone(&semaphore),
                Arc::clone(&emitter),
                cancel.child_token(),
            );
        }

        if inflight.is_empty() && (frontier.is_empty() || cancel.is_cancelled()) {
            break;
        }

        let Some(joined) = inflight.join_next().await else {
            continue;
        };
        let outcome = match joined {
            Ok(outcome) => outcome,
            Err(join_err) => {
                tracing::warn!(error = %join_err, "node task aborted");
                last_error = Some(format!("node task aborted: {join_err}"));
                failure_observed = true;
                if !options.continue_on_error {
                    cancel.cancel();
                }
                continue;
            }
        };

        match outcome.result {
            Ok(result) => {
                match result.outcome {
                    NodeOutcome::Success { output_state } => {
                        let next = output_state
                            .with_step(current.step + 1)
                            .with_current_node(outcome.node_id.as_str());
                        if let Err(err) = store.save(next.clone()).await {
                            tracing::warn!(
                                node = %outcome.node_id,
                                error = %err,
                                "snapshot persistence failed; aborting run"
                            );
                            last_error = Some(format!("state store save failed: {err}"));
                            failure_observed = true;
                            store_failure.get_or_insert(err);
                            cancel.cancel();
                            continue;
                        }
                        current = next;
                        emit_or_log(
                            &emitter,
                            StateEvent::node_exited(
                                execution_id.as_str(),
                                outcome.node_id.as_str(),
                                current.clone(),
                                None,
                            ),
                        );
                        completed.insert(outcome.node_id.clone());
                        enqueue_enabled_edges(
                            &graph,
                            &outcome.node_id,
                            &current,
                            &mut seen,
                            &mut frontier,
                        );
                    }
                    NodeOutcome::Failure { reason, error } => {
                        tracing::debug!(node = %outcome.node_id, %reason, "node failed");
                        last_error = Some(reason.clone());
                        failure_observed = true;
                        emit_or_log(
                            &emitter,
                            StateEvent::node_error(
                                execution_id.as_str(),
                                outcome.node_id.as_str(),
                                current.clone(),
                                reason,
                                error.unwrap_or_default(),
                                None,
                            ),
                        );
                        if options.continue_on_error {
                            enqueue_enabled_edges(
                                &graph,
                                &outcome.node_id,
                                &current,
                                &mut seen,
                                &mut frontier,
                            );
                        } else {
                            cancel.cancel();
                        }
                    }
                    NodeOutcome::Skipped { reason } => {
                        tracing::debug!(node = %outcome.node_id, %reason, "node skipped");
                        completed.insert(outcome.node_id.clone());
                        enqueue_enabled_edges(
                            &graph,
                            &outcome.node_id,
                            &current,
                            &mut seen,
                            &mut frontier,
                        );
                    }
                }
            }
            Err(err) => {
                let cancelled = matches!(err, NodeError::Cancelled { .. });
                let rendered = err.to_string();
                tracing::debug!(node = %outcome.node_id, error = %rendered, "node errored");
                if !cancelled || last_error.is_none() {
                    last_error = Some(rendered.clone());
                }
                failure_observed = failure_observed || !cancelled;
                emit_or_log(
                    &emitter,
                    StateEvent::node_error(
                        execution_id.as_str(),
                        outcome.node_id.as_str(),
                        current.clone(),
                        rendered,
                        error_chain(&err),
                        None,
                    ),
                );
                if options.continue_on_error && !cancelled {
                    enqueue_enabled_edges(
                        &graph,
                        &outcome.node_id,
                        &current,
                        &mut seen,
                        &mut frontier,
                    );
                } else if !options.continue_on_error {
                    cancel.cancel();
                }
            }
        }
    }

    // Terminal status: completed iff at least one exit node was reached and
    // every exit node the predicates routed to ran to success. Exits behind
    // never-taken branches do not count against the run; a persistence
    // failure forces the failed path.
    let scheduled_exits: Vec<&String> = graph
        .exit_node_ids()
        .iter()
        .filter(|id| seen.contains(id.as_str()))
        .collect();
    let exits_done = store_failure.is_none()
        && !scheduled_exits.is_empty()
        && scheduled_exits.iter().all(|id| completed.contains(id.as_str()));
    let final_state = if exits_done {
        current.with_status(WorkflowStatus::Completed)
    } else {
        let status = if cancel.is_cancelled() && !failure_observed {
            WorkflowStatus::Cancelled
        } else {
            WorkflowStatus::Failed
        };
        let reason = last_error.clone().unwrap_or_else(|| {
            if scheduled_exits.is_empty() {
                "no exit node was reached".to_string()
            } else {
                "not all exit nodes completed".to_string()
            }
        });
        current.with_status(status).with_error(reason)
    };
    match store.save(final_state.clone()).await {
        Ok(()) => {
            if exits_done {
                emit_or_log(
                    &emitter,
                    StateEvent::workflow_completed(
                        execution_id.as_str(),
                        final_state.clone(),
                        None,
                    ),
                );
            } else {
                let reason = final_state.error.clone().unwrap_or_default();
                emit_or_log(
                    &emitter,
                    StateEvent::workflow_failed(
                        execution_id.as_str(),
                        final_state.clone(),
                        reason,
                        None,
                    ),
                );
            }
            match store_failure {
                Some(err) => Err(err.into()),
                None => Ok(final_state),
            }
        }
        Err(err) => {
            // The stream contract still holds when the final save fails: a
            // terminal event goes out before the error surfaces.
            let reason = format!("state store save failed: {err}");
            let failed = if final_state.status == WorkflowStatus::Completed {
                final_state
                    .with_status(WorkflowStatus::Failed)
                    .with_error(reason.clone())
            } else {
                final_state
            };
            let detail = failed.error.clone().unwrap_or(reason);
            emit_or_log(
                &emitter,
                StateEvent::workflow_failed(execution_id.as_str(), failed, detail, None),
            );
            Err(err.into())
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn spawn_node_task(
    inflight: &mut JoinSet<TaskOutcome>,
    node: Arc<dyn Node>,
    snapshot: WorkflowState,
    execution_id: &str,
    options: &ExecutorOptions,
    semaphore: Arc<Semaphore>,
    emitter: Arc<EventEmitter>,
    node_cancel: CancellationToken,
) {
    let execution_id = execution_id.to_string();
    let budget = if node.is_llm() {
        options.llm_node_timeout
    } else {
        options.node_timeout
    };
    let retry = options.retry.clone();
    let breakers = options.breakers.clone();

    inflight.spawn(async move {
        let node_id = node.id().to_string();
        // Second gate beneath the scheduler's own cap; defends against
        // re-entrant dispatch.
        let _permit = match semaphore.acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                return TaskOutcome {
                    result: Err(NodeError::Cancelled {
                        node_id: node_id.clone(),
                    }),
                    node_id,
                };
            }
        };

        emit_or_log(
            &emitter,
            StateEvent::node_entered(
                execution_id.as_str(),
                node_id.as_str(),
                snapshot.with_current_node(node_id.as_str()),
                None,
            ),
        );

        let result = invoke_node(
            node.as_ref(),
            snapshot,
            node_cancel,
            budget,
            retry.as_ref(),
            breakers.as_deref(),
            execution_id.as_str(),
        )
        .await;
        TaskOutcome { node_id, result }
    });
}

/// Runs a node body under breaker, retry, timeout, and cancellation, and
/// stamps the owning execution's id onto the result.
///
/// The body is invoked exactly once per attempt; the breaker decides before
/// each attempt whether the body may run at all.
async fn invoke_node(
    node: &dyn Node,
    state: WorkflowState,
    cancel: CancellationToken,
    budget: Duration,
    retry: Option<&RetryPolicy>,
    breakers: Option<&CircuitBreakerRegistry>,
    execution_id: &str,
) -> Result<NodeResult, NodeError> {
    let node_id = node.id().to_string();
    let max_attempts = retry.map_or(1, |policy| policy.max_attempts.max(1));
    let mut attempt: u32 = 1;

    loop {
        if let (Some(registry), Some(tag)) = (breakers, node.breaker_tag()) {
            if !registry.try_acquire(tag) {
                return Err(NodeError::CircuitOpen {
                    tag: tag.to_string(),
                });
            }
        }

        let result = run_attempt(node, state.clone(), cancel.child_token(), budget, &node_id).await;

        if let (Some(registry), Some(tag)) = (breakers, node.breaker_tag()) {
            match &result {
                Ok(res) if !res.is_failure() => registry.record_success(tag),
                _ => registry.record_failure(tag),
            }
        }

        match result {
            Ok(result) => return Ok(result.stamped(execution_id)),
            Err(err) if attempt < max_attempts && err.is_transient() && !cancel.is_cancelled() => {
                let delay = retry.map_or(Duration::ZERO, |policy| policy.delay_for(attempt));
                tracing::debug!(
                    node = %node_id,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "retrying transient node failure"
                );
                tokio::select! {
                    _ = cancel.cancelled() => {
                        return Err(NodeError::Cancelled { node_id });
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

async fn run_attempt(
    node: &dyn Node,
    state: WorkflowState,
    cancel: CancellationToken,
    budget: Duration,
    node_id: &str,
) -> Result<NodeResult, NodeError> {
    tokio::select! {
        _ = cancel.cancelled() => Err(NodeError::Cancelled {
            node_id: node_id.to_string(),
        }),
        outcome = tokio::time::timeout(budget, node.execute(state, cancel.clone())) => match outcome {
            Ok(result) => result,
            Err(_) => Err(NodeError::Timeout {
                node_id: node_id.to_string(),
                elapsed_ms: budget.as_millis() as u64,
            }),
        },
    }
}
