#![allow(dead_code)]

use std::sync::atomic::{AtomicIsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use filament::events::{EventKind, StateEvent};
use filament::executor::{ExecutionRequest, ExecutorOptions, ParallelExecutor};
use filament::graph::GraphDefinition;
use filament::state::WorkflowState;
use filament::store::{StateStore, StoreError};

pub fn initial_state(workflow_id: &str) -> WorkflowState {
    WorkflowState::new(workflow_id, "thread-test")
}

/// Runs a graph to the end, returning the full ordered event log and the
/// final state.
pub async fn run_and_collect(
    graph: Arc<GraphDefinition>,
    state: WorkflowState,
    options: ExecutorOptions,
) -> (Vec<StateEvent>, WorkflowState) {
    let executor = ParallelExecutor::in_memory();
    let request = ExecutionRequest::new(graph, state).with_options(options);
    let handle = executor.execute(request).expect("graph should be valid");
    let (events, _cancel, join) = handle.into_parts();
    let collected = events.collect().await;
    let final_state = join.await.expect("scheduler task").expect("run");
    (collected, final_state)
}

/// Compact signature of an event for order assertions:
/// `"NodeEntered(a)"`, `"WorkflowCompleted"`, ...
pub fn event_sig(event: &StateEvent) -> String {
    let kind = match event.kind() {
        EventKind::NodeEntered => "NodeEntered",
        EventKind::NodeExited => "NodeExited",
        EventKind::NodeError => "NodeError",
        EventKind::WorkflowCompleted => "WorkflowCompleted",
        EventKind::WorkflowFailed => "WorkflowFailed",
    };
    match event.node_id() {
        Some(node_id) => format!("{kind}({node_id})"),
        None => kind.to_string(),
    }
}

pub fn event_sigs(events: &[StateEvent]) -> Vec<String> {
    events.iter().map(event_sig).collect()
}

/// Index of the first event matching the signature; panics if absent.
pub fn index_of(events: &[StateEvent], sig: &str) -> usize {
    events
        .iter()
        .position(|e| event_sig(e) == sig)
        .unwrap_or_else(|| panic!("event {sig} not found in {:?}", event_sigs(events)))
}

/// Store whose `save` starts failing after a fixed number of successes.
/// Reads report nothing stored.
pub struct FlakyStore {
    saves_remaining: AtomicIsize,
}

impl FlakyStore {
    pub fn failing_after(saves: isize) -> Self {
        Self {
            saves_remaining: AtomicIsize::new(saves),
        }
    }
}

#[async_trait]
impl StateStore for FlakyStore {
    async fn get(&self, _state_id: &str) -> Result<Option<WorkflowState>, StoreError> {
        Ok(None)
    }

    async fn save(&self, _state: WorkflowState) -> Result<(), StoreError> {
        if self.saves_remaining.fetch_sub(1, Ordering::SeqCst) <= 0 {
            return Err(StoreError::Backend("disk full".to_string()));
        }
        Ok(())
    }

    async fn delete(&self, _state_id: &str) -> Result<bool, StoreError> {
        Ok(false)
    }

    async fn exists(&self, _state_id: &str) -> Result<bool, StoreError> {
        Ok(false)
    }

    async fn list_by_workflow(
        &self,
        _workflow_id: &str,
    ) -> Result<Vec<WorkflowState>, StoreError> {
        Ok(Vec::new())
    }

    async fn list_by_thread(&self, _thread_id: &str) -> Result<Vec<WorkflowState>, StoreError> {
        Ok(Vec::new())
    }
}
