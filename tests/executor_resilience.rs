//! Timeouts, retries, circuit breakers, and cancellation deadlines.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use filament::events::EventKind;
use filament::executor::{
    CircuitBreakerConfig, CircuitBreakerRegistry, ExecutionRequest, ExecutorError,
    ExecutorOptions, ParallelExecutor, RetryPolicy,
};
use filament::graph::GraphBuilder;
use filament::node::PassthroughNode;
use filament::state::WorkflowStatus;

use common::*;

#[tokio::test]
async fn timed_out_node_surfaces_as_node_error_with_the_duration() {
    let graph = Arc::new(
        GraphBuilder::new("timeouts")
            .add_node(SlowNode::new("sleepy", Duration::from_secs(5)))
            .build()
            .unwrap(),
    );
    let options = ExecutorOptions::default().with_node_timeout(Duration::from_millis(100));

    // The run must terminate within a small multiple of the deadline, not
    // the node's five seconds.
    let run = run_and_collect(graph, initial_state("w1"), options);
    let (events, final_state) = tokio::time::timeout(Duration::from_secs(2), run)
        .await
        .expect("run should end promptly after the deadline");

    assert_eq!(
        event_sigs(&events),
        vec!["NodeEntered(sleepy)", "NodeError(sleepy)", "WorkflowFailed"]
    );
    let error = events[1].error().unwrap();
    assert!(error.contains("timed out"));
    assert!(error.contains("100 ms"));
    assert_eq!(final_state.status, WorkflowStatus::Failed);
}

#[tokio::test]
async fn llm_tagged_nodes_get_the_longer_budget() {
    let graph = Arc::new(
        GraphBuilder::new("llm-budget")
            .add_node(SlowNode::new("model", Duration::from_millis(200)).llm())
            .build()
            .unwrap(),
    );
    let options = ExecutorOptions::default()
        .with_node_timeout(Duration::from_millis(50))
        .with_llm_node_timeout(Duration::from_secs(2));
    let (_, final_state) = run_and_collect(graph, initial_state("w1"), options).await;
    assert_eq!(final_state.status, WorkflowStatus::Completed);
}

#[tokio::test]
async fn transient_failures_are_retried_until_success() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let graph = Arc::new(
        GraphBuilder::new("retryable")
            .add_node(FlakyNode::new("flaky", 2, attempts.clone()))
            .build()
            .unwrap(),
    );
    let options = ExecutorOptions::default().with_retry(
        RetryPolicy::new(3).with_base_delay(Duration::from_millis(10)),
    );
    let (events, final_state) = run_and_collect(graph, initial_state("w1"), options).await;

    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    assert_eq!(final_state.status, WorkflowStatus::Completed);
    // Retries stay inside one node invocation: a single Entered/Exited pair.
    assert_eq!(
        event_sigs(&events),
        vec![
            "NodeEntered(flaky)",
            "NodeExited(flaky)",
            "WorkflowCompleted"
        ]
    );
}

#[tokio::test]
async fn exhausted_retries_surface_the_last_error() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let graph = Arc::new(
        GraphBuilder::new("hopeless")
            .add_node(FlakyNode::new("flaky", 10, attempts.clone()))
            .build()
            .unwrap(),
    );
    let options = ExecutorOptions::default().with_retry(
        RetryPolicy::new(2).with_base_delay(Duration::from_millis(5)),
    );
    let (events, final_state) = run_and_collect(graph, initial_state("w1"), options).await;

    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    assert_eq!(final_state.status, WorkflowStatus::Failed);
    assert!(events[1].error().unwrap().contains("connection reset"));
}

#[tokio::test]
async fn open_breaker_short_circuits_tagged_nodes() {
    // Three failing nodes share the "llm" tag with a threshold of two: the
    // third must be rejected without its body running.
    let invocations = Arc::new(AtomicUsize::new(0));
    let graph = Arc::new(
        GraphBuilder::new("guarded")
            .add_node(UnreliableNode::tagged("first", "llm", invocations.clone()))
            .add_node(UnreliableNode::tagged("second", "llm", invocations.clone()))
            .add_node(UnreliableNode::tagged("third", "llm", invocations.clone()))
            .add_edge("first", "second")
            .add_edge("second", "third")
            .build()
            .unwrap(),
    );
    let registry = Arc::new(CircuitBreakerRegistry::new(CircuitBreakerConfig {
        failure_threshold: 2,
        recovery_timeout: Duration::from_secs(60),
    }));
    let options = ExecutorOptions::default()
        .with_continue_on_error(true)
        .with_breakers(registry.clone());
    let (events, final_state) = run_and_collect(graph, initial_state("w1"), options).await;

    assert_eq!(invocations.load(Ordering::SeqCst), 2);
    let errors: Vec<&str> = events.iter().filter_map(|e| e.error()).collect();
    assert!(errors
        .iter()
        .any(|e| e.contains("circuit breaker open for tag 'llm'")));
    assert_eq!(final_state.status, WorkflowStatus::Failed);
}

#[tokio::test]
async fn breaker_success_keeps_the_circuit_closed() {
    let registry = Arc::new(CircuitBreakerRegistry::default());
    let graph = Arc::new(
        GraphBuilder::new("healthy")
            .add_node(PassthroughNode::new("a"))
            .add_node(PassthroughNode::new("b"))
            .add_edge("a", "b")
            .build()
            .unwrap(),
    );
    let options = ExecutorOptions::default().with_breakers(registry);
    let (_, final_state) = run_and_collect(graph, initial_state("w1"), options).await;
    assert_eq!(final_state.status, WorkflowStatus::Completed);
}

#[tokio::test]
async fn store_failure_mid_run_still_ends_in_a_terminal_event() {
    // Initial snapshot and the first commit persist; the second commit hits
    // a failing store. The stream must still end in one WorkflowFailed even
    // though the run surfaces a store error.
    let graph = Arc::new(
        GraphBuilder::new("fragile-store")
            .add_node(PassthroughNode::new("a"))
            .add_node(PassthroughNode::new("b"))
            .add_edge("a", "b")
            .build()
            .unwrap(),
    );
    let executor = ParallelExecutor::new(Arc::new(FlakyStore::failing_after(2)));
    let handle = executor
        .execute(ExecutionRequest::new(graph, initial_state("w1")))
        .unwrap();
    let (events, _cancel, join) = handle.into_parts();
    let events = events.collect().await;
    let err = join.await.unwrap().unwrap_err();

    assert!(matches!(err, ExecutorError::Store(_)));
    assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
    let last = events.last().unwrap();
    assert_eq!(last.kind(), EventKind::WorkflowFailed);
    assert!(last.error().unwrap().contains("state store save failed"));
    assert_eq!(last.state().status, WorkflowStatus::Failed);
}

#[tokio::test]
async fn store_failure_on_the_initial_save_is_still_terminal() {
    let graph = Arc::new(
        GraphBuilder::new("fragile-store")
            .add_node(PassthroughNode::new("only"))
            .build()
            .unwrap(),
    );
    let executor = ParallelExecutor::new(Arc::new(FlakyStore::failing_after(0)));
    let handle = executor
        .execute(ExecutionRequest::new(graph, initial_state("w1")))
        .unwrap();
    let (events, _cancel, join) = handle.into_parts();
    let events = events.collect().await;
    let err = join.await.unwrap().unwrap_err();

    assert!(matches!(err, ExecutorError::Store(_)));
    assert_eq!(event_sigs(&events), vec!["WorkflowFailed"]);
    assert!(events[0].error().unwrap().contains("state store save failed"));
}

#[tokio::test]
async fn failure_cancels_the_sibling_branch() {
    // a forks into a fast failing branch and a gated slow branch; without
    // continue_on_error the slow branch must be cancelled and the run must
    // still end in a single terminal event.
    let gate = Arc::new(tokio::sync::Notify::new());
    let graph = Arc::new(
        GraphBuilder::new("fork-fail")
            .add_node(PassthroughNode::new("a"))
            .add_node(FailingNode::new("bad", "boom"))
            .add_node(GatedNode::new("slow", gate))
            .fork("a", ["bad", "slow"])
            .build()
            .unwrap(),
    );
    let run = run_and_collect(graph, initial_state("w1"), ExecutorOptions::default());
    let (events, final_state) = tokio::time::timeout(Duration::from_secs(2), run)
        .await
        .expect("cancellation must not hang the run");

    assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
    assert!(events.last().unwrap().is_terminal());
    assert_eq!(final_state.status, WorkflowStatus::Failed);
    assert!(final_state.error.as_deref().unwrap().contains("boom"));
}
