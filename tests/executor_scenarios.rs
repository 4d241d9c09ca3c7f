//! End-to-end executor scenarios: event order, terminal status, and the
//! streaming contract.

mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use filament::events::{event_hash, EventKind};
use filament::executor::{ExecutionRequest, ExecutorOptions, ParallelExecutor};
use filament::graph::{GraphBuilder, GraphDefinition};
use filament::node::PassthroughNode;
use filament::state::WorkflowStatus;

use common::*;

fn linear_chain() -> Arc<GraphDefinition> {
    Arc::new(
        GraphBuilder::new("linear")
            .add_node(PassthroughNode::new("a"))
            .add_node(PassthroughNode::new("b"))
            .add_node(PassthroughNode::new("c"))
            .add_edge("a", "b")
            .add_edge("b", "c")
            .build()
            .unwrap(),
    )
}

#[tokio::test]
async fn linear_three_node_happy_path() {
    let (events, final_state) = run_and_collect(
        linear_chain(),
        initial_state("w1"),
        ExecutorOptions::default(),
    )
    .await;

    assert_eq!(
        event_sigs(&events),
        vec![
            "NodeEntered(a)",
            "NodeExited(a)",
            "NodeEntered(b)",
            "NodeExited(b)",
            "NodeEntered(c)",
            "NodeExited(c)",
            "WorkflowCompleted",
        ]
    );
    assert_eq!(final_state.status, WorkflowStatus::Completed);
    assert_eq!(final_state.step, 3);
    assert!(final_state.error.is_none());
}

#[tokio::test]
async fn conditional_fork_takes_only_the_enabled_branch() {
    let graph = Arc::new(
        GraphBuilder::new("router")
            .add_node(PassthroughNode::new("a"))
            .add_node(PassthroughNode::new("b"))
            .add_node(PassthroughNode::new("c"))
            .add_edge_when("a", "b", |s| {
                s.data_value("route").and_then(|v| v.as_str()) == Some("b")
            })
            .add_edge_when("a", "c", |s| {
                s.data_value("route").and_then(|v| v.as_str()) == Some("c")
            })
            .build()
            .unwrap(),
    );
    let state = initial_state("w1").with_data("route", json!("b"));
    let (events, final_state) = run_and_collect(graph, state, ExecutorOptions::default()).await;

    assert_eq!(
        event_sigs(&events),
        vec![
            "NodeEntered(a)",
            "NodeExited(a)",
            "NodeEntered(b)",
            "NodeExited(b)",
            "WorkflowCompleted",
        ]
    );
    assert!(events.iter().all(|e| e.node_id() != Some("c")));
    assert_eq!(final_state.status, WorkflowStatus::Completed);
}

#[tokio::test]
async fn failure_without_continue_stops_the_run() {
    let graph = Arc::new(
        GraphBuilder::new("failing")
            .add_node(PassthroughNode::new("a"))
            .add_node(FailingNode::new("b", "boom"))
            .add_edge("a", "b")
            .build()
            .unwrap(),
    );
    let (events, final_state) =
        run_and_collect(graph, initial_state("w1"), ExecutorOptions::default()).await;

    assert_eq!(
        event_sigs(&events),
        vec![
            "NodeEntered(a)",
            "NodeExited(a)",
            "NodeEntered(b)",
            "NodeError(b)",
            "WorkflowFailed",
        ]
    );
    assert_eq!(final_state.status, WorkflowStatus::Failed);
    assert!(final_state.error.as_deref().unwrap().contains("boom"));
}

#[tokio::test]
async fn failure_with_continue_reaches_downstream_nodes() {
    let graph = Arc::new(
        GraphBuilder::new("tolerant")
            .add_node(PassthroughNode::new("a"))
            .add_node(FailingNode::new("b", "boom"))
            .add_node(PassthroughNode::new("c"))
            .add_edge("a", "b")
            .add_edge("b", "c")
            .build()
            .unwrap(),
    );
    let options = ExecutorOptions::default().with_continue_on_error(true);
    let (events, final_state) = run_and_collect(graph, initial_state("w1"), options).await;

    assert_eq!(
        event_sigs(&events),
        vec![
            "NodeEntered(a)",
            "NodeExited(a)",
            "NodeEntered(b)",
            "NodeError(b)",
            "NodeEntered(c)",
            "NodeExited(c)",
            "WorkflowCompleted",
        ]
    );
    assert_eq!(final_state.status, WorkflowStatus::Completed);
}

#[tokio::test]
async fn concurrency_cap_of_one_serialises_a_fork() {
    // `slow` blocks on an external signal; with a cap of one, `fast` must
    // not even enter until `slow` has exited.
    let gate = Arc::new(tokio::sync::Notify::new());
    let graph = Arc::new(
        GraphBuilder::new("capped")
            .add_node(PassthroughNode::new("a"))
            .add_node(GatedNode::new("slow", gate.clone()))
            .add_node(PassthroughNode::new("fast"))
            .fork("a", ["slow", "fast"])
            .build()
            .unwrap(),
    );
    let executor = ParallelExecutor::in_memory();
    let request = ExecutionRequest::new(graph, initial_state("w1"))
        .with_options(ExecutorOptions::default().with_max_concurrency(1));
    let handle = executor.execute(request).unwrap();

    // Wait until `slow` has entered, then give the scheduler time to
    // misbehave before releasing the gate.
    let entered_slow = loop {
        match handle.events().recv().await {
            Some(event) => {
                if event_sig(&event) == "NodeEntered(slow)" {
                    break vec![event];
                }
            }
            None => panic!("stream ended before slow entered"),
        }
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    let mut events = entered_slow;
    events.extend(handle.events().drain());
    assert!(
        events.iter().all(|e| e.node_id() != Some("fast")),
        "fast started while slow was still running: {:?}",
        event_sigs(&events)
    );

    gate.notify_one();
    let (stream, _cancel, join) = handle.into_parts();
    events.extend(stream.collect().await);
    let final_state = join.await.unwrap().unwrap();

    assert!(index_of(&events, "NodeExited(slow)") < index_of(&events, "NodeEntered(fast)"));
    assert_eq!(final_state.status, WorkflowStatus::Completed);
}

#[tokio::test]
async fn serialised_fork_enters_siblings_in_edge_insertion_order() {
    let graph = Arc::new(
        GraphBuilder::new("ordered")
            .add_node(PassthroughNode::new("a"))
            .add_node(PassthroughNode::new("x"))
            .add_node(PassthroughNode::new("y"))
            .fork("a", ["x", "y"])
            .build()
            .unwrap(),
    );
    let options = ExecutorOptions::default().with_max_concurrency(1);
    let (events, final_state) = run_and_collect(graph, initial_state("w1"), options).await;

    assert!(index_of(&events, "NodeEntered(x)") < index_of(&events, "NodeEntered(y)"));
    assert_eq!(final_state.status, WorkflowStatus::Completed);
    assert_eq!(final_state.step, 3);
}

#[tokio::test]
async fn diamond_join_runs_the_join_node_once() {
    let counter = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let graph = Arc::new(
        GraphBuilder::new("diamond")
            .add_node(PassthroughNode::new("a"))
            .add_node(PassthroughNode::new("b"))
            .add_node(PassthroughNode::new("c"))
            .add_node(CountingNode::new("d", counter.clone()))
            .fork("a", ["b", "c"])
            .join("d", ["b", "c"])
            .build()
            .unwrap(),
    );
    let (events, final_state) =
        run_and_collect(graph, initial_state("w1"), ExecutorOptions::default()).await;

    assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert_eq!(final_state.status, WorkflowStatus::Completed);
    assert!(events.last().unwrap().is_terminal());
}

#[tokio::test]
async fn event_stream_is_finite_chained_and_terminal_last() {
    let (events, _) = run_and_collect(
        linear_chain(),
        initial_state("w1"),
        ExecutorOptions::default(),
    )
    .await;

    // Exactly one terminal event, and it is the last one.
    let terminal_count = events.iter().filter(|e| e.is_terminal()).count();
    assert_eq!(terminal_count, 1);
    assert!(events.last().unwrap().is_terminal());

    // Hash chain: each event links to its predecessor.
    assert!(events[0].previous_hash().is_none());
    for pair in events.windows(2) {
        let expected = event_hash(&pair[0]).unwrap();
        assert_eq!(pair[1].previous_hash(), Some(expected.as_str()));
    }

    // Step is non-decreasing along the stream.
    let steps: Vec<u64> = events.iter().map(|e| e.state().step).collect();
    assert!(steps.windows(2).all(|w| w[0] <= w[1]));

    // Per node: Entered strictly precedes Exited.
    for node in ["a", "b", "c"] {
        let entered = index_of(&events, &format!("NodeEntered({node})"));
        let exited = index_of(&events, &format!("NodeExited({node})"));
        assert!(entered < exited);
    }
}

#[tokio::test]
async fn snapshots_are_persisted_through_the_store() {
    let executor = ParallelExecutor::in_memory();
    let request = ExecutionRequest::new(linear_chain(), initial_state("persisted-wf"));
    let final_state = executor.run_to_completion(request).await.unwrap();

    let store = executor.store();
    assert!(store.exists(&final_state.id).await.unwrap());
    let history = store.list_by_workflow("persisted-wf").await.unwrap();
    // Initial snapshot, three commits, final status update.
    assert_eq!(history.len(), 5);
    assert_eq!(history.last().unwrap().status, WorkflowStatus::Completed);
    let by_thread = store.list_by_thread("thread-test").await.unwrap();
    assert_eq!(by_thread.len(), history.len());
}

#[tokio::test]
async fn external_cancellation_ends_the_run_with_a_terminal_event() {
    let gate = Arc::new(tokio::sync::Notify::new());
    let graph = Arc::new(
        GraphBuilder::new("cancellable")
            .add_node(GatedNode::new("stuck", gate))
            .build()
            .unwrap(),
    );
    let executor = ParallelExecutor::in_memory();
    let handle = executor
        .execute(ExecutionRequest::new(graph, initial_state("w1")))
        .unwrap();

    // Let the node enter, then cancel the whole run.
    loop {
        match handle.events().recv().await {
            Some(event) if event.kind() == EventKind::NodeEntered => break,
            Some(_) => {}
            None => panic!("stream ended early"),
        }
    }
    handle.cancel();

    let (stream, _cancel, join) = handle.into_parts();
    let rest = stream.collect().await;
    let final_state = join.await.unwrap().unwrap();

    assert!(rest.last().unwrap().is_terminal());
    assert_eq!(final_state.status, WorkflowStatus::Cancelled);
    assert!(final_state.error.is_some());
}
