#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use filament::node::{Node, NodeError, NodeResult};
use filament::state::WorkflowState;

/// Succeeds after stamping `visited_<id> = true` into the state data.
#[derive(Clone, Debug)]
pub struct StampNode {
    pub id: String,
}

impl StampNode {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

#[async_trait]
impl Node for StampNode {
    fn id(&self) -> &str {
        &self.id
    }

    async fn execute(
        &self,
        state: WorkflowState,
        _cancel: CancellationToken,
    ) -> Result<NodeResult, NodeError> {
        let out = state.with_data(format!("visited_{}", self.id), json!(true));
        Ok(NodeResult::success(&self.id, out))
    }
}

/// Always returns a soft failure with the given reason.
#[derive(Clone, Debug)]
pub struct FailingNode {
    pub id: String,
    pub reason: String,
}

impl FailingNode {
    pub fn new(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Node for FailingNode {
    fn id(&self) -> &str {
        &self.id
    }

    async fn execute(
        &self,
        _state: WorkflowState,
        _cancel: CancellationToken,
    ) -> Result<NodeResult, NodeError> {
        Ok(NodeResult::failure(&self.id, &self.reason))
    }
}

/// Sleeps for a fixed delay, then succeeds.
#[derive(Clone, Debug)]
pub struct SlowNode {
    pub id: String,
    pub delay: Duration,
    pub llm_tagged: bool,
}

impl SlowNode {
    pub fn new(id: impl Into<String>, delay: Duration) -> Self {
        Self {
            id: id.into(),
            delay,
            llm_tagged: false,
        }
    }

    pub fn llm(mut self) -> Self {
        self.llm_tagged = true;
        self
    }
}

#[async_trait]
impl Node for SlowNode {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_llm(&self) -> bool {
        self.llm_tagged
    }

    async fn execute(
        &self,
        state: WorkflowState,
        _cancel: CancellationToken,
    ) -> Result<NodeResult, NodeError> {
        tokio::time::sleep(self.delay).await;
        Ok(NodeResult::success(&self.id, state))
    }
}

/// Blocks on an external signal, then succeeds.
#[derive(Clone, Debug)]
pub struct GatedNode {
    pub id: String,
    pub gate: Arc<Notify>,
}

impl GatedNode {
    pub fn new(id: impl Into<String>, gate: Arc<Notify>) -> Self {
        Self {
            id: id.into(),
            gate,
        }
    }
}

#[async_trait]
impl Node for GatedNode {
    fn id(&self) -> &str {
        &self.id
    }

    async fn execute(
        &self,
        state: WorkflowState,
        _cancel: CancellationToken,
    ) -> Result<NodeResult, NodeError> {
        self.gate.notified().await;
        Ok(NodeResult::success(&self.id, state))
    }
}

/// Counts invocations, then succeeds.
#[derive(Clone, Debug)]
pub struct CountingNode {
    pub id: String,
    pub counter: Arc<AtomicUsize>,
}

impl CountingNode {
    pub fn new(id: impl Into<String>, counter: Arc<AtomicUsize>) -> Self {
        Self {
            id: id.into(),
            counter,
        }
    }
}

#[async_trait]
impl Node for CountingNode {
    fn id(&self) -> &str {
        &self.id
    }

    async fn execute(
        &self,
        state: WorkflowState,
        _cancel: CancellationToken,
    ) -> Result<NodeResult, NodeError> {
        self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(NodeResult::success(&self.id, state))
    }
}

/// Raises a transient error until `failures` attempts have happened, then
/// succeeds. Counts every invocation.
#[derive(Clone, Debug)]
pub struct FlakyNode {
    pub id: String,
    pub failures: usize,
    pub attempts: Arc<AtomicUsize>,
}

impl FlakyNode {
    pub fn new(id: impl Into<String>, failures: usize, attempts: Arc<AtomicUsize>) -> Self {
        Self {
            id: id.into(),
            failures,
            attempts,
        }
    }
}

#[async_trait]
impl Node for FlakyNode {
    fn id(&self) -> &str {
        &self.id
    }

    async fn execute(
        &self,
        state: WorkflowState,
        _cancel: CancellationToken,
    ) -> Result<NodeResult, NodeError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt <= self.failures {
            return Err(NodeError::Other("connection reset by peer".to_string()));
        }
        Ok(NodeResult::success(&self.id, state))
    }
}

/// Raises a transient error on every invocation; optionally breaker-tagged.
#[derive(Clone, Debug)]
pub struct UnreliableNode {
    pub id: String,
    pub tag: Option<String>,
    pub invocations: Arc<AtomicUsize>,
}

impl UnreliableNode {
    pub fn tagged(
        id: impl Into<String>,
        tag: impl Into<String>,
        invocations: Arc<AtomicUsize>,
    ) -> Self {
        Self {
            id: id.into(),
            tag: Some(tag.into()),
            invocations,
        }
    }
}

#[async_trait]
impl Node for UnreliableNode {
    fn id(&self) -> &str {
        &self.id
    }

    fn breaker_tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    async fn execute(
        &self,
        _state: WorkflowState,
        _cancel: CancellationToken,
    ) -> Result<NodeResult, NodeError> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        Err(NodeError::Other("connection refused".to_string()))
    }
}
