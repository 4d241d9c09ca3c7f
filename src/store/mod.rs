//! Snapshot persistence for recovery and introspection.
//!
//! The executor persists every committed snapshot through a [`StateStore`].
//! The trait abstracts over backends; [`InMemoryStateStore`] is the volatile
//! implementation used by default and in tests.

pub mod memory;

use async_trait::async_trait;
use miette::Diagnostic;
use thiserror::Error;

use crate::state::WorkflowState;

pub use memory::InMemoryStateStore;

/// Persistence failures.
#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("state '{state_id}' not found")]
    #[diagnostic(code(filament::store::not_found))]
    NotFound { state_id: String },

    #[error("store backend error: {0}")]
    #[diagnostic(code(filament::store::backend))]
    Backend(String),
}

/// Keyed snapshot persistence with workflow and thread secondary indices.
///
/// All operations are safe under concurrent invocation; consistency is
/// per-operation, no multi-operation transactions are promised.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Fetches a snapshot by id.
    async fn get(&self, state_id: &str) -> Result<Option<WorkflowState>, StoreError>;

    /// Persists a snapshot. Idempotent by `state.id`: a re-save replaces the
    /// prior value without touching the indices.
    async fn save(&self, state: WorkflowState) -> Result<(), StoreError>;

    /// Removes a snapshot from the primary map and both indices.
    /// Returns whether anything was removed.
    async fn delete(&self, state_id: &str) -> Result<bool, StoreError>;

    async fn exists(&self, state_id: &str) -> Result<bool, StoreError>;

    /// Snapshots of a logical workflow, in save order.
    async fn list_by_workflow(&self, workflow_id: &str)
        -> Result<Vec<WorkflowState>, StoreError>;

    /// Snapshots of a conversation thread, in save order.
    async fn list_by_thread(&self, thread_id: &str) -> Result<Vec<WorkflowState>, StoreError>;
}
