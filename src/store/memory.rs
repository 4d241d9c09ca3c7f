//! Volatile in-memory snapshot store.

use std::sync::RwLock;

use async_trait::async_trait;
use rustc_hash::FxHashMap;

use super::{StateStore, StoreError};
use crate::state::WorkflowState;

/// In-memory [`StateStore`] backed by a primary map and two secondary
/// indices kept in lockstep.
///
/// Each map sits behind its own `RwLock`; locks are only held across the
/// map operation itself, never across an await point.
#[derive(Debug, Default)]
pub struct InMemoryStateStore {
    states: RwLock<FxHashMap<String, WorkflowState>>,
    by_workflow: RwLock<FxHashMap<String, Vec<String>>>,
    by_thread: RwLock<FxHashMap<String, Vec<String>>>,
}

impl InMemoryStateStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored snapshots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.states.read().expect("state map lock poisoned").len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn resolve(&self, ids: Vec<String>) -> Vec<WorkflowState> {
        let states = self.states.read().expect("state map lock poisoned");
        ids.iter().filter_map(|id| states.get(id).cloned()).collect()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn get(&self, state_id: &str) -> Result<Option<WorkflowState>, StoreError> {
        let states = self.states.read().expect("state map lock poisoned");
        Ok(states.get(state_id).cloned())
    }

    async fn save(&self, state: WorkflowState) -> Result<(), StoreError> {
        let replaced = {
            let mut states = self.states.write().expect("state map lock poisoned");
            states.insert(state.id.clone(), state.clone()).is_some()
        };
        // Index only on first save of an id; a replace leaves indices as-is.
        if !replaced {
            self.by_workflow
                .write()
                .expect("workflow index lock poisoned")
                .entry(state.workflow_id.clone())
                .or_default()
                .push(state.id.clone());
            self.by_thread
                .write()
                .expect("thread index lock poisoned")
                .entry(state.thread_id.clone())
                .or_default()
                .push(state.id.clone());
        }
        Ok(())
    }

    async fn delete(&self, state_id: &str) -> Result<bool, StoreError> {
        let removed = {
            let mut states = self.states.write().expect("state map lock poisoned");
            states.remove(state_id)
        };
        let Some(state) = removed else {
            return Ok(false);
        };
        {
            let mut index = self
                .by_workflow
                .write()
                .expect("workflow index lock poisoned");
            if let Some(ids) = index.get_mut(&state.workflow_id) {
                ids.retain(|id| id != state_id);
                if ids.is_empty() {
                    index.remove(&state.workflow_id);
                }
            }
        }
        {
            let mut index = self.by_thread.write().expect("thread index lock poisoned");
            if let Some(ids) = index.get_mut(&state.thread_id) {
                ids.retain(|id| id != state_id);
                if ids.is_empty() {
                    index.remove(&state.thread_id);
                }
            }
        }
        Ok(true)
    }

    async fn exists(&self, state_id: &str) -> Result<bool, StoreError> {
        let states = self.states.read().expect("state map lock poisoned");
        Ok(states.contains_key(state_id))
    }

    async fn list_by_workflow(
        &self,
        workflow_id: &str,
    ) -> Result<Vec<WorkflowState>, StoreError> {
        let ids = {
            let index = self
                .by_workflow
                .read()
                .expect("workflow index lock poisoned");
            index.get(workflow_id).cloned().unwrap_or_default()
        };
        Ok(self.resolve(ids))
    }

    async fn list_by_thread(&self, thread_id: &str) -> Result<Vec<WorkflowState>, StoreError> {
        let ids = {
            let index = self.by_thread.read().expect("thread index lock poisoned");
            index.get(thread_id).cloned().unwrap_or_default()
        };
        Ok(self.resolve(ids))
    }
}
