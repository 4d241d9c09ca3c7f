//! Opaque unique identifiers for the engine's entities.
//!
//! All ids are UUIDv4 with a short entity prefix so a bare id seen in a log
//! line or a persisted snapshot is self-describing.

use uuid::Uuid;

/// Generates prefixed unique ids for states, events, messages, and runs.
#[derive(Clone, Copy, Debug, Default)]
pub struct IdGenerator;

impl IdGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    #[must_use]
    pub fn state_id(&self) -> String {
        format!("state_{}", Uuid::new_v4().simple())
    }

    #[must_use]
    pub fn execution_id(&self) -> String {
        format!("exec_{}", Uuid::new_v4().simple())
    }

    #[must_use]
    pub fn event_id(&self) -> String {
        format!("evt_{}", Uuid::new_v4().simple())
    }

    #[must_use]
    pub fn message_id(&self) -> String {
        format!("msg_{}", Uuid::new_v4().simple())
    }

    #[must_use]
    pub fn tool_call_id(&self) -> String {
        format!("tool_{}", Uuid::new_v4().simple())
    }

    #[must_use]
    pub fn thread_id(&self) -> String {
        format!("thread_{}", Uuid::new_v4().simple())
    }

    #[must_use]
    pub fn graph_id(&self) -> String {
        format!("graph_{}", Uuid::new_v4().simple())
    }
}
