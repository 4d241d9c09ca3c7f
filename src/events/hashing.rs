//! Canonical SHA-256 hashing of states and events.
//!
//! The canonical form is the serde JSON serialization: struct fields in
//! declaration order, map keys sorted (state data lives in a `BTreeMap`),
//! enum variants as string tags. Equal field values therefore always yield
//! the same digest, and any differing field changes it.

use serde::Serialize;
use sha2::{Digest, Sha256};

use super::event::StateEvent;
use crate::state::WorkflowState;

fn digest_of<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let bytes = serde_json::to_vec(value)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

/// SHA-256 digest of a state's canonical serialized form, hex-encoded.
pub fn state_hash(state: &WorkflowState) -> Result<String, serde_json::Error> {
    digest_of(state)
}

/// SHA-256 digest of an event's canonical serialized form, hex-encoded.
pub fn event_hash(event: &StateEvent) -> Result<String, serde_json::Error> {
    digest_of(event)
}
