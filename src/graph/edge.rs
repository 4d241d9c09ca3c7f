//! Edges and their enabling guards.
//!
//! An edge connects two nodes and optionally carries a guard evaluated
//! against the current workflow state. Guards must be cheap and
//! side-effect-free: the executor evaluates them on every traversal and
//! never memoises the outcome.

use std::fmt;
use std::sync::Arc;

use crate::state::WorkflowState;

/// State predicate deciding whether an edge is taken.
pub type PredicateFn = Arc<dyn Fn(&WorkflowState) -> bool + Send + Sync>;

/// Enabling condition of an edge.
///
/// `Never` is a structural sentinel: the validator elides `Never`-guarded
/// edges before cycle detection, so a conditional loop whose back edge can
/// statically never fire is accepted as acyclic. `When` predicates are
/// treated as potentially true for validation purposes.
#[derive(Clone, Default)]
pub enum EdgeGuard {
    /// Unconditional; equivalent to an absent predicate.
    #[default]
    Always,
    /// Statically never taken.
    Never,
    /// Evaluated against the current state on each traversal.
    When(PredicateFn),
}

impl EdgeGuard {
    /// Wraps a predicate closure.
    pub fn when<F>(predicate: F) -> Self
    where
        F: Fn(&WorkflowState) -> bool + Send + Sync + 'static,
    {
        EdgeGuard::When(Arc::new(predicate))
    }

    /// Evaluates the guard against `state`.
    #[must_use]
    pub fn is_enabled(&self, state: &WorkflowState) -> bool {
        match self {
            EdgeGuard::Always => true,
            EdgeGuard::Never => false,
            EdgeGuard::When(predicate) => predicate(state),
        }
    }

    /// Whether this guard is the structurally-false sentinel.
    #[must_use]
    pub fn is_never(&self) -> bool {
        matches!(self, EdgeGuard::Never)
    }
}

impl fmt::Debug for EdgeGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EdgeGuard::Always => write!(f, "Always"),
            EdgeGuard::Never => write!(f, "Never"),
            EdgeGuard::When(_) => write!(f, "When(..)"),
        }
    }
}

/// A directed, optionally guarded link between two nodes.
///
/// Edges are first-class and ordered: sibling outgoing edges keep their
/// insertion order everywhere, including scheduling tie-breaks.
#[derive(Clone, Debug)]
pub struct Edge {
    pub source: String,
    pub target: String,
    pub label: Option<String>,
    pub guard: EdgeGuard,
}

impl Edge {
    /// An unconditional edge.
    #[must_use]
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            label: None,
            guard: EdgeGuard::Always,
        }
    }

    /// A guarded edge taken only when `predicate` holds on the current state.
    pub fn when<F>(source: impl Into<String>, target: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&WorkflowState) -> bool + Send + Sync + 'static,
    {
        Self {
            source: source.into(),
            target: target.into(),
            label: None,
            guard: EdgeGuard::when(predicate),
        }
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    #[must_use]
    pub fn with_guard(mut self, guard: EdgeGuard) -> Self {
        self.guard = guard;
        self
    }

    /// Evaluates this edge's guard against `state`.
    #[must_use]
    pub fn is_enabled(&self, state: &WorkflowState) -> bool {
        self.guard.is_enabled(state)
    }
}
