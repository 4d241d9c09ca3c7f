//! The parallel executor: scheduling, concurrency gating, and resilience.
//!
//! [`ParallelExecutor`] drives a validated graph breadth-first from its entry
//! node. Node bodies run concurrently under a semaphore capped at
//! `max_concurrency`; successful state commits are serialised on the
//! scheduler task so each commit's snapshot derives from a well-defined
//! predecessor. Every transition is streamed as a
//! [`StateEvent`](crate::events::StateEvent) and the stream always ends in
//! exactly one terminal event.

pub mod breaker;
pub mod options;
pub mod retry;
pub mod runner;

pub use breaker::{CircuitBreakerConfig, CircuitBreakerRegistry, CircuitState};
pub use options::{ExecutionRequest, ExecutorOptions};
pub use retry::RetryPolicy;
pub use runner::{ExecutionHandle, ExecutorError, ParallelExecutor};
