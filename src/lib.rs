//! ```text
//! GraphBuilder ─┬─► GraphDefinition ─► ParallelExecutor
//!               │        │                   │
//!               │        ├─► validation      ├─► Node tasks ─► NodeResult
//!               │        │   (reachability,  │                   │
//!               │        │    cycles)        │                   ├─► WorkflowState (immutable commits)
//!               │        │                   │                   └─► StateEvent stream (hash-chained)
//!               │        └─► viz (DOT /      │
//!               │             Mermaid)       └─► StateStore (snapshots) ─► RunTrace
//!               │
//!               └─► ExecutorOptions (concurrency, timeouts, retry, breakers)
//! ```
//!
//! Filament is a workflow execution engine for directed, mostly-acyclic graphs
//! of async compute nodes. Edges carry conditional predicates evaluated against
//! an evolving, immutable workflow state; the executor traverses the graph
//! breadth-first under a concurrency ceiling and streams one observability
//! event per state transition, each event hash-chained to its predecessor.

pub mod events;
pub mod executor;
pub mod graph;
pub mod llm;
pub mod message;
pub mod node;
pub mod state;
pub mod store;
pub mod trace;
pub mod utils;
pub mod viz;
