//! Graph model: nodes, guarded edges, and structural validation.
//!
//! A [`GraphDefinition`] is the validated, immutable topology the executor
//! traverses. It is assembled through [`GraphBuilder`], which collects
//! argument-level errors as calls are made and runs structural validation
//! (reachability, cycle detection) in [`GraphBuilder::build`].

pub mod builder;
pub mod definition;
pub mod edge;
mod validation;

pub use builder::{GraphBuilder, GraphError};
pub use definition::GraphDefinition;
pub use edge::{Edge, EdgeGuard, PredicateFn};
