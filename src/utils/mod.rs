//! Small shared utilities.

pub mod id_generator;
