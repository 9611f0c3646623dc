//! Domain models for chunk-stack
//!
//! Stacks, the run-scoped output pool and the input/output graph.
//! Backend access is injected through [`crate::backend::Backend`].

mod graph;
mod pool;
mod stack;

pub use graph::{GraphWarning, StackGraph};
pub use pool::{OutputPool, Overwrite};
pub use stack::{AliasRule, ApplyMode, Environment, RemoteState, Stack};
