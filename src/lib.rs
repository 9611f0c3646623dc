//! chunk-stack - create or update a chain of interdependent orchestration stacks
//!
//! A single document lists the stacks of a deployment. Each stack names a
//! template, the parameters it accepts from a shared base environment, the
//! outputs it publishes and the inputs it consumes from other stacks.
//! A run looks up which stacks already exist, gathers their outputs, feeds
//! them into the consumers' environments and then creates or updates every
//! stack in declaration order.

pub mod domain;
pub mod storage;
pub mod backend;
pub mod engine;
pub mod cli;

pub use domain::{AliasRule, ApplyMode, Environment, OutputPool, Stack};
pub use engine::{GraphExecutor, RunOptions, RunPlan, RunReport};
