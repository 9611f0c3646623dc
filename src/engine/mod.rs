//! # Stack Graph Engine
//!
//! Turns a document into backend calls.
//!
//! ```text
//! RunPlan::load ──► Vec<Stack> ──► GraphExecutor::run ──► RunReport
//!   document            │             resolve  (lookup ids)
//!   templates           │             collect  (outputs -> pool)
//!   base environment    │             propagate (pool -> inputs)
//!   ordering warnings   │             apply    (create/update or render)
//! ```
//!
//! Fatal problems surface from [`RunPlan::load`] before any backend call.
//! Everything after that is recorded in the [`RunReport`].

mod executor;
mod plan;

pub use executor::{Diagnostic, GraphExecutor, Phase, RunOptions, RunReport, StackReport};
pub use plan::{PlanError, RunPlan};
