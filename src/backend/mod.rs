//! # Orchestration Backend
//!
//! Everything that talks to the service managing the stacks goes through the
//! [`Backend`] trait. The engine only needs three calls from it.
//!
//! | Call | Used in phase | Purpose |
//! |------|---------------|---------|
//! | `lookup` | resolve | Find the id of an existing stack by full name |
//! | `get_outputs` | collect | Read the published outputs of an existing stack |
//! | `apply` | apply | Create or update a stack from a template + environment |
//!
//! ## Implementations
//!
//! - [`CommandBackend`] - shells out to the orchestration CLI (`openstack` by default)
//! - a recording in-memory fake, used by the unit tests
//!
//! ## Dispatch
//!
//! [`ApplyDispatcher`] wraps `apply` for the last phase. It renders the
//! dry-run announcement, writes the environment payload file and formats the
//! failure diagnostic the same way for every stack.

mod command;
mod dispatcher;
mod protocol;

#[cfg(test)]
pub(crate) mod testing;

use std::collections::BTreeMap;

pub use command::{CommandBackend, DEFAULT_PROGRAM};
pub use dispatcher::{ApplyDispatcher, ApplyOutcome};
pub use protocol::{ApplyRequest, BackendError};

/// Capability the engine needs from the orchestration service
pub trait Backend {
    /// Returns the id of the stack named `full_name`, or [`BackendError::NotFound`]
    fn lookup(&self, full_name: &str) -> Result<String, BackendError>;

    /// Returns every output the stack currently publishes
    fn get_outputs(&self, remote_id: &str)
        -> Result<BTreeMap<String, serde_json::Value>, BackendError>;

    /// Creates or updates a stack
    fn apply(&self, request: &ApplyRequest<'_>) -> Result<(), BackendError>;

    /// Human-readable equivalent of `apply`, used for dry runs
    fn describe(&self, request: &ApplyRequest<'_>) -> String {
        let mut parts = vec![
            format!("stack-{}", request.mode),
            "--template-file".to_string(),
            request.template.to_string(),
            "--environment".to_string(),
            request.environment_arg(),
            request.full_name.to_string(),
        ];
        parts.extend(request.passthrough.iter().cloned());
        parts.join(" ")
    }
}
