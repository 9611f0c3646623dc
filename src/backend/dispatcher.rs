//! Apply dispatcher
//!
//! Issues the create/update call for a stack, or renders it when running
//! dry. Live calls get the environment payload as a temporary JSON file.

use std::io::Write;

use serde::Serialize;

use super::protocol::{ApplyRequest, BackendError};
use super::Backend;
use crate::domain::Stack;

/// What happened to one stack in the apply phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ApplyOutcome {
    /// Dry run; the backend was not contacted
    Planned { command: String },

    /// The backend accepted the create/update
    Applied,

    /// The backend call failed; `environment` is the pretty-printed payload
    Failed { error: String, environment: String },
}

impl ApplyOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, ApplyOutcome::Failed { .. })
    }
}

/// Sends stacks to the backend one at a time
pub struct ApplyDispatcher<'a> {
    backend: &'a dyn Backend,
    passthrough: &'a [String],
    dry_run: bool,
}

impl<'a> ApplyDispatcher<'a> {
    pub fn new(backend: &'a dyn Backend, passthrough: &'a [String], dry_run: bool) -> Self {
        Self {
            backend,
            passthrough,
            dry_run,
        }
    }

    /// Creates or updates `stack`, or only renders the call in dry-run mode
    pub fn dispatch(&self, stack: &Stack) -> ApplyOutcome {
        let payload = stack.payload();
        let full_name = stack.full_name();

        if self.dry_run {
            let request = ApplyRequest {
                mode: stack.apply_mode(),
                template: &stack.template,
                environment_file: None,
                payload: &payload,
                full_name: &full_name,
                passthrough: self.passthrough,
            };
            return ApplyOutcome::Planned {
                command: Self::announcement(self.backend, &request),
            };
        }

        // Removed when dropped, after the backend returns
        let result = write_payload(&payload).and_then(|file| {
            let request = ApplyRequest {
                mode: stack.apply_mode(),
                template: &stack.template,
                environment_file: Some(file.path()),
                payload: &payload,
                full_name: &full_name,
                passthrough: self.passthrough,
            };
            self.backend.apply(&request)
        });

        match result {
            Ok(()) => ApplyOutcome::Applied,
            Err(e) => ApplyOutcome::Failed {
                error: e.to_string(),
                environment: serde_json::to_string_pretty(&stack.environment)
                    .unwrap_or_else(|_| "{}".to_string()),
            },
        }
    }

    /// Dry-run line: the command plus the inline environment payload
    pub fn announcement(backend: &dyn Backend, request: &ApplyRequest<'_>) -> String {
        format!(
            "COMMAND: {} ENVIRONMENT: {}",
            backend.describe(request),
            request.payload
        )
    }

    /// Multi-line diagnostic printed for a failed apply
    pub fn failure_diagnostic(full_name: &str, error: &str, environment: &str) -> String {
        format!(
            "Failed to apply {}: {}\nEnvironment sent:\n{}",
            full_name, error, environment
        )
    }
}

fn write_payload(payload: &serde_json::Value) -> Result<tempfile::NamedTempFile, BackendError> {
    let mut file = tempfile::Builder::new()
        .prefix("chunk-stack-env-")
        .suffix(".json")
        .tempfile()
        .map_err(BackendError::Payload)?;

    let body = serde_json::to_vec(payload)
        .map_err(|e| BackendError::Payload(std::io::Error::other(e)))?;
    file.write_all(&body).map_err(BackendError::Payload)?;
    file.flush().map_err(BackendError::Payload)?;

    Ok(file)
}
