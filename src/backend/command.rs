//! Backend that shells out to the orchestration CLI
//!
//! Default program is the unified `openstack` client:
//! - lookup: `openstack stack show <name> -f json -c id`
//! - outputs: `openstack stack show <id> -f json -c outputs`
//! - apply: `openstack stack create|update -t <template> -e <env> <name> [passthrough...]`

use std::collections::BTreeMap;
use std::process::{Command, Output, Stdio};

use serde::Deserialize;

use super::protocol::{ApplyRequest, BackendError};
use super::Backend;

pub const DEFAULT_PROGRAM: &str = "openstack";

#[derive(Debug, Deserialize)]
struct ShowId {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ShowOutputs {
    #[serde(default)]
    outputs: Option<Vec<OutputEntry>>,
}

#[derive(Debug, Deserialize)]
struct OutputEntry {
    output_key: String,
    #[serde(default)]
    output_value: serde_json::Value,
}

/// Backend driving an external CLI
#[derive(Debug, Clone)]
pub struct CommandBackend {
    /// Executable to run
    program: String,

    /// Arguments placed before every sub-command (e.g. `--os-cloud prod`)
    extra_args: Vec<String>,
}

impl CommandBackend {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            extra_args: Vec::new(),
        }
    }

    pub fn with_extra_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Full argument list for an apply call, program excluded
    pub fn apply_args(&self, request: &ApplyRequest<'_>) -> Vec<String> {
        let mut args = self.extra_args.clone();
        args.extend([
            "stack".to_string(),
            request.mode.as_str().to_string(),
            "-t".to_string(),
            request.template.to_string(),
            "-e".to_string(),
            request.environment_arg(),
            request.full_name.to_string(),
        ]);
        args.extend(request.passthrough.iter().cloned());
        args
    }

    fn show_args(&self, target: &str, column: &str) -> Vec<String> {
        let mut args = self.extra_args.clone();
        args.extend(
            ["stack", "show", target, "-f", "json", "-c", column]
                .iter()
                .map(|s| s.to_string()),
        );
        args
    }

    /// Runs the program with captured output
    fn capture(&self, args: &[String]) -> Result<Output, BackendError> {
        Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| BackendError::Spawn {
                program: self.program.clone(),
                source,
            })
    }

    fn failure(&self, output: &Output) -> BackendError {
        BackendError::CommandFailed {
            program: self.program.clone(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }
    }

    fn invalid(&self, reason: impl ToString) -> BackendError {
        BackendError::InvalidResponse {
            program: self.program.clone(),
            reason: reason.to_string(),
        }
    }
}

/// Matches the client's "Stack not found: <name>" and the API's
/// "The Stack (<name>) could not be found." wording only
fn is_missing_stack(stderr: &str) -> bool {
    stderr.contains("Stack not found")
        || (stderr.contains("Stack (") && stderr.contains("could not be found"))
}

impl Default for CommandBackend {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRAM)
    }
}

impl Backend for CommandBackend {
    fn lookup(&self, full_name: &str) -> Result<String, BackendError> {
        let output = self.capture(&self.show_args(full_name, "id"))?;

        if !output.status.success() {
            if is_missing_stack(&String::from_utf8_lossy(&output.stderr)) {
                return Err(BackendError::NotFound(full_name.to_string()));
            }
            return Err(self.failure(&output));
        }

        let shown: ShowId = serde_json::from_slice(&output.stdout).map_err(|e| self.invalid(e))?;
        Ok(shown.id)
    }

    fn get_outputs(
        &self,
        remote_id: &str,
    ) -> Result<BTreeMap<String, serde_json::Value>, BackendError> {
        let output = self.capture(&self.show_args(remote_id, "outputs"))?;

        if !output.status.success() {
            return Err(self.failure(&output));
        }

        let shown: ShowOutputs =
            serde_json::from_slice(&output.stdout).map_err(|e| self.invalid(e))?;

        Ok(shown
            .outputs
            .unwrap_or_default()
            .into_iter()
            .map(|o| (o.output_key, o.output_value))
            .collect())
    }

    fn apply(&self, request: &ApplyRequest<'_>) -> Result<(), BackendError> {
        // Inherit stdio so the operator sees the backend's own progress
        let status = Command::new(&self.program)
            .args(self.apply_args(request))
            .status()
            .map_err(|source| BackendError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(BackendError::CommandFailed {
                program: self.program.clone(),
                status: status.to_string(),
                stderr: String::new(),
            })
        }
    }

    fn describe(&self, request: &ApplyRequest<'_>) -> String {
        let mut parts = vec![self.program.clone()];
        parts.extend(self.apply_args(request));
        parts.join(" ")
    }
}
