//! Backend request and error types

use std::path::Path;

use thiserror::Error;

use crate::domain::ApplyMode;

/// Placeholder shown for the environment file when nothing is written
pub const ENVIRONMENT_PLACEHOLDER: &str = "<environment>";

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Stack not found: {0}")]
    NotFound(String),

    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}{}", detail(.stderr))]
    CommandFailed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("Invalid response from {program}: {reason}")]
    InvalidResponse { program: String, reason: String },

    #[error("Failed to write environment payload: {0}")]
    Payload(#[source] std::io::Error),
}

fn detail(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {}", stderr)
    }
}

/// A single create/update call
#[derive(Debug, Clone)]
pub struct ApplyRequest<'a> {
    pub mode: ApplyMode,

    /// Template path, as written in the document
    pub template: &'a str,

    /// Environment payload file; `None` for dry runs
    pub environment_file: Option<&'a Path>,

    /// `{"parameters": {...}}`
    pub payload: &'a serde_json::Value,

    pub full_name: &'a str,

    /// Extra arguments forwarded verbatim
    pub passthrough: &'a [String],
}

impl ApplyRequest<'_> {
    /// Environment argument as it appears on a command line
    pub fn environment_arg(&self) -> String {
        match self.environment_file {
            Some(path) => path.display().to_string(),
            None => ENVIRONMENT_PLACEHOLDER.to_string(),
        }
    }
}
