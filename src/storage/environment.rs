//! Base environment loading and per-stack filtering
//!
//! The base environment file is YAML or JSON with a `parameters` mapping,
//! the same shape the backend accepts. A path that does not exist means
//! there is no base environment.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::domain::Environment;

#[derive(Debug, Error)]
pub enum EnvironmentError {
    #[error("Failed to read environment {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse environment {path}: {reason}")]
    Parse { path: PathBuf, reason: String },
}

#[derive(Debug, Default, Deserialize)]
struct EnvironmentFile {
    #[serde(default)]
    parameters: Option<Environment>,
}

/// Loads the `parameters` of a base environment file.
///
/// `None`, a missing file and a file without `parameters` all give an empty map.
pub fn load_base_environment(path: Option<&Path>) -> Result<Environment, EnvironmentError> {
    let Some(path) = path else {
        return Ok(Environment::new());
    };
    if !path.exists() {
        return Ok(Environment::new());
    }

    let content = fs::read_to_string(path).map_err(|source| EnvironmentError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    parse_base_environment(&content).map_err(|reason| EnvironmentError::Parse {
        path: path.to_path_buf(),
        reason,
    })
}

/// Parses base environment text
pub fn parse_base_environment(content: &str) -> Result<Environment, String> {
    if content.trim().is_empty() {
        return Ok(Environment::new());
    }

    let file: Option<EnvironmentFile> =
        serde_yaml::from_str(content).map_err(|e| e.to_string())?;

    Ok(file.and_then(|f| f.parameters).unwrap_or_default())
}

/// Entries of `base` whose keys are in `allowed`; all of `base` when `allowed` is empty
pub fn merge(base: &Environment, allowed: &[String]) -> Environment {
    if allowed.is_empty() {
        return base.clone();
    }

    base.iter()
        .filter(|(key, _)| allowed.iter().any(|a| a == *key))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}
