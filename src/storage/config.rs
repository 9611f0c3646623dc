//! Configuration handling for chunk-stack
//!
//! Configuration is read from `~/.config/chunk-stack/config.toml` (global)
//! and `.chunk-stack.toml` (project, found by walking up from the current
//! directory). Project values override global ones.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backend::DEFAULT_PROGRAM;

/// Project configuration file name
pub const PROJECT_CONFIG_FILE: &str = ".chunk-stack.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

/// What to do when two stacks declare the same output
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutputCollision {
    /// Warn; the value fetched last is used
    #[default]
    LastWins,
    /// Refuse to run
    Fail,
}

impl OutputCollision {
    pub fn as_str(&self) -> &str {
        match self {
            OutputCollision::LastWins => "last_wins",
            OutputCollision::Fail => "fail",
        }
    }
}

/// Orchestration CLI settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BackendConfig {
    /// Executable used for lookups and applies
    pub program: String,

    /// Arguments placed before every sub-command
    pub extra_args: Vec<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            program: DEFAULT_PROGRAM.to_string(),
            extra_args: Vec::new(),
        }
    }
}

/// Run defaults
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct RunConfig {
    /// Base environment used when `--environment` is not given
    pub environment: Option<PathBuf>,

    /// Duplicate output policy
    pub output_collision: OutputCollision,
}

/// One configuration file. Every field is optional so layers can be merged.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct ConfigFile {
    pub backend: Option<PartialBackend>,
    pub run: Option<PartialRun>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct PartialBackend {
    pub program: Option<String>,
    pub extra_args: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct PartialRun {
    pub environment: Option<PathBuf>,
    pub output_collision: Option<OutputCollision>,
}

impl ConfigFile {
    /// Resolves relative paths against the directory holding `path`
    pub fn relative_to(mut self, path: &Path) -> Self {
        let Some(dir) = path.parent() else {
            return self;
        };

        if let Some(run) = self.run.as_mut() {
            if let Some(environment) = run.environment.take() {
                run.environment = Some(if environment.is_relative() {
                    dir.join(environment)
                } else {
                    environment
                });
            }
        }
        self
    }
}

/// Effective configuration (global + project)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub backend: BackendConfig,
    pub run: RunConfig,

    /// Project file that was applied, if any
    pub project_file: Option<PathBuf>,
}

impl Config {
    /// Loads configuration from default locations
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        if let Some(global) = Self::global_config_path() {
            if let Some(file) = Self::read_file(&global)? {
                config.apply(file.relative_to(&global));
            }
        }

        if let Some(project) = Self::find_project_config() {
            if let Some(file) = Self::read_file(&project)? {
                config.apply(file.relative_to(&project));
                config.project_file = Some(project);
            }
        }

        Ok(config)
    }

    /// Returns the global config file path
    pub fn global_config_path() -> Option<PathBuf> {
        ProjectDirs::from("dev", "chunk-stack", "chunk-stack")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Finds `.chunk-stack.toml` in the current directory or a parent
    pub fn find_project_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;

        loop {
            let candidate = current.join(PROJECT_CONFIG_FILE);
            if candidate.is_file() {
                return Some(candidate);
            }

            if !current.pop() {
                return None;
            }
        }
    }

    /// Parses TOML configuration text
    pub fn parse(content: &str) -> std::result::Result<ConfigFile, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    fn read_file(path: &Path) -> Result<Option<ConfigFile>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;

        Self::parse(&content)
            .map(Some)
            .with_context(|| format!("Failed to parse config: {}", path.display()))
    }

    /// Overlays the values set in `file`
    pub fn apply(&mut self, file: ConfigFile) {
        if let Some(backend) = file.backend {
            if let Some(program) = backend.program {
                self.backend.program = program;
            }
            if let Some(args) = backend.extra_args {
                self.backend.extra_args = args;
            }
        }

        if let Some(run) = file.run {
            if run.environment.is_some() {
                self.run.environment = run.environment;
            }
            if let Some(policy) = run.output_collision {
                self.run.output_collision = policy;
            }
        }
    }
}
