//! # Loading Layer
//!
//! Reads everything a run needs from disk before any backend is contacted.
//!
//! ## Inputs
//!
//! | Data | Format | Source |
//! |------|--------|--------|
//! | Stack document | YAML with a `resources` mapping | `--template-file` |
//! | Stack templates | YAML/JSON, only `Parameters`/`parameters` is read | `template:` of each resource |
//! | Base environment | YAML/JSON with a `parameters` mapping | `--environment` or `run.environment` |
//! | Config | TOML | `~/.config/chunk-stack/config.toml`, `.chunk-stack.toml` |
//!
//! A base environment path that does not exist is treated as empty.
//! A document without `resources` or an unreadable template is fatal.
//!
//! ## Key Types
//!
//! - [`StackDocument`] - Parsed document, builds [`crate::domain::Stack`]s
//! - [`Config`] - Global and project configuration

mod config;
mod document;
mod environment;

pub use config::{BackendConfig, Config, ConfigError, ConfigFile, OutputCollision, RunConfig, PROJECT_CONFIG_FILE};
pub use document::{allow_list, template_parameters, DocumentError, ResourceSpec, StackDocument};
pub use environment::{load_base_environment, merge, parse_base_environment, EnvironmentError};
