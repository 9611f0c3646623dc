//! Stack entity
//!
//! A stack is one orchestration unit: a template, the environment it will be
//! applied with, and the outputs/inputs that tie it to other stacks in the
//! same document.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::pool::OutputPool;
use crate::backend::{Backend, BackendError};

/// Parameter name -> value, as sent to the backend under `parameters`
pub type Environment = BTreeMap<String, serde_json::Value>;

/// Extra names a propagated input is written under
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasRule {
    /// Names that receive a copy of the input value
    #[serde(default)]
    pub aliases: Vec<String>,

    /// Drop the original input key once the aliases are written
    #[serde(default)]
    pub rename: bool,
}

/// Whether the backend already manages this stack
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RemoteState {
    /// No lookup has happened yet this run
    #[default]
    Unresolved,

    /// Looked up; the backend has no such stack (or the lookup failed)
    Absent,

    /// Looked up; the backend knows it under this id
    Exists(String),
}

/// Backend operation chosen for a stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyMode {
    Create,
    Update,
}

impl ApplyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplyMode::Create => "create",
            ApplyMode::Update => "update",
        }
    }
}

impl std::fmt::Display for ApplyMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One stack from the document
#[derive(Debug, Clone)]
pub struct Stack {
    /// Resource name, unique within the document
    pub name: String,

    /// Run prefix prepended to `name` on the backend
    pub prefix: String,

    /// Path to the stack's own template
    pub template: String,

    /// Parameters sent with create/update
    pub environment: Environment,

    /// Outputs published into the pool
    pub outputs: Vec<String>,

    /// Parameters filled from the pool
    pub inputs: Vec<String>,

    /// Alias rules keyed by input name
    pub aliases: BTreeMap<String, AliasRule>,

    remote: RemoteState,
}

impl Stack {
    pub fn new(
        name: impl Into<String>,
        prefix: impl Into<String>,
        template: impl Into<String>,
        environment: Environment,
    ) -> Self {
        Self {
            name: name.into(),
            prefix: prefix.into(),
            template: template.into(),
            environment,
            outputs: Vec::new(),
            inputs: Vec::new(),
            aliases: BTreeMap::new(),
            remote: RemoteState::Unresolved,
        }
    }

    pub fn with_outputs(mut self, outputs: Vec<String>) -> Self {
        self.outputs = outputs;
        self
    }

    pub fn with_inputs(mut self, inputs: Vec<String>) -> Self {
        self.inputs = inputs;
        self
    }

    pub fn with_aliases(mut self, aliases: BTreeMap<String, AliasRule>) -> Self {
        self.aliases = aliases;
        self
    }

    /// Name used against the backend
    pub fn full_name(&self) -> String {
        format!("{}{}", self.prefix, self.name)
    }

    pub fn remote_state(&self) -> &RemoteState {
        &self.remote
    }

    /// Backend id, if the stack already exists
    pub fn remote_id(&self) -> Option<&str> {
        match &self.remote {
            RemoteState::Exists(id) => Some(id),
            _ => None,
        }
    }

    /// Create when the backend has no record of the stack, update otherwise
    pub fn apply_mode(&self) -> ApplyMode {
        if self.remote_id().is_some() {
            ApplyMode::Update
        } else {
            ApplyMode::Create
        }
    }

    /// Looks up the backend id once per run.
    ///
    /// A missing stack is not an error. Any other failure marks the stack as
    /// absent (so it will be created) and is handed back for logging.
    pub fn resolve_remote_id(&mut self, backend: &dyn Backend) -> Result<(), BackendError> {
        if self.remote != RemoteState::Unresolved {
            return Ok(());
        }

        match backend.lookup(&self.full_name()) {
            Ok(id) => {
                self.remote = RemoteState::Exists(id);
                Ok(())
            }
            Err(BackendError::NotFound(_)) => {
                self.remote = RemoteState::Absent;
                Ok(())
            }
            Err(e) => {
                self.remote = RemoteState::Absent;
                Err(e)
            }
        }
    }

    /// Copies the declared outputs of an existing stack into the pool.
    ///
    /// Returns the names written. Outputs the backend does not report are skipped.
    pub fn fetch_outputs(
        &self,
        backend: &dyn Backend,
        pool: &mut OutputPool,
    ) -> Result<Vec<String>, BackendError> {
        let Some(id) = self.remote_id() else {
            return Ok(Vec::new());
        };
        if self.outputs.is_empty() {
            return Ok(Vec::new());
        }

        let mut fetched = backend.get_outputs(id)?;

        let mut written = Vec::new();
        for name in &self.outputs {
            if let Some(value) = fetched.remove(name) {
                pool.insert(name.clone(), value, &self.name);
                written.push(name.clone());
            }
        }
        Ok(written)
    }

    /// Fills declared inputs from the pool, then applies alias rules.
    ///
    /// Inputs missing from the pool become empty strings.
    pub fn apply_inputs(&mut self, pool: &OutputPool) {
        for input in &self.inputs {
            let value = pool
                .get(input)
                .cloned()
                .unwrap_or_else(|| serde_json::Value::String(String::new()));

            self.environment.insert(input.clone(), value.clone());

            if let Some(rule) = self.aliases.get(input) {
                for alias in &rule.aliases {
                    self.environment.insert(alias.clone(), value.clone());
                }
                if rule.rename {
                    self.environment.remove(input);
                }
            }
        }
    }

    /// Environment wrapped the way the backend expects it
    pub fn payload(&self) -> serde_json::Value {
        serde_json::json!({ "parameters": self.environment })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::FakeBackend;
    use serde_json::json;

    fn stack(name: &str) -> Stack {
        Stack::new(name, "demo-", format!("{}.yaml", name), Environment::new())
    }

    fn pool_with(entries: &[(&str, &str)]) -> OutputPool {
        let mut pool = OutputPool::new();
        for (k, v) in entries {
            pool.insert(k.to_string(), json!(v), "Producer");
        }
        pool
    }

    #[test]
    fn full_name_uses_prefix() {
        assert_eq!(stack("Parent").full_name(), "demo-Parent");
    }

    #[test]
    fn new_stack_creates() {
        let s = stack("Parent");
        assert_eq!(s.remote_state(), &RemoteState::Unresolved);
        assert_eq!(s.apply_mode(), ApplyMode::Create);
    }

    #[test]
    fn resolve_existing_stack() {
        let backend = FakeBackend::new().with_stack("demo-Parent", &[]);
        let mut s = stack("Parent");

        s.resolve_remote_id(&backend).unwrap();

        assert!(s.remote_id().is_some());
        assert_eq!(s.apply_mode(), ApplyMode::Update);
    }

    #[test]
    fn resolve_missing_stack_is_not_an_error() {
        let backend = FakeBackend::new();
        let mut s = stack("Parent");

        s.resolve_remote_id(&backend).unwrap();

        assert_eq!(s.remote_state(), &RemoteState::Absent);
        assert_eq!(s.apply_mode(), ApplyMode::Create);
    }

    #[test]
    fn resolve_failure_degrades_to_create() {
        let backend = FakeBackend::new().failing_lookups();
        let mut s = stack("Parent");

        assert!(s.resolve_remote_id(&backend).is_err());
        assert_eq!(s.remote_state(), &RemoteState::Absent);
        assert_eq!(s.apply_mode(), ApplyMode::Create);
    }

    #[test]
    fn resolve_looks_up_once() {
        let backend = FakeBackend::new();
        let mut s = stack("Parent");

        s.resolve_remote_id(&backend).unwrap();
        s.resolve_remote_id(&backend).unwrap();

        assert_eq!(backend.lookup_count(), 1);
    }

    #[test]
    fn fetch_outputs_writes_declared_outputs_only() {
        let backend = FakeBackend::new()
            .with_stack("demo-Parent", &[("output", "a special value"), ("other", "x")]);
        let mut s = stack("Parent").with_outputs(vec!["output".into(), "missing".into()]);
        s.resolve_remote_id(&backend).unwrap();

        let mut pool = OutputPool::new();
        let written = s.fetch_outputs(&backend, &mut pool).unwrap();

        assert_eq!(written, vec!["output".to_string()]);
        assert_eq!(pool.get("output"), Some(&json!("a special value")));
        assert!(pool.get("other").is_none());
    }

    #[test]
    fn fetch_outputs_skips_absent_stack() {
        let backend = FakeBackend::new();
        let mut s = stack("Parent").with_outputs(vec!["output".into()]);
        s.resolve_remote_id(&backend).unwrap();

        let mut pool = OutputPool::new();
        s.fetch_outputs(&backend, &mut pool).unwrap();

        assert!(pool.is_empty());
        assert_eq!(backend.output_query_count(), 0);
    }

    #[test]
    fn fetch_outputs_skips_stack_without_declared_outputs() {
        let backend = FakeBackend::new().with_stack("demo-Parent", &[("output", "v")]);
        let mut s = stack("Parent");
        s.resolve_remote_id(&backend).unwrap();

        let mut pool = OutputPool::new();
        s.fetch_outputs(&backend, &mut pool).unwrap();

        assert!(pool.is_empty());
        assert_eq!(backend.output_query_count(), 0);
    }

    #[test]
    fn apply_inputs_reads_pool() {
        let mut s = stack("Child").with_inputs(vec!["output".into()]);
        s.apply_inputs(&pool_with(&[("output", "a special value")]));

        assert_eq!(s.environment.get("output"), Some(&json!("a special value")));
    }

    #[test]
    fn apply_inputs_blanks_missing_values() {
        let mut s = stack("Child").with_inputs(vec!["output".into()]);
        s.apply_inputs(&OutputPool::new());

        assert_eq!(s.environment.get("output"), Some(&json!("")));
    }

    #[test]
    fn apply_inputs_overrides_base_environment() {
        let mut env = Environment::new();
        env.insert("output".into(), json!("from base"));
        let mut s = Stack::new("Child", "", "child.yaml", env).with_inputs(vec!["output".into()]);

        s.apply_inputs(&pool_with(&[("output", "from pool")]));

        assert_eq!(s.environment.get("output"), Some(&json!("from pool")));
    }

    #[test]
    fn alias_without_rename_keeps_original() {
        let mut aliases = BTreeMap::new();
        aliases.insert(
            "output".to_string(),
            AliasRule { aliases: vec!["copy_a".into(), "copy_b".into()], rename: false },
        );
        let mut s = stack("Child").with_inputs(vec!["output".into()]).with_aliases(aliases);

        s.apply_inputs(&pool_with(&[("output", "v")]));

        assert_eq!(s.environment.get("output"), Some(&json!("v")));
        assert_eq!(s.environment.get("copy_a"), Some(&json!("v")));
        assert_eq!(s.environment.get("copy_b"), Some(&json!("v")));
    }

    #[test]
    fn alias_with_rename_drops_original() {
        let mut aliases = BTreeMap::new();
        aliases.insert(
            "output".to_string(),
            AliasRule { aliases: vec!["renamed_output".into()], rename: true },
        );
        let mut s = stack("Child").with_inputs(vec!["output".into()]).with_aliases(aliases);

        s.apply_inputs(&pool_with(&[("output", "a special value")]));

        assert_eq!(s.environment.get("renamed_output"), Some(&json!("a special value")));
        assert!(!s.environment.contains_key("output"));
    }

    #[test]
    fn alias_for_undeclared_input_is_ignored() {
        let mut aliases = BTreeMap::new();
        aliases.insert(
            "unused".to_string(),
            AliasRule { aliases: vec!["never".into()], rename: true },
        );
        let mut s = stack("Child").with_aliases(aliases);

        s.apply_inputs(&pool_with(&[("unused", "v")]));

        assert!(s.environment.is_empty());
    }

    #[test]
    fn payload_wraps_parameters() {
        let mut env = Environment::new();
        env.insert("param1".into(), json!("x"));
        let s = Stack::new("Parent", "", "parent.yaml", env);

        assert_eq!(s.payload(), json!({"parameters": {"param1": "x"}}));
    }
}
