//! In-memory backend for tests
//!
//! Keeps stacks in a map, records every call and turns a successful create
//! into an existing stack so a second run sees it.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

use super::protocol::{ApplyRequest, BackendError};
use super::Backend;
use crate::domain::ApplyMode;

/// A recorded apply call
#[derive(Debug, Clone)]
pub struct AppliedCall {
    pub mode: ApplyMode,
    pub template: String,
    pub full_name: String,
    pub payload: serde_json::Value,
    pub passthrough: Vec<String>,
    pub had_environment_file: bool,
}

#[derive(Debug, Clone)]
struct FakeStack {
    id: String,
    outputs: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Default)]
pub struct FakeBackend {
    stacks: RefCell<BTreeMap<String, FakeStack>>,
    applied: RefCell<Vec<AppliedCall>>,
    lookups: Cell<usize>,
    output_queries: Cell<usize>,
    fail_lookups: bool,
    fail_outputs: bool,
    fail_applies_for: Option<Vec<String>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an existing stack with string outputs
    pub fn with_stack(self, full_name: &str, outputs: &[(&str, &str)]) -> Self {
        let id = format!("id-{}", full_name);
        let outputs = outputs
            .iter()
            .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.to_string())))
            .collect();
        self.stacks
            .borrow_mut()
            .insert(full_name.to_string(), FakeStack { id, outputs });
        self
    }

    pub fn failing_lookups(mut self) -> Self {
        self.fail_lookups = true;
        self
    }

    pub fn failing_outputs(mut self) -> Self {
        self.fail_outputs = true;
        self
    }

    /// Every apply fails
    pub fn failing_applies(mut self) -> Self {
        self.fail_applies_for = Some(Vec::new());
        self
    }

    /// Applies for these full names fail
    pub fn failing_applies_for(mut self, names: &[&str]) -> Self {
        self.fail_applies_for = Some(names.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn applied(&self) -> Vec<AppliedCall> {
        self.applied.borrow().clone()
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.get()
    }

    pub fn output_query_count(&self) -> usize {
        self.output_queries.get()
    }

    fn apply_fails(&self, full_name: &str) -> bool {
        match &self.fail_applies_for {
            None => false,
            Some(names) if names.is_empty() => true,
            Some(names) => names.iter().any(|n| n == full_name),
        }
    }
}

impl Backend for FakeBackend {
    fn lookup(&self, full_name: &str) -> Result<String, BackendError> {
        self.lookups.set(self.lookups.get() + 1);

        if self.fail_lookups {
            return Err(BackendError::CommandFailed {
                program: "fake".into(),
                status: "exit status: 1".into(),
                stderr: "service unavailable".into(),
            });
        }

        self.stacks
            .borrow()
            .get(full_name)
            .map(|s| s.id.clone())
            .ok_or_else(|| BackendError::NotFound(full_name.to_string()))
    }

    fn get_outputs(
        &self,
        remote_id: &str,
    ) -> Result<BTreeMap<String, serde_json::Value>, BackendError> {
        self.output_queries.set(self.output_queries.get() + 1);

        if self.fail_outputs {
            return Err(BackendError::InvalidResponse {
                program: "fake".into(),
                reason: "garbled outputs".into(),
            });
        }

        self.stacks
            .borrow()
            .values()
            .find(|s| s.id == remote_id)
            .map(|s| s.outputs.clone())
            .ok_or_else(|| BackendError::NotFound(remote_id.to_string()))
    }

    fn apply(&self, request: &ApplyRequest<'_>) -> Result<(), BackendError> {
        self.applied.borrow_mut().push(AppliedCall {
            mode: request.mode,
            template: request.template.to_string(),
            full_name: request.full_name.to_string(),
            payload: request.payload.clone(),
            passthrough: request.passthrough.to_vec(),
            had_environment_file: request
                .environment_file
                .map(|p| p.is_file())
                .unwrap_or(false),
        });

        if self.apply_fails(request.full_name) {
            return Err(BackendError::CommandFailed {
                program: "fake".into(),
                status: "exit status: 1".into(),
                stderr: format!("could not apply {}", request.full_name),
            });
        }

        let mut stacks = self.stacks.borrow_mut();
        stacks
            .entry(request.full_name.to_string())
            .or_insert_with(|| FakeStack {
                id: format!("id-{}", request.full_name),
                outputs: BTreeMap::new(),
            });
        Ok(())
    }
}
