//! Graph executor
//!
//! Runs the four phases over all stacks in declaration order:
//!
//! 1. resolve - look up each stack's backend id
//! 2. collect - copy declared outputs of existing stacks into the pool
//! 3. propagate - fill declared inputs from the pool
//! 4. apply - create or update each stack
//!
//! Each phase finishes for every stack before the next one starts, so every
//! stack reads the same, complete pool. Per-stack backend failures are
//! recorded in the report and never stop the run.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::backend::{ApplyDispatcher, ApplyOutcome, Backend};
use crate::domain::{ApplyMode, Environment, OutputPool, Overwrite, Stack};

/// Executor phase, in run order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Resolve,
    Collect,
    Propagate,
    Apply,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Resolve => "resolve",
            Phase::Collect => "collect",
            Phase::Propagate => "propagate",
            Phase::Apply => "apply",
        };
        f.write_str(name)
    }
}

/// A failure the run recovered from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// Lookup failed for a reason other than "not found"; the stack will be created
    LookupFailed { error: String },

    /// Outputs could not be read; the stack published nothing this run
    OutputFetchFailed { error: String },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::LookupFailed { error } => {
                write!(f, "lookup failed, treating as new: {}", error)
            }
            Diagnostic::OutputFetchFailed { error } => {
                write!(f, "could not fetch outputs: {}", error)
            }
        }
    }
}

/// Run switches
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Render applies instead of running them
    pub dry_run: bool,

    /// Forwarded verbatim to every apply
    pub passthrough: Vec<String>,
}

/// What happened to one stack
#[derive(Debug, Clone, Serialize)]
pub struct StackReport {
    pub name: String,
    pub full_name: String,
    pub template: String,
    pub mode: ApplyMode,
    pub remote_id: Option<String>,

    /// Outputs this stack wrote into the pool
    pub published: Vec<String>,

    pub diagnostics: Vec<Diagnostic>,
    pub outcome: ApplyOutcome,

    /// Environment after input propagation
    pub environment: Environment,
}

/// Result of one run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub stacks: Vec<StackReport>,

    /// Pool writes that replaced another stack's value
    pub overwrites: Vec<Overwrite>,

    /// Final pool contents
    pub pool: BTreeMap<String, serde_json::Value>,
}

impl RunReport {
    /// Stacks whose apply failed
    pub fn failures(&self) -> Vec<&StackReport> {
        self.stacks.iter().filter(|s| s.outcome.is_failure()).collect()
    }

    pub fn has_failures(&self) -> bool {
        self.stacks.iter().any(|s| s.outcome.is_failure())
    }

    pub fn stack(&self, name: &str) -> Option<&StackReport> {
        self.stacks.iter().find(|s| s.name == name)
    }
}

/// Drives the phases against a backend
pub struct GraphExecutor<'a> {
    backend: &'a dyn Backend,
    options: RunOptions,
}

impl<'a> GraphExecutor<'a> {
    pub fn new(backend: &'a dyn Backend, options: RunOptions) -> Self {
        Self { backend, options }
    }

    /// Runs all phases with no progress callback
    pub fn run(&self, stacks: &mut [Stack]) -> RunReport {
        self.run_with(stacks, |_, _| {})
    }

    /// Runs all phases, calling `progress` before each stack in each phase
    pub fn run_with<F>(&self, stacks: &mut [Stack], mut progress: F) -> RunReport
    where
        F: FnMut(Phase, &Stack),
    {
        let started_at = Utc::now();
        let mut diagnostics: Vec<Vec<Diagnostic>> = vec![Vec::new(); stacks.len()];
        let mut published: Vec<Vec<String>> = vec![Vec::new(); stacks.len()];

        for (stack, diags) in stacks.iter_mut().zip(diagnostics.iter_mut()) {
            progress(Phase::Resolve, &*stack);
            if let Err(e) = stack.resolve_remote_id(self.backend) {
                diags.push(Diagnostic::LookupFailed {
                    error: e.to_string(),
                });
            }
        }

        // Fresh pool per run
        let mut pool = OutputPool::new();
        for ((stack, diags), written) in stacks
            .iter()
            .zip(diagnostics.iter_mut())
            .zip(published.iter_mut())
        {
            progress(Phase::Collect, stack);
            match stack.fetch_outputs(self.backend, &mut pool) {
                Ok(names) => *written = names,
                Err(e) => diags.push(Diagnostic::OutputFetchFailed {
                    error: e.to_string(),
                }),
            }
        }

        for stack in stacks.iter_mut() {
            progress(Phase::Propagate, &*stack);
            stack.apply_inputs(&pool);
        }

        let dispatcher =
            ApplyDispatcher::new(self.backend, &self.options.passthrough, self.options.dry_run);
        let mut reports = Vec::with_capacity(stacks.len());
        for ((stack, diagnostics), published) in stacks.iter().zip(diagnostics).zip(published) {
            progress(Phase::Apply, stack);
            let outcome = dispatcher.dispatch(stack);
            reports.push(StackReport {
                name: stack.name.clone(),
                full_name: stack.full_name(),
                template: stack.template.clone(),
                mode: stack.apply_mode(),
                remote_id: stack.remote_id().map(str::to_string),
                published,
                diagnostics,
                outcome,
                environment: stack.environment.clone(),
            });
        }

        RunReport {
            dry_run: self.options.dry_run,
            started_at,
            finished_at: Utc::now(),
            stacks: reports,
            overwrites: pool.overwrites().to_vec(),
            pool: pool.values(),
        }
    }
}
