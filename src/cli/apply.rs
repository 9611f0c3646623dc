//! Apply command - runs every stack in a document through the backend

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use super::output::Output;
use crate::backend::{ApplyDispatcher, ApplyOutcome, CommandBackend};
use crate::domain::ApplyMode;
use crate::engine::{GraphExecutor, RunOptions, RunPlan, RunReport};
use crate::storage::{Config, OutputCollision};

#[derive(Args, Debug)]
pub struct ApplyArgs {
    /// Stack document (YAML with a `resources` mapping)
    #[arg(long = "template-file", short = 't')]
    pub template_file: PathBuf,

    /// Base environment file; ignored if it does not exist
    #[arg(long, short = 'e')]
    pub environment: Option<PathBuf>,

    /// Print the backend commands instead of running them
    #[arg(long)]
    pub noop: bool,

    /// Refuse to run when two stacks declare the same output
    #[arg(long)]
    pub strict_outputs: bool,

    /// Orchestration CLI to run (overrides config)
    #[arg(long, env = "CHUNK_STACK_BACKEND")]
    pub backend: Option<String>,

    /// Prefix prepended to every stack name on the backend
    pub name: String,

    /// Arguments forwarded to every create/update
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub passthrough: Vec<String>,
}

pub fn run(args: ApplyArgs, output: &Output) -> Result<()> {
    let config = Config::load()?;
    if let Some(path) = &config.project_file {
        output.verbose_ctx("config", &format!("Using {}", path.display()));
    }

    let environment = args.environment.clone().or(config.run.environment.clone());
    let collision = if args.strict_outputs {
        OutputCollision::Fail
    } else {
        config.run.output_collision
    };

    output.verbose_ctx(
        "apply",
        &format!(
            "document={}, environment={:?}, prefix={:?}, collisions={}",
            args.template_file.display(),
            environment,
            args.name,
            collision.as_str()
        ),
    );

    let mut plan = RunPlan::load(&args.template_file, environment.as_deref(), &args.name, collision)
        .with_context(|| format!("Failed to load {}", args.template_file.display()))?;

    for warning in &plan.warnings {
        output.warn(&warning.to_string());
    }
    if !plan.is_ordered() {
        if let Some(order) = &plan.suggested_order {
            output.warn(&format!("declare stacks as: {}", order.join(", ")));
        }
    }

    let program = args.backend.clone().unwrap_or(config.backend.program.clone());
    let backend = CommandBackend::new(&program).with_extra_args(config.backend.extra_args.clone());
    output.verbose_ctx("apply", &format!("Backend program: {}", program));

    let options = RunOptions {
        dry_run: args.noop,
        passthrough: args.passthrough.clone(),
    };
    let report = GraphExecutor::new(&backend, options).run_with(&mut plan.stacks, |phase, stack| {
        output.verbose_ctx(&phase.to_string(), &stack.full_name());
    });

    if output.is_json() {
        output.data(&serde_json::json!({
            "prefix": plan.prefix,
            "warnings": plan.warnings,
            "report": report,
        }));
    } else {
        print_report(output, &report);
    }

    let failures = report.failures();
    if !failures.is_empty() {
        anyhow::bail!(
            "{} of {} stacks failed to apply",
            failures.len(),
            report.stacks.len()
        );
    }

    Ok(())
}

fn print_report(output: &Output, report: &RunReport) {
    for stack in &report.stacks {
        for diagnostic in &stack.diagnostics {
            output.warn(&format!("{}: {}", stack.full_name, diagnostic));
        }
    }
    for overwrite in &report.overwrites {
        output.warn(&format!(
            "output '{}' from {} replaced the value from {}",
            overwrite.output, overwrite.current, overwrite.previous
        ));
    }

    for stack in &report.stacks {
        match &stack.outcome {
            ApplyOutcome::Planned { command } => println!("{}", command),
            ApplyOutcome::Applied => {
                output.verbose_ctx("apply", &format!("{} {}d", stack.full_name, stack.mode))
            }
            ApplyOutcome::Failed { error, environment } => eprintln!(
                "{}",
                ApplyDispatcher::failure_diagnostic(&stack.full_name, error, environment)
            ),
        }
    }

    if report.dry_run {
        return;
    }

    let applied: Vec<_> = report
        .stacks
        .iter()
        .filter(|s| s.outcome == ApplyOutcome::Applied)
        .collect();
    let created = applied.iter().filter(|s| s.mode == ApplyMode::Create).count();
    output.success(&format!(
        "Applied {} of {} stacks ({} created, {} updated)",
        applied.len(),
        report.stacks.len(),
        created,
        applied.len() - created
    ));
}
