//! Check command - shows what a run would work with, offline

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use super::output::Output;
use crate::domain::{Stack, StackGraph};
use crate::engine::RunPlan;
use crate::storage::{Config, OutputCollision};

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Stack document (YAML with a `resources` mapping)
    #[arg(long = "template-file", short = 't')]
    pub template_file: PathBuf,

    /// Base environment file; ignored if it does not exist
    #[arg(long, short = 'e')]
    pub environment: Option<PathBuf>,

    /// Treat duplicate outputs as an error
    #[arg(long)]
    pub strict_outputs: bool,

    /// Prefix prepended to every stack name on the backend
    #[arg(default_value = "")]
    pub name: String,
}

pub fn run(args: CheckArgs, output: &Output) -> Result<()> {
    let config = Config::load()?;
    let environment = args.environment.clone().or(config.run.environment.clone());
    let collision = if args.strict_outputs {
        OutputCollision::Fail
    } else {
        config.run.output_collision
    };

    let plan = RunPlan::load(&args.template_file, environment.as_deref(), &args.name, collision)
        .with_context(|| format!("Failed to load {}", args.template_file.display()))?;
    output.verbose_ctx("check", &format!("Loaded {} stacks", plan.stacks.len()));
    let graph = StackGraph::from_stacks(&plan.stacks);

    if output.is_json() {
        let stacks: Vec<_> = plan.stacks.iter().map(|s| stack_json(s, &graph)).collect();
        output.data(&serde_json::json!({
            "prefix": plan.prefix,
            "stacks": stacks,
            "warnings": plan.warnings,
            "suggested_order": plan.suggested_order,
        }));
        return Ok(());
    }

    for stack in &plan.stacks {
        print_stack(stack, &graph);
    }

    if plan.warnings.is_empty() {
        println!("No ordering problems found");
        println!("Inputs only receive outputs of stacks that exist before the run starts");
    } else {
        println!("Warnings:");
        for warning in &plan.warnings {
            println!("  {}", warning);
        }
        if !plan.is_ordered() {
            if let Some(order) = &plan.suggested_order {
                println!();
                println!("Suggested order: {}", order.join(", "));
            }
        }
    }

    Ok(())
}

fn list(items: &[String]) -> String {
    if items.is_empty() {
        "-".to_string()
    } else {
        items.join(", ")
    }
}

fn print_stack(stack: &Stack, graph: &StackGraph) {
    let parameters: Vec<String> = stack.environment.keys().cloned().collect();
    let aliases: Vec<String> = stack
        .aliases
        .iter()
        .map(|(input, rule)| {
            format!(
                "{} -> {}{}",
                input,
                rule.aliases.join("/"),
                if rule.rename { " (rename)" } else { "" }
            )
        })
        .collect();

    println!("{} ({})", stack.name, stack.full_name());
    println!("  template:   {}", stack.template);
    println!("  parameters: {}", list(&parameters));
    println!("  outputs:    {}", list(&stack.outputs));
    println!("  inputs:     {}", list(&stack.inputs));
    println!("  aliases:    {}", list(&aliases));
    println!("  reads from: {}", list(&graph.producers_of(&stack.name)));
    println!("  feeds:      {}", list(&graph.consumers_of(&stack.name)));
    println!();
}

fn stack_json(stack: &Stack, graph: &StackGraph) -> serde_json::Value {
    serde_json::json!({
        "name": stack.name,
        "full_name": stack.full_name(),
        "template": stack.template,
        "environment": stack.environment,
        "outputs": stack.outputs,
        "inputs": stack.inputs,
        "aliases": stack.aliases,
        "reads_from": graph.producers_of(&stack.name),
        "feeds": graph.consumers_of(&stack.name),
    })
}
