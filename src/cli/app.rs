//! Main CLI application structure

use clap::{Parser, Subcommand};
use anyhow::Result;

use super::output::{Output, OutputFormat};
use super::{apply, check};

#[derive(Parser)]
#[command(name = "chunk-stack")]
#[command(author, version, about = "Create or update a chain of dependent orchestration stacks")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Enable verbose output for debugging
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create or update every stack in a document
    Apply(apply::ApplyArgs),

    /// Load a document and show its stacks without contacting the backend
    Check(check::CheckArgs),
}

/// Main entry point for the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(cli.format, cli.verbose);

    output.verbose("chunk-stack starting");

    match cli.command {
        Commands::Apply(args) => apply::run(args, &output)?,
        Commands::Check(args) => check::run(args, &output)?,
    }

    output.verbose("Command completed successfully");
    Ok(())
}
