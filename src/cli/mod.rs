//! # Command-Line Interface
//!
//! User-facing CLI commands and output formatting.
//!
//! ## Commands
//!
//! | Command | Purpose | Contacts backend |
//! |---------|---------|------------------|
//! | `apply` | Resolve, collect, propagate and create/update every stack | yes (`--noop` skips create/update) |
//! | `check` | Show stacks, filtered environments and ordering warnings | no |
//!
//! ## Pass-through Arguments
//!
//! Everything after the name prefix is forwarded to every create/update:
//! ```bash
//! chunk-stack apply -t stacks.yaml -e env.json prod- -- --wait
//! ```
//!
//! ## Output Formats
//!
//! All commands support `--format` flag:
//! - `text` (default) - Human-readable output
//! - `json` - Machine-parseable JSON
//!
//! ## Verbose Mode
//!
//! Use `--verbose` (or `-v`) for phase-by-phase debug output on stderr.
//!
//! ## Entry Point
//!
//! Call [`run()`] to parse arguments and execute the appropriate command.

mod app;
mod apply;
mod check;
mod output;

pub use app::{Cli, Commands, run};
pub use output::{Output, OutputFormat};
