//! chunk-stack - create or update chains of dependent orchestration stacks

use std::process::ExitCode;

fn main() -> ExitCode {
    if let Err(e) = chunk_stack::cli::run() {
        eprintln!("Error: {:#}", e);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
