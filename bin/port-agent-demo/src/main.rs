//! Thin entry point; all behavior lives in [`run`].

mod cli;

use std::process::ExitCode;

fn main() -> ExitCode {
    match cli::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("port-agent-demo: {error}");
            ExitCode::FAILURE
        }
    }
}
