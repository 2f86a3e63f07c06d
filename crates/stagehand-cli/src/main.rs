//! Binary entrypoint for the Stagehand front end.
//!
//! Delegates to [`stagehand_cli::run`], which loads configuration, starts the
//! worker, and executes one subcommand against it.

use std::io;
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut stdout = io::stdout().lock();
    let mut stderr = io::stderr().lock();
    stagehand_cli::run(std::env::args_os(), &mut stdout, &mut stderr)
}
