//! taglock: tag-based distributed locks for cloud instances.
//!
//! This is the main entry point for the `taglock` CLI. It parses arguments,
//! sets up logging, dispatches to the appropriate command handler, and maps
//! errors to exit codes.

use std::process::ExitCode;
use taglock::cli::Cli;
use taglock::context::Context;
use taglock::{commands, logging};

fn main() -> ExitCode {
    let cli = Cli::parse_args();
    logging::init(cli.global.verbose);

    let result = Context::resolve(&cli.global).and_then(|ctx| commands::dispatch(&ctx, cli.command));

    match result {
        Ok(code) => ExitCode::from(code.clamp(0, 255) as u8),
        Err(err) => {
            // Print user-actionable error message to stderr
            eprintln!("Error: {}", err);

            ExitCode::from(err.exit_code() as u8)
        }
    }
}
