//! Command implementations for taglock.
//!
//! This module provides the dispatcher that routes CLI commands to their
//! implementations. Every command returns the process exit code on success;
//! errors carry their own exit code.

mod child;
mod lock;
mod run;
mod status;

use crate::cli::Command;
use crate::context::Context;
use crate::error::Result;

pub use lock::{cmd_acquire, cmd_release, cmd_renew};
pub use run::{cmd_protect, cmd_run};
pub use status::cmd_status;

/// Dispatch a command to its implementation.
pub fn dispatch(ctx: &Context, command: Command) -> Result<i32> {
    match command {
        Command::Acquire(args) => cmd_acquire(ctx, args),
        Command::Renew(args) => cmd_renew(ctx, args),
        Command::Release(args) => cmd_release(ctx, args),
        Command::Status(args) => cmd_status(ctx, args),
        Command::Run(args) => cmd_run(ctx, args),
        Command::Protect(args) => cmd_protect(ctx, args),
    }
}
