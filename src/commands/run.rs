//! Implementation of the `taglock run` and `taglock protect` commands.

use super::child;
use crate::autoscaling::{ensure_healthy, protect};
use crate::cli::{ProtectArgs, RunArgs};
use crate::context::Context;
use crate::error::{LockingFailure, Result, TagLockError};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Execute the `taglock run` command.
///
/// Order of operations:
/// 1. Health gate (when an autoscaling document is configured)
/// 2. Acquire the lock
/// 3. Set scale-in protection
/// 4. Run the command, renewing the lock if `--renew-every` is set
/// 5. Restore protection, then release the lock
///
/// Step 5 also runs when a later step fails. Returns the command's exit code.
pub fn cmd_run(ctx: &Context, args: RunArgs) -> Result<i32> {
    let argv = child::argv(&args.child)?;
    let engine = ctx.engine();
    let autoscaling = ctx.autoscaling();
    let lease = args.lease.unwrap_or(ctx.config.lease_seconds);
    let timeout = args
        .timeout
        .map(Duration::from_secs)
        .unwrap_or_else(|| ctx.config.timeout());

    if ctx.config.check_health
        && !args.no_health_check
        && let Some(client) = &autoscaling
    {
        ensure_healthy(client, &args.name)?;
    }

    let mut guard = engine.lock(&args.name, &ctx.owner, lease, timeout)?;

    let protection = match &autoscaling {
        Some(client) if ctx.config.protect_while_locked && !args.no_protect => {
            Some(protect(client, true)?)
        }
        _ => None,
    };

    info!(lock = %args.name, command = %argv.join(" "), "running command under lock");
    let mut process = child::spawn(&argv)?;
    let every = args.renew_every.map(Duration::from_secs);
    let status = child::wait_with_heartbeat(&mut process, every, || {
        match engine.refresh(&mut guard) {
            Ok(()) => {
                debug!(lock = %args.name, "lock renewed while command runs");
                true
            }
            // Transient; the next beat may still renew within the lease.
            Err(e @ TagLockError::Store(_)) => {
                warn!(lock = %args.name, error = %e, "failed to renew lock; will retry");
                true
            }
            Err(e) if matches!(e.locking_failure(), Some(LockingFailure::LockLost { .. })) => {
                error!(
                    lock = %args.name,
                    error = %e,
                    "lock lost while command is running; no longer renewing"
                );
                false
            }
            Err(e) => {
                error!(lock = %args.name, error = %e, "failed to renew lock; no longer renewing");
                false
            }
        }
    })?;

    if let Some(protection) = protection {
        protection.exit();
    }
    guard.exit();

    let code = child::exit_code(status);
    info!(lock = %args.name, exit_code = code, "command finished");
    Ok(code)
}

/// Execute the `taglock protect` command.
pub fn cmd_protect(ctx: &Context, args: ProtectArgs) -> Result<i32> {
    let argv = child::argv(&args.child)?;
    let Some(client) = ctx.autoscaling() else {
        return Err(TagLockError::UserError(
            "protect needs an autoscaling status document; set autoscaling_file in the config"
                .to_string(),
        ));
    };

    let guard = protect(&client, !args.unprotect)?;
    let mut process = child::spawn(&argv)?;
    let status = child::wait_with_heartbeat(&mut process, None, || true)?;
    guard.exit();

    Ok(child::exit_code(status))
}
