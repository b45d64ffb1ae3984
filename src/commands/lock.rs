//! Implementation of the `acquire`, `renew` and `release` commands.
//!
//! These operate on a lock across separate `taglock` invocations: the owner
//! id (by default `user@host`) is what ties a later `renew` or `release` to
//! an earlier `acquire`.

use crate::cli::{AcquireArgs, ReleaseArgs, RenewArgs};
use crate::clock::Clock;
use crate::context::Context;
use crate::error::Result;
use crate::exit_codes;
use crate::locks::{LockHandle, LockRecord, LockState, ReleaseOutcome, format_age};
use std::time::Duration;

/// Execute the `taglock acquire` command.
pub fn cmd_acquire(ctx: &Context, args: AcquireArgs) -> Result<i32> {
    let engine = ctx.engine();
    let lease = args.lease.unwrap_or(ctx.config.lease_seconds);
    let timeout = args
        .timeout
        .map(Duration::from_secs)
        .unwrap_or_else(|| ctx.config.timeout());

    let handle = engine.acquire(&args.name, &ctx.owner, lease, timeout)?;

    println!("Acquired lock '{}'", handle.name());
    print_record(engine.resource_id(), handle.record());
    Ok(exit_codes::SUCCESS)
}

/// Execute the `taglock renew` command.
pub fn cmd_renew(ctx: &Context, args: RenewArgs) -> Result<i32> {
    let engine = ctx.engine();
    let now = engine.clock().now();

    let lease = match args.lease {
        Some(lease) => lease,
        None => match engine.inspect(&args.name)? {
            LockState::HeldFresh(record) | LockState::HeldStale(record) => record.lease_seconds,
            LockState::Free | LockState::Malformed(_) => ctx.config.lease_seconds,
        },
    };

    let held = LockHandle::new(&args.name, LockRecord::new(&ctx.owner, now, lease));
    let handle = engine.renew(&held)?;

    println!("Renewed lock '{}'", handle.name());
    print_record(engine.resource_id(), handle.record());
    Ok(exit_codes::SUCCESS)
}

/// Execute the `taglock release` command.
///
/// Exits successfully when the lock is gone afterwards, whether or not this
/// invocation deleted it.
pub fn cmd_release(ctx: &Context, args: ReleaseArgs) -> Result<i32> {
    let engine = ctx.engine();
    let record = LockRecord::new(&ctx.owner, engine.clock().now(), ctx.config.lease_seconds);

    match engine.release(LockHandle::new(&args.name, record)) {
        ReleaseOutcome::Released => {
            println!("Released lock '{}'", args.name);
            Ok(exit_codes::SUCCESS)
        }
        ReleaseOutcome::AlreadyReleased => {
            println!("Lock '{}' is not held", args.name);
            Ok(exit_codes::SUCCESS)
        }
        ReleaseOutcome::NotOwner { current_owner } => {
            println!(
                "Lock '{}' is held by {}; left in place",
                args.name,
                current_owner.as_deref().unwrap_or("an unreadable record")
            );
            Ok(exit_codes::LOCK_FAILURE)
        }
        ReleaseOutcome::Failed(reason) => {
            eprintln!("Failed to release lock '{}': {}", args.name, reason);
            Ok(exit_codes::STORE_FAILURE)
        }
    }
}

fn print_record(resource_id: &str, record: &LockRecord) {
    println!("  Resource:   {}", resource_id);
    println!("  Owner:      {}", record.owner_id);
    println!(
        "  Acquired:   {}",
        record.acquired_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!(
        "  Lease:      {} ({}s)",
        format_age(chrono::Duration::seconds(record.lease_seconds as i64)),
        record.lease_seconds
    );
    println!(
        "  Expires:    {}",
        record.expires_at().format("%Y-%m-%d %H:%M:%S UTC")
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::error::TagLockError;
    use crate::store::TagStore;
    use tempfile::TempDir;

    fn context(temp_dir: &TempDir, owner: &str) -> Context {
        let config = Config {
            resource_id: "i-test".to_string(),
            store_dir: temp_dir.path().join("tags"),
            owner: Some(owner.to_string()),
            lease_seconds: 60,
            ..Config::default()
        };
        Context::from_config(config).unwrap()
    }

    fn acquire_args(name: &str) -> AcquireArgs {
        AcquireArgs {
            name: name.to_string(),
            lease: None,
            timeout: None,
        }
    }

    #[test]
    fn test_acquire_then_release_across_invocations() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = context(&temp_dir, "ci@runner");

        assert_eq!(cmd_acquire(&ctx, acquire_args("deploy")).unwrap(), exit_codes::SUCCESS);
        assert!(ctx.store().read("i-test").unwrap().contains_key("deploy"));

        let code = cmd_release(
            &ctx,
            ReleaseArgs {
                name: "deploy".to_string(),
            },
        )
        .unwrap();
        assert_eq!(code, exit_codes::SUCCESS);
        assert!(ctx.store().read("i-test").unwrap().is_empty());
    }

    #[test]
    fn test_acquire_held_lock_fails_with_lock_exit_code() {
        let temp_dir = TempDir::new().unwrap();
        cmd_acquire(&context(&temp_dir, "a@host"), acquire_args("deploy")).unwrap();

        let err = cmd_acquire(&context(&temp_dir, "b@host"), acquire_args("deploy")).unwrap_err();
        assert!(matches!(err, TagLockError::ResourceLocking { .. }));
        assert_eq!(err.exit_code(), exit_codes::LOCK_FAILURE);
    }

    #[test]
    fn test_release_of_foreign_lock_leaves_it() {
        let temp_dir = TempDir::new().unwrap();
        let holder = context(&temp_dir, "a@host");
        cmd_acquire(&holder, acquire_args("deploy")).unwrap();

        let code = cmd_release(
            &context(&temp_dir, "b@host"),
            ReleaseArgs {
                name: "deploy".to_string(),
            },
        )
        .unwrap();

        assert_eq!(code, exit_codes::LOCK_FAILURE);
        assert!(holder.store().read("i-test").unwrap().contains_key("deploy"));
    }

    #[test]
    fn test_renew_keeps_current_lease_unless_overridden() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = context(&temp_dir, "a@host");
        cmd_acquire(
            &ctx,
            AcquireArgs {
                name: "deploy".to_string(),
                lease: Some(90),
                timeout: None,
            },
        )
        .unwrap();

        let renew = |lease| {
            cmd_renew(
                &ctx,
                RenewArgs {
                    name: "deploy".to_string(),
                    lease,
                },
            )
        };
        let lease_of = || match ctx.engine().inspect("deploy").unwrap() {
            LockState::HeldFresh(record) => record.lease_seconds,
            other => panic!("unexpected state: {:?}", other),
        };

        renew(None).unwrap();
        assert_eq!(lease_of(), 90);
        renew(Some(30)).unwrap();
        assert_eq!(lease_of(), 30);
    }

    #[test]
    fn test_renew_of_foreign_lock_fails() {
        let temp_dir = TempDir::new().unwrap();
        cmd_acquire(&context(&temp_dir, "a@host"), acquire_args("deploy")).unwrap();

        let err = cmd_renew(
            &context(&temp_dir, "b@host"),
            RenewArgs {
                name: "deploy".to_string(),
                lease: None,
            },
        )
        .unwrap_err();
        assert!(err.to_string().contains("taken over by a@host"));
    }
}
