//! Implementation of the `taglock status` command.
//!
//! Lists the lock records on the resource, optionally filtered by a glob on
//! the lock name, and highlights stale ones.

use crate::cli::StatusArgs;
use crate::context::Context;
use crate::error::{Result, TagLockError};
use crate::exit_codes;
use crate::locks::LockInfo;
use globset::Glob;

/// Execute the `taglock status` command.
pub fn cmd_status(ctx: &Context, args: StatusArgs) -> Result<i32> {
    let engine = ctx.engine();
    let locks = filter_locks(engine.list()?, args.filter.as_deref())?;

    if locks.is_empty() {
        println!("No locks on {}.", engine.resource_id());
        return Ok(exit_codes::SUCCESS);
    }

    println!("Locks on {} ({}):", engine.resource_id(), locks.len());
    println!();

    for lock in &locks {
        println!("  {}:", lock.name);
        println!("    Owner:      {}", lock.record.owner_id);
        println!(
            "    Acquired:   {}",
            lock.record.acquired_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
        println!("    Age:        {}", crate::locks::format_age(lock.age));
        println!(
            "    Expires:    {}",
            lock.record.expires_at().format("%Y-%m-%d %H:%M:%S UTC")
        );
        if lock.is_stale {
            println!("    Status:     STALE (lease expired; can be stolen)");
        }
        println!();
    }

    let stale_count = locks.iter().filter(|l| l.is_stale).count();
    if stale_count > 0 {
        println!("{} stale lock(s).", stale_count);
    }

    Ok(exit_codes::SUCCESS)
}

/// Keep only locks whose names match `pattern`.
pub(crate) fn filter_locks(locks: Vec<LockInfo>, pattern: Option<&str>) -> Result<Vec<LockInfo>> {
    let Some(pattern) = pattern else {
        return Ok(locks);
    };

    let matcher = Glob::new(pattern)
        .map_err(|e| {
            TagLockError::UserError(format!("invalid --filter glob '{}': {}", pattern, e))
        })?
        .compile_matcher();

    Ok(locks
        .into_iter()
        .filter(|lock| matcher.is_match(&lock.name))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locks::LockRecord;
    use chrono::{TimeDelta, Utc};

    fn info(name: &str) -> LockInfo {
        LockInfo {
            name: name.to_string(),
            record: LockRecord::new("a@host", Utc::now(), 60),
            is_stale: false,
            age: TimeDelta::zero(),
        }
    }

    fn names(locks: &[LockInfo]) -> Vec<&str> {
        locks.iter().map(|l| l.name.as_str()).collect()
    }

    #[test]
    fn test_no_filter_keeps_everything() {
        let locks = filter_locks(vec![info("deploy"), info("db:migrate")], None).unwrap();
        assert_eq!(names(&locks), vec!["deploy", "db:migrate"]);
    }

    #[test]
    fn test_filter_matches_lock_names() {
        let locks = vec![info("db:migrate"), info("db:backup"), info("deploy")];
        let filtered = filter_locks(locks, Some("db:*")).unwrap();
        assert_eq!(names(&filtered), vec!["db:migrate", "db:backup"]);
    }

    #[test]
    fn test_invalid_filter_is_user_error() {
        let err = filter_locks(vec![info("deploy")], Some("[unclosed")).unwrap_err();
        assert!(matches!(err, TagLockError::UserError(_)));
    }
}
