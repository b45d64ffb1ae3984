//! Tag-based distributed locking.
//!
//! A lock is a single tag on a shared resource (for example an EC2 instance).
//! Its value is an encoded [`LockRecord`]: owner, acquisition time and lease.
//! Independent processes on different machines contend for the same tag key.
//!
//! # Protocol
//!
//! The tag store has no compare-and-swap, so each acquisition attempt is a
//! full cycle:
//!
//! ```text
//! READING -> FREE | HELD_FRESH | HELD_STALE | MALFORMED
//!   HELD_FRESH                    -> back off and retry (or time out)
//!   FREE | HELD_STALE | MALFORMED -> WRITING -> CONFIRMING -> OWNED | RACE_LOST
//!   RACE_LOST                     -> back off and retry (or time out)
//! ```
//!
//! Confirming means reading the tag again and requiring it to hold exactly
//! the value written. Of several concurrent writers, only the one whose value
//! survives believes it owns the lock.
//!
//! # Limitations
//!
//! - Staleness is judged against each reader's own clock; clocks must agree
//!   to well within the lease.
//! - If the store serves stale reads, two stealers can both confirm their own
//!   writes. That window is bounded by the store's replication lag and is not
//!   closed here.
//! - A holder is not interrupted when its lock is stolen; it finds out on the
//!   next renew.
//! - A holder killed before releasing leaves its tag in place until the lease
//!   runs out, after which the lock can be stolen.

mod engine;
mod record;


pub use engine::{
    Backoff, LockEngine, LockGuard, LockHandle, LockInfo, LockState, ReleaseOutcome,
    validate_lock_name,
};
pub use record::{LockRecord, MAX_LEASE_SECONDS, format_age};
