//! The lock engine: acquire, renew, release and steal on a tag store.

use super::record::{LockRecord, MAX_LEASE_SECONDS, format_age};
use crate::clock::{Clock, SystemClock};
use crate::error::{LockingFailure, Result, TagLockError};
use crate::scope::{ScopeGuard, guarded};
use crate::store::TagStore;
use chrono::{DateTime, TimeDelta, Utc};
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Characters allowed in a tag key, up to the 128 character limit.
static LOCK_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[\p{L}\p{N} _.:/=+\-@]{1,128}$").expect("Invalid lock name regex")
});

/// Validate that `name` can be used as a lock tag key.
pub fn validate_lock_name(name: &str) -> Result<()> {
    if !LOCK_NAME_RE.is_match(name) {
        return Err(TagLockError::UserError(format!(
            "invalid lock name '{}': use 1-128 letters, digits, spaces or _ . : / = + - @",
            name
        )));
    }
    if name.to_ascii_lowercase().starts_with("aws:") {
        return Err(TagLockError::UserError(format!(
            "invalid lock name '{}': the 'aws:' prefix is reserved",
            name
        )));
    }
    Ok(())
}

fn validate_lease(lease_seconds: u64) -> Result<()> {
    if lease_seconds == 0 || lease_seconds > MAX_LEASE_SECONDS {
        return Err(TagLockError::UserError(format!(
            "lease_seconds must be between 1 and {}",
            MAX_LEASE_SECONDS
        )));
    }
    Ok(())
}

/// Exponential backoff between acquisition attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    /// Wait after the first failed attempt.
    pub initial: Duration,
    /// Upper bound for a single wait.
    pub max: Duration,
}

impl Backoff {
    /// Shortest wait allowed between attempts.
    pub const MIN_WAIT: Duration = Duration::from_millis(1);

    /// `initial` is raised to [`Backoff::MIN_WAIT`] and `max` to `initial`.
    pub fn new(initial: Duration, max: Duration) -> Self {
        let initial = initial.max(Self::MIN_WAIT);
        Self {
            initial,
            max: max.max(initial),
        }
    }

    fn next(&self, current: Duration) -> Duration {
        current.saturating_mul(2).min(self.max).max(Self::MIN_WAIT)
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(250), Duration::from_secs(5))
    }
}

/// Proof of a confirmed acquisition.
///
/// Not `Clone`: [`LockEngine::release`] consumes the handle, so a handle is
/// released at most once.
#[derive(Debug, PartialEq, Eq)]
pub struct LockHandle {
    name: String,
    record: LockRecord,
}

impl LockHandle {
    /// Rebuild a handle for a record this owner acquired earlier, possibly in
    /// another process. Handles are normally obtained from `acquire`.
    pub fn new(name: &str, record: LockRecord) -> Self {
        Self {
            name: name.to_string(),
            record,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn record(&self) -> &LockRecord {
        &self.record
    }

    pub fn owner_id(&self) -> &str {
        &self.record.owner_id
    }
}

/// Scoped lock: dropping it releases the lock.
pub type LockGuard<'a> = ScopeGuard<'a, LockHandle>;

/// What a reader finds under a lock's tag key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockState {
    /// No tag.
    Free,
    /// A valid record whose lease has not run out.
    HeldFresh(LockRecord),
    /// A valid record whose lease has run out.
    HeldStale(LockRecord),
    /// A value that does not decode. Present but untrusted.
    Malformed(String),
}

impl LockState {
    /// Classify a raw tag value at `now`.
    pub fn classify(value: Option<&str>, now: DateTime<Utc>) -> Self {
        match value {
            None => LockState::Free,
            Some(raw) => match LockRecord::decode(raw) {
                Ok(record) if record.is_stale(now) => LockState::HeldStale(record),
                Ok(record) => LockState::HeldFresh(record),
                Err(e) => LockState::Malformed(e.to_string()),
            },
        }
    }
}

/// Result of a best-effort release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// Our record was deleted.
    Released,
    /// The tag was already gone.
    AlreadyReleased,
    /// Someone else's record (or an undecodable value) is in place; left alone.
    NotOwner { current_owner: Option<String> },
    /// The store failed; the lock will expire with its lease.
    Failed(String),
}

/// A lock record found on the resource.
#[derive(Debug, Clone)]
pub struct LockInfo {
    pub name: String,
    pub record: LockRecord,
    pub is_stale: bool,
    pub age: TimeDelta,
}

impl fmt::Display for LockInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (owner: {}, age: {}, expires: {}{})",
            self.name,
            self.record.owner_id,
            format_age(self.age),
            self.record.expires_at().to_rfc3339(),
            if self.is_stale { ", STALE" } else { "" }
        )
    }
}

enum Attempt {
    Owned(LockHandle),
    Busy(LockRecord),
    RaceLost(Option<String>),
}

enum Confirmation {
    Confirmed,
    Mismatch(Option<LockRecord>),
}

/// Mutual exclusion over the tags of one resource.
///
/// The store offers no compare-and-swap, so every write is followed by a
/// confirm-read: ownership is established only when the value read back is
/// exactly the value written.
#[derive(Debug)]
pub struct LockEngine<S, C = SystemClock> {
    store: S,
    clock: C,
    resource_id: String,
    backoff: Backoff,
}

impl<S: TagStore> LockEngine<S, SystemClock> {
    /// Engine for `resource_id` using the system clock.
    pub fn new(store: S, resource_id: &str) -> Self {
        Self::with_clock(store, SystemClock, resource_id)
    }
}

impl<S: TagStore, C: Clock> LockEngine<S, C> {
    pub fn with_clock(store: S, clock: C, resource_id: &str) -> Self {
        Self {
            store,
            clock,
            resource_id: resource_id.to_string(),
            backoff: Backoff::default(),
        }
    }

    /// Replace the retry backoff policy.
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Acquire `name` for `owner_id`, retrying until `timeout` elapses.
    ///
    /// A zero timeout makes exactly one attempt. Each attempt reads the tag,
    /// and unless a fresh lease is in place writes a new record and
    /// confirm-reads it. Stale and malformed records are overwritten (stolen)
    /// the same way as an absent one.
    ///
    /// # Errors
    ///
    /// * `TagLockError::ResourceLocking` - no confirmed ownership before the
    ///   deadline (busy, or every race lost)
    /// * `TagLockError::Store` - the store failed; returned immediately
    /// * `TagLockError::UserError` - invalid name, owner or lease
    pub fn acquire(
        &self,
        name: &str,
        owner_id: &str,
        lease_seconds: u64,
        timeout: Duration,
    ) -> Result<LockHandle> {
        validate_lock_name(name)?;
        validate_lease(lease_seconds)?;
        if owner_id.is_empty() {
            return Err(TagLockError::UserError(
                "owner id must not be empty".to_string(),
            ));
        }

        let deadline = TimeDelta::from_std(timeout)
            .ok()
            .and_then(|timeout| self.clock.now().checked_add_signed(timeout))
            .ok_or_else(|| TagLockError::UserError("timeout is too large".to_string()))?;

        let mut delay = self.backoff.initial.max(Backoff::MIN_WAIT);
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let failure = match self.try_acquire(name, owner_id, lease_seconds)? {
                Attempt::Owned(handle) => {
                    info!(
                        lock = %name,
                        owner = %owner_id,
                        resource = %self.resource_id,
                        attempt,
                        "lock acquired"
                    );
                    return Ok(handle);
                }
                Attempt::Busy(record) => {
                    debug!(
                        lock = %name,
                        holder = %record.owner_id,
                        attempt,
                        "lock is held"
                    );
                    LockingFailure::AlreadyLocked {
                        expires_at: record.expires_at(),
                        owner: record.owner_id,
                    }
                }
                Attempt::RaceLost(winner) => {
                    info!(
                        lock = %name,
                        owner = %owner_id,
                        winner = winner.as_deref().unwrap_or("unknown"),
                        attempt,
                        "lost acquisition race"
                    );
                    LockingFailure::RaceLost { winner }
                }
            };

            let now = self.clock.now();
            if now >= deadline {
                return Err(TagLockError::locking(name, failure));
            }
            let remaining = (deadline - now).to_std().unwrap_or(Duration::ZERO);
            self.clock.sleep(delay.min(remaining));
            delay = self.backoff.next(delay);
        }
    }

    /// One full read, decide, write, confirm cycle.
    fn try_acquire(&self, name: &str, owner_id: &str, lease_seconds: u64) -> Result<Attempt> {
        let now = self.clock.now();
        match self.read_state(name, now)? {
            LockState::HeldFresh(record) => return Ok(Attempt::Busy(record)),
            LockState::Free => debug!(lock = %name, "lock is free"),
            LockState::HeldStale(record) => info!(
                lock = %name,
                previous_owner = %record.owner_id,
                expired_at = %record.expires_at().to_rfc3339(),
                "stealing stale lock"
            ),
            LockState::Malformed(reason) => warn!(
                lock = %name,
                %reason,
                "overwriting malformed lock record"
            ),
        }

        let record = LockRecord::new(owner_id, now, lease_seconds);
        let value = record.encode()?;
        self.store.write(&self.resource_id, name, &value)?;

        match self.confirm(name, &value)? {
            Confirmation::Confirmed => Ok(Attempt::Owned(LockHandle::new(name, record))),
            Confirmation::Mismatch(current) => {
                Ok(Attempt::RaceLost(current.map(|r| r.owner_id)))
            }
        }
    }

    fn confirm(&self, name: &str, written: &str) -> Result<Confirmation> {
        let tags = self.store.read(&self.resource_id)?;
        match tags.get(name) {
            Some(current) if current == written => Ok(Confirmation::Confirmed),
            current => Ok(Confirmation::Mismatch(
                current.and_then(|value| LockRecord::decode(value).ok()),
            )),
        }
    }

    fn read_state(&self, name: &str, now: DateTime<Utc>) -> Result<LockState> {
        let tags = self.store.read(&self.resource_id)?;
        Ok(LockState::classify(tags.get(name).map(String::as_str), now))
    }

    /// Current state of `name`, without side effects.
    pub fn inspect(&self, name: &str) -> Result<LockState> {
        self.read_state(name, self.clock.now())
    }

    /// All lock records on the resource, sorted by name.
    ///
    /// Tags whose values do not decode as lock records are skipped.
    pub fn list(&self) -> Result<Vec<LockInfo>> {
        let now = self.clock.now();
        let tags = self.store.read(&self.resource_id)?;
        Ok(tags
            .into_iter()
            .filter_map(|(name, value)| {
                let record = LockRecord::decode(&value).ok()?;
                Some(LockInfo {
                    is_stale: record.is_stale(now),
                    age: record.age(now),
                    name,
                    record,
                })
            })
            .collect())
    }

    /// Restart the lease of a held lock at `now`.
    ///
    /// Refuses to write when the stored record no longer belongs to the
    /// handle's owner, and fails when the confirm-read shows another owner.
    /// Never retries.
    pub fn renew(&self, handle: &LockHandle) -> Result<LockHandle> {
        let name = handle.name();
        let owner_id = handle.owner_id();
        validate_lease(handle.record().lease_seconds)?;

        let tags = self.store.read(&self.resource_id)?;
        let current = tags
            .get(name)
            .and_then(|value| LockRecord::decode(value).ok());
        if current.as_ref().map(|r| r.owner_id.as_str()) != Some(owner_id) {
            let current_owner = current.map(|r| r.owner_id);
            warn!(
                lock = %name,
                owner = %owner_id,
                current_owner = current_owner.as_deref().unwrap_or("none"),
                "lock lost before renewal"
            );
            return Err(TagLockError::locking(
                name,
                LockingFailure::LockLost { current_owner },
            ));
        }

        let record = LockRecord::new(owner_id, self.clock.now(), handle.record().lease_seconds);
        let value = record.encode()?;
        self.store.write(&self.resource_id, name, &value)?;

        match self.confirm(name, &value)? {
            Confirmation::Confirmed => {
                debug!(lock = %name, owner = %owner_id, "lock renewed");
                Ok(LockHandle::new(name, record))
            }
            Confirmation::Mismatch(Some(current)) if current.owner_id == owner_id => {
                debug!(lock = %name, owner = %owner_id, "lock renewed concurrently by same owner");
                Ok(LockHandle::new(name, current))
            }
            Confirmation::Mismatch(current) => {
                let current_owner = current.map(|r| r.owner_id);
                warn!(
                    lock = %name,
                    owner = %owner_id,
                    current_owner = current_owner.as_deref().unwrap_or("none"),
                    "lock lost during renewal"
                );
                Err(TagLockError::locking(
                    name,
                    LockingFailure::LockLost { current_owner },
                ))
            }
        }
    }

    /// Renew in place, e.g. through a [`LockGuard`].
    pub fn refresh(&self, handle: &mut LockHandle) -> Result<()> {
        *handle = self.renew(handle)?;
        Ok(())
    }

    /// Best-effort release.
    ///
    /// Deletes the tag only when the stored record still belongs to the
    /// handle's owner. Never fails; problems are logged and reported in the
    /// outcome.
    pub fn release(&self, handle: LockHandle) -> ReleaseOutcome {
        let outcome = self.try_release(&handle);
        match &outcome {
            ReleaseOutcome::Released => {
                info!(lock = %handle.name(), owner = %handle.owner_id(), "lock released")
            }
            ReleaseOutcome::AlreadyReleased => {
                debug!(lock = %handle.name(), "lock already released")
            }
            ReleaseOutcome::NotOwner { current_owner } => warn!(
                lock = %handle.name(),
                owner = %handle.owner_id(),
                current_owner = current_owner.as_deref().unwrap_or("unknown"),
                "lock was taken over; leaving it in place"
            ),
            ReleaseOutcome::Failed(reason) => warn!(
                lock = %handle.name(),
                %reason,
                "failed to release lock; it will expire with its lease"
            ),
        }
        outcome
    }

    fn try_release(&self, handle: &LockHandle) -> ReleaseOutcome {
        let tags = match self.store.read(&self.resource_id) {
            Ok(tags) => tags,
            Err(e) => return ReleaseOutcome::Failed(e.to_string()),
        };
        let Some(value) = tags.get(handle.name()) else {
            return ReleaseOutcome::AlreadyReleased;
        };

        match LockRecord::decode(value) {
            Ok(record) if record.owner_id == handle.owner_id() => {
                match self.store.delete(&self.resource_id, handle.name()) {
                    Ok(()) => ReleaseOutcome::Released,
                    Err(e) => ReleaseOutcome::Failed(e.to_string()),
                }
            }
            Ok(record) => ReleaseOutcome::NotOwner {
                current_owner: Some(record.owner_id),
            },
            Err(_) => ReleaseOutcome::NotOwner {
                current_owner: None,
            },
        }
    }

    /// Acquire and return a guard that releases on drop.
    pub fn lock(
        &self,
        name: &str,
        owner_id: &str,
        lease_seconds: u64,
        timeout: Duration,
    ) -> Result<LockGuard<'_>> {
        let handle = self.acquire(name, owner_id, lease_seconds, timeout)?;
        Ok(ScopeGuard::new(handle, move |handle| {
            self.release(handle);
        }))
    }

    /// Run `f` while holding `name`.
    ///
    /// The lock is released however `f` ends: success, error or panic.
    /// Ownership loss inside `f` is only noticed if `f` renews.
    ///
    /// # Example
    ///
    /// ```
    /// use std::time::Duration;
    /// use taglock::locks::LockEngine;
    /// use taglock::store::MemoryTagStore;
    ///
    /// let engine = LockEngine::new(MemoryTagStore::new(), "i-0123456789abcdef0");
    /// let answer = engine.with_lock("deploy", "web@host-1", 60, Duration::ZERO, |handle| {
    ///     engine.refresh(handle)?;
    ///     Ok::<_, taglock::error::TagLockError>(42)
    /// })?;
    /// assert_eq!(answer, 42);
    /// # Ok::<(), taglock::error::TagLockError>(())
    /// ```
    pub fn with_lock<R, E, F>(
        &self,
        name: &str,
        owner_id: &str,
        lease_seconds: u64,
        timeout: Duration,
        f: F,
    ) -> std::result::Result<R, E>
    where
        E: From<TagLockError>,
        F: FnOnce(&mut LockHandle) -> std::result::Result<R, E>,
    {
        guarded(
            || {
                self.acquire(name, owner_id, lease_seconds, timeout)
                    .map_err(E::from)
            },
            |handle| {
                self.release(handle);
            },
            f,
        )
    }
}
