//! Lock records and their tag value encoding.
//!
//! A lock record is stored as the value of a single tag, encoded as compact
//! JSON:
//!
//! ```text
//! {"owner":"deploy@build-7","acquired_at":"2026-10-19T12:00:00Z","lease":300}
//! ```
//!
//! The encoding is deterministic for a given record, which is what lets the
//! engine confirm a write by comparing the stored string byte for byte.

use crate::error::{Result, TagLockError};
use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// Upper bound on lease length (ten years).
pub const MAX_LEASE_SECONDS: u64 = 10 * 365 * 24 * 60 * 60;

/// Ownership metadata for one lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    /// Identity of the acquiring process or instance.
    #[serde(rename = "owner")]
    pub owner_id: String,

    /// When the lease started, with whole-second precision.
    pub acquired_at: DateTime<Utc>,

    /// How long the lock stays valid without renewal.
    #[serde(rename = "lease")]
    pub lease_seconds: u64,
}

impl LockRecord {
    /// Create a record, truncating `acquired_at` to whole seconds.
    pub fn new(owner_id: &str, acquired_at: DateTime<Utc>, lease_seconds: u64) -> Self {
        Self {
            owner_id: owner_id.to_string(),
            acquired_at: acquired_at.trunc_subsecs(0),
            lease_seconds,
        }
    }

    /// Instant at which the lease runs out.
    pub fn expires_at(&self) -> DateTime<Utc> {
        let lease = Duration::seconds(self.lease_seconds.min(MAX_LEASE_SECONDS) as i64);
        self.acquired_at
            .checked_add_signed(lease)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// A record is stale once `now >= acquired_at + lease`.
    ///
    /// Every reader decides this against its own clock.
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at()
    }

    /// Time elapsed since acquisition, as seen at `now`.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.acquired_at)
    }

    /// Encode the record as a tag value.
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| TagLockError::Encoding(e.to_string()))
    }

    /// Decode a tag value.
    ///
    /// Fails with [`TagLockError::Parse`] when fields are missing, the
    /// timestamp does not parse, the owner is empty or the lease is out of
    /// range.
    pub fn decode(value: &str) -> Result<Self> {
        let record: LockRecord = serde_json::from_str(value)
            .map_err(|e| TagLockError::Parse(format!("{} (value: {:?})", e, value)))?;

        if record.owner_id.is_empty() {
            return Err(TagLockError::Parse("owner must not be empty".to_string()));
        }
        if record.lease_seconds == 0 || record.lease_seconds > MAX_LEASE_SECONDS {
            return Err(TagLockError::Parse(format!(
                "lease of {} seconds is out of range",
                record.lease_seconds
            )));
        }

        Ok(record)
    }
}

/// Format a duration as a short human-readable age.
pub fn format_age(age: Duration) -> String {
    let seconds = age.num_seconds().max(0);
    let minutes = seconds / 60;
    let hours = minutes / 60;
    let days = hours / 24;

    if days > 0 {
        format!("{}d {}h", days, hours % 24)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes % 60)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds % 60)
    } else {
        format!("{}s", seconds)
    }
}
