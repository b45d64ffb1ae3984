//! Error types for taglock.
//!
//! Uses thiserror for derive macros and provides user-actionable error messages.

use crate::exit_codes;
use chrono::{DateTime, Utc};
use std::fmt;
use thiserror::Error;

/// Why ownership of a lock could not be established or kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockingFailure {
    /// Another owner holds a lease that has not expired yet.
    AlreadyLocked {
        owner: String,
        expires_at: DateTime<Utc>,
    },
    /// Our write was overwritten before the confirm-read.
    RaceLost {
        /// Owner found by the confirm-read, if the value decoded.
        winner: Option<String>,
    },
    /// A held lock now belongs to someone else (or nobody).
    LockLost { current_owner: Option<String> },
    /// The instance is not healthy enough to take locks.
    Unhealthy {
        health_status: String,
        lifecycle_state: String,
    },
}

impl fmt::Display for LockingFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockingFailure::AlreadyLocked { owner, expires_at } => write!(
                f,
                "held by {} until {}",
                owner,
                expires_at.to_rfc3339()
            ),
            LockingFailure::RaceLost { winner: Some(w) } => {
                write!(f, "lost the race to {}", w)
            }
            LockingFailure::RaceLost { winner: None } => {
                write!(f, "lost the race to a concurrent writer")
            }
            LockingFailure::LockLost {
                current_owner: Some(o),
            } => write!(f, "lock was taken over by {}", o),
            LockingFailure::LockLost {
                current_owner: None,
            } => write!(f, "lock is no longer held"),
            LockingFailure::Unhealthy {
                health_status,
                lifecycle_state,
            } => write!(
                f,
                "instance is unhealthy (health: {}, lifecycle: {})",
                health_status, lifecycle_state
            ),
        }
    }
}

/// Main error type for taglock operations.
#[derive(Error, Debug)]
pub enum TagLockError {
    /// Invalid arguments or configuration.
    #[error("{0}")]
    UserError(String),

    /// Ownership of the named lock could not be confirmed.
    #[error("Could not lock '{name}': {reason}")]
    ResourceLocking {
        name: String,
        reason: LockingFailure,
    },

    /// A stored lock record could not be decoded.
    #[error("Malformed lock record: {0}")]
    Parse(String),

    /// A lock record could not be encoded.
    #[error("Failed to encode lock record: {0}")]
    Encoding(String),

    /// The tag store (or autoscaling backend) failed.
    #[error("Tag store operation failed: {0}")]
    Store(String),
}

impl TagLockError {
    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            TagLockError::UserError(_) => exit_codes::USER_ERROR,
            TagLockError::ResourceLocking { .. } => exit_codes::LOCK_FAILURE,
            TagLockError::Parse(_) => exit_codes::USER_ERROR,
            TagLockError::Encoding(_) => exit_codes::USER_ERROR,
            TagLockError::Store(_) => exit_codes::STORE_FAILURE,
        }
    }

    /// The locking failure, if this is a resource locking error.
    pub fn locking_failure(&self) -> Option<&LockingFailure> {
        match self {
            TagLockError::ResourceLocking { reason, .. } => Some(reason),
            _ => None,
        }
    }

    pub(crate) fn locking(name: &str, reason: LockingFailure) -> Self {
        TagLockError::ResourceLocking {
            name: name.to_string(),
            reason,
        }
    }
}

/// Result type alias for taglock operations.
pub type Result<T> = std::result::Result<T, TagLockError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_error_has_correct_exit_code() {
        let err = TagLockError::UserError("bad argument".to_string());
        assert_eq!(err.exit_code(), exit_codes::USER_ERROR);
    }

    #[test]
    fn locking_error_has_correct_exit_code() {
        let err = TagLockError::locking("deploy", LockingFailure::RaceLost { winner: None });
        assert_eq!(err.exit_code(), exit_codes::LOCK_FAILURE);
        assert!(err.locking_failure().is_some());
    }

    #[test]
    fn store_error_has_correct_exit_code() {
        let err = TagLockError::Store("connection reset".to_string());
        assert_eq!(err.exit_code(), exit_codes::STORE_FAILURE);
        assert!(err.locking_failure().is_none());
    }

    #[test]
    fn error_messages_are_descriptive() {
        let expires_at = DateTime::parse_from_rfc3339("2026-01-02T03:04:05Z")
            .unwrap()
            .with_timezone(&Utc);
        let err = TagLockError::locking(
            "deploy",
            LockingFailure::AlreadyLocked {
                owner: "ci@build-1".to_string(),
                expires_at,
            },
        );
        assert_eq!(
            err.to_string(),
            "Could not lock 'deploy': held by ci@build-1 until 2026-01-02T03:04:05+00:00"
        );

        let err = TagLockError::locking(
            "deploy",
            LockingFailure::Unhealthy {
                health_status: "Unhealthy".to_string(),
                lifecycle_state: "InService".to_string(),
            },
        );
        assert!(err.to_string().contains("instance is unhealthy"));
    }
}
