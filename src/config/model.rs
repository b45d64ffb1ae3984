//! Config struct definition and default implementation.

use crate::locks::Backoff;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for taglock.
///
/// This struct represents the contents of `taglock.yaml`.
/// Unknown fields in the YAML are ignored for forward compatibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // =========================================================================
    // Store settings
    // =========================================================================
    /// Resource whose tags hold the locks (e.g. an instance id).
    #[serde(default = "default_resource_id")]
    pub resource_id: String,

    /// Root directory of the file-backed tag store.
    #[serde(default = "default_store_dir")]
    pub store_dir: PathBuf,

    /// JSON document describing this instance's autoscaling group.
    /// Unset means the instance is not in a group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autoscaling_file: Option<PathBuf>,

    // =========================================================================
    // Lock settings
    // =========================================================================
    /// Owner id written into lock records (default: `user@host`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,

    /// Lease length in seconds.
    #[serde(default = "default_lease_seconds")]
    pub lease_seconds: u64,

    /// How long `acquire` keeps retrying (0 = one attempt).
    #[serde(default)]
    pub timeout_seconds: u64,

    /// First retry delay in milliseconds.
    #[serde(default = "default_backoff_initial_ms")]
    pub backoff_initial_ms: u64,

    /// Retry delay cap in milliseconds.
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,

    // =========================================================================
    // Autoscaling settings
    // =========================================================================
    /// Refuse locks while the instance is unhealthy.
    #[serde(default = "default_true")]
    pub check_health: bool,

    /// Hold scale-in protection while `run` holds a lock.
    #[serde(default = "default_true")]
    pub protect_while_locked: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            resource_id: default_resource_id(),
            store_dir: default_store_dir(),
            autoscaling_file: None,
            owner: None,
            lease_seconds: default_lease_seconds(),
            timeout_seconds: 0,
            backoff_initial_ms: default_backoff_initial_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            check_health: default_true(),
            protect_while_locked: default_true(),
        }
    }
}

impl Config {
    /// Retry policy built from the backoff settings.
    pub fn backoff(&self) -> Backoff {
        Backoff::new(
            Duration::from_millis(self.backoff_initial_ms),
            Duration::from_millis(self.backoff_max_ms),
        )
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

pub(crate) fn default_resource_id() -> String {
    "local".to_string()
}
pub(crate) fn default_store_dir() -> PathBuf {
    PathBuf::from(".taglock/tags")
}
pub(crate) fn default_lease_seconds() -> u64 {
    30 * 60 * 60
}
pub(crate) fn default_backoff_initial_ms() -> u64 {
    250
}
pub(crate) fn default_backoff_max_ms() -> u64 {
    5000
}
pub(crate) fn default_true() -> bool {
    true
}
