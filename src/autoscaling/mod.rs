//! Autoscaling group membership: health gate and scale-in protection.
//!
//! The crate does not talk to a cloud API directly. An [`AutoscalingClient`]
//! reports this instance's group status and toggles its scale-in protection;
//! [`MemoryAutoscaling`] and [`FileAutoscaling`] are the bundled backends.

mod file;
mod memory;
mod protection;

pub use file::FileAutoscaling;
pub use memory::MemoryAutoscaling;
pub use protection::{ProtectionGuard, protect};

use crate::error::{LockingFailure, Result, TagLockError};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Lifecycle state of an instance that is serving traffic.
pub const IN_SERVICE: &str = "InService";

/// Group status of the current instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AutoscalingStatus {
    pub auto_scaling_group_name: String,
    pub health_status: String,
    pub lifecycle_state: String,
    pub protected_from_scale_in: bool,
}

impl AutoscalingStatus {
    /// A healthy, in-service member of `group`, unprotected.
    pub fn in_service(group: &str) -> Self {
        Self {
            auto_scaling_group_name: group.to_string(),
            health_status: "Healthy".to_string(),
            lifecycle_state: IN_SERVICE.to_string(),
            protected_from_scale_in: false,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.health_status.eq_ignore_ascii_case("healthy") && self.lifecycle_state == IN_SERVICE
    }
}

/// Access to the autoscaling group this instance belongs to.
pub trait AutoscalingClient {
    /// Current status, or `None` when the instance is not in a group.
    fn status(&self) -> Result<Option<AutoscalingStatus>>;

    /// Set or clear scale-in protection for this instance.
    fn set_protected(&self, protected: bool) -> Result<()>;
}

impl<T: AutoscalingClient + ?Sized> AutoscalingClient for &T {
    fn status(&self) -> Result<Option<AutoscalingStatus>> {
        (**self).status()
    }

    fn set_protected(&self, protected: bool) -> Result<()> {
        (**self).set_protected(protected)
    }
}

/// Refuse lock `name` to an instance its group considers unhealthy.
///
/// Instances outside any group always pass.
pub fn ensure_healthy<A: AutoscalingClient>(client: &A, name: &str) -> Result<()> {
    let Some(status) = client.status()? else {
        debug!(lock = %name, "not in an autoscaling group; skipping health check");
        return Ok(());
    };

    if status.is_healthy() {
        return Ok(());
    }

    warn!(
        lock = %name,
        group = %status.auto_scaling_group_name,
        health = %status.health_status,
        lifecycle = %status.lifecycle_state,
        "instance is unhealthy; refusing lock"
    );
    Err(TagLockError::locking(
        name,
        LockingFailure::Unhealthy {
            health_status: status.health_status,
            lifecycle_state: status.lifecycle_state,
        },
    ))
}
