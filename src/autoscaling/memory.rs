use super::{AutoscalingClient, AutoscalingStatus};
use crate::error::{Result, TagLockError};
use std::sync::{Arc, Mutex, MutexGuard};

/// Autoscaling status held in memory. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryAutoscaling {
    status: Arc<Mutex<Option<AutoscalingStatus>>>,
}

impl MemoryAutoscaling {
    /// A group member with the given status.
    pub fn new(status: AutoscalingStatus) -> Self {
        Self {
            status: Arc::new(Mutex::new(Some(status))),
        }
    }

    /// Current scale-in protection flag, `None` outside a group.
    pub fn protected(&self) -> Option<bool> {
        self.lock()
            .ok()?
            .as_ref()
            .map(|status| status.protected_from_scale_in)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<AutoscalingStatus>>> {
        self.status
            .lock()
            .map_err(|_| TagLockError::Store("in-memory autoscaling state is poisoned".to_string()))
    }
}

impl AutoscalingClient for MemoryAutoscaling {
    fn status(&self) -> Result<Option<AutoscalingStatus>> {
        Ok(self.lock()?.clone())
    }

    fn set_protected(&self, protected: bool) -> Result<()> {
        match self.lock()?.as_mut() {
            Some(status) => {
                status.protected_from_scale_in = protected;
                Ok(())
            }
            None => Err(TagLockError::Store(
                "instance is not in an autoscaling group".to_string(),
            )),
        }
    }
}
