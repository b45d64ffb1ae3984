use super::AutoscalingClient;
use crate::error::Result;
use crate::scope::ScopeGuard;
use tracing::{info, warn};

/// Scale-in protection held for a scope. The context is the flag to restore,
/// `None` when the instance is not in a group.
pub type ProtectionGuard<'a> = ScopeGuard<'a, Option<bool>>;

/// Set scale-in protection to `desired` until the returned guard exits.
///
/// On exit the prior value is put back. Restore failures are logged and
/// otherwise ignored. Outside an autoscaling group this is a no-op.
pub fn protect<'a, A>(client: &'a A, desired: bool) -> Result<ProtectionGuard<'a>>
where
    A: AutoscalingClient + ?Sized,
{
    ScopeGuard::enter(
        || -> Result<Option<bool>> {
            let Some(status) = client.status()? else {
                info!("not in an autoscaling group; scale-in protection unchanged");
                return Ok(None);
            };
            let prior = status.protected_from_scale_in;
            if prior != desired {
                client.set_protected(desired)?;
            }
            info!(
                group = %status.auto_scaling_group_name,
                protected = desired,
                prior,
                "scale-in protection set"
            );
            Ok(Some(prior))
        },
        move |prior| {
            let Some(prior) = prior else {
                return;
            };
            if prior == desired {
                return;
            }
            match client.set_protected(prior) {
                Ok(()) => info!(protected = prior, "scale-in protection restored"),
                Err(e) => warn!(
                    error = %e,
                    protected = prior,
                    "failed to restore scale-in protection"
                ),
            }
        },
    )
}
