//! Authority gate: the acting account must hold an approving role.

use super::report::{ChannelRef, RunError};
use crate::platform::PlatformClient;

/// Confirm the acting account may approve join requests on this channel.
///
/// Role membership (owner or administrator) stands in for a per-capability
/// check: the platform exposes no reliable "can approve joins" flag, so
/// this is a documented approximation rather than a strict permission test.
/// A failure here aborts the run before any approval attempts.
pub async fn check_authority(
    platform: &dyn PlatformClient,
    channel: &ChannelRef,
) -> Result<(), RunError> {
    let role = platform.get_membership(channel.id).await.map_err(|e| {
        RunError::InsufficientPrivilege(format!("membership lookup failed: {}", e))
    })?;

    if role.can_approve() {
        Ok(())
    } else {
        Err(RunError::InsufficientPrivilege(format!(
            "role '{}' cannot approve join requests on {}",
            role, channel.title
        )))
    }
}
