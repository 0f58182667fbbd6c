//! Channel resolution: implicit join plus canonical metadata lookup.

use super::report::{ChannelRef, RunError};
use crate::platform::PlatformClient;

/// Resolve a raw channel identifier into a canonical reference.
///
/// The join step runs first: the platform only returns join requests for
/// channels the acting account holds a peer reference to, and private
/// channels with no prior interaction fail resolution without it. The step
/// is idempotent, but it may change the account's channel association.
///
/// Any failure wraps as `ChannelUnreachable` carrying the original message;
/// no retry at this layer.
pub async fn resolve(platform: &dyn PlatformClient, raw: &str) -> Result<ChannelRef, RunError> {
    platform
        .join_channel(raw)
        .await
        .map_err(|e| RunError::ChannelUnreachable(e.to_string()))?;

    let meta = platform
        .get_channel(raw)
        .await
        .map_err(|e| RunError::ChannelUnreachable(e.to_string()))?;

    Ok(ChannelRef {
        raw: raw.to_string(),
        id: meta.id,
        title: meta.title,
    })
}
