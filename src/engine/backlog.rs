//! Lazy forward sequence over the platform's paged join-request listing.

use crate::platform::{PendingJoinRequest, PlatformClient, PlatformError};
use std::collections::VecDeque;
use std::sync::Arc;

/// Forward-only view of the pending backlog
///
/// Pages are fetched on demand; the total count is never known in advance.
/// The sequence is bounded by the backlog size at call time and restarts
/// from the beginning on the next run.
pub struct Backlog {
    platform: Arc<dyn PlatformClient>,
    channel_id: i64,
    cursor: Option<u64>,
    buffer: VecDeque<PendingJoinRequest>,
    exhausted: bool,
}

impl Backlog {
    pub fn new(platform: Arc<dyn PlatformClient>, channel_id: i64) -> Self {
        Self {
            platform,
            channel_id,
            cursor: None,
            buffer: VecDeque::new(),
            exhausted: false,
        }
    }

    /// Next pending request, oldest first; `None` when the backlog is done
    pub async fn next(&mut self) -> Result<Option<PendingJoinRequest>, PlatformError> {
        loop {
            if let Some(item) = self.buffer.pop_front() {
                return Ok(Some(item));
            }
            if self.exhausted {
                return Ok(None);
            }

            let page = self
                .platform
                .pending_page(self.channel_id, self.cursor)
                .await?;

            match page.next_cursor {
                Some(cursor) => self.cursor = Some(cursor),
                None => self.exhausted = true,
            }
            self.buffer.extend(page.items);
        }
    }
}
