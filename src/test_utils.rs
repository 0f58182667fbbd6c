//! Shared test doubles: a scriptable in-memory platform client.

use crate::platform::{
    ChannelMeta, PendingJoinRequest, PendingPage, PlatformClient, PlatformError, Role,
};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::{watch, Notify, Semaphore};

/// Blocks approvals until released; used to hold a run mid-flight
#[derive(Clone)]
pub struct ApprovalGate {
    /// Signalled when an approval call enters the gate
    pub entered: Arc<Notify>,
    /// Add permits to let approvals proceed
    pub release: Arc<Semaphore>,
}

impl ApprovalGate {
    pub fn new() -> Self {
        Self {
            entered: Arc::new(Notify::new()),
            release: Arc::new(Semaphore::new(0)),
        }
    }
}

struct Inner {
    channel: ChannelMeta,
    role: Role,
    resolution_error: Option<PlatformError>,
    membership_error: Option<PlatformError>,
    pending: Vec<PendingJoinRequest>,
    /// Snapshot taken when a listing starts (cursor == None)
    listing: Vec<PendingJoinRequest>,
    page_size: usize,
    page_calls: u64,
    /// Successful page fetches allowed before listing starts failing
    fail_listing_after: Option<u64>,
    approve_errors: HashMap<i64, VecDeque<PlatformError>>,
    approve_calls: Vec<(i64, i64)>,
    bulk_result: Result<bool, PlatformError>,
    /// Whether a successful bulk call clears the backlog
    bulk_clears: bool,
    bulk_calls: u64,
    /// Request cancellation once this many approvals have happened
    cancel_after: Option<(u64, watch::Sender<bool>)>,
}

/// Scriptable platform client for engine tests
#[derive(Clone)]
pub struct MockPlatform {
    inner: Arc<Mutex<Inner>>,
    gate: Arc<Mutex<Option<ApprovalGate>>>,
}

pub fn pending(user_id: i64) -> PendingJoinRequest {
    PendingJoinRequest {
        user_id,
        display_name: format!("user-{}", user_id),
        username: None,
    }
}

impl MockPlatform {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                channel: ChannelMeta {
                    id: -100,
                    title: "Mock Channel".to_string(),
                },
                role: Role::Owner,
                resolution_error: None,
                membership_error: None,
                pending: Vec::new(),
                listing: Vec::new(),
                page_size: 50,
                page_calls: 0,
                fail_listing_after: None,
                approve_errors: HashMap::new(),
                approve_calls: Vec::new(),
                bulk_result: Ok(false),
                bulk_clears: false,
                bulk_calls: 0,
                cancel_after: None,
            })),
            gate: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_pending(self, user_ids: impl IntoIterator<Item = i64>) -> Self {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.pending = user_ids.into_iter().map(pending).collect();
        }
        self
    }

    pub fn with_page_size(self, size: usize) -> Self {
        self.inner.lock().unwrap().page_size = size;
        self
    }

    pub fn with_role(self, role: Role) -> Self {
        self.inner.lock().unwrap().role = role;
        self
    }

    pub fn fail_resolution(self, error: PlatformError) -> Self {
        self.inner.lock().unwrap().resolution_error = Some(error);
        self
    }

    pub fn fail_membership(self, error: PlatformError) -> Self {
        self.inner.lock().unwrap().membership_error = Some(error);
        self
    }

    /// Allow this many successful page fetches, then fail listing
    pub fn fail_listing_after(self, pages: u64) -> Self {
        self.inner.lock().unwrap().fail_listing_after = Some(pages);
        self
    }

    /// Script the next approval for a user to fail with this error
    pub fn approve_error(self, user_id: i64, error: PlatformError) -> Self {
        self.inner
            .lock()
            .unwrap()
            .approve_errors
            .entry(user_id)
            .or_default()
            .push_back(error);
        self
    }

    pub fn with_bulk_result(self, result: Result<bool, PlatformError>) -> Self {
        self.inner.lock().unwrap().bulk_result = result;
        self
    }

    /// A successful bulk call empties the backlog
    pub fn bulk_clears_backlog(self) -> Self {
        self.inner.lock().unwrap().bulk_clears = true;
        self
    }

    /// Flip the watch channel to cancelled once `count` approvals completed
    pub fn cancel_after_approvals(self, count: u64, tx: watch::Sender<bool>) -> Self {
        self.inner.lock().unwrap().cancel_after = Some((count, tx));
        self
    }

    pub fn with_gate(self, gate: ApprovalGate) -> Self {
        *self.gate.lock().unwrap() = Some(gate);
        self
    }

    pub fn approve_calls(&self) -> Vec<(i64, i64)> {
        self.inner.lock().unwrap().approve_calls.clone()
    }

    pub fn bulk_calls(&self) -> u64 {
        self.inner.lock().unwrap().bulk_calls
    }

    pub fn page_calls(&self) -> u64 {
        self.inner.lock().unwrap().page_calls
    }

    pub fn remaining_pending(&self) -> Vec<i64> {
        self.inner
            .lock()
            .unwrap()
            .pending
            .iter()
            .map(|r| r.user_id)
            .collect()
    }
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl PlatformClient for MockPlatform {
    async fn join_channel(&self, _raw: &str) -> Result<(), PlatformError> {
        let inner = self.inner.lock().unwrap();
        match &inner.resolution_error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    async fn get_channel(&self, _raw: &str) -> Result<ChannelMeta, PlatformError> {
        let inner = self.inner.lock().unwrap();
        match &inner.resolution_error {
            Some(e) => Err(e.clone()),
            None => Ok(inner.channel.clone()),
        }
    }

    async fn get_membership(&self, _channel_id: i64) -> Result<Role, PlatformError> {
        let inner = self.inner.lock().unwrap();
        match &inner.membership_error {
            Some(e) => Err(e.clone()),
            None => Ok(inner.role),
        }
    }

    async fn pending_page(
        &self,
        _channel_id: i64,
        cursor: Option<u64>,
    ) -> Result<PendingPage, PlatformError> {
        let mut inner = self.inner.lock().unwrap();

        if let Some(allowed) = inner.fail_listing_after {
            if inner.page_calls >= allowed {
                return Err(PlatformError::Transport("listing failed".to_string()));
            }
        }
        inner.page_calls += 1;

        // A fresh listing snapshots the backlog as it stands
        if cursor.is_none() {
            inner.listing = inner.pending.clone();
        }

        let start = cursor.unwrap_or(0) as usize;
        let end = (start + inner.page_size).min(inner.listing.len());
        let items = inner.listing[start..end].to_vec();
        let next_cursor = if end < inner.listing.len() {
            Some(end as u64)
        } else {
            None
        };

        Ok(PendingPage { items, next_cursor })
    }

    async fn approve_join_request(
        &self,
        channel_id: i64,
        user_id: i64,
    ) -> Result<(), PlatformError> {
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.entered.notify_one();
            if let Ok(permit) = gate.release.acquire().await {
                permit.forget();
            }
        }

        let mut inner = self.inner.lock().unwrap();
        inner.approve_calls.push((channel_id, user_id));

        let outcome = match inner
            .approve_errors
            .get_mut(&user_id)
            .and_then(|q| q.pop_front())
        {
            Some(error) => Err(error),
            None => {
                inner.pending.retain(|r| r.user_id != user_id);
                Ok(())
            }
        };

        if let Some((count, tx)) = &inner.cancel_after {
            if inner.approve_calls.len() as u64 >= *count {
                let _ = tx.send(true);
            }
        }

        outcome
    }

    async fn approve_all_join_requests(&self, _channel_id: i64) -> Result<bool, PlatformError> {
        let mut inner = self.inner.lock().unwrap();
        inner.bulk_calls += 1;
        let result = inner.bulk_result.clone();
        if matches!(result, Ok(true)) && inner.bulk_clears {
            inner.pending.clear();
        }
        result
    }
}
