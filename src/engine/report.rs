//! Run outcome types: counters, result assembly, and the error taxonomy.

use serde::Serialize;

/// A resolved channel reference
///
/// Constructed only after successful resolution; `id` and `title` are the
/// platform's canonical values, `raw` is the caller's original input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelRef {
    /// Caller-supplied identifier (numeric or handle form)
    pub raw: String,
    /// Canonical channel ID
    pub id: i64,
    /// Human-readable channel title
    pub title: String,
}

/// Monotonic counters for a single run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunCounters {
    pub approved: u64,
    pub skipped: u64,
    pub processed: u64,
}

impl RunCounters {
    /// Count one approved request
    pub fn record_approved(&mut self) {
        self.approved += 1;
        self.processed += 1;
    }

    /// Count one skipped request
    pub fn record_skipped(&mut self) {
        self.skipped += 1;
        self.processed += 1;
    }

    /// Invariant: every processed item was approved or skipped
    pub fn is_consistent(&self) -> bool {
        self.approved + self.skipped == self.processed
    }
}

/// Outcome of processing one pending request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalOutcome {
    Approved,
    Skipped(String),
    /// Platform mandated a wait of this many seconds
    Deferred(u64),
}

/// Which strategy produced the result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMethod {
    Bulk,
    Individual,
}

/// Terminal status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    Error,
}

/// The engine's sole output: exactly one per invocation
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub status: RunStatus,
    /// Strategy used; `None` when the run failed before a strategy ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<RunMethod>,
    /// Resolved channel; `None` when resolution itself failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<ChannelRef>,
    pub counters: RunCounters,
    /// Bulk approval cleared the backlog without reporting a count
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub approved_all: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunResult {
    /// Successful individual-loop run
    pub fn success(channel: ChannelRef, counters: RunCounters) -> Self {
        Self {
            status: RunStatus::Success,
            method: Some(RunMethod::Individual),
            channel: Some(channel),
            counters,
            approved_all: false,
            error: None,
        }
    }

    /// Successful bulk run; the platform does not report a count
    pub fn bulk_success(channel: ChannelRef) -> Self {
        Self {
            status: RunStatus::Success,
            method: Some(RunMethod::Bulk),
            channel: Some(channel),
            counters: RunCounters::default(),
            approved_all: true,
            error: None,
        }
    }

    /// Failed run, carrying whatever counters had accumulated
    pub fn failure(
        method: Option<RunMethod>,
        channel: Option<ChannelRef>,
        counters: RunCounters,
        error: impl Into<String>,
    ) -> Self {
        Self {
            status: RunStatus::Error,
            method,
            channel,
            counters,
            approved_all: false,
            error: Some(error.into()),
        }
    }

    /// One-line summary for logs and chat replies
    pub fn summary(&self) -> String {
        let channel = self
            .channel
            .as_ref()
            .map(|c| c.title.clone())
            .unwrap_or_else(|| "?".to_string());

        match self.status {
            RunStatus::Success if self.approved_all => {
                format!("Approved all pending requests for {} (bulk)", channel)
            }
            RunStatus::Success => format!(
                "Approved {} of {} requests for {} ({} skipped)",
                self.counters.approved, self.counters.processed, channel, self.counters.skipped
            ),
            RunStatus::Error => format!(
                "Run failed for {}: {} ({} approved, {} skipped before failure)",
                channel,
                self.error.as_deref().unwrap_or("unknown error"),
                self.counters.approved,
                self.counters.skipped
            ),
        }
    }
}

/// Errors from run orchestration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunError {
    /// Resolution or the implicit join failed; fatal before any approvals
    ChannelUnreachable(String),
    /// Acting account lacks the owner/administrator role
    InsufficientPrivilege(String),
    /// Another run is already active for this channel
    AlreadyRunning(i64),
    /// Backlog listing failed mid-run; partial counters are preserved
    ListingFailed(String),
    /// Cancellation was requested; partial counters are preserved
    Cancelled,
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunError::ChannelUnreachable(msg) => write!(f, "channel unreachable: {}", msg),
            RunError::InsufficientPrivilege(msg) => {
                write!(f, "insufficient privilege: {}", msg)
            }
            RunError::AlreadyRunning(id) => {
                write!(f, "a run is already active for channel {}", id)
            }
            RunError::ListingFailed(msg) => write!(f, "backlog listing failed: {}", msg),
            RunError::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::error::Error for RunError {}
