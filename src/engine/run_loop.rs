//! The individual approval loop.
//!
//! Pages through the pending backlog one request at a time, pacing itself
//! under the platform's per-account rate ceiling. Per-item failures are
//! counted and skipped; only listing failures and cancellation end the
//! loop early, and both still return the accumulated counters.

use super::backlog::Backlog;
use super::progress::ProgressSink;
use super::report::{ApprovalOutcome, ChannelRef, RunCounters, RunError, RunMethod, RunResult};
use crate::platform::{PlatformClient, PlatformError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Pacing and reporting policy for the individual loop
#[derive(Debug, Clone)]
pub struct PacingPolicy {
    /// Fixed delay between successful approvals
    pub pacing_delay: Duration,
    /// Emit a progress snapshot every this many processed items
    pub progress_every: u64,
}

impl Default for PacingPolicy {
    fn default() -> Self {
        Self {
            pacing_delay: Duration::from_millis(750),
            progress_every: 10,
        }
    }
}

/// Run the individual loop until the backlog is exhausted, the limit is
/// reached, or cancellation is observed. Always returns a `RunResult`.
pub async fn run_individual_loop(
    platform: Arc<dyn PlatformClient>,
    channel: &ChannelRef,
    limit: Option<u64>,
    policy: &PacingPolicy,
    sink: Option<&dyn ProgressSink>,
    cancel: &mut watch::Receiver<bool>,
) -> RunResult {
    let mut counters = RunCounters::default();
    let mut backlog = Backlog::new(platform.clone(), channel.id);

    loop {
        if let Some(limit) = limit {
            if counters.approved >= limit {
                break;
            }
        }
        if *cancel.borrow() {
            return cancelled_result(channel, counters);
        }

        let item = match backlog.next().await {
            Ok(Some(item)) => item,
            Ok(None) => break,
            Err(e) => {
                return RunResult::failure(
                    Some(RunMethod::Individual),
                    Some(channel.clone()),
                    counters,
                    RunError::ListingFailed(e.to_string()).to_string(),
                );
            }
        };

        let result = platform.approve_join_request(channel.id, item.user_id).await;
        match outcome_of(result) {
            ApprovalOutcome::Approved => {
                counters.record_approved();
                emit_if_due(&counters, policy, sink);
                if pace(policy.pacing_delay, cancel).await {
                    return cancelled_result(channel, counters);
                }
            }
            ApprovalOutcome::Deferred(secs) => {
                // The mandated wait is pacing, not a failure; without a
                // same-item retry the request counts as skipped.
                eprintln!(
                    "[engine] rate limited on user {}, waiting {}s",
                    item.user_id, secs
                );
                counters.record_skipped();
                emit_if_due(&counters, policy, sink);
                if pace(Duration::from_secs(secs), cancel).await {
                    return cancelled_result(channel, counters);
                }
            }
            ApprovalOutcome::Skipped(reason) => {
                eprintln!("[engine] skipping user {}: {}", item.user_id, reason);
                counters.record_skipped();
                emit_if_due(&counters, policy, sink);
            }
        }
    }

    RunResult::success(channel.clone(), counters)
}

/// Classify one approval call result
fn outcome_of(result: Result<(), PlatformError>) -> ApprovalOutcome {
    match result {
        Ok(()) => ApprovalOutcome::Approved,
        Err(PlatformError::RateLimited(secs)) => ApprovalOutcome::Deferred(secs),
        Err(e) => ApprovalOutcome::Skipped(e.to_string()),
    }
}

fn emit_if_due(counters: &RunCounters, policy: &PacingPolicy, sink: Option<&dyn ProgressSink>) {
    if policy.progress_every == 0 || counters.processed % policy.progress_every != 0 {
        return;
    }
    if let Some(sink) = sink {
        sink.emit((*counters).into());
    }
}

fn cancelled_result(channel: &ChannelRef, counters: RunCounters) -> RunResult {
    RunResult::failure(
        Some(RunMethod::Individual),
        Some(channel.clone()),
        counters,
        RunError::Cancelled.to_string(),
    )
}

/// Sleep for `delay`, returning early if cancellation arrives.
/// Returns true when the run was cancelled.
async fn pace(delay: Duration, cancel: &mut watch::Receiver<bool>) -> bool {
    if delay.is_zero() {
        return *cancel.borrow();
    }
    tokio::select! {
        _ = tokio::time::sleep(delay) => false,
        _ = cancelled(cancel) => true,
    }
}

/// Resolves only once cancellation is requested
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow() {
            return;
        }
        if cancel.changed().await.is_err() {
            // Sender gone; cancellation can no longer arrive
            std::future::pending::<()>().await;
        }
    }
}
