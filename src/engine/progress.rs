//! Best-effort progress snapshots emitted during an individual run.

use super::report::RunCounters;
use serde::Serialize;
use tokio::sync::mpsc;

/// Point-in-time counter snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    pub approved: u64,
    pub skipped: u64,
    pub processed: u64,
}

impl From<RunCounters> for ProgressSnapshot {
    fn from(counters: RunCounters) -> Self {
        Self {
            approved: counters.approved,
            skipped: counters.skipped,
            processed: counters.processed,
        }
    }
}

/// Sink for progress snapshots
///
/// Emission must never block or fail the loop; implementations drop
/// snapshots they cannot deliver.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, snapshot: ProgressSnapshot);
}

/// Channel-backed sink for triggers that render incremental updates
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<ProgressSnapshot>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProgressSnapshot>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ProgressSink for ChannelSink {
    fn emit(&self, snapshot: ProgressSnapshot) {
        // Receiver may be gone; dropping the snapshot is fine
        let _ = self.tx.send(snapshot);
    }
}
