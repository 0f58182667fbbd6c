//! Join-request approval engine.
//!
//! Control flow per run: resolve the channel, claim it against concurrent
//! runs, verify authority, try the bulk shortcut, and otherwise drive the
//! individual approval loop. Every started run yields exactly one
//! [`RunResult`].

pub mod authority;
pub mod backlog;
pub mod progress;
pub mod report;
pub mod resolver;
pub mod run_loop;

pub use progress::{ChannelSink, ProgressSink, ProgressSnapshot};
pub use report::{
    ApprovalOutcome, ChannelRef, RunCounters, RunError, RunMethod, RunResult, RunStatus,
};
pub use run_loop::PacingPolicy;

use crate::platform::PlatformClient;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

/// The approval engine: one instance serves all runs
pub struct ApprovalEngine {
    platform: Arc<dyn PlatformClient>,
    policy: PacingPolicy,
    /// Channel IDs with a run in flight
    active: Mutex<HashSet<i64>>,
}

/// Removes the channel from the active set when the run ends
struct ActiveGuard<'a> {
    engine: &'a ApprovalEngine,
    id: i64,
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.engine.active.lock().unwrap().remove(&self.id);
    }
}

impl ApprovalEngine {
    pub fn new(platform: Arc<dyn PlatformClient>, policy: PacingPolicy) -> Arc<Self> {
        Arc::new(Self {
            platform,
            policy,
            active: Mutex::new(HashSet::new()),
        })
    }

    /// Number of runs currently in flight
    pub fn active_runs(&self) -> usize {
        self.active.lock().unwrap().len()
    }

    /// Execute one approval run.
    ///
    /// `Err` is returned only when the run is rejected before it starts
    /// (another run holds the same channel). Every accepted run produces
    /// exactly one `RunResult`, success or failure.
    pub async fn run(
        &self,
        raw: &str,
        limit: Option<u64>,
        sink: Option<&dyn ProgressSink>,
        mut cancel: watch::Receiver<bool>,
    ) -> Result<RunResult, RunError> {
        let channel = match resolver::resolve(self.platform.as_ref(), raw).await {
            Ok(channel) => channel,
            Err(e) => {
                return Ok(RunResult::failure(
                    None,
                    None,
                    RunCounters::default(),
                    e.to_string(),
                ))
            }
        };

        let _guard = match self.claim(channel.id) {
            Some(guard) => guard,
            None => return Err(RunError::AlreadyRunning(channel.id)),
        };

        if let Err(e) = authority::check_authority(self.platform.as_ref(), &channel).await {
            return Ok(RunResult::failure(
                None,
                Some(channel),
                RunCounters::default(),
                e.to_string(),
            ));
        }

        eprintln!(
            "[engine] run started for {} (id {}, limit {:?})",
            channel.title, channel.id, limit
        );

        // One bulk attempt; any failure is a routing signal, not an error.
        // A true result is advisory, so verify with a listing probe before
        // declaring the backlog cleared.
        match self.platform.approve_all_join_requests(channel.id).await {
            Ok(true) => match self.platform.pending_page(channel.id, None).await {
                Ok(page) if page.items.is_empty() => {
                    eprintln!(
                        "[engine] bulk approval cleared the backlog for {}",
                        channel.title
                    );
                    return Ok(RunResult::bulk_success(channel));
                }
                Ok(_) => {
                    eprintln!("[engine] bulk approval left requests pending; falling back")
                }
                Err(e) => {
                    eprintln!("[engine] bulk verification failed ({}); falling back", e)
                }
            },
            Ok(false) => eprintln!("[engine] bulk approval unavailable; falling back"),
            Err(e) => eprintln!("[engine] bulk approval failed ({}); falling back", e),
        }

        let result = run_loop::run_individual_loop(
            self.platform.clone(),
            &channel,
            limit,
            &self.policy,
            sink,
            &mut cancel,
        )
        .await;

        eprintln!("[engine] {}", result.summary());
        Ok(result)
    }

    fn claim(&self, id: i64) -> Option<ActiveGuard<'_>> {
        let mut active = self.active.lock().unwrap();
        if active.insert(id) {
            Some(ActiveGuard { engine: self, id })
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{PlatformError, Role};
    use crate::test_utils::{ApprovalGate, MockPlatform};
    use std::time::Duration;

    fn engine(mock: &MockPlatform) -> Arc<ApprovalEngine> {
        ApprovalEngine::new(
            Arc::new(mock.clone()),
            PacingPolicy {
                pacing_delay: Duration::ZERO,
                progress_every: 10,
            },
        )
    }

    fn cancel_rx() -> (watch::Sender<bool>, watch::Receiver<bool>) {
        watch::channel(false)
    }

    #[tokio::test]
    async fn test_bulk_success_skips_individual_loop() {
        let mock = MockPlatform::new()
            .with_pending(1..=3)
            .with_bulk_result(Ok(true))
            .bulk_clears_backlog();
        let engine = engine(&mock);
        let (_tx, rx) = cancel_rx();

        let result = engine.run("@mock", None, None, rx).await.unwrap();
        assert_eq!(result.status, RunStatus::Success);
        assert_eq!(result.method, Some(RunMethod::Bulk));
        assert!(result.approved_all);
        assert_eq!(mock.bulk_calls(), 1);
        assert!(mock.approve_calls().is_empty());
    }

    #[tokio::test]
    async fn test_advisory_bulk_falls_back_when_requests_remain() {
        let mock = MockPlatform::new()
            .with_pending(1..=3)
            .with_bulk_result(Ok(true));
        let engine = engine(&mock);
        let (_tx, rx) = cancel_rx();

        let result = engine.run("@mock", None, None, rx).await.unwrap();
        assert_eq!(result.method, Some(RunMethod::Individual));
        assert_eq!(result.counters.approved, 3);
        assert_eq!(mock.approve_calls().len(), 3);
    }

    #[tokio::test]
    async fn test_bulk_unavailable_falls_back() {
        let mock = MockPlatform::new().with_pending(1..=3);
        let engine = engine(&mock);
        let (_tx, rx) = cancel_rx();

        let result = engine.run("@mock", None, None, rx).await.unwrap();
        assert_eq!(result.status, RunStatus::Success);
        assert_eq!(result.method, Some(RunMethod::Individual));
        assert_eq!(result.counters.approved, 3);
    }

    #[tokio::test]
    async fn test_bulk_error_routes_instead_of_failing() {
        let mock = MockPlatform::new()
            .with_pending([7])
            .with_bulk_result(Err(PlatformError::Transport("bulk broke".to_string())));
        let engine = engine(&mock);
        let (_tx, rx) = cancel_rx();

        let result = engine.run("@mock", None, None, rx).await.unwrap();
        assert_eq!(result.status, RunStatus::Success);
        assert_eq!(result.counters.approved, 1);
    }

    #[tokio::test]
    async fn test_resolution_failure_yields_error_result() {
        let mock = MockPlatform::new()
            .fail_resolution(PlatformError::NotFound("@ghost".to_string()));
        let engine = engine(&mock);
        let (_tx, rx) = cancel_rx();

        let result = engine.run("@ghost", None, None, rx).await.unwrap();
        assert_eq!(result.status, RunStatus::Error);
        assert_eq!(result.counters.processed, 0);
        assert!(result.channel.is_none());
        assert!(result.error.unwrap().contains("channel unreachable"));
    }

    #[tokio::test]
    async fn test_privilege_failure_aborts_before_approvals() {
        let mock = MockPlatform::new().with_pending(1..=3).with_role(Role::Member);
        let engine = engine(&mock);
        let (_tx, rx) = cancel_rx();

        let result = engine.run("@mock", None, None, rx).await.unwrap();
        assert_eq!(result.status, RunStatus::Error);
        assert_eq!(result.counters.processed, 0);
        assert!(mock.approve_calls().is_empty());
        assert!(result.error.unwrap().contains("insufficient privilege"));
    }

    #[tokio::test]
    async fn test_second_run_rejected_while_active() {
        let gate = ApprovalGate::new();
        let mock = MockPlatform::new().with_pending([1]).with_gate(gate.clone());
        let engine = engine(&mock);

        let (_tx1, rx1) = cancel_rx();
        let first = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.run("@mock", None, None, rx1).await })
        };

        // Wait until the first run is inside an approval call
        gate.entered.notified().await;

        let (_tx2, rx2) = cancel_rx();
        let second = engine.run("@mock", None, None, rx2).await;
        assert_eq!(second.unwrap_err(), RunError::AlreadyRunning(-100));

        gate.release.add_permits(10);
        let first = first.await.unwrap().unwrap();
        assert_eq!(first.status, RunStatus::Success);
    }

    #[tokio::test]
    async fn test_channel_released_after_run() {
        let mock = MockPlatform::new().with_pending([1]);
        let engine = engine(&mock);

        let (_tx, rx) = cancel_rx();
        engine.run("@mock", None, None, rx).await.unwrap();
        assert_eq!(engine.active_runs(), 0);

        let (_tx, rx) = cancel_rx();
        let again = engine.run("@mock", None, None, rx).await;
        assert!(again.is_ok());
    }
}
