//! Host lifecycle hooks for the remote call queue.
//!
//! Losing focus pauses dispatch and regaining it resumes. Shutdown gives a
//! final save a bounded number of ticks before the queue is stopped, after
//! which every outstanding call resolves as cancelled.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::domain::{QueueDriveError, QueueState, RemoteCallQueue, RemoteError};

/// Result of [`LifecycleHooks::shutdown`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// The final save completed.
    Saved,
    /// The final save failed; shutdown continued.
    SaveFailed(RemoteError),
    /// The final save did not finish within the tick budget.
    TimedOut,
    /// The queue had already been stopped; nothing was saved.
    AlreadyStopped,
}

/// Maps host focus and shutdown events onto a [`RemoteCallQueue`].
#[derive(Clone)]
pub struct LifecycleHooks {
    queue: Arc<RemoteCallQueue>,
}

impl LifecycleHooks {
    /// Hooks driving `queue`.
    pub fn new(queue: Arc<RemoteCallQueue>) -> Self {
        Self { queue }
    }

    /// Pause dispatch when focus is lost and resume it when regained.
    pub fn focus_changed(&self, focused: bool) {
        if focused {
            self.queue.resume();
        } else {
            self.queue.pause();
        }
    }

    /// Flush `final_save` within `budget` ticks, then stop the queue.
    ///
    /// The queue is resumed first so a save issued while unfocused can still
    /// run. A failed or unfinished save is logged and does not prevent the
    /// queue from stopping.
    pub fn shutdown<F>(&self, final_save: F, budget: usize) -> ShutdownOutcome
    where
        F: Future<Output = Result<(), RemoteError>>,
    {
        if !self.begin_shutdown() {
            return ShutdownOutcome::AlreadyStopped;
        }
        let flushed = self.queue.drive(final_save, budget);
        self.finish_shutdown(flushed)
    }

    /// Like [`shutdown`](Self::shutdown), but paces ticks on the tokio timer
    /// so I/O-backed adapters can make progress.
    pub async fn shutdown_paced<F>(
        &self,
        final_save: F,
        period: Duration,
        budget: usize,
    ) -> ShutdownOutcome
    where
        F: Future<Output = Result<(), RemoteError>>,
    {
        if !self.begin_shutdown() {
            return ShutdownOutcome::AlreadyStopped;
        }
        let flushed = self.queue.drive_paced(final_save, period, budget).await;
        self.finish_shutdown(flushed)
    }

    fn begin_shutdown(&self) -> bool {
        if self.queue.state() == QueueState::Stopped {
            warn!("shutdown requested on a stopped queue; skipping final save");
            return false;
        }
        self.queue.resume();
        true
    }

    fn finish_shutdown(
        &self,
        flushed: Result<Result<(), RemoteError>, QueueDriveError>,
    ) -> ShutdownOutcome {
        let outcome = match flushed {
            Ok(Ok(())) => ShutdownOutcome::Saved,
            Ok(Err(err)) => {
                warn!(error = %err, "final save failed during shutdown");
                ShutdownOutcome::SaveFailed(err)
            }
            Err(err) => {
                warn!(error = %err, "final save abandoned during shutdown");
                ShutdownOutcome::TimedOut
            }
        };
        self.queue.stop();
        info!(?outcome, "client shut down");
        outcome
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.

    use super::*;
    use crate::domain::game_data::STAGE;
    use crate::domain::{
        DataSyncService, Identity, QueuedRemote, RecordId, RemoteErrorKind, RemoteOperation,
    };
    use crate::outbound::memory::InMemoryRemoteService;
    use crate::test_support::StaticIdentity;
    use rstest::{fixture, rstest};

    struct Harness {
        remote: Arc<InMemoryRemoteService>,
        queue: Arc<RemoteCallQueue>,
        hooks: LifecycleHooks,
        data: DataSyncService,
        owner: RecordId,
    }

    fn harness_with(remote: InMemoryRemoteService) -> Harness {
        let remote = Arc::new(remote);
        let owner = remote.create_guest_account(Some("Ada")).record_id;
        let queue = Arc::new(RemoteCallQueue::new(remote.clone()));
        let data = DataSyncService::new(
            QueuedRemote::new(queue.clone()),
            Arc::new(StaticIdentity::new(Some(Identity::new(owner.clone(), None)))),
        );
        Harness {
            remote,
            hooks: LifecycleHooks::new(queue.clone()),
            queue,
            data,
            owner,
        }
    }

    #[fixture]
    fn harness() -> Harness {
        harness_with(InMemoryRemoteService::new())
    }

    #[rstest]
    fn focus_toggles_pause_and_resume(harness: Harness) {
        harness.hooks.focus_changed(false);
        assert_eq!(harness.queue.state(), QueueState::Paused);
        harness.hooks.focus_changed(true);
        assert_eq!(harness.queue.state(), QueueState::Running);
    }

    #[rstest]
    fn shutdown_flushes_save_issued_while_unfocused(harness: Harness) {
        harness.hooks.focus_changed(false);
        let progress = STAGE.default_value();
        let save = harness.data.save_category(&STAGE, &progress);

        let outcome = harness.hooks.shutdown(save, 64);

        assert_eq!(outcome, ShutdownOutcome::Saved);
        assert_eq!(harness.queue.state(), QueueState::Stopped);
        assert_eq!(harness.remote.rows(&harness.owner, "stage").len(), 1);
    }

    #[rstest]
    fn failed_save_still_stops_the_queue(harness: Harness) {
        harness
            .remote
            .fail_next(RemoteOperation::FetchRecord, RemoteError::network("offline"));
        let progress = STAGE.default_value();
        let save = harness.data.save_category(&STAGE, &progress);

        let outcome = harness.hooks.shutdown(save, 64);

        assert!(matches!(
            outcome,
            ShutdownOutcome::SaveFailed(ref err) if err.kind() == RemoteErrorKind::NetworkFailure
        ));
        assert_eq!(harness.queue.state(), QueueState::Stopped);
    }

    #[test]
    fn exhausted_budget_cancels_the_outstanding_call() {
        let harness = harness_with(InMemoryRemoteService::new().with_latency(50));
        let progress = STAGE.default_value();
        let save = harness.data.save_category(&STAGE, &progress);

        let outcome = harness.hooks.shutdown(save, 4);

        assert_eq!(outcome, ShutdownOutcome::TimedOut);
        assert_eq!(harness.queue.state(), QueueState::Stopped);
        assert!(harness.queue.is_idle());
    }

    #[tokio::test]
    async fn paced_shutdown_flushes_the_save() {
        let harness = harness_with(InMemoryRemoteService::new().with_latency(1));
        let progress = STAGE.default_value();
        let save = harness.data.save_category(&STAGE, &progress);

        let outcome = harness
            .hooks
            .shutdown_paced(save, Duration::from_millis(1), 64)
            .await;

        assert_eq!(outcome, ShutdownOutcome::Saved);
        assert_eq!(harness.queue.state(), QueueState::Stopped);
    }

    #[rstest]
    fn focus_changes_after_shutdown_are_ignored(harness: Harness) {
        assert_eq!(
            harness.hooks.shutdown(async { Ok(()) }, 1),
            ShutdownOutcome::Saved
        );
        harness.hooks.focus_changed(true);
        assert_eq!(harness.queue.state(), QueueState::Stopped);
        assert_eq!(
            harness.hooks.shutdown(async { Ok(()) }, 1),
            ShutdownOutcome::AlreadyStopped
        );
    }
}
