//! Periodic and manual snapshot refreshes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::model::RefreshSummary;
use crate::store::RecordStore;

const FAILURE_HINT: &str = "Could not update the cache. Ensure the API is reachable (VPN connected?)";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum RefreshOutcome {
    Updated(RefreshSummary),
    Failed { reason: String },
    /// Another refresh was already in flight
    Skipped,
}

pub struct RefreshScheduler {
    store: Arc<RecordStore>,
    interval: Duration,
    in_flight: AtomicBool,
}

impl RefreshScheduler {
    pub fn new(store: Arc<RecordStore>, interval: Duration) -> Self {
        Self {
            store,
            interval,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Refresh now and then every `interval` until the handle is aborted.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                // First tick completes immediately
                ticker.tick().await;
                self.refresh_now().await;
            }
        })
    }

    /// Run one refresh, logging instead of returning any failure.
    pub async fn refresh_now(&self) -> RefreshOutcome {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Refresh already in progress, skipping");
            return RefreshOutcome::Skipped;
        }

        let result = self.store.refresh().await;
        self.in_flight.store(false, Ordering::Release);

        match result {
            Ok(summary) => RefreshOutcome::Updated(summary),
            Err(e) => {
                tracing::warn!("{}: {}", FAILURE_HINT, e);
                RefreshOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStorage;
    use crate::testing::{decider, FakeSource};

    fn scheduler(source: Arc<FakeSource>, interval: Duration) -> Arc<RefreshScheduler> {
        let store = Arc::new(RecordStore::new(source, Arc::new(MemoryStorage::new())));
        Arc::new(RefreshScheduler::new(store, interval))
    }

    #[tokio::test]
    async fn manual_refresh_reports_update() {
        let source = Arc::new(FakeSource::new(vec![decider("a", 1)], vec![]));
        let scheduler = scheduler(source, Duration::from_secs(60));

        match scheduler.refresh_now().await {
            RefreshOutcome::Updated(summary) => assert_eq!(summary.deciders, 1),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn failures_are_reported_not_raised() {
        let source = Arc::new(FakeSource::new(vec![decider("a", 1)], vec![]));
        let scheduler = scheduler(source.clone(), Duration::from_secs(60));
        scheduler.refresh_now().await;

        source.fail_deciders.store(true, Ordering::SeqCst);
        let outcome = scheduler.refresh_now().await;
        assert!(matches!(outcome, RefreshOutcome::Failed { .. }));

        // Stale data is kept
        assert_eq!(scheduler.store.get().unwrap().deciders.len(), 1);
        // The guard is released after a failure
        source.fail_deciders.store(false, Ordering::SeqCst);
        assert!(matches!(
            scheduler.refresh_now().await,
            RefreshOutcome::Updated(_)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_trigger_is_skipped() {
        let source = Arc::new(FakeSource::new(vec![], vec![]));
        *source.delay.lock().unwrap() = Duration::from_secs(2);
        let scheduler = scheduler(source.clone(), Duration::from_secs(60));

        let (first, second) = tokio::join!(scheduler.refresh_now(), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            scheduler.refresh_now().await
        });

        assert!(matches!(first, RefreshOutcome::Updated(_)));
        assert_eq!(second, RefreshOutcome::Skipped);
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn spawned_task_refreshes_on_start_and_interval() {
        let source = Arc::new(FakeSource::new(vec![decider("a", 1)], vec![]));
        let scheduler = scheduler(source.clone(), Duration::from_secs(60));
        let handle = Arc::clone(&scheduler).spawn();

        tokio::time::sleep(Duration::from_secs(1)).await;
        // Startup refresh: one call per resource
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 4);

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn spawned_task_survives_failures() {
        let source = Arc::new(FakeSource::new(vec![], vec![]));
        source.fail_experiments.store(true, Ordering::SeqCst);
        let scheduler = scheduler(source.clone(), Duration::from_secs(10));
        let handle = Arc::clone(&scheduler).spawn();

        tokio::time::sleep(Duration::from_secs(25)).await;
        assert!(!handle.is_finished());
        assert_eq!(source.calls.load(Ordering::SeqCst), 6);
        assert!(scheduler.store.get().is_none());

        handle.abort();
    }
}
