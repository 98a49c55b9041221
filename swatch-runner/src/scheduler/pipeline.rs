//! Pipeline scheduler
//!
//! Reads the record snapshot once, then fans records out to enrichment tasks.
//! A semaphore caps how many tasks run at once; each task owns its permit and
//! releases it when it ends, whatever the outcome.
//!
//! Outcomes are reaped as they complete and folded into the run summary.
//! A shutdown signal stops dispatch and lets in-flight tasks drain. Repeated
//! store-unavailable failures abort the run.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use swatch_core::{Record, RunSummary};
use swatch_store::StoreError;
use thiserror::Error;
use tokio::sync::{Semaphore, watch};
use tokio::task::{Id as TaskId, JoinError, JoinSet};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::context::EnrichmentContext;
use crate::outcome::{EnrichmentOutcome, SkipReason, TaskError};
use crate::task::EnrichmentTask;

/// Fatal run conditions
#[derive(Debug, Error)]
pub enum RunError {
    /// The snapshot could not be read, so no record was processed
    #[error("failed to fetch record snapshot: {0}")]
    Snapshot(#[source] StoreError),

    /// The store stopped answering mid-run
    #[error("record store unreachable after {consecutive} consecutive failures: {last_error}")]
    StoreUnreachable {
        consecutive: usize,
        last_error: StoreError,
        /// Outcomes gathered before the run aborted
        summary: Box<RunSummary>,
    },
}

/// Scheduler limits
#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub concurrency_limit: usize,
    pub snapshot_timeout: Duration,
    pub max_consecutive_store_failures: usize,
}

impl From<&Config> for SchedulerSettings {
    fn from(config: &Config) -> Self {
        Self {
            concurrency_limit: config.concurrency_limit,
            snapshot_timeout: config.snapshot_timeout,
            max_consecutive_store_failures: config.max_consecutive_store_failures,
        }
    }
}

/// Why dispatch stopped before the worklist was exhausted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Halt {
    Cancelled,
    StoreUnreachable,
}

/// Runs enrichment passes over the record store
pub struct PipelineScheduler {
    context: Arc<EnrichmentContext>,
    settings: SchedulerSettings,
}

impl PipelineScheduler {
    pub fn new(context: Arc<EnrichmentContext>, settings: SchedulerSettings) -> Self {
        Self { context, settings }
    }

    /// Runs one pass with no shutdown signal
    pub async fn run(&self) -> Result<RunSummary, RunError> {
        let (_never, shutdown) = watch::channel(false);
        self.run_until(shutdown).await
    }

    /// Runs one pass, stopping dispatch once `shutdown` turns true
    pub async fn run_until(
        &self,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<RunSummary, RunError> {
        let snapshot = self.fetch_snapshot().await?;
        let mut tally = Tally::new(
            snapshot.len(),
            self.settings.max_consecutive_store_failures,
        );

        info!(
            "Starting run {} over {} record(s) (concurrency: {})",
            tally.summary.run_id,
            snapshot.len(),
            self.settings.concurrency_limit
        );

        let permits = Arc::new(Semaphore::new(self.settings.concurrency_limit.max(1)));
        let mut tasks: JoinSet<EnrichmentOutcome> = JoinSet::new();
        let mut in_flight: HashMap<TaskId, String> = HashMap::new();
        let mut worklist = snapshot.into_iter();
        let mut halt = None;

        'dispatch: for record in worklist.by_ref() {
            let permit = loop {
                tokio::select! {
                    biased;

                    _ = wait_for_shutdown(&mut shutdown) => {
                        info!("Shutdown requested, draining in-flight tasks");
                        halt = Some(Halt::Cancelled);
                        tally.not_dispatched(record, SkipReason::Cancelled);
                        break 'dispatch;
                    }

                    Some(joined) = tasks.join_next_with_id(), if !tasks.is_empty() => {
                        tally.absorb(joined, &mut in_flight);
                        if tally.store_unreachable() {
                            error!("Record store unreachable, stopping dispatch");
                            halt = Some(Halt::StoreUnreachable);
                            tally.not_dispatched(record, SkipReason::RunAborted);
                            break 'dispatch;
                        }
                    }

                    permit = Arc::clone(&permits).acquire_owned() => match permit {
                        Ok(permit) => break permit,
                        Err(_) => {
                            halt = Some(Halt::Cancelled);
                            tally.not_dispatched(record, SkipReason::Cancelled);
                            break 'dispatch;
                        }
                    },
                }
            };

            let id = record.id.clone();
            let task = EnrichmentTask::new(record, Arc::clone(&self.context));
            let handle = tasks.spawn(async move {
                let _permit = permit;
                task.run().await
            });
            debug!("Dispatched record {}", id);
            in_flight.insert(handle.id(), id);
        }

        let reason = match halt {
            Some(Halt::StoreUnreachable) => SkipReason::RunAborted,
            _ => SkipReason::Cancelled,
        };
        for record in worklist {
            tally.not_dispatched(record, reason.clone());
        }

        while let Some(joined) = tasks.join_next_with_id().await {
            tally.absorb(joined, &mut in_flight);
        }

        tally.summary.cancelled = halt == Some(Halt::Cancelled);
        tally.summary.finish();

        if halt == Some(Halt::StoreUnreachable) || tally.store_unreachable() {
            return Err(tally.into_unreachable());
        }

        let summary = tally.summary;
        info!(
            "Run {} finished: {} total, {} succeeded, {} skipped, {} failed",
            summary.run_id, summary.total, summary.succeeded, summary.skipped, summary.failed
        );

        Ok(summary)
    }

    async fn fetch_snapshot(&self) -> Result<Vec<Record>, RunError> {
        let timeout = self.settings.snapshot_timeout;

        let result = match tokio::time::timeout(timeout, self.context.store.fetch_all()).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(timeout)),
        };

        result.map_err(|e| {
            error!("Failed to fetch record snapshot: {}", e);
            RunError::Snapshot(e)
        })
    }
}

/// Resolves once the shutdown flag is set; never resolves if the sender is gone
async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Accumulates outcomes into the run summary
struct Tally {
    summary: RunSummary,
    threshold: usize,
    consecutive_store_failures: usize,
    last_store_error: Option<StoreError>,
}

impl Tally {
    fn new(total: usize, threshold: usize) -> Self {
        Self {
            summary: RunSummary::begin(total),
            threshold: threshold.max(1),
            consecutive_store_failures: 0,
            last_store_error: None,
        }
    }

    fn absorb(
        &mut self,
        joined: Result<(TaskId, EnrichmentOutcome), JoinError>,
        in_flight: &mut HashMap<TaskId, String>,
    ) {
        match joined {
            Ok((task_id, outcome)) => {
                in_flight.remove(&task_id);
                self.record(outcome);
            }
            Err(err) => {
                let id = in_flight.remove(&err.id()).unwrap_or_default();
                error!("Task for record {} did not complete: {}", id, err);
                self.record(EnrichmentOutcome::Failed {
                    id,
                    error: TaskError::WorkerPanicked(err.to_string()),
                });
            }
        }
    }

    fn record(&mut self, outcome: EnrichmentOutcome) {
        if let Some(failure) = outcome.failure_record() {
            if let EnrichmentOutcome::Failed {
                error: TaskError::Store(store_error),
                ..
            } = &outcome
            {
                if store_error.is_unavailable() {
                    self.consecutive_store_failures += 1;
                    self.last_store_error = Some(store_error.clone());
                } else {
                    // The store answered, so it is reachable
                    self.consecutive_store_failures = 0;
                }
            }
            self.summary.record_failure(failure);
            return;
        }

        match outcome {
            EnrichmentOutcome::Success { .. } => {
                self.consecutive_store_failures = 0;
                self.summary.record_success();
            }
            EnrichmentOutcome::Skipped { .. } => self.summary.record_skip(),
            EnrichmentOutcome::Failed { .. } => {}
        }
    }

    fn not_dispatched(&mut self, record: Record, reason: SkipReason) {
        debug!("Record {} not dispatched: {}", record.id, reason);
        self.record(EnrichmentOutcome::Skipped {
            id: record.id,
            reason,
        });
    }

    fn store_unreachable(&self) -> bool {
        self.consecutive_store_failures >= self.threshold
    }

    fn into_unreachable(self) -> RunError {
        warn!(
            "Run {} aborted: {} succeeded, {} skipped, {} failed of {}",
            self.summary.run_id,
            self.summary.succeeded,
            self.summary.skipped,
            self.summary.failed,
            self.summary.total
        );

        RunError::StoreUnreachable {
            consecutive: self.consecutive_store_failures,
            last_error: self
                .last_store_error
                .unwrap_or_else(|| StoreError::Unavailable("unknown".to_string())),
            summary: Box::new(self.summary),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::palette::PaletteExtractor;
    use crate::test_support::{
        BrokenSnapshotStore, FailingStore, FakeFetcher, FixedPalette, HangingStore, record,
    };
    use async_trait::async_trait;
    use swatch_core::{FailureKind, HexColor, Rgb};
    use swatch_store::{MemoryRecordStore, RecordStore};
    use url::Url;

    use crate::fetcher::{FetchError, ImageFetcher};

    fn url(n: usize) -> String {
        format!("http://images.example.com/{}.jpg", n)
    }

    fn catalog(n: usize) -> Vec<Record> {
        (0..n)
            .map(|i| record(&format!("sku-{:03}", i), Some(&url(i))))
            .collect()
    }

    fn settings(concurrency_limit: usize) -> SchedulerSettings {
        SchedulerSettings {
            concurrency_limit,
            snapshot_timeout: Duration::from_secs(5),
            max_consecutive_store_failures: 3,
        }
    }

    fn scheduler(
        store: Arc<dyn RecordStore>,
        fetcher: Arc<dyn ImageFetcher>,
        extractor: Arc<dyn PaletteExtractor>,
        concurrency_limit: usize,
    ) -> PipelineScheduler {
        let context = EnrichmentContext::new(
            store,
            fetcher,
            extractor,
            2,
            Duration::from_secs(5),
        );
        PipelineScheduler::new(Arc::new(context), settings(concurrency_limit))
    }

    fn palette() -> Arc<FixedPalette> {
        Arc::new(FixedPalette(vec![
            Rgb::new(10, 20, 30),
            Rgb::new(200, 100, 50),
        ]))
    }

    fn assert_balanced(summary: &RunSummary) {
        assert_eq!(
            summary.succeeded + summary.skipped + summary.failed,
            summary.total
        );
    }

    #[tokio::test]
    async fn test_empty_snapshot() {
        let store = Arc::new(MemoryRecordStore::new());
        let summary = scheduler(store, Arc::new(FakeFetcher::new()), palette(), 4)
            .run()
            .await
            .unwrap();

        assert_eq!(summary.total, 0);
        assert_eq!(summary.succeeded, 0);
        assert_eq!(summary.skipped, 0);
        assert_eq!(summary.failed, 0);
        assert!(summary.failures.is_empty());
        assert!(!summary.cancelled);
    }

    #[tokio::test]
    async fn test_mixed_outcomes_are_isolated() {
        let mut records = catalog(4);
        records.push(record("no-url", None));
        records.push(record("bad-url", Some("not a url")));
        let store = Arc::new(MemoryRecordStore::with_records(records));
        let fetcher = Arc::new(FakeFetcher::new().failing(&url(1), 404));

        let summary = scheduler(store.clone(), fetcher.clone(), palette(), 2)
            .run()
            .await
            .unwrap();

        assert_eq!(summary.total, 6);
        assert_eq!(summary.succeeded, 3);
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.failed, 1);
        assert_balanced(&summary);
        assert_eq!(summary.failures[0].id, "sku-001");
        assert_eq!(summary.failures[0].kind, FailureKind::Fetch);

        // Skipped records never reach the fetcher
        assert_eq!(fetcher.calls(), 4);

        let expected: Vec<HexColor> = ["#0a141e", "#c86432"]
            .iter()
            .map(|h| HexColor::parse(h).unwrap())
            .collect();
        for id in ["sku-000", "sku-002", "sku-003"] {
            let stored = store.get(id).await.unwrap();
            assert_eq!(stored.calculated_colors.as_ref(), Some(&expected));
        }
        assert!(store.get("sku-001").await.unwrap().calculated_colors.is_none());
        assert!(store.get("no-url").await.unwrap().calculated_colors.is_none());
    }

    #[tokio::test]
    async fn test_concurrency_limit_is_respected() {
        let store = Arc::new(MemoryRecordStore::with_records(catalog(20)));
        let fetcher = Arc::new(FakeFetcher::new().with_delay(Duration::from_millis(20)));

        let summary = scheduler(store, fetcher.clone(), palette(), 3)
            .run()
            .await
            .unwrap();

        assert_eq!(summary.succeeded, 20);
        assert_eq!(fetcher.calls(), 20);
        assert!(fetcher.max_in_flight() <= 3);
        assert!(fetcher.max_in_flight() >= 2);
    }

    #[tokio::test]
    async fn test_rerun_is_reentrant_safe() {
        let store = Arc::new(MemoryRecordStore::with_records(catalog(5)));
        let scheduler = scheduler(store.clone(), Arc::new(FakeFetcher::new()), palette(), 2);

        let first = scheduler.run().await.unwrap();
        let after_first = store.fetch_all().await.unwrap();
        let second = scheduler.run().await.unwrap();
        let after_second = store.fetch_all().await.unwrap();

        assert_eq!(
            (first.total, first.succeeded, first.skipped, first.failed),
            (second.total, second.succeeded, second.skipped, second.failed)
        );
        assert_ne!(first.run_id, second.run_id);
        assert_eq!(after_first, after_second);
    }

    #[tokio::test]
    async fn test_panicking_task_does_not_affect_siblings() {
        let store = Arc::new(MemoryRecordStore::with_records(catalog(3)));
        let fetcher = Arc::new(FakeFetcher::new().panicking(&url(1)));

        let summary = scheduler(store, fetcher, palette(), 3)
            .run()
            .await
            .unwrap();

        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.failures[0].id, "sku-001");
        assert_eq!(summary.failures[0].kind, FailureKind::Panicked);
    }

    #[tokio::test]
    async fn test_rejected_updates_are_per_record_failures() {
        let inner = Arc::new(MemoryRecordStore::with_records(catalog(6)));
        let store = Arc::new(FailingStore::rejecting(
            inner.clone(),
            &["sku-000", "sku-001", "sku-002", "sku-003"],
        ));

        let summary = scheduler(store, Arc::new(FakeFetcher::new()), palette(), 1)
            .run()
            .await
            .unwrap();

        // Rejections prove the store is reachable, so the run completes
        assert_eq!(summary.failed, 4);
        assert_eq!(summary.succeeded, 2);
        assert!(summary.failures.iter().all(|f| f.kind == FailureKind::Store));
    }

    #[tokio::test]
    async fn test_unreachable_store_aborts_run() {
        let inner = Arc::new(MemoryRecordStore::with_records(catalog(50)));
        let store = Arc::new(FailingStore::unavailable(inner));
        let fetcher = Arc::new(FakeFetcher::new());

        let err = scheduler(store, fetcher.clone(), palette(), 2)
            .run()
            .await
            .unwrap_err();

        match err {
            RunError::StoreUnreachable {
                consecutive,
                last_error,
                summary,
            } => {
                assert!(consecutive >= 3);
                assert!(last_error.is_unavailable());
                assert_balanced(&summary);
                assert_eq!(summary.total, 50);
                assert!(summary.skipped > 0);
                assert_eq!(summary.succeeded, 0);
            }
            other => panic!("expected StoreUnreachable, got {:?}", other),
        }

        // Dispatch stopped well before the end of the worklist
        assert!(fetcher.calls() < 50);
    }

    #[tokio::test]
    async fn test_snapshot_failure_is_fatal() {
        let err = scheduler(
            Arc::new(BrokenSnapshotStore),
            Arc::new(FakeFetcher::new()),
            palette(),
            2,
        )
        .run()
        .await
        .unwrap_err();

        assert!(matches!(err, RunError::Snapshot(StoreError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_persist_timeouts_escalate_to_unreachable() {
        let inner = Arc::new(MemoryRecordStore::with_records(catalog(10)));
        let context = EnrichmentContext::new(
            Arc::new(HangingStore::updates(inner.clone())),
            Arc::new(FakeFetcher::new()),
            palette(),
            2,
            Duration::from_millis(50),
        );
        let scheduler = PipelineScheduler::new(Arc::new(context), settings(2));

        let err = scheduler.run().await.unwrap_err();

        match err {
            RunError::StoreUnreachable {
                consecutive,
                last_error,
                summary,
            } => {
                assert!(consecutive >= 3);
                assert!(matches!(last_error, StoreError::Timeout(t) if t == Duration::from_millis(50)));
                assert_balanced(&summary);
                assert_eq!(summary.total, 10);
                assert_eq!(summary.succeeded, 0);
                assert!(summary.failed >= 3);
                assert!(summary.skipped > 0);
                assert!(summary.failures.iter().all(|f| f.kind == FailureKind::Store));
            }
            other => panic!("expected StoreUnreachable, got {:?}", other),
        }

        // Timed-out updates never reached the records
        for record in inner.fetch_all().await.unwrap() {
            assert!(record.calculated_colors.is_none());
        }
    }

    #[tokio::test]
    async fn test_snapshot_timeout_is_fatal() {
        let context = EnrichmentContext::new(
            Arc::new(HangingStore::snapshot()),
            Arc::new(FakeFetcher::new()),
            palette(),
            2,
            Duration::from_secs(5),
        );
        let settings = SchedulerSettings {
            snapshot_timeout: Duration::from_millis(50),
            ..settings(2)
        };

        let err = PipelineScheduler::new(Arc::new(context), settings)
            .run()
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            RunError::Snapshot(StoreError::Timeout(t)) if t == Duration::from_millis(50)
        ));
    }

    #[tokio::test]
    async fn test_shutdown_before_start_dispatches_nothing() {
        let store = Arc::new(MemoryRecordStore::with_records(catalog(4)));
        let fetcher = Arc::new(FakeFetcher::new());
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();

        let summary = scheduler(store, fetcher.clone(), palette(), 2)
            .run_until(rx)
            .await
            .unwrap();

        assert!(summary.cancelled);
        assert_eq!(summary.skipped, 4);
        assert_balanced(&summary);
        assert_eq!(fetcher.calls(), 0);
    }

    /// Fetcher that raises the shutdown flag during its first fetch
    struct ShutdownOnFetch {
        shutdown: watch::Sender<bool>,
        inner: FakeFetcher,
    }

    #[async_trait]
    impl ImageFetcher for ShutdownOnFetch {
        async fn fetch(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
            self.shutdown.send_replace(true);
            self.inner.fetch(url).await
        }
    }

    #[tokio::test]
    async fn test_shutdown_drains_in_flight_tasks() {
        let store = Arc::new(MemoryRecordStore::with_records(catalog(5)));
        let (tx, rx) = watch::channel(false);
        let fetcher = Arc::new(ShutdownOnFetch {
            shutdown: tx,
            inner: FakeFetcher::new().with_delay(Duration::from_millis(20)),
        });

        let summary = scheduler(store.clone(), fetcher, palette(), 1)
            .run_until(rx)
            .await
            .unwrap();

        assert!(summary.cancelled);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.skipped, 4);
        assert_balanced(&summary);

        // The in-flight record finished and was persisted
        assert!(store.get("sku-000").await.unwrap().calculated_colors.is_some());
        assert!(store.get("sku-001").await.unwrap().calculated_colors.is_none());
    }
}
