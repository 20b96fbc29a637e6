//! Call fetcher: the producer side of the pipeline.
//!
//! Every interval the fetcher pulls the current call listing for one system,
//! drops calls already in the ledger and pushes the rest onto the queue. The
//! first successful cycle only primes the ledger, so calls that existed before
//! startup are never played.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::ledger::SeenLedger;
use super::queue::{CallSender, EnqueueOutcome};
use crate::adapters::CallSource;

/// Fetcher mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// Record every listed call as seen, enqueue nothing
    Priming,
    /// Enqueue calls not seen before
    SteadyState,
}

/// What a single successful cycle did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Calls in the listing
    pub listed: usize,
    /// Calls recorded as baseline during priming
    pub primed: usize,
    /// New calls pushed onto the queue
    pub enqueued: usize,
    /// Pending calls discarded to make room
    pub evicted: usize,
    /// Calls skipped because they were already seen
    pub already_seen: usize,
}

/// Producer loop state
pub struct CallFetcher {
    source: Arc<dyn CallSource>,
    system: String,
    ledger: Arc<SeenLedger>,
    queue: CallSender,
    interval: Duration,
    mode: FetchMode,
}

impl CallFetcher {
    pub fn new(
        source: Arc<dyn CallSource>,
        system: impl Into<String>,
        ledger: Arc<SeenLedger>,
        queue: CallSender,
        interval: Duration,
    ) -> Self {
        Self {
            source,
            system: system.into(),
            ledger,
            queue,
            interval,
            mode: FetchMode::Priming,
        }
    }

    pub fn mode(&self) -> FetchMode {
        self.mode
    }

    pub fn queue(&self) -> &CallSender {
        &self.queue
    }

    /// Run until `shutdown` is cancelled.
    ///
    /// Waits one interval before every cycle, including the first. Failed
    /// cycles are logged and retried on the next tick.
    pub async fn run(mut self, shutdown: CancellationToken) {
        debug!(system = %self.system, interval = ?self.interval, "Call fetcher started");

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }

            match self.poll_once().await {
                Ok(report) => debug!(
                    listed = report.listed,
                    primed = report.primed,
                    enqueued = report.enqueued,
                    evicted = report.evicted,
                    already_seen = report.already_seen,
                    queued = self.queue.len(),
                    "Fetch cycle complete"
                ),
                Err(e) => error!("Error fetching calls: {:#}", e),
            }
        }

        info!("Stopping call fetcher.");
    }

    /// Run a single fetch cycle.
    ///
    /// On error nothing is enqueued, the ledger is untouched and the mode does
    /// not change.
    #[instrument(skip(self), fields(system = %self.system, mode = ?self.mode))]
    pub async fn poll_once(&mut self) -> Result<CycleReport> {
        debug!("Fetching calls...");
        let calls = self.source.list_calls(&self.system).await?;

        let mut report = CycleReport {
            listed: calls.len(),
            ..Default::default()
        };

        for call in calls {
            debug!(call_id = %call.id, "Processing call");

            match self.mode {
                FetchMode::Priming => {
                    self.ledger.mark_seen(&call.id);
                    report.primed += 1;
                    debug!(call_id = %call.id, "Marked call as processed (initial run)");
                }
                FetchMode::SteadyState => {
                    if !self.ledger.mark_seen(&call.id) {
                        report.already_seen += 1;
                        debug!(call_id = %call.id, "Call already processed");
                        continue;
                    }

                    let call_id = call.id.clone();
                    match self.queue.try_enqueue(call) {
                        EnqueueOutcome::Enqueued => {
                            info!(call_id = %call_id, "New call added to queue");
                        }
                        EnqueueOutcome::Evicted(oldest) => {
                            warn!(
                                call_id = %call_id,
                                dropped = %oldest.id,
                                "Queue full, dropping oldest call"
                            );
                            report.evicted += 1;
                        }
                    }
                    report.enqueued += 1;
                }
            }
        }

        if self.mode == FetchMode::Priming {
            info!(
                baseline = report.primed,
                "Initial listing recorded; only new calls will be played"
            );
            self.mode = FetchMode::SteadyState;
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::queue;
    use crate::domain::{Call, System};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Returns scripted listings, one per call to `list_calls`
    struct Script(Mutex<VecDeque<Result<Vec<Call>>>>);

    impl Script {
        fn new(cycles: Vec<Result<Vec<Call>>>) -> Arc<Self> {
            Arc::new(Self(Mutex::new(cycles.into())))
        }
    }

    #[async_trait]
    impl CallSource for Script {
        fn name(&self) -> &str {
            "script"
        }

        async fn list_systems(&self) -> Result<Vec<System>> {
            Ok(Vec::new())
        }

        async fn list_calls(&self, _short_name: &str) -> Result<Vec<Call>> {
            self.0
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new()))
        }

        async fn health_check(&self) -> Result<()> {
            Ok(())
        }
    }

    fn calls(ids: &[&str]) -> Vec<Call> {
        ids.iter()
            .map(|id| Call::new(*id, format!("https://example.com/{}.m4a", id)))
            .collect()
    }

    fn fetcher(source: Arc<Script>, capacity: usize) -> (CallFetcher, Arc<SeenLedger>) {
        let ledger = Arc::new(SeenLedger::new());
        let (tx, _rx) = queue::bounded(capacity).unwrap();
        let fetcher = CallFetcher::new(source, "test", ledger.clone(), tx, Duration::from_secs(5));
        (fetcher, ledger)
    }

    #[tokio::test]
    async fn test_priming_then_only_new_calls() {
        let source = Script::new(vec![Ok(calls(&["X", "Y"])), Ok(calls(&["X", "Y", "Z"]))]);
        let (mut fetcher, ledger) = fetcher(source, 10);

        let first = fetcher.poll_once().await.unwrap();
        assert_eq!(first.primed, 2);
        assert_eq!(first.enqueued, 0);
        assert!(fetcher.queue().is_empty());
        assert_eq!(fetcher.mode(), FetchMode::SteadyState);
        assert!(ledger.has("X") && ledger.has("Y"));

        let second = fetcher.poll_once().await.unwrap();
        assert_eq!(second.enqueued, 1);
        assert_eq!(second.already_seen, 2);

        let ids: Vec<_> = fetcher.queue().snapshot().into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec!["Z"]);
    }

    #[tokio::test]
    async fn test_empty_priming_listing_still_primes() {
        let source = Script::new(vec![Ok(Vec::new()), Ok(calls(&["A"]))]);
        let (mut fetcher, _ledger) = fetcher(source, 10);

        fetcher.poll_once().await.unwrap();
        assert_eq!(fetcher.mode(), FetchMode::SteadyState);

        let report = fetcher.poll_once().await.unwrap();
        assert_eq!(report.enqueued, 1);
    }

    #[tokio::test]
    async fn test_failed_cycle_changes_nothing() {
        let source = Script::new(vec![
            Err(anyhow::anyhow!("proxy unreachable")),
            Ok(calls(&["A"])),
            Err(anyhow::anyhow!("Failed to locate <pre> tags in response")),
            Ok(calls(&["A", "B"])),
        ]);
        let (mut fetcher, ledger) = fetcher(source, 10);

        assert!(fetcher.poll_once().await.is_err());
        assert_eq!(fetcher.mode(), FetchMode::Priming);
        assert!(ledger.is_empty());

        fetcher.poll_once().await.unwrap();
        assert_eq!(fetcher.mode(), FetchMode::SteadyState);

        assert!(fetcher.poll_once().await.is_err());
        assert_eq!(ledger.len(), 1);
        assert!(fetcher.queue().is_empty());

        let report = fetcher.poll_once().await.unwrap();
        assert_eq!(report.enqueued, 1);
    }

    #[tokio::test]
    async fn test_duplicates_within_one_listing_enqueued_once() {
        let source = Script::new(vec![Ok(Vec::new()), Ok(calls(&["A", "A", "B"]))]);
        let (mut fetcher, _ledger) = fetcher(source, 10);

        fetcher.poll_once().await.unwrap();
        let report = fetcher.poll_once().await.unwrap();

        assert_eq!(report.enqueued, 2);
        assert_eq!(report.already_seen, 1);
    }

    #[tokio::test]
    async fn test_overflow_reports_evictions() {
        let source = Script::new(vec![Ok(Vec::new()), Ok(calls(&["A", "B", "C"]))]);
        let (mut fetcher, ledger) = fetcher(source, 2);

        fetcher.poll_once().await.unwrap();
        let report = fetcher.poll_once().await.unwrap();

        assert_eq!(report.enqueued, 3);
        assert_eq!(report.evicted, 1);
        // Evicted calls stay seen and are never re-queued.
        assert!(ledger.has("A"));

        let ids: Vec<_> = fetcher.queue().snapshot().into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec!["B", "C"]);
    }
}
