//! Per-feed refresh scheduler.
//!
//! One worker task per feed fetches immediately, then on a fixed interval.
//! A tick that arrives while the previous fetch of the same feed is still
//! running is skipped. Every fetch runs on its own task, stamped with a
//! sequence number, and races the stop flag; results go back to the owner
//! over a `flume` channel.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use pb_api_types::IdeaQueryParams;
use pb_core::config::RefreshConfig;
use pb_core::state::{Feed, FeedUpdate, SequenceCounter};
use pb_telemetry::metrics::{global_metrics, FetchMetrics, Outcome};
use pb_telemetry::tracing_setup::create_refresh_span;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn, Instrument};

use crate::error::FetchError;
use crate::source::DashboardSource;

/// Refresh period per feed.
#[derive(Debug, Clone)]
pub struct RefreshIntervals {
    /// Agent status (default: 30s).
    pub agents: Duration,
    /// Ideas (default: 30s).
    pub ideas: Duration,
    /// CoS/PM status (default: 300s).
    pub cos_pm: Duration,
}

impl Default for RefreshIntervals {
    fn default() -> Self {
        Self::from(&RefreshConfig::default())
    }
}

impl From<&RefreshConfig> for RefreshIntervals {
    fn from(cfg: &RefreshConfig) -> Self {
        Self {
            agents: Duration::from_secs(cfg.agents_secs.max(1)),
            ideas: Duration::from_secs(cfg.ideas_secs.max(1)),
            cos_pm: Duration::from_secs(cfg.cos_pm_secs.max(1)),
        }
    }
}

impl RefreshIntervals {
    pub fn uniform(period: Duration) -> Self {
        Self {
            agents: period,
            ideas: period,
            cos_pm: period,
        }
    }

    pub fn for_feed(&self, feed: Feed) -> Duration {
        match feed {
            Feed::Agents => self.agents,
            Feed::Ideas => self.ideas,
            Feed::CosPm => self.cos_pm,
        }
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

pub struct RefreshScheduler<S> {
    source: Arc<S>,
    intervals: RefreshIntervals,
    sequence: SequenceCounter,
    metrics: &'static FetchMetrics,
}

impl<S: DashboardSource> RefreshScheduler<S> {
    pub fn new(source: Arc<S>, intervals: RefreshIntervals, sequence: SequenceCounter) -> Self {
        Self {
            source,
            intervals,
            sequence,
            metrics: global_metrics(),
        }
    }

    /// Record into `metrics` instead of the process-wide collector.
    pub fn with_metrics(mut self, metrics: &'static FetchMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Start one worker per feed. The first fetch of every feed is issued
    /// right away; the ideas feed uses `initial_query`.
    pub fn spawn(
        self,
        initial_query: IdeaQueryParams,
    ) -> (RefreshHandle, flume::Receiver<FeedUpdate>) {
        let (stop_tx, stop_rx) = watch::channel(false);
        let (tx, rx) = flume::unbounded();
        let (query_tx, query_rx) = watch::channel(initial_query);
        let (retry_tx, retry_rx) = watch::channel(0u64);

        let workers = Feed::ALL
            .iter()
            .map(|&feed| {
                let worker = FeedWorker {
                    feed,
                    source: self.source.clone(),
                    period: self.intervals.for_feed(feed),
                    sequence: self.sequence.clone(),
                    tx: tx.clone(),
                    stop_rx: stop_rx.clone(),
                    query_rx: (feed == Feed::Ideas).then(|| query_rx.clone()),
                    retry_rx: Some(retry_rx.clone()),
                    in_flight: Arc::new(AtomicUsize::new(0)),
                    metrics: self.metrics,
                };
                tokio::spawn(worker.run())
            })
            .collect();

        debug!(
            agents_secs = self.intervals.agents.as_secs(),
            ideas_secs = self.intervals.ideas.as_secs(),
            cos_pm_secs = self.intervals.cos_pm.as_secs(),
            "refresh scheduler started"
        );

        let handle = RefreshHandle {
            stop_tx,
            query_tx,
            retry_tx,
            workers,
        };
        (handle, rx)
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// How [`RefreshHandle::stop`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopResult {
    /// Every worker returned before the deadline.
    Joined,
    /// Workers still running at the deadline were aborted.
    Aborted { remaining: usize },
}

impl StopResult {
    pub fn is_complete(&self) -> bool {
        matches!(self, StopResult::Joined)
    }
}

/// Control side of a running scheduler. Dropping it stops the scheduler.
pub struct RefreshHandle {
    stop_tx: watch::Sender<bool>,
    query_tx: watch::Sender<IdeaQueryParams>,
    retry_tx: watch::Sender<u64>,
    workers: Vec<JoinHandle<()>>,
}

impl RefreshHandle {
    /// Switch the ideas feed to `query` and fetch with it immediately, even
    /// if a fetch with the previous query is still running. Returns false
    /// when the query is unchanged.
    pub fn set_query(&self, query: IdeaQueryParams) -> bool {
        self.query_tx.send_if_modified(|current| {
            if *current == query {
                false
            } else {
                *current = query;
                true
            }
        })
    }

    /// Fetch every feed now. Feeds with a fetch already running are left
    /// alone.
    pub fn refresh_now(&self) {
        self.retry_tx.send_modify(|n| *n = n.wrapping_add(1));
    }

    pub fn is_stopped(&self) -> bool {
        *self.stop_tx.borrow()
    }

    /// Raise the stop flag and join the workers. Each worker cancels its
    /// pending fetches before returning; workers still running after
    /// `timeout` are aborted. Calling it again is a no-op.
    pub async fn stop(&mut self, timeout: Duration) -> StopResult {
        self.stop_tx.send_replace(true);
        let workers: Vec<JoinHandle<()>> = self.workers.drain(..).collect();
        let aborts: Vec<_> = workers.iter().map(JoinHandle::abort_handle).collect();

        let joined = tokio::time::timeout(timeout, async move {
            for worker in workers {
                if let Err(e) = worker.await {
                    debug!(error = %e, "refresh worker ended abnormally");
                }
            }
        })
        .await;

        match joined {
            Ok(()) => StopResult::Joined,
            Err(_) => {
                let remaining = aborts.iter().filter(|a| !a.is_finished()).count();
                for abort in &aborts {
                    abort.abort();
                }
                warn!(remaining, "refresh workers did not stop in time, aborted");
                StopResult::Aborted { remaining }
            }
        }
    }
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        self.stop_tx.send_replace(true);
        for worker in &self.workers {
            worker.abort();
        }
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

struct FeedWorker<S> {
    feed: Feed,
    source: Arc<S>,
    period: Duration,
    sequence: SequenceCounter,
    tx: flume::Sender<FeedUpdate>,
    stop_rx: watch::Receiver<bool>,
    query_rx: Option<watch::Receiver<IdeaQueryParams>>,
    retry_rx: Option<watch::Receiver<u64>>,
    in_flight: Arc<AtomicUsize>,
    metrics: &'static FetchMetrics,
}

/// Resolves when the receiver sees a new value. Never resolves once the
/// receiver is gone or was never there.
async fn changed<T>(rx: &mut Option<watch::Receiver<T>>) {
    match rx {
        Some(inner) => {
            if inner.changed().await.is_err() {
                *rx = None;
                std::future::pending::<()>().await;
            }
        }
        None => std::future::pending::<()>().await,
    }
}

/// Resolves once the stop flag is raised. A dropped handle counts as a stop.
async fn stopped(rx: &mut watch::Receiver<bool>) {
    // Err means the sender is gone.
    let _ = rx.wait_for(|stop| *stop).await;
}

impl<S: DashboardSource> FeedWorker<S> {
    async fn run(mut self) {
        let mut tasks: JoinSet<()> = JoinSet::new();

        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while !*self.stop_rx.borrow() {
            tokio::select! {
                biased;
                _ = stopped(&mut self.stop_rx) => break,
                _ = ticker.tick() => {
                    if self.in_flight.load(Ordering::SeqCst) > 0 {
                        debug!(feed = %self.feed, "previous fetch still pending, skipping tick");
                        self.metrics.record_outcome(self.feed.as_str(), Outcome::Skipped);
                    } else {
                        self.launch(&mut tasks);
                    }
                }
                _ = changed(&mut self.query_rx) => {
                    debug!(feed = %self.feed, "ideas query changed");
                    self.launch(&mut tasks);
                }
                _ = changed(&mut self.retry_rx) => {
                    if self.in_flight.load(Ordering::SeqCst) == 0 {
                        self.launch(&mut tasks);
                    }
                }
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        tasks.shutdown().await;
        debug!(feed = %self.feed, "refresh worker stopped");
    }

    fn launch(&mut self, tasks: &mut JoinSet<()>) {
        let seq = self.sequence.next();
        let query = self
            .query_rx
            .as_mut()
            .map(|rx| rx.borrow_and_update().clone())
            .unwrap_or_default();
        let (span, trace_id) = create_refresh_span(self.feed.as_str(), seq);

        let mut stop_rx = self.stop_rx.clone();
        if *stop_rx.borrow() {
            return;
        }

        let feed = self.feed;
        let source = self.source.clone();
        let tx = self.tx.clone();
        let in_flight = self.in_flight.clone();
        let metrics = self.metrics;
        in_flight.fetch_add(1, Ordering::SeqCst);

        tasks.spawn(
            async move {
                debug!(trace_id = %trace_id, "fetch started");
                let started = Instant::now();
                let update = tokio::select! {
                    biased;
                    _ = stopped(&mut stop_rx) => None,
                    update = fetch(&*source, feed, seq, query) => Some(update),
                };
                in_flight.fetch_sub(1, Ordering::SeqCst);

                let Some((update, records)) = update else {
                    debug!("fetch cancelled by stop");
                    return;
                };
                metrics.observe_duration(feed.as_str(), started.elapsed().as_secs_f64());
                match records {
                    Some(count) => {
                        metrics.record_outcome(feed.as_str(), Outcome::Ok);
                        metrics.set_records(feed.as_str(), count);
                    }
                    None => metrics.record_outcome(feed.as_str(), Outcome::Error),
                }

                if *stop_rx.borrow() {
                    metrics.record_outcome(feed.as_str(), Outcome::Discarded);
                    return;
                }
                if tx.send(update).is_err() {
                    debug!("update receiver dropped");
                }
            }
            .instrument(span),
        );
    }
}

/// Run one fetch and wrap the result. Also returns the record count on
/// success.
async fn fetch<S: DashboardSource>(
    source: &S,
    feed: Feed,
    seq: u64,
    query: IdeaQueryParams,
) -> (FeedUpdate, Option<usize>) {
    match feed {
        Feed::Agents => {
            let result = source.agent_statuses().await;
            let records = result.as_ref().ok().map(|b| b.reports.len());
            let update = FeedUpdate::Agents {
                seq,
                result: result.map_err(|e| report(feed, e)),
            };
            (update, records)
        }
        Feed::Ideas => {
            let result = source.ideas(&query).await;
            let records = result.as_ref().ok().map(|b| b.ideas.len());
            let update = FeedUpdate::Ideas {
                seq,
                query,
                result: result.map_err(|e| report(feed, e)),
            };
            (update, records)
        }
        Feed::CosPm => {
            let result = source.cos_pm_status().await;
            let records = result.as_ref().ok().map(|_| 1);
            let update = FeedUpdate::CosPm {
                seq,
                result: result.map_err(|e| report(feed, e)),
            };
            (update, records)
        }
    }
}

fn report(feed: Feed, err: FetchError) -> String {
    warn!(feed = %feed, error = %err, retryable = err.is_retryable(), "fetch failed");
    err.summary()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pb_core::types::{AgentStatusBatch, CosPmStatus, IdeaBatch};

    /// Every request hangs until cancelled.
    struct Hanging;

    #[async_trait]
    impl DashboardSource for Hanging {
        async fn agent_statuses(&self) -> crate::Result<AgentStatusBatch> {
            std::future::pending().await
        }
        async fn ideas(&self, _query: &IdeaQueryParams) -> crate::Result<IdeaBatch> {
            std::future::pending().await
        }
        async fn cos_pm_status(&self) -> crate::Result<CosPmStatus> {
            std::future::pending().await
        }
    }

    fn scheduler() -> RefreshScheduler<Hanging> {
        let metrics: &'static FetchMetrics = Box::leak(Box::new(FetchMetrics::new()));
        RefreshScheduler::new(
            Arc::new(Hanging),
            RefreshIntervals::uniform(Duration::from_millis(10)),
            SequenceCounter::new(),
        )
        .with_metrics(metrics)
    }

    #[tokio::test]
    async fn stop_joins_workers_with_hanging_fetches() {
        let (mut handle, rx) = scheduler().spawn(IdeaQueryParams::default());
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!handle.is_stopped());

        let result = handle.stop(Duration::from_secs(1)).await;
        assert_eq!(result, StopResult::Joined);
        assert!(handle.is_stopped());
        assert!(rx.try_recv().is_err());

        // Nothing left to join.
        assert!(handle.stop(Duration::from_millis(10)).await.is_complete());
    }

    #[tokio::test]
    async fn dropping_handle_ends_workers() {
        let (handle, rx) = scheduler().spawn(IdeaQueryParams::default());
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(handle);
        // Workers hold the only senders; the channel disconnects once they end.
        let closed = tokio::time::timeout(Duration::from_secs(1), rx.recv_async()).await;
        assert!(matches!(closed, Ok(Err(flume::RecvError::Disconnected))));
    }

    #[test]
    fn intervals_follow_config() {
        let cfg = RefreshConfig {
            agents_secs: 5,
            ideas_secs: 10,
            cos_pm_secs: 60,
            request_timeout_secs: 3,
        };
        let intervals = RefreshIntervals::from(&cfg);
        assert_eq!(intervals.for_feed(Feed::Agents), Duration::from_secs(5));
        assert_eq!(intervals.for_feed(Feed::Ideas), Duration::from_secs(10));
        assert_eq!(intervals.for_feed(Feed::CosPm), Duration::from_secs(60));
    }

    #[test]
    fn default_intervals() {
        let intervals = RefreshIntervals::default();
        assert_eq!(intervals.agents, Duration::from_secs(30));
        assert_eq!(intervals.ideas, Duration::from_secs(30));
        assert_eq!(intervals.cos_pm, Duration::from_secs(300));
    }

    #[test]
    fn zero_seconds_is_clamped() {
        let cfg = RefreshConfig {
            agents_secs: 0,
            ..Default::default()
        };
        assert_eq!(RefreshIntervals::from(&cfg).agents, Duration::from_secs(1));
    }
}
