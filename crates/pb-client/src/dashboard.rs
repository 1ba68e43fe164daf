use std::sync::Arc;
use std::time::Duration;

use pb_core::config::Config;
use pb_core::state::{ApplyOutcome, DashboardState, Feed, FeedUpdate, SequenceCounter};
use pb_core::types::AgentProfile;
use pb_core::view::ViewSelection;
use pb_telemetry::metrics::{global_metrics, FetchMetrics, Outcome};
use tracing::{debug, info};

use crate::refresh::{RefreshHandle, RefreshIntervals, RefreshScheduler, StopResult};
use crate::source::DashboardSource;

/// What [`Dashboard::next_update`] did with one delivered fetch result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Applied {
    pub feed: Feed,
    pub seq: u64,
    pub outcome: ApplyOutcome,
    /// The fetch itself succeeded.
    pub ok: bool,
}

/// A running dashboard: the owned state plus the scheduler feeding it.
///
/// State is only mutated through `&mut self`, on whichever task owns the
/// dashboard; refresh workers never touch it.
pub struct Dashboard {
    state: DashboardState,
    updates: flume::Receiver<FeedUpdate>,
    handle: RefreshHandle,
    metrics: &'static FetchMetrics,
}

impl Dashboard {
    /// Start refreshing with the roster, default sort and intervals from
    /// `config`. Must be called inside a tokio runtime.
    pub fn start<S: DashboardSource>(source: Arc<S>, config: &Config) -> Self {
        Self::start_with(
            source,
            config.roster.clone(),
            ViewSelection::sorted_by(config.view.default_sort),
            RefreshIntervals::from(&config.refresh),
            global_metrics(),
        )
    }

    pub fn start_with<S: DashboardSource>(
        source: Arc<S>,
        roster: Vec<AgentProfile>,
        selection: ViewSelection,
        intervals: RefreshIntervals,
        metrics: &'static FetchMetrics,
    ) -> Self {
        let sequence = SequenceCounter::new();
        let state = DashboardState::new(roster, selection, sequence.clone());
        let (handle, updates) = RefreshScheduler::new(source, intervals, sequence)
            .with_metrics(metrics)
            .spawn(state.selection().filter.query());
        info!("dashboard started");
        Self {
            state,
            updates,
            handle,
            metrics,
        }
    }

    pub fn state(&self) -> &DashboardState {
        &self.state
    }

    /// Wait for the next fetch result and apply it. Returns `None` once the
    /// dashboard has been stopped.
    pub async fn next_update(&mut self) -> Option<Applied> {
        if self.handle.is_stopped() {
            return None;
        }
        let update = self.updates.recv_async().await.ok()?;
        if self.handle.is_stopped() {
            return None;
        }
        Some(self.apply(update))
    }

    /// Apply every result already delivered, without waiting.
    pub fn drain_pending(&mut self) -> Vec<Applied> {
        let mut applied = Vec::new();
        if self.handle.is_stopped() {
            return applied;
        }
        while let Ok(update) = self.updates.try_recv() {
            applied.push(self.apply(update));
        }
        applied
    }

    fn apply(&mut self, update: FeedUpdate) -> Applied {
        let feed = update.feed();
        let seq = update.seq();
        let ok = update.is_ok();
        let outcome = self.state.apply(update);
        if outcome != ApplyOutcome::Applied {
            self.metrics.record_outcome(feed.as_str(), Outcome::Discarded);
        }
        debug!(feed = %feed, seq, ok, ?outcome, "feed update");
        Applied {
            feed,
            seq,
            outcome,
            ok,
        }
    }

    /// Change the filter/sort. A changed server-side filter triggers an
    /// immediate ideas fetch; results for the old filter are dropped.
    pub fn set_selection(&mut self, selection: ViewSelection) {
        if let Some(query) = self.state.set_selection(selection) {
            debug!(?query, "ideas filter changed");
            self.handle.set_query(query);
        }
    }

    /// Re-fetch every feed now, e.g. after a failure.
    pub fn refresh_now(&self) {
        self.handle.refresh_now();
    }

    pub fn is_stopped(&self) -> bool {
        self.handle.is_stopped()
    }

    /// Stop refreshing. Pending fetches are cancelled and anything already
    /// delivered but not yet applied is discarded.
    pub async fn stop(&mut self, timeout: Duration) -> StopResult {
        let result = self.handle.stop(timeout).await;
        let dropped = self.updates.drain().count();
        if dropped > 0 {
            debug!(dropped, "discarded updates delivered after stop");
        }
        info!(?result, "dashboard stopped");
        result
    }
}
