use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pb_api_types::IdeaQueryParams;
use pb_client::{Applied, Dashboard, DashboardSource, FetchError, RefreshIntervals};
use pb_core::roster::default_roster;
use pb_core::state::{ApplyOutcome, Feed, FeedStatus};
use pb_core::types::{
    AgentHealth, AgentStatusBatch, AgentStatusReport, CosPmStatus, Decision, Idea, IdeaBatch,
};
use pb_core::view::{IdeaFilter, ViewSelection};
use pb_telemetry::metrics::{FetchMetrics, Outcome};

// ---------------------------------------------------------------------------
// In-memory source
// ---------------------------------------------------------------------------

#[derive(Default)]
struct FakeSource {
    agent_calls: AtomicUsize,
    idea_calls: Mutex<Vec<IdeaQueryParams>>,
    cos_pm_calls: AtomicUsize,
    /// Delay for ideas requests without a decision filter.
    unfiltered_delay: Duration,
    ideas_fail: bool,
}

impl FakeSource {
    fn idea_call_count(&self) -> usize {
        self.idea_calls.lock().unwrap().len()
    }
}

fn idea(id: &str) -> Idea {
    Idea {
        id: id.to_string(),
        content: format!("idea {id}"),
        agent: "Hoddle Trend Scout".to_string(),
        decision: Decision::FastTrack,
        fast_track: true,
        ice_score: Some(7.0),
        profit_tier: Some(2),
        created_at: None,
    }
}

#[async_trait]
impl DashboardSource for FakeSource {
    async fn agent_statuses(&self) -> pb_client::Result<AgentStatusBatch> {
        self.agent_calls.fetch_add(1, Ordering::SeqCst);
        Ok(AgentStatusBatch {
            reports: vec![AgentStatusReport {
                id: Some("hoddle-trend-scout".into()),
                name: None,
                team: Some("Hoddle".into()),
                health: AgentHealth::Operational,
                last_check: None,
            }],
            ..Default::default()
        })
    }

    async fn ideas(&self, query: &IdeaQueryParams) -> pb_client::Result<IdeaBatch> {
        self.idea_calls.lock().unwrap().push(query.clone());
        if self.ideas_fail {
            return Err(FetchError::Status {
                status: 500,
                url: "http://fake/api/ideas".into(),
            });
        }
        let id = match query.decision.as_deref() {
            None => {
                tokio::time::sleep(self.unfiltered_delay).await;
                "old"
            }
            Some(_) => "new",
        };
        Ok(IdeaBatch {
            ideas: vec![idea(id)],
            server_summary: None,
        })
    }

    async fn cos_pm_status(&self) -> pb_client::Result<CosPmStatus> {
        self.cos_pm_calls.fetch_add(1, Ordering::SeqCst);
        Ok(CosPmStatus {
            cos_status: Some("healthy".into()),
            ..Default::default()
        })
    }
}

fn metrics() -> &'static FetchMetrics {
    Box::leak(Box::new(FetchMetrics::new()))
}

fn start(source: Arc<FakeSource>, period: Duration) -> (Dashboard, &'static FetchMetrics) {
    let metrics = metrics();
    let dashboard = Dashboard::start_with(
        source,
        default_roster(),
        ViewSelection::default(),
        RefreshIntervals::uniform(period),
        metrics,
    );
    (dashboard, metrics)
}

async fn next(dashboard: &mut Dashboard) -> Applied {
    tokio::time::timeout(Duration::from_secs(2), dashboard.next_update())
        .await
        .expect("update within timeout")
        .expect("dashboard running")
}

async fn wait_until(mut check: impl FnMut() -> bool) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached");
}

const LONG: Duration = Duration::from_secs(3600);

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn initial_fetch_fills_every_feed() {
    let source = Arc::new(FakeSource::default());
    let (mut dashboard, metrics) = start(source.clone(), LONG);
    assert!(dashboard.state().is_loading());

    for _ in 0..3 {
        let applied = next(&mut dashboard).await;
        assert_eq!(applied.outcome, ApplyOutcome::Applied);
        assert!(applied.ok);
    }

    let state = dashboard.state();
    assert!(!state.is_loading());
    assert_eq!(state.ideas().len(), 1);
    assert_eq!(state.agent_cards().len(), 8);
    assert_eq!(state.cos_pm().unwrap().health(), AgentHealth::Healthy);
    assert_eq!(metrics.outcome_count("ideas", Outcome::Ok), 1);
    assert_eq!(metrics.records("ideas"), 1);

    dashboard.stop(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn ideas_failure_does_not_block_agents() {
    let source = Arc::new(FakeSource {
        ideas_fail: true,
        ..Default::default()
    });
    let (mut dashboard, metrics) = start(source, LONG);

    for _ in 0..3 {
        next(&mut dashboard).await;
    }

    let state = dashboard.state();
    assert_eq!(
        state.feed_status(Feed::Ideas),
        FeedStatus::Failed {
            error: "HTTP 500".into()
        }
    );
    assert_eq!(state.feed_status(Feed::Agents), FeedStatus::Ready);
    let up = state.agent_cards().iter().filter(|c| c.health.is_up()).count();
    assert_eq!(up, 1);
    assert_eq!(metrics.outcome_count("ideas", Outcome::Error), 1);

    dashboard.stop(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn filter_change_discards_pending_older_fetch() {
    let source = Arc::new(FakeSource {
        unfiltered_delay: Duration::from_millis(300),
        ..Default::default()
    });
    let (mut dashboard, metrics) = start(source.clone(), LONG);

    // The unfiltered fetch is now in flight.
    wait_until(|| source.idea_call_count() >= 1).await;
    dashboard.set_selection(ViewSelection {
        filter: IdeaFilter {
            decision: Some(Decision::FastTrack),
            ..Default::default()
        },
        ..Default::default()
    });

    let mut ideas_outcomes = Vec::new();
    while ideas_outcomes.len() < 2 {
        let applied = next(&mut dashboard).await;
        if applied.feed == Feed::Ideas {
            ideas_outcomes.push(applied.outcome);
            // The old result must never be what is shown.
            assert!(dashboard.state().ideas().iter().all(|i| i.id != "old"));
        }
    }

    assert_eq!(
        ideas_outcomes,
        vec![ApplyOutcome::Applied, ApplyOutcome::Superseded]
    );
    assert_eq!(dashboard.state().ideas()[0].id, "new");
    assert_eq!(metrics.outcome_count("ideas", Outcome::Discarded), 1);

    let calls = source.idea_calls.lock().unwrap().clone();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1].decision.as_deref(), Some("fast_track"));
    drop(calls);

    dashboard.stop(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn sort_change_does_not_refetch() {
    let source = Arc::new(FakeSource::default());
    let (mut dashboard, _) = start(source.clone(), LONG);
    for _ in 0..3 {
        next(&mut dashboard).await;
    }

    dashboard.set_selection(ViewSelection::sorted_by(pb_core::view::SortKey::IceScore));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(source.idea_call_count(), 1);

    dashboard.stop(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn slow_fetch_skips_ticks() {
    let source = Arc::new(FakeSource {
        unfiltered_delay: Duration::from_millis(250),
        ..Default::default()
    });
    let (mut dashboard, metrics) = start(source.clone(), Duration::from_millis(40));

    tokio::time::sleep(Duration::from_millis(600)).await;

    // Without the guard a 40ms ticker would have issued ~15 requests.
    let calls = source.idea_call_count();
    assert!(calls >= 2 && calls <= 4, "ideas calls: {calls}");
    assert!(metrics.outcome_count("ideas", Outcome::Skipped) > 0);
    // Fast feeds keep their own cadence.
    assert!(source.agent_calls.load(Ordering::SeqCst) >= 5);

    dashboard.stop(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn stop_halts_schedule_and_cancels_pending() {
    let source = Arc::new(FakeSource {
        unfiltered_delay: Duration::from_secs(30),
        ..Default::default()
    });
    let (mut dashboard, metrics) = start(source.clone(), Duration::from_millis(20));
    wait_until(|| source.idea_call_count() >= 1).await;

    let started = std::time::Instant::now();
    let result = dashboard.stop(Duration::from_secs(2)).await;
    assert!(result.is_complete());
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(dashboard.is_stopped());

    let agent_calls = source.agent_calls.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(source.agent_calls.load(Ordering::SeqCst), agent_calls);
    assert_eq!(metrics.outcome_count("ideas", Outcome::Ok), 0);
    assert!(dashboard.next_update().await.is_none());
    assert!(dashboard.drain_pending().is_empty());
    assert_eq!(dashboard.state().feed_status(Feed::Ideas), FeedStatus::Loading);
}

#[tokio::test]
async fn refresh_now_refetches_every_feed() {
    let source = Arc::new(FakeSource::default());
    let (mut dashboard, _) = start(source.clone(), LONG);
    for _ in 0..3 {
        next(&mut dashboard).await;
    }

    dashboard.refresh_now();
    let mut seqs = Vec::new();
    for _ in 0..3 {
        let applied = next(&mut dashboard).await;
        assert_eq!(applied.outcome, ApplyOutcome::Applied);
        seqs.push(applied.seq);
    }
    assert!(seqs.iter().all(|s| *s > 3));
    assert_eq!(source.agent_calls.load(Ordering::SeqCst), 2);
    assert_eq!(source.cos_pm_calls.load(Ordering::SeqCst), 2);
    assert_eq!(source.idea_call_count(), 2);

    dashboard.stop(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn dropping_dashboard_stops_workers() {
    let source = Arc::new(FakeSource::default());
    let (dashboard, _) = start(source.clone(), Duration::from_millis(20));
    wait_until(|| source.agent_calls.load(Ordering::SeqCst) >= 1).await;
    drop(dashboard);

    tokio::time::sleep(Duration::from_millis(50)).await;
    let calls = source.agent_calls.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(source.agent_calls.load(Ordering::SeqCst), calls);
}
