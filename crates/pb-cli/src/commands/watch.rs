use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use pb_client::{Applied, Dashboard};
use pb_core::config::Config;
use pb_core::state::{ApplyOutcome, DashboardState, Feed, FeedStatus};
use pb_core::view::{SortKey, ViewSelection};
use pb_telemetry::metrics::global_metrics;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use super::{api_client, FilterArgs};

const STOP_TIMEOUT: Duration = Duration::from_secs(2);
const RETRY_BACKOFF: Duration = Duration::from_secs(5);

/// Run the `watch` subcommand: keep every feed refreshing and print one
/// line per delivered result until ctrl-c.
pub async fn run(
    cfg: &Config,
    filter: &FilterArgs,
    sort: Option<SortKey>,
    metrics: bool,
) -> anyhow::Result<()> {
    let client = Arc::new(api_client(cfg)?);
    let mut dashboard = Dashboard::start(client, cfg);
    dashboard.set_selection(ViewSelection {
        filter: filter.to_filter()?,
        sort: sort.unwrap_or(cfg.view.default_sort),
    });
    println!(
        "watching (agents every {}s, ideas every {}s, cos/pm every {}s); ctrl-c to stop",
        cfg.refresh.agents_secs, cfg.refresh.ideas_secs, cfg.refresh.cos_pm_secs
    );

    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };
    drive(&mut dashboard, RETRY_BACKOFF, ctrl_c, |line| {
        println!("{} {line}", Local::now().format("%H:%M:%S"));
    })
    .await;

    let result = dashboard.stop(STOP_TIMEOUT).await;
    info!(complete = result.is_complete(), "watch stopped");
    if metrics {
        print!("{}", global_metrics().export_prometheus());
    }
    Ok(())
}

/// Apply and print updates until `shutdown` resolves or the dashboard stops.
/// A failed fetch schedules one retry of every feed after `backoff`; further
/// failures before it fires do not push it back.
async fn drive(
    dashboard: &mut Dashboard,
    backoff: Duration,
    shutdown: impl Future<Output = ()>,
    mut emit: impl FnMut(String),
) {
    tokio::pin!(shutdown);
    let mut retry_at: Option<Instant> = None;

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = sleep_until(retry_at.unwrap_or_else(Instant::now)), if retry_at.is_some() => {
                retry_at = None;
                debug!("retrying after failed fetch");
                dashboard.refresh_now();
            }
            applied = dashboard.next_update() => {
                let Some(applied) = applied else { break };
                if applied.outcome == ApplyOutcome::Applied && !applied.ok && retry_at.is_none() {
                    retry_at = Some(Instant::now() + backoff);
                }
                emit(render_update(dashboard.state(), &applied));
            }
        }
    }
}

fn outcome_label(outcome: ApplyOutcome) -> &'static str {
    match outcome {
        ApplyOutcome::Applied => "applied",
        ApplyOutcome::Stale => "stale",
        ApplyOutcome::Superseded => "superseded",
    }
}

/// One status line for an applied (or discarded) feed result.
pub fn render_update(state: &DashboardState, applied: &Applied) -> String {
    let head = format!("{:<7} #{:<4}", applied.feed.as_str(), applied.seq);
    if applied.outcome != ApplyOutcome::Applied {
        return format!("{head} dropped ({})", outcome_label(applied.outcome));
    }

    let body = match applied.feed {
        Feed::Agents => {
            let teams = state.team_health();
            teams
                .iter()
                .map(|t| format!("{} {}/{}", t.team, t.healthy, t.total))
                .collect::<Vec<_>>()
                .join(", ")
        }
        Feed::Ideas => {
            let stats = state.idea_stats();
            format!(
                "{} ideas, {} visible, {} fast track, avg ICE {:.2}",
                stats.total,
                state.visible_ideas().len(),
                stats.fast_track,
                stats.average_ice_score
            )
        }
        Feed::CosPm => match state.cos_pm() {
            Some(status) => format!(
                "cos {}, {}/{} tasks done",
                status.health().as_str(),
                status.completed_tasks,
                status.total_tasks
            ),
            None => String::new(),
        },
    };

    match state.feed_status(applied.feed) {
        FeedStatus::Stale { error } => {
            let since = state
                .updated_at(applied.feed)
                .map(|at| format!(", data from {}", at.with_timezone(&Local).format("%H:%M:%S")))
                .unwrap_or_default();
            format!("{head} {body} (stale: {error}{since})")
        }
        FeedStatus::Failed { error } => format!("{head} failed: {error}"),
        _ => format!("{head} {body}"),
    }
}
