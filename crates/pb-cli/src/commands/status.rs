use pb_api_types::IdeaQueryParams;
use pb_core::config::Config;
use pb_core::normalize::{merge_roster, unknown_roster};
use pb_core::stats::{team_health, IdeaStats};
use pb_core::types::{AgentStatusBatch, CosPmStatus, IdeaBatch};

use super::{api_client, friendly_error};

/// Run the `status` subcommand: one fetch per feed, printed as panels.
pub async fn run(cfg: &Config) -> anyhow::Result<()> {
    println!("{}", render(cfg).await?);
    Ok(())
}

pub async fn render(cfg: &Config) -> anyhow::Result<String> {
    let client = api_client(cfg)?;
    let query = IdeaQueryParams::default();
    let (agents, ideas, cos_pm) = tokio::join!(
        client.fetch_agent_statuses(),
        client.fetch_ideas(&query),
        client.fetch_cos_pm_status(),
    );

    if agents.is_err() && ideas.is_err() {
        if let Err(e) = cos_pm {
            return Err(friendly_error(e));
        }
    }

    let mut out = String::from("pulseboard status\n");
    out.push_str(&"-".repeat(40));
    out.push('\n');
    out.push_str(&agents_panel(cfg, &agents));
    out.push_str(&ideas_panel(&ideas));
    out.push_str(&cos_pm_panel(&cos_pm));
    Ok(out.trim_end().to_string())
}

fn agents_panel(cfg: &Config, agents: &pb_client::Result<AgentStatusBatch>) -> String {
    let (cards, note) = match agents {
        Ok(batch) => (merge_roster(&cfg.roster, batch), String::new()),
        Err(e) => (unknown_roster(&cfg.roster), format!("  ({})", e.summary())),
    };
    let mut out = format!("Agents{note}\n");
    for team in team_health(&cards) {
        out.push_str(&format!(
            "  {:<14} {}/{} up\n",
            format!("{}:", team.team),
            team.healthy,
            team.total
        ));
    }
    out
}

fn ideas_panel(ideas: &pb_client::Result<IdeaBatch>) -> String {
    match ideas {
        Ok(batch) => {
            let stats = IdeaStats::from_ideas(&batch.ideas);
            let mut out = format!("Ideas\n  total:         {}\n", stats.total);
            for (decision, count) in &stats.decisions {
                out.push_str(&format!(
                    "  {:<14} {count}\n",
                    format!("{}:", decision.as_str())
                ));
            }
            out.push_str(&format!("  avg ICE:       {:.2}\n", stats.average_ice_score));
            out
        }
        Err(e) => format!("Ideas  ({})\n", e.summary()),
    }
}

fn cos_pm_panel(cos_pm: &pb_client::Result<CosPmStatus>) -> String {
    match cos_pm {
        Ok(status) => format!(
            "CoS / PM\n  health:        {}\n  projects:      {} active / {} total\n  \
             tasks:         {} done / {} total ({} high priority)\n  \
             comms:         {:.1}% ok, {:.0}ms avg\n",
            status.health().as_str(),
            status.active_projects,
            status.total_projects,
            status.completed_tasks,
            status.total_tasks,
            status.high_priority_tasks,
            status.communication_success_rate,
            status.avg_response_time_ms,
        ),
        Err(e) => format!("CoS / PM  ({})\n", e.summary()),
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use axum::{routing::get, Json, Router};
    use serde_json::json;

    use super::*;
    use crate::commands::test_support::serve;

    #[tokio::test]
    async fn renders_every_panel() {
        let app = Router::new()
            .route(
                "/api/agents/status",
                get(|| async {
                    Json(json!({"status": "healthy", "agents": [
                        {"agent_name": "Hoddle Gap Finder", "status": "operational"}
                    ]}))
                }),
            )
            .route(
                "/api/ideas",
                get(|| async {
                    Json(json!([
                        {"id": 1, "final_decision": "approved", "ice_plus_score": 8},
                        {"id": 2, "final_decision": "approved", "ice_plus_score": 6}
                    ]))
                }),
            )
            .route(
                "/status",
                get(|| async {
                    Json(json!({
                        "cos_status": "healthy",
                        "pm_total_projects": 5,
                        "pm_active_projects": "2",
                        "communication_success_rate": 97.5
                    }))
                }),
            );
        let cfg = serve(app).await;
        let out = render(&cfg).await.unwrap();

        assert!(out.starts_with("pulseboard status"));
        assert!(out.contains("Hoddle:        1/4 up"));
        assert!(out.contains("approved:      2"));
        assert!(out.contains("fast_track:    0"));
        assert!(out.contains("avg ICE:       7.00"));
        assert!(out.contains("health:        healthy"));
        assert!(out.contains("2 active / 5 total"));
        assert!(out.contains("97.5% ok"));
    }

    #[tokio::test]
    async fn one_failing_feed_keeps_the_others() {
        let app = Router::new()
            .route("/api/agents/status", get(|| async { Json(json!([])) }))
            .route(
                "/api/ideas",
                get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "busy") }),
            )
            .route("/status", get(|| async { Json(json!({})) }));
        let cfg = serve(app).await;
        let out = render(&cfg).await.unwrap();

        assert!(out.contains("Ideas  (HTTP 503)"));
        assert!(out.contains("Waddle:        0/4 up"));
        assert!(out.contains("health:        unknown"));
    }

    #[tokio::test]
    async fn all_feeds_down_is_an_error() {
        let app = Router::new();
        let cfg = serve(app).await;
        let err = render(&cfg).await.unwrap_err();
        assert!(err.to_string().contains("HTTP 404"));
    }
}
