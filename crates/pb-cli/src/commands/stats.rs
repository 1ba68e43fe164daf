use pb_core::config::Config;
use pb_core::stats::{agent_names, count_by_agent, IdeaStats};
use pb_core::types::{Decision, ServerSummary};
use pb_core::view::filter_ideas;
use serde_json::json;

use super::{api_client, friendly_error, FilterArgs};

/// Run the `stats` subcommand.
pub async fn run(cfg: &Config, filter: &FilterArgs, json: bool) -> anyhow::Result<()> {
    println!("{}", render(cfg, filter, json).await?);
    Ok(())
}

pub async fn render(cfg: &Config, args: &FilterArgs, json: bool) -> anyhow::Result<String> {
    let filter = args.to_filter()?;
    let batch = api_client(cfg)?
        .fetch_ideas(&filter.query())
        .await
        .map_err(friendly_error)?;
    let ideas = filter_ideas(&batch.ideas, &filter);
    let stats = IdeaStats::from_ideas(&ideas);
    let by_agent = count_by_agent(&ideas);
    // Choices for --agent come from everything fetched, not just the matches.
    let agents = agent_names(&batch.ideas);

    if json {
        let out = json!({
            "stats": stats,
            "by_agent": by_agent,
            "server_summary": batch.server_summary,
            "agent_choices": agents,
        });
        return Ok(serde_json::to_string_pretty(&out)?);
    }
    Ok(render_text(&stats, &by_agent, &agents, batch.server_summary.as_ref()))
}

fn render_text(
    stats: &IdeaStats,
    by_agent: &std::collections::BTreeMap<String, usize>,
    agents: &[String],
    server: Option<&ServerSummary>,
) -> String {
    let mut out = format!("Ideas:          {}\n", stats.total);
    for decision in Decision::ALL {
        out.push_str(&format!(
            "  {:<13} {}\n",
            format!("{}:", decision.label()),
            stats.count(decision)
        ));
    }
    out.push_str(&format!("Fast-tracked:   {}\n", stats.fast_track));
    out.push_str(&format!("Avg ICE score:  {:.2}\n", stats.average_ice_score));

    if let Some(summary) = server {
        out.push_str(&format!(
            "Server reports: {} total, {} fast track\n",
            summary.total.map_or("-".to_string(), |n| n.to_string()),
            summary.fast_track.map_or("-".to_string(), |n| n.to_string()),
        ));
    }

    if !by_agent.is_empty() {
        out.push_str("By agent:\n");
        for (agent, count) in by_agent {
            let name = if agent.is_empty() { "(unattributed)" } else { agent };
            out.push_str(&format!("  {name:<28} {count}\n"));
        }
    }
    if !agents.is_empty() {
        out.push_str(&format!("Agent choices:  {}\n", agents.join(", ")));
    }
    out.trim_end().to_string()
}
