use pb_core::config::Config;
use pb_core::normalize::merge_roster;
use pb_core::stats::team_health;
use pb_core::types::AgentCard;

use super::{api_client, friendly_error, truncate};

/// Run the `agents` subcommand: roster merged with live health.
pub async fn run(cfg: &Config, json: bool) -> anyhow::Result<()> {
    println!("{}", render(cfg, json).await?);
    Ok(())
}

pub async fn render(cfg: &Config, json: bool) -> anyhow::Result<String> {
    let batch = api_client(cfg)?
        .fetch_agent_statuses()
        .await
        .map_err(friendly_error)?;
    let cards = merge_roster(&cfg.roster, &batch);

    if json {
        return Ok(serde_json::to_string_pretty(&cards)?);
    }
    Ok(render_cards(&cards))
}

pub fn render_cards(cards: &[AgentCard]) -> String {
    let mut out = String::new();
    for team in team_health(cards) {
        out.push_str(&format!(
            "{} team  ({}/{} up)\n",
            team.team, team.healthy, team.total
        ));
        for card in cards.iter().filter(|c| c.profile.team == team.team) {
            out.push_str(&format!(
                "  {:<28} {:<12} {:<11} {:>3}%  {}\n",
                truncate(&card.profile.name, 28),
                card.health.as_str(),
                card.profile.mode.as_str(),
                card.profile.expected_fast_track_rate,
                card.last_check.as_deref().unwrap_or("-"),
            ));
        }
    }
    out.trim_end().to_string()
}
