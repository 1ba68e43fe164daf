pub mod agents;
pub mod ideas;
pub mod stats;
pub mod status;
pub mod watch;

use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use clap::Args;
use pb_client::{DashboardClient, FetchError};
use pb_core::config::Config;
use pb_core::types::Decision;
use pb_core::view::{IdeaFilter, SortKey};

/// Load the config file (explicit path, else the default location), then
/// apply `PULSEBOARD_*_URL` overrides.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let mut cfg = match path {
        Some(p) => Config::load_from(p)
            .with_context(|| format!("failed to load config from {}", p.display()))?,
        None => Config::load().context("failed to load ~/.pulseboard/config.toml")?,
    };
    cfg.apply_env_overrides();
    cfg.validate()?;
    Ok(cfg)
}

pub fn api_client(cfg: &Config) -> anyhow::Result<DashboardClient> {
    DashboardClient::from_config(cfg).map_err(friendly_error)
}

/// Map fetch errors to user-friendly messages.
pub fn friendly_error(err: FetchError) -> anyhow::Error {
    match err {
        FetchError::Transport(e) if e.is_connect() => anyhow::anyhow!(
            "Could not connect to the dashboard services. Are they running?\n  \
             (hint: check [endpoints] in ~/.pulseboard/config.toml or PULSEBOARD_*_URL)"
        ),
        FetchError::Transport(e) => anyhow::anyhow!("Request failed: {e}"),
        FetchError::Timeout => {
            anyhow::anyhow!("Request timed out. Raise refresh.request_timeout_secs if the service is slow.")
        }
        FetchError::Status { status, url } => {
            anyhow::anyhow!("Service returned HTTP {status} for {url}")
        }
        FetchError::Decode(e) => anyhow::anyhow!("Service returned an invalid response body: {e}"),
    }
}

/// Idea filter flags shared by `ideas`, `stats` and `watch`.
#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Case-insensitive text search over content and agent.
    #[arg(long, short = 's')]
    pub search: Option<String>,

    /// fast_track, approved, review or archive.
    #[arg(long, short = 'd')]
    pub decision: Option<Decision>,

    /// Exact agent name (case-insensitive).
    #[arg(long, short = 'a')]
    pub agent: Option<String>,

    /// Profit tier 1-4; repeat for several.
    #[arg(long = "tier", value_parser = clap::value_parser!(u8).range(1..=4))]
    pub tiers: Vec<u8>,

    #[arg(long)]
    pub min_ice: Option<f64>,

    #[arg(long)]
    pub max_ice: Option<f64>,

    /// Created on or after this day (YYYY-MM-DD).
    #[arg(long)]
    pub since: Option<String>,

    /// Created on or before this day (YYYY-MM-DD).
    #[arg(long)]
    pub until: Option<String>,
}

impl FilterArgs {
    pub fn to_filter(&self) -> anyhow::Result<IdeaFilter> {
        Ok(IdeaFilter {
            search: self.search.clone(),
            decision: self.decision,
            agent: self.agent.clone(),
            profit_tiers: self.tiers.clone(),
            min_ice: self.min_ice,
            max_ice: self.max_ice,
            created_after: self.since.as_deref().map(|d| day_bound(d, false)).transpose()?,
            created_before: self.until.as_deref().map(|d| day_bound(d, true)).transpose()?,
        })
    }
}

/// Start (or last second) of a calendar day in UTC.
fn day_bound(raw: &str, end_of_day: bool) -> anyhow::Result<DateTime<Utc>> {
    let day = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .with_context(|| format!("invalid date '{raw}' (expected YYYY-MM-DD)"))?;
    let (h, m, s) = if end_of_day { (23, 59, 59) } else { (0, 0, 0) };
    day.and_hms_opt(h, m, s)
        .map(|t| t.and_utc())
        .with_context(|| format!("invalid date '{raw}'"))
}

#[derive(Args, Debug, Clone, Default)]
pub struct IdeasArgs {
    #[command(flatten)]
    pub filter: FilterArgs,

    /// created_at (default), ice_score or profit_tier.
    #[arg(long)]
    pub sort: Option<SortKey>,

    /// Show at most this many ideas.
    #[arg(long, short = 'n')]
    pub limit: Option<usize>,

    /// Print JSON instead of a table.
    #[arg(long)]
    pub json: bool,
}

/// Cut `text` to `max` characters, marking the cut.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

#[cfg(test)]
pub(crate) mod test_support {
    use axum::Router;
    use pb_core::config::{Config, EndpointsConfig};

    /// Serve `app` on an ephemeral port and return a config pointing at it.
    pub async fn serve(app: Router) -> Config {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        let mut cfg = Config::default();
        cfg.endpoints = EndpointsConfig::with_base(&format!("http://{addr}"));
        cfg.refresh.request_timeout_secs = 2;
        cfg
    }
}
