use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use pb_api_types::ApiCosPmStatus;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Decision
// ---------------------------------------------------------------------------

/// Triage decision attached to an idea.
///
/// The ideas services use at least two vocabularies (`approved`/`review` and
/// `prototype`/`watch_list`); both collapse onto these four values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    FastTrack,
    Approved,
    Review,
    Archive,
}

impl Decision {
    pub const ALL: [Decision; 4] = [
        Decision::FastTrack,
        Decision::Approved,
        Decision::Review,
        Decision::Archive,
    ];

    /// Wire name, as sent to the ideas service's `decision` parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::FastTrack => "fast_track",
            Decision::Approved => "approved",
            Decision::Review => "review",
            Decision::Archive => "archive",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Decision::FastTrack => "Fast Track",
            Decision::Approved => "Approved",
            Decision::Review => "Review",
            Decision::Archive => "Archive",
        }
    }

    /// Map any observed source spelling onto a decision. Case, spaces and
    /// hyphens are ignored, so `"Fast Track"`, `"fast-track"` and
    /// `"fast_track"` are the same value.
    pub fn from_source(raw: &str) -> Option<Decision> {
        let key: String = raw
            .trim()
            .chars()
            .map(|c| match c {
                ' ' | '-' => '_',
                c => c.to_ascii_lowercase(),
            })
            .collect();
        match key.as_str() {
            "fast_track" | "fasttrack" => Some(Decision::FastTrack),
            "approved" | "approve" | "prototype" => Some(Decision::Approved),
            "review" | "watch_list" | "watchlist" => Some(Decision::Review),
            "archive" | "archived" => Some(Decision::Archive),
            _ => None,
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Decision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decision::from_source(s).ok_or_else(|| {
            format!("unknown decision '{s}' (expected fast_track, approved, review or archive)")
        })
    }
}

// ---------------------------------------------------------------------------
// Idea
// ---------------------------------------------------------------------------

/// Canonical idea record, produced only by [`crate::normalize`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Idea {
    pub id: String,
    pub content: String,
    pub agent: String,
    pub decision: Decision,
    /// Set when the decision is fast-track or the source flagged it so.
    pub fast_track: bool,
    pub ice_score: Option<f64>,
    /// 1 (highest profit band) through 4.
    pub profit_tier: Option<u8>,
    pub created_at: Option<DateTime<Utc>>,
}

impl Idea {
    /// Score used for aggregation and sorting; absent counts as zero.
    pub fn ice_or_zero(&self) -> f64 {
        self.ice_score.unwrap_or(0.0)
    }

    pub fn ice_display(&self) -> String {
        match self.ice_score {
            Some(score) => format!("{score:.2}"),
            None => "N/A".to_string(),
        }
    }

    pub fn tier_label(&self) -> &'static str {
        profit_tier_label(self.profit_tier)
    }

    pub fn created_display(&self) -> String {
        match self.created_at {
            Some(at) => at.format("%Y-%m-%d").to_string(),
            None => "Unknown".to_string(),
        }
    }
}

/// Monthly profit band for a tier.
pub fn profit_tier_label(tier: Option<u8>) -> &'static str {
    match tier {
        Some(1) => "$5k+/month",
        Some(2) => "$3-5k/month",
        Some(3) => "$1-3k/month",
        Some(4) => "<$1k/month",
        _ => "Unknown",
    }
}

/// Summary counts some ideas deployments precompute next to the collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSummary {
    pub total: Option<u64>,
    pub fast_track: Option<u64>,
}

/// One normalized ideas response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdeaBatch {
    pub ideas: Vec<Idea>,
    pub server_summary: Option<ServerSummary>,
}

// ---------------------------------------------------------------------------
// Agents
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AgentMode {
    Continuous,
    OnDemand,
}

impl AgentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentMode::Continuous => "continuous",
            AgentMode::OnDemand => "on-demand",
        }
    }
}

/// Static description of an ideation agent. Lives in the roster, never
/// fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentProfile {
    pub id: String,
    pub name: String,
    pub team: String,
    pub mode: AgentMode,
    #[serde(default)]
    pub description: String,
    /// Expected share of fast-tracked ideas, in percent.
    pub expected_fast_track_rate: u8,
    pub endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enhancement: Option<String>,
}

/// Runtime health of an agent or service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentHealth {
    Operational,
    Healthy,
    Error,
    Unknown,
}

impl AgentHealth {
    pub fn from_source(raw: &str) -> AgentHealth {
        match raw.trim().to_ascii_lowercase().as_str() {
            "operational" | "ok" | "up" | "running" | "active" => AgentHealth::Operational,
            "healthy" => AgentHealth::Healthy,
            "error" | "down" | "failed" | "unhealthy" | "offline" => AgentHealth::Error,
            _ => AgentHealth::Unknown,
        }
    }

    pub fn is_up(&self) -> bool {
        matches!(self, AgentHealth::Operational | AgentHealth::Healthy)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentHealth::Operational => "operational",
            AgentHealth::Healthy => "healthy",
            AgentHealth::Error => "error",
            AgentHealth::Unknown => "unknown",
        }
    }
}

/// Health of one agent as reported by the status service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentStatusReport {
    pub id: Option<String>,
    pub name: Option<String>,
    pub team: Option<String>,
    pub health: AgentHealth,
    pub last_check: Option<String>,
}

/// One normalized agent-status response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentStatusBatch {
    pub reports: Vec<AgentStatusReport>,
    /// Envelope-level `status`, when the service sends one.
    pub overall: Option<AgentHealth>,
    pub total_agents: Option<u64>,
    pub healthy_agents: Option<u64>,
}

/// Roster entry merged with its latest health.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentCard {
    pub profile: AgentProfile,
    pub health: AgentHealth,
    pub last_check: Option<String>,
}

// ---------------------------------------------------------------------------
// CoS / PM
// ---------------------------------------------------------------------------

/// Chief-of-Staff / Project-Manager status panel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CosPmStatus {
    pub cos_status: Option<String>,
    pub ai_intelligence: Option<String>,
    pub pm_connectivity: Option<String>,
    pub cache_status: Option<String>,
    pub reported_at: Option<String>,
    pub total_projects: u64,
    pub active_projects: u64,
    pub total_tasks: u64,
    pub completed_tasks: u64,
    pub pending_tasks: u64,
    pub high_priority_tasks: u64,
    /// Percent, clamped to 0-100.
    pub communication_success_rate: f64,
    pub avg_response_time_ms: f64,
    pub last_communication: Option<String>,
}

impl CosPmStatus {
    pub fn health(&self) -> AgentHealth {
        self.cos_status
            .as_deref()
            .map(AgentHealth::from_source)
            .unwrap_or(AgentHealth::Unknown)
    }
}

impl From<ApiCosPmStatus> for CosPmStatus {
    fn from(raw: ApiCosPmStatus) -> Self {
        Self {
            cos_status: raw.cos_status,
            ai_intelligence: raw.cos_ai_intelligence,
            pm_connectivity: raw.cos_pm_connectivity,
            cache_status: raw.cos_cache_status,
            reported_at: raw.cos_timestamp,
            total_projects: raw.pm_total_projects,
            active_projects: raw.pm_active_projects,
            total_tasks: raw.pm_total_tasks,
            completed_tasks: raw.pm_completed_tasks,
            pending_tasks: raw.pm_pending_tasks,
            high_priority_tasks: raw.pm_high_priority_tasks,
            communication_success_rate: raw.communication_success_rate.clamp(0.0, 100.0),
            avg_response_time_ms: raw.avg_response_time.max(0.0),
            last_communication: raw.last_communication,
        }
    }
}
