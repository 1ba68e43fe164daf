//! Wire shapes for the services the dashboard polls.
//!
//! The agent-status, ideas and CoS/PM services were deployed in several
//! generations that never agreed on field names or value types, so every
//! field here is defaulted and the numeric ones are decoded leniently.
//! Idea records are deliberately not typed: they are normalized from raw
//! `serde_json::Value` in `pb-core`, where the field translation table lives.

use serde::{Deserialize, Serialize};

pub mod lenient;

// ── Collection envelope field names ──

/// Object field that wraps the idea collection (`{"ideas": [...]}`).
pub const IDEAS_FIELD: &str = "ideas";

/// Object field that wraps the agent collection (`{"agents": [...]}`).
pub const AGENTS_FIELD: &str = "agents";

// ── Agent status service ──

/// One entry of the agent-status collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiAgentStatus {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub id: Option<String>,
    #[serde(default, alias = "agent_name", deserialize_with = "lenient::opt_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub team: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub mode: Option<String>,
    #[serde(default, alias = "last_seen", deserialize_with = "lenient::opt_string")]
    pub last_check: Option<String>,
}

// ── Chief-of-Staff / Project-Manager service ──

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiCosPmStatus {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub cos_status: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub cos_ai_intelligence: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub cos_pm_connectivity: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub cos_cache_status: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub cos_timestamp: Option<String>,
    #[serde(default, deserialize_with = "lenient::u64")]
    pub pm_total_projects: u64,
    #[serde(default, deserialize_with = "lenient::u64")]
    pub pm_total_tasks: u64,
    #[serde(default, deserialize_with = "lenient::u64")]
    pub pm_active_projects: u64,
    #[serde(default, deserialize_with = "lenient::u64")]
    pub pm_completed_tasks: u64,
    #[serde(default, deserialize_with = "lenient::u64")]
    pub pm_pending_tasks: u64,
    #[serde(default, deserialize_with = "lenient::u64")]
    pub pm_high_priority_tasks: u64,
    /// Percentage, 0-100.
    #[serde(default, deserialize_with = "lenient::f64")]
    pub communication_success_rate: f64,
    /// Milliseconds.
    #[serde(default, deserialize_with = "lenient::f64")]
    pub avg_response_time: f64,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub last_communication: Option<String>,
}

// ── Ideas service query string ──

/// Server-side filter parameters understood by the ideas service.
///
/// Unset parameters are omitted from the query string entirely; the service
/// treats a missing parameter as "all".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdeaQueryParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

impl IdeaQueryParams {
    pub fn is_empty(&self) -> bool {
        self.decision.is_none() && self.agent.is_none() && self.search.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn agent_status_accepts_agent_name_alias() {
        let a: ApiAgentStatus = serde_json::from_value(json!({
            "agent_name": "Hoddle Trend Scout",
            "status": "healthy",
            "team": "Hoddle"
        }))
        .unwrap();
        assert_eq!(a.name.as_deref(), Some("Hoddle Trend Scout"));
        assert_eq!(a.status.as_deref(), Some("healthy"));
        assert!(a.id.is_none());
    }

    #[test]
    fn agent_status_numeric_id_becomes_string() {
        let a: ApiAgentStatus = serde_json::from_value(json!({"id": 7})).unwrap();
        assert_eq!(a.id.as_deref(), Some("7"));
    }

    #[test]
    fn cos_pm_status_tolerates_strings_and_nulls() {
        let s: ApiCosPmStatus = serde_json::from_value(json!({
            "cos_status": "healthy",
            "pm_total_projects": "12",
            "pm_total_tasks": null,
            "communication_success_rate": 98.5,
            "avg_response_time": "120"
        }))
        .unwrap();
        assert_eq!(s.cos_status.as_deref(), Some("healthy"));
        assert_eq!(s.pm_total_projects, 12);
        assert_eq!(s.pm_total_tasks, 0);
        assert!((s.communication_success_rate - 98.5).abs() < f64::EPSILON);
        assert!((s.avg_response_time - 120.0).abs() < f64::EPSILON);
        assert!(s.cos_cache_status.is_none());
    }

    #[test]
    fn cos_pm_status_empty_object_is_default() {
        let s: ApiCosPmStatus = serde_json::from_value(json!({})).unwrap();
        assert_eq!(s, ApiCosPmStatus::default());
    }

    #[test]
    fn query_params_skip_unset_fields() {
        let q = IdeaQueryParams {
            decision: Some("fast_track".into()),
            ..Default::default()
        };
        let v = serde_json::to_value(&q).unwrap();
        assert_eq!(v, json!({"decision": "fast_track"}));
        assert!(!q.is_empty());
        assert!(IdeaQueryParams::default().is_empty());
    }
}
