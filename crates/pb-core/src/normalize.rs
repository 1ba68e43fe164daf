//! Raw payload → canonical record mapping.
//!
//! Nothing in here fails: a payload of the wrong shape yields an empty
//! collection, and a missing or mistyped field yields its documented
//! default. Transport and JSON-syntax failures are the client's business.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use pb_api_types::{lenient, ApiAgentStatus, ApiCosPmStatus, AGENTS_FIELD, IDEAS_FIELD};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::types::{
    AgentCard, AgentHealth, AgentProfile, AgentStatusBatch, AgentStatusReport, CosPmStatus,
    Decision, Idea, IdeaBatch, ServerSummary,
};

// ---------------------------------------------------------------------------
// Field translation table
// ---------------------------------------------------------------------------

// Raw keys tried for each canonical idea field, first match wins.
const ID_KEYS: &[&str] = &["id", "idea_id", "_id"];
const CONTENT_KEYS: &[&str] = &["content", "concept", "title", "description"];
const AGENT_KEYS: &[&str] = &["agent_name", "agent", "agent_id"];
const DECISION_KEYS: &[&str] = &["final_decision", "decision"];
const FAST_TRACK_KEYS: &[&str] = &["fast_track", "fastTrack"];
const ICE_KEYS: &[&str] = &["ice_plus_score", "ice_score", "iceScore"];
const TIER_KEYS: &[&str] = &["profit_tier", "profitTier"];
const CREATED_KEYS: &[&str] = &["created_at", "createdAt", "timestamp", "date"];

/// Decision assumed when the source sends none or an unknown word.
pub const DEFAULT_DECISION: Decision = Decision::Archive;

fn lookup<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .find_map(|k| obj.get(*k).filter(|v| !v.is_null()))
}

// ---------------------------------------------------------------------------
// Envelopes
// ---------------------------------------------------------------------------

/// The record collection inside a response body.
///
/// A bare array is the collection itself; an object contributes its
/// `field` member when that is an array. Anything else is empty.
pub fn collection<'a>(payload: &'a Value, field: &str) -> &'a [Value] {
    match payload {
        Value::Array(items) => items,
        Value::Object(map) => map
            .get(field)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[]),
        _ => &[],
    }
}

fn server_summary(payload: &Value) -> Option<ServerSummary> {
    let obj = payload.as_object()?;
    let total = obj.get("total").and_then(lenient::as_u64);
    let fast_track = obj.get("fast_track").and_then(lenient::as_u64);
    (total.is_some() || fast_track.is_some()).then_some(ServerSummary { total, fast_track })
}

// ---------------------------------------------------------------------------
// Ideas
// ---------------------------------------------------------------------------

/// Normalize an ideas response body.
///
/// Entries that are not objects are skipped. Ids are unique within the
/// returned batch: a repeated id keeps its first occurrence.
pub fn normalize_ideas(payload: &Value) -> IdeaBatch {
    let items = collection(payload, IDEAS_FIELD);
    let mut seen = HashSet::with_capacity(items.len());
    let mut ideas = Vec::with_capacity(items.len());

    for (index, item) in items.iter().enumerate() {
        let Some(idea) = normalize_idea(item, index) else {
            debug!(index, "skipping non-object idea entry");
            continue;
        };
        if !seen.insert(idea.id.clone()) {
            warn!(id = %idea.id, "duplicate idea id in batch, keeping first");
            continue;
        }
        ideas.push(idea);
    }

    IdeaBatch {
        ideas,
        server_summary: server_summary(payload),
    }
}

/// Normalize one idea object. `index` names the record when it has no id.
pub fn normalize_idea(item: &Value, index: usize) -> Option<Idea> {
    let obj = item.as_object()?;

    let id = lookup(obj, ID_KEYS)
        .and_then(lenient::as_string)
        .unwrap_or_else(|| format!("#{index}"));
    let content = lookup(obj, CONTENT_KEYS)
        .and_then(lenient::as_string)
        .unwrap_or_default();
    let agent = lookup(obj, AGENT_KEYS)
        .and_then(lenient::as_string)
        .unwrap_or_default();
    let decision = lookup(obj, DECISION_KEYS)
        .and_then(Value::as_str)
        .and_then(Decision::from_source)
        .unwrap_or(DEFAULT_DECISION);
    let flagged = lookup(obj, FAST_TRACK_KEYS)
        .and_then(lenient::as_bool)
        .unwrap_or(false);
    let ice_score = lookup(obj, ICE_KEYS).and_then(lenient::as_f64);
    let profit_tier = lookup(obj, TIER_KEYS)
        .and_then(lenient::as_f64)
        .filter(|t| t.fract() == 0.0 && (1.0..=4.0).contains(t))
        .map(|t| t as u8);
    let created_at = lookup(obj, CREATED_KEYS).and_then(parse_timestamp);

    Some(Idea {
        id,
        content,
        agent,
        decision,
        fast_track: flagged || decision == Decision::FastTrack,
        ice_score,
        profit_tier,
        created_at,
    })
}

/// RFC 3339, naive date-time (taken as UTC), plain date, or unix time in
/// seconds or milliseconds.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if let Ok(at) = DateTime::parse_from_rfc3339(s) {
                return Some(at.with_timezone(&Utc));
            }
            for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
                if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
                    return Some(naive.and_utc());
                }
            }
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|naive| naive.and_utc())
        }
        Value::Number(n) => {
            let raw = n.as_i64()?;
            if raw.abs() >= 100_000_000_000 {
                Utc.timestamp_millis_opt(raw).single()
            } else {
                Utc.timestamp_opt(raw, 0).single()
            }
        }
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Agents
// ---------------------------------------------------------------------------

/// Normalize an agent-status response body.
///
/// Collection entries may be objects or bare agent names; a bare name takes
/// the envelope's overall status.
pub fn normalize_agent_statuses(payload: &Value) -> AgentStatusBatch {
    let overall = payload
        .get("status")
        .and_then(Value::as_str)
        .map(AgentHealth::from_source);

    let reports = collection(payload, AGENTS_FIELD)
        .iter()
        .filter_map(|item| match item {
            Value::String(name) => Some(AgentStatusReport {
                id: None,
                name: Some(name.clone()),
                team: None,
                health: overall.unwrap_or(AgentHealth::Unknown),
                last_check: None,
            }),
            Value::Object(_) => {
                let raw: ApiAgentStatus = serde_json::from_value(item.clone()).ok()?;
                Some(AgentStatusReport {
                    health: raw
                        .status
                        .as_deref()
                        .map(AgentHealth::from_source)
                        .unwrap_or(AgentHealth::Unknown),
                    id: raw.id,
                    name: raw.name,
                    team: raw.team,
                    last_check: raw.last_check,
                })
            }
            _ => None,
        })
        .collect();

    AgentStatusBatch {
        reports,
        overall,
        total_agents: payload.get("total_agents").and_then(lenient::as_u64),
        healthy_agents: payload.get("healthy_agents").and_then(lenient::as_u64),
    }
}

/// Merge the static roster with fetched health.
///
/// Reports match a roster entry by id, or by name ignoring case. Entries
/// without a report are `Error` when the whole service reported an error and
/// `Unknown` otherwise.
pub fn merge_roster(roster: &[AgentProfile], batch: &AgentStatusBatch) -> Vec<AgentCard> {
    let fallback = match batch.overall {
        Some(AgentHealth::Error) => AgentHealth::Error,
        _ => AgentHealth::Unknown,
    };

    roster
        .iter()
        .map(|profile| {
            let report = batch.reports.iter().find(|r| {
                r.id.as_deref() == Some(profile.id.as_str())
                    || r
                        .name
                        .as_deref()
                        .is_some_and(|n| n.eq_ignore_ascii_case(&profile.name))
            });
            AgentCard {
                profile: profile.clone(),
                health: report.map(|r| r.health).unwrap_or(fallback),
                last_check: report.and_then(|r| r.last_check.clone()),
            }
        })
        .collect()
}

/// Roster cards before any status has been fetched.
pub fn unknown_roster(roster: &[AgentProfile]) -> Vec<AgentCard> {
    merge_roster(roster, &AgentStatusBatch::default())
}

// ---------------------------------------------------------------------------
// CoS / PM
// ---------------------------------------------------------------------------

pub fn normalize_cos_pm(payload: &Value) -> CosPmStatus {
    if !payload.is_object() {
        return CosPmStatus::default();
    }
    serde_json::from_value::<ApiCosPmStatus>(payload.clone())
        .unwrap_or_default()
        .into()
}
