//! Built-in ideation agent roster.
//!
//! Hoddle agents run continuously; Waddle agents run on demand. Only their
//! health is fetched at runtime; everything here is static and can be
//! replaced wholesale through `[[roster]]` in the config file.

use crate::types::{AgentMode, AgentProfile};

struct Entry {
    id: &'static str,
    name: &'static str,
    team: &'static str,
    mode: AgentMode,
    description: &'static str,
    rate: u8,
    enhancement: Option<&'static str>,
}

const ENTRIES: &[Entry] = &[
    Entry {
        id: "hoddle-concept-pitcher",
        name: "Hoddle Concept Pitcher",
        team: "Hoddle",
        mode: AgentMode::Continuous,
        description: "Continuous business concept generation",
        rate: 20,
        enhancement: None,
    },
    Entry {
        id: "hoddle-trend-scout",
        name: "Hoddle Trend Scout",
        team: "Hoddle",
        mode: AgentMode::Continuous,
        description: "Market trend analysis and opportunity identification",
        rate: 80,
        enhancement: None,
    },
    Entry {
        id: "hoddle-gap-finder",
        name: "Hoddle Gap Finder",
        team: "Hoddle",
        mode: AgentMode::Continuous,
        description: "Market gap identification and analysis",
        rate: 25,
        enhancement: None,
    },
    Entry {
        id: "hoddle-feasibility-analyst",
        name: "Hoddle Feasibility Analyst",
        team: "Hoddle",
        mode: AgentMode::Continuous,
        description: "Implementation feasibility analysis",
        rate: 22,
        enhancement: None,
    },
    Entry {
        id: "waddle-concept-pitcher",
        name: "Waddle Concept Pitcher",
        team: "Waddle",
        mode: AgentMode::OnDemand,
        description: "Task-directed concept generation",
        rate: 15,
        enhancement: None,
    },
    Entry {
        id: "waddle-trend-scout",
        name: "Waddle Trend Scout",
        team: "Waddle",
        mode: AgentMode::OnDemand,
        description: "YouTube-enhanced trend analysis",
        rate: 40,
        enhancement: Some("YouTube Integration"),
    },
    Entry {
        id: "waddle-gap-finder",
        name: "Waddle Gap Finder",
        team: "Waddle",
        mode: AgentMode::OnDemand,
        description: "Targeted market gap analysis",
        rate: 20,
        enhancement: None,
    },
    Entry {
        id: "waddle-feasibility-analyst",
        name: "Waddle Feasibility Analyst",
        team: "Waddle",
        mode: AgentMode::OnDemand,
        description: "On-demand feasibility optimization",
        rate: 18,
        enhancement: None,
    },
];

pub fn default_roster() -> Vec<AgentProfile> {
    ENTRIES
        .iter()
        .map(|e| AgentProfile {
            id: e.id.to_string(),
            name: e.name.to_string(),
            team: e.team.to_string(),
            mode: e.mode,
            description: e.description.to_string(),
            expected_fast_track_rate: e.rate,
            endpoint: format!("/{}", e.id),
            enhancement: e.enhancement.map(str::to_string),
        })
        .collect()
}
