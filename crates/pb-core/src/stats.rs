//! Aggregate figures derived from a list of ideas or agent cards.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{AgentCard, Decision, Idea};

/// Count of ideas per decision. Every decision is present, zero included.
pub fn count_by_decision(ideas: &[Idea]) -> BTreeMap<Decision, usize> {
    let mut counts: BTreeMap<Decision, usize> = Decision::ALL.iter().map(|d| (*d, 0)).collect();
    for idea in ideas {
        *counts.entry(idea.decision).or_default() += 1;
    }
    counts
}

/// Mean ICE score with absent scores counted as zero; 0.0 for no ideas.
pub fn average_ice_score(ideas: &[Idea]) -> f64 {
    if ideas.is_empty() {
        return 0.0;
    }
    let sum: f64 = ideas.iter().map(Idea::ice_or_zero).sum();
    sum / ideas.len() as f64
}

pub fn fast_track_count(ideas: &[Idea]) -> usize {
    ideas.iter().filter(|i| i.fast_track).count()
}

/// Count of ideas per agent name. Ideas without an agent are not counted.
pub fn count_by_agent(ideas: &[Idea]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for idea in ideas.iter().filter(|i| !i.agent.is_empty()) {
        *counts.entry(idea.agent.clone()).or_default() += 1;
    }
    counts
}

/// Distinct agent names, sorted. Feeds the agent filter choices.
pub fn agent_names(ideas: &[Idea]) -> Vec<String> {
    count_by_agent(ideas).into_keys().collect()
}

/// Headline numbers for the ideas panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdeaStats {
    pub total: usize,
    pub fast_track: usize,
    pub decisions: BTreeMap<Decision, usize>,
    pub average_ice_score: f64,
}

impl IdeaStats {
    pub fn from_ideas(ideas: &[Idea]) -> Self {
        Self {
            total: ideas.len(),
            fast_track: fast_track_count(ideas),
            decisions: count_by_decision(ideas),
            average_ice_score: average_ice_score(ideas),
        }
    }

    pub fn count(&self, decision: Decision) -> usize {
        self.decisions.get(&decision).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamHealth {
    pub team: String,
    pub total: usize,
    pub healthy: usize,
}

/// Per-team agent counts, in order of first appearance in the roster.
pub fn team_health(cards: &[AgentCard]) -> Vec<TeamHealth> {
    let mut teams: Vec<TeamHealth> = Vec::new();
    for card in cards {
        let idx = match teams.iter().position(|t| t.team == card.profile.team) {
            Some(idx) => idx,
            None => {
                teams.push(TeamHealth {
                    team: card.profile.team.clone(),
                    total: 0,
                    healthy: 0,
                });
                teams.len() - 1
            }
        };
        teams[idx].total += 1;
        if card.health.is_up() {
            teams[idx].healthy += 1;
        }
    }
    teams
}
