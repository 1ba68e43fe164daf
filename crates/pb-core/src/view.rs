//! Filter and sort derivations over a list of ideas.
//!
//! Nothing here mutates its input. Callers recompute the visible list from
//! the fetched list whenever either the list or the selection changes.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use pb_api_types::IdeaQueryParams;
use serde::{Deserialize, Serialize};

use crate::types::{Decision, Idea};

// ---------------------------------------------------------------------------
// Sort
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    /// Newest first; undated ideas last.
    #[default]
    CreatedAt,
    /// Highest first; unscored ideas rank as zero.
    IceScore,
    /// Tier 1 first; unknown tiers last.
    ProfitTier,
}

impl SortKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::CreatedAt => "created_at",
            SortKey::IceScore => "ice_score",
            SortKey::ProfitTier => "profit_tier",
        }
    }

    fn compare(&self, a: &Idea, b: &Idea) -> Ordering {
        match self {
            SortKey::CreatedAt => match (a.created_at, b.created_at) {
                (Some(x), Some(y)) => y.cmp(&x),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            },
            SortKey::IceScore => b.ice_or_zero().total_cmp(&a.ice_or_zero()),
            SortKey::ProfitTier => a
                .profit_tier
                .unwrap_or(u8::MAX)
                .cmp(&b.profit_tier.unwrap_or(u8::MAX)),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "created_at" | "created" | "date" => Ok(SortKey::CreatedAt),
            "ice_score" | "ice" => Ok(SortKey::IceScore),
            "profit_tier" | "tier" => Ok(SortKey::ProfitTier),
            other => Err(format!(
                "unknown sort key '{other}' (expected created_at, ice_score or profit_tier)"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Filter
// ---------------------------------------------------------------------------

/// Conjunction of optional predicates. The default matches everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdeaFilter {
    /// Case-insensitive substring over content and agent.
    pub search: Option<String>,
    pub decision: Option<Decision>,
    /// Agent name, compared ignoring case.
    pub agent: Option<String>,
    /// Accepted tiers; empty accepts any tier, unknown included.
    pub profit_tiers: Vec<u8>,
    pub min_ice: Option<f64>,
    pub max_ice: Option<f64>,
    /// Inclusive lower bound on `created_at`.
    pub created_after: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `created_at`.
    pub created_before: Option<DateTime<Utc>>,
}

impl IdeaFilter {
    fn search_term(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
    }

    fn agent_name(&self) -> Option<&str> {
        self.agent.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    pub fn matches(&self, idea: &Idea) -> bool {
        if let Some(term) = self.search_term() {
            let hit = idea.content.to_lowercase().contains(&term)
                || idea.agent.to_lowercase().contains(&term);
            if !hit {
                return false;
            }
        }
        if self.decision.is_some_and(|d| idea.decision != d) {
            return false;
        }
        if let Some(agent) = self.agent_name() {
            if !idea.agent.eq_ignore_ascii_case(agent) {
                return false;
            }
        }
        if !self.profit_tiers.is_empty()
            && !idea
                .profit_tier
                .is_some_and(|t| self.profit_tiers.contains(&t))
        {
            return false;
        }
        let ice = idea.ice_or_zero();
        if self.min_ice.is_some_and(|min| ice < min) || self.max_ice.is_some_and(|max| ice > max) {
            return false;
        }
        if self.created_after.is_some() || self.created_before.is_some() {
            let Some(at) = idea.created_at else {
                return false;
            };
            if self.created_after.is_some_and(|after| at < after)
                || self.created_before.is_some_and(|before| at > before)
            {
                return false;
            }
        }
        true
    }

    pub fn is_unconstrained(&self) -> bool {
        self.search_term().is_none()
            && self.decision.is_none()
            && self.agent_name().is_none()
            && self.profit_tiers.is_empty()
            && self.min_ice.is_none()
            && self.max_ice.is_none()
            && self.created_after.is_none()
            && self.created_before.is_none()
    }

    /// The part of the filter the ideas service understands.
    pub fn query(&self) -> IdeaQueryParams {
        IdeaQueryParams {
            decision: self.decision.map(|d| d.as_str().to_string()),
            agent: self.agent_name().map(str::to_string),
            search: self.search_term(),
        }
    }
}

/// What the user has currently selected in the ideas panel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewSelection {
    pub filter: IdeaFilter,
    pub sort: SortKey,
}

impl ViewSelection {
    pub fn sorted_by(sort: SortKey) -> Self {
        Self {
            filter: IdeaFilter::default(),
            sort,
        }
    }
}

pub fn filter_ideas(ideas: &[Idea], filter: &IdeaFilter) -> Vec<Idea> {
    ideas.iter().filter(|i| filter.matches(i)).cloned().collect()
}

/// Stable sort of a copy of `ideas`.
pub fn sort_ideas(ideas: &[Idea], key: SortKey) -> Vec<Idea> {
    let mut sorted = ideas.to_vec();
    sorted.sort_by(|a, b| key.compare(a, b));
    sorted
}

pub fn visible_ideas(ideas: &[Idea], selection: &ViewSelection) -> Vec<Idea> {
    let mut visible = filter_ideas(ideas, &selection.filter);
    visible.sort_by(|a, b| selection.sort.compare(a, b));
    visible
}
