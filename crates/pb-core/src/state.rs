//! Owned dashboard state and the sequencing rules for applying fetch results.
//!
//! Every fetch is stamped with a number from one [`SequenceCounter`] before
//! it is issued. A feed applies a result only when its number is newer than
//! the last one applied and not below the feed's floor; raising the floor
//! (on a filter change) invalidates everything issued before it.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use pb_api_types::IdeaQueryParams;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::normalize::{merge_roster, unknown_roster};
use crate::stats::{team_health, IdeaStats, TeamHealth};
use crate::types::{AgentCard, AgentProfile, AgentStatusBatch, CosPmStatus, Idea, IdeaBatch};
use crate::view::{visible_ideas, ViewSelection};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feed {
    Agents,
    Ideas,
    CosPm,
}

impl Feed {
    pub const ALL: [Feed; 3] = [Feed::Agents, Feed::Ideas, Feed::CosPm];

    pub fn as_str(&self) -> &'static str {
        match self {
            Feed::Agents => "agents",
            Feed::Ideas => "ideas",
            Feed::CosPm => "cos_pm",
        }
    }
}

impl fmt::Display for Feed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared source of request sequence numbers. Clones hand out from the same
/// counter; the first number issued is 1.
#[derive(Debug, Clone, Default)]
pub struct SequenceCounter(Arc<AtomicU64>);

impl SequenceCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Highest number issued so far (0 when none).
    pub fn current(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Per-feed state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    /// Older than, or equal to, the last applied result.
    Stale,
    /// Issued before the feed's floor was raised.
    Superseded,
}

/// What a panel should show for a feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FeedStatus {
    /// Nothing received yet.
    Loading,
    Ready,
    /// Showing earlier data; the latest fetch failed.
    Stale { error: String },
    /// No data has ever loaded.
    Failed { error: String },
}

impl FeedStatus {
    pub fn error(&self) -> Option<&str> {
        match self {
            FeedStatus::Stale { error } | FeedStatus::Failed { error } => Some(error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FeedState<T> {
    data: Option<T>,
    error: Option<String>,
    applied_seq: u64,
    floor: u64,
    updated_at: Option<DateTime<Utc>>,
}

impl<T> Default for FeedState<T> {
    fn default() -> Self {
        Self {
            data: None,
            error: None,
            applied_seq: 0,
            floor: 0,
            updated_at: None,
        }
    }
}

impl<T> FeedState<T> {
    /// Apply the result of request `seq`. A failure keeps the previous data
    /// and records the error next to it.
    pub fn apply(&mut self, seq: u64, result: Result<T, String>) -> ApplyOutcome {
        if seq < self.floor {
            return ApplyOutcome::Superseded;
        }
        if seq <= self.applied_seq {
            return ApplyOutcome::Stale;
        }
        self.applied_seq = seq;
        match result {
            Ok(data) => {
                self.data = Some(data);
                self.error = None;
                self.updated_at = Some(Utc::now());
            }
            Err(error) => self.error = Some(error),
        }
        ApplyOutcome::Applied
    }

    /// Discard every result issued before `next_seq`. The data already shown
    /// stays until a newer result arrives.
    pub fn supersede(&mut self, next_seq: u64) {
        self.floor = self.floor.max(next_seq);
    }

    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn applied_seq(&self) -> u64 {
        self.applied_seq
    }

    /// When the data currently held was fetched. Failures leave it alone.
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn status(&self) -> FeedStatus {
        match (&self.data, &self.error) {
            (_, None) if self.applied_seq == 0 => FeedStatus::Loading,
            (Some(_), None) => FeedStatus::Ready,
            (Some(_), Some(e)) => FeedStatus::Stale { error: e.clone() },
            (None, Some(e)) => FeedStatus::Failed { error: e.clone() },
            (None, None) => FeedStatus::Loading,
        }
    }
}

// ---------------------------------------------------------------------------
// Updates
// ---------------------------------------------------------------------------

/// A finished fetch, as sent back by a refresh worker. Errors are already
/// rendered to their user-facing summary.
#[derive(Debug, Clone)]
pub enum FeedUpdate {
    Agents {
        seq: u64,
        result: Result<AgentStatusBatch, String>,
    },
    Ideas {
        seq: u64,
        /// Server-side filter the request was issued with.
        query: IdeaQueryParams,
        result: Result<IdeaBatch, String>,
    },
    CosPm {
        seq: u64,
        result: Result<CosPmStatus, String>,
    },
}

impl FeedUpdate {
    pub fn feed(&self) -> Feed {
        match self {
            FeedUpdate::Agents { .. } => Feed::Agents,
            FeedUpdate::Ideas { .. } => Feed::Ideas,
            FeedUpdate::CosPm { .. } => Feed::CosPm,
        }
    }

    pub fn seq(&self) -> u64 {
        match self {
            FeedUpdate::Agents { seq, .. }
            | FeedUpdate::Ideas { seq, .. }
            | FeedUpdate::CosPm { seq, .. } => *seq,
        }
    }

    pub fn is_ok(&self) -> bool {
        match self {
            FeedUpdate::Agents { result, .. } => result.is_ok(),
            FeedUpdate::Ideas { result, .. } => result.is_ok(),
            FeedUpdate::CosPm { result, .. } => result.is_ok(),
        }
    }
}

// ---------------------------------------------------------------------------
// Dashboard state
// ---------------------------------------------------------------------------

/// Everything the dashboard shows. Owned by one task; the derived views are
/// recomputed on every call.
#[derive(Debug)]
pub struct DashboardState {
    roster: Vec<AgentProfile>,
    agents: FeedState<AgentStatusBatch>,
    ideas: FeedState<IdeaBatch>,
    cos_pm: FeedState<CosPmStatus>,
    selection: ViewSelection,
    sequence: SequenceCounter,
}

impl DashboardState {
    pub fn new(roster: Vec<AgentProfile>, selection: ViewSelection, sequence: SequenceCounter) -> Self {
        Self {
            roster,
            agents: FeedState::default(),
            ideas: FeedState::default(),
            cos_pm: FeedState::default(),
            selection,
            sequence,
        }
    }

    pub fn sequence(&self) -> &SequenceCounter {
        &self.sequence
    }

    pub fn apply(&mut self, update: FeedUpdate) -> ApplyOutcome {
        let feed = update.feed();
        let seq = update.seq();
        let outcome = match update {
            FeedUpdate::Agents { seq, result } => self.agents.apply(seq, result),
            FeedUpdate::Ideas { seq, query, result } => {
                if query != self.selection.filter.query() {
                    ApplyOutcome::Superseded
                } else {
                    self.ideas.apply(seq, result)
                }
            }
            FeedUpdate::CosPm { seq, result } => self.cos_pm.apply(seq, result),
        };
        if outcome != ApplyOutcome::Applied {
            debug!(feed = %feed, seq, ?outcome, "discarding feed update");
        }
        outcome
    }

    pub fn selection(&self) -> &ViewSelection {
        &self.selection
    }

    /// Replace the selection. Returns the new server query when it differs
    /// from the old one; ideas results issued for the old query are then
    /// never applied.
    pub fn set_selection(&mut self, selection: ViewSelection) -> Option<IdeaQueryParams> {
        let old = self.selection.filter.query();
        let new = selection.filter.query();
        self.selection = selection;
        if old == new {
            return None;
        }
        self.ideas.supersede(self.sequence.current() + 1);
        Some(new)
    }

    pub fn feed_status(&self, feed: Feed) -> FeedStatus {
        match feed {
            Feed::Agents => self.agents.status(),
            Feed::Ideas => self.ideas.status(),
            Feed::CosPm => self.cos_pm.status(),
        }
    }

    pub fn updated_at(&self, feed: Feed) -> Option<DateTime<Utc>> {
        match feed {
            Feed::Agents => self.agents.updated_at(),
            Feed::Ideas => self.ideas.updated_at(),
            Feed::CosPm => self.cos_pm.updated_at(),
        }
    }

    /// True until every feed has produced a first result, good or bad.
    pub fn is_loading(&self) -> bool {
        Feed::ALL
            .iter()
            .any(|f| self.feed_status(*f) == FeedStatus::Loading)
    }

    /// Last fetched ideas, unfiltered.
    pub fn ideas(&self) -> &[Idea] {
        self.ideas.data().map(|b| b.ideas.as_slice()).unwrap_or(&[])
    }

    pub fn idea_batch(&self) -> Option<&IdeaBatch> {
        self.ideas.data()
    }

    pub fn visible_ideas(&self) -> Vec<Idea> {
        visible_ideas(self.ideas(), &self.selection)
    }

    /// Statistics over the unfiltered list.
    pub fn idea_stats(&self) -> IdeaStats {
        IdeaStats::from_ideas(self.ideas())
    }

    pub fn roster(&self) -> &[AgentProfile] {
        &self.roster
    }

    pub fn agent_cards(&self) -> Vec<AgentCard> {
        match self.agents.data() {
            Some(batch) => merge_roster(&self.roster, batch),
            None => unknown_roster(&self.roster),
        }
    }

    pub fn agent_batch(&self) -> Option<&AgentStatusBatch> {
        self.agents.data()
    }

    pub fn team_health(&self) -> Vec<TeamHealth> {
        team_health(&self.agent_cards())
    }

    pub fn cos_pm(&self) -> Option<&CosPmStatus> {
        self.cos_pm.data()
    }
}
