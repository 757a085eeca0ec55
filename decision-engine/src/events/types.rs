//! Notifications emitted on every session transition.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::filter::CandidateId;
use crate::params::AlgorithmParams;
use crate::result::DecisionResult;
use crate::session::{GroupId, SessionId, SkipKind, TurnSlot, UserId};

/// All decision engine events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DecisionEvent {
    /// Session created and order committed
    SessionCreated {
        session_id: SessionId,
        group_id: GroupId,
        elimination_order: Vec<UserId>,
        params: AlgorithmParams,
        timestamp: DateTime<Utc>,
    },

    /// A new turn began
    TurnAdvanced {
        session_id: SessionId,
        user_id: UserId,
        round: u32,
        turn_index: usize,
        catch_up: bool,
        deadline: DateTime<Utc>,
        timestamp: DateTime<Utc>,
    },

    /// A participant removed a candidate
    CandidateEliminated {
        session_id: SessionId,
        user_id: UserId,
        candidate_id: CandidateId,
        round: u32,
        remaining: usize,
        timestamp: DateTime<Utc>,
    },

    /// A turn was deferred (quick-skip or timeout)
    TurnSkipped {
        session_id: SessionId,
        user_id: UserId,
        round: u32,
        turn_index: usize,
        kind: SkipKind,
        timestamp: DateTime<Utc>,
    },

    /// A catch-up timeout forfeited every outstanding deferral of a user
    TurnsForfeited {
        session_id: SessionId,
        user_id: UserId,
        slots: Vec<TurnSlot>,
        timestamp: DateTime<Utc>,
    },

    /// Regular rounds finished with deferrals outstanding
    CatchUpStarted {
        session_id: SessionId,
        pending: usize,
        timestamp: DateTime<Utc>,
    },

    /// Winner drawn
    DecisionCompleted {
        session_id: SessionId,
        result: Box<DecisionResult>,
        timestamp: DateTime<Utc>,
    },

    /// Session cancelled before completion
    SessionCancelled {
        session_id: SessionId,
        timestamp: DateTime<Utc>,
    },
}

impl DecisionEvent {
    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::SessionCreated { .. } => "session_created",
            Self::TurnAdvanced { .. } => "turn_advanced",
            Self::CandidateEliminated { .. } => "candidate_eliminated",
            Self::TurnSkipped { .. } => "turn_skipped",
            Self::TurnsForfeited { .. } => "turns_forfeited",
            Self::CatchUpStarted { .. } => "catch_up_started",
            Self::DecisionCompleted { .. } => "decision_completed",
            Self::SessionCancelled { .. } => "session_cancelled",
        }
    }

    pub fn session_id(&self) -> &str {
        match self {
            Self::SessionCreated { session_id, .. }
            | Self::TurnAdvanced { session_id, .. }
            | Self::CandidateEliminated { session_id, .. }
            | Self::TurnSkipped { session_id, .. }
            | Self::TurnsForfeited { session_id, .. }
            | Self::CatchUpStarted { session_id, .. }
            | Self::DecisionCompleted { session_id, .. }
            | Self::SessionCancelled { session_id, .. } => session_id,
        }
    }

    /// Acting participant, if the event has one
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::TurnAdvanced { user_id, .. }
            | Self::CandidateEliminated { user_id, .. }
            | Self::TurnSkipped { user_id, .. }
            | Self::TurnsForfeited { user_id, .. } => Some(user_id),
            _ => None,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::SessionCreated { timestamp, .. }
            | Self::TurnAdvanced { timestamp, .. }
            | Self::CandidateEliminated { timestamp, .. }
            | Self::TurnSkipped { timestamp, .. }
            | Self::TurnsForfeited { timestamp, .. }
            | Self::CatchUpStarted { timestamp, .. }
            | Self::DecisionCompleted { timestamp, .. }
            | Self::SessionCancelled { timestamp, .. } => *timestamp,
        }
    }
}
