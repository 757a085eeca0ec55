//! Immutable record of a completed decision.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DecisionError, EngineResult};
use crate::filter::CandidateId;
use crate::params::AlgorithmParams;
use crate::session::{EliminationSession, GroupId, SessionId, SessionStatus, SkipKind, UserId};

/// Outcome of a finished elimination run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionResult {
    pub session_id: SessionId,
    pub group_id: GroupId,
    pub winner: CandidateId,
    pub runners_up: Vec<CandidateId>,
    /// Elimination order as played
    pub participants: Vec<UserId>,
    pub eliminations_by_user: BTreeMap<UserId, u32>,
    /// Quick-skips used per participant
    pub quick_skips_by_user: BTreeMap<UserId, u32>,
    pub timeout_skips: usize,
    pub forfeited_turns: usize,
    pub params: AlgorithmParams,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl DecisionResult {
    /// Build from a session that reached `Completed`.
    pub fn from_session(session: &EliminationSession) -> EngineResult<Self> {
        if session.status != SessionStatus::Completed {
            return Err(DecisionError::internal(format!(
                "session {} is {}, not completed",
                session.id, session.status
            )));
        }
        let winner = session.final_selection.clone().ok_or_else(|| {
            DecisionError::internal(format!("completed session {} has no winner", session.id))
        })?;
        let completed_at = session.completed_at.unwrap_or(session.updated_at);

        let skips = session.skips();
        let quick_skips_by_user = session
            .elimination_order
            .iter()
            .map(|u| (u.clone(), skips.skip_count(u)))
            .collect();

        Ok(Self {
            session_id: session.id.clone(),
            group_id: session.group_id.clone(),
            winner,
            runners_up: session.runners_up.clone(),
            participants: session.elimination_order.clone(),
            eliminations_by_user: session.eliminations_by_user(),
            quick_skips_by_user,
            timeout_skips: skips.count_of(SkipKind::TimeoutSkip),
            forfeited_turns: skips.count_of(SkipKind::Forfeited),
            params: session.params,
            started_at: session.created_at,
            completed_at,
        })
    }

    /// Total candidates removed by participants.
    pub fn total_eliminations(&self) -> u32 {
        self.eliminations_by_user.values().sum()
    }
}
