//! Read-only view of a session for one participant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EngineResult;
use crate::filter::CandidateId;
use crate::session::{EliminationSession, SessionId, SessionStatus, SkippedTurn, UserId};

/// What a participant needs to render the elimination screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EliminationStatus {
    pub session_id: SessionId,
    pub status: SessionStatus,
    pub current_candidates: Vec<CandidateId>,
    pub current_turn_user: Option<UserId>,
    pub is_my_turn: bool,
    pub current_round: u32,
    pub total_rounds: u32,
    /// Seconds left on the current turn, zero when inactive
    pub time_remaining_secs: i64,
    pub elimination_order: Vec<UserId>,
    pub skipped_turns: Vec<SkippedTurn>,
    pub can_quick_skip: bool,
    pub skips_used: u32,
    pub skip_limit: u32,
    pub is_catch_up: bool,
    pub pending_catch_up_turns: usize,
    pub final_selection: Option<CandidateId>,
    pub runners_up: Vec<CandidateId>,
}

impl EliminationStatus {
    /// Project `session` for `user_id`, who must be a participant.
    ///
    /// Callers apply the pending timeout first.
    pub fn for_user(
        session: &EliminationSession,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<Self> {
        session.ensure_participant(user_id)?;

        let skips = session.skips();
        let active = session.status.is_active();
        let current_turn_user = session.current_turn_user().map(str::to_string);
        let is_my_turn = current_turn_user.as_deref() == Some(user_id);
        let skips_used = skips.skip_count(user_id);

        let can_quick_skip = is_my_turn
            && skips_used < session.params.k
            && session
                .current_slot()
                .map(|slot| !skips.has_entry_for(&slot))
                .unwrap_or(false);

        Ok(Self {
            session_id: session.id.clone(),
            status: session.status,
            current_candidates: session.current_candidates.clone(),
            current_turn_user,
            is_my_turn,
            current_round: session.current_round,
            total_rounds: session.params.k,
            time_remaining_secs: if active {
                session.time_remaining(now).num_seconds()
            } else {
                0
            },
            elimination_order: session.elimination_order.clone(),
            skipped_turns: skips.entries().to_vec(),
            can_quick_skip,
            skips_used,
            skip_limit: session.params.k,
            is_catch_up: session.is_catch_up(),
            pending_catch_up_turns: skips.pending_count(),
            final_selection: session.final_selection.clone(),
            runners_up: session.runners_up.clone(),
        })
    }
}
