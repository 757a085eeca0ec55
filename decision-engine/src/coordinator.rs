//! Turn coordinator: every mutation of an elimination session goes through here.
//!
//! One coordinator is built per request with the request's clock reading and
//! RNG. It applies the operation to the session in place and collects the
//! events the caller should publish once the session is stored.
//!
//! # Turn flow
//!
//! ```text
//!            eliminate / quick-skip / timeout-skip
//!           ┌────────────────────────────────────┐
//!           ▼                                    │
//! Setup ──► InProgress (rounds 1..=K) ──────────┘
//!   │            │ round K done, deferrals left
//!   │            ▼
//!   │        CatchUp (replay unresolved deferrals FIFO)
//!   │            │ none left, or candidates ≤ M
//!   ▼            ▼
//! Completed ◄────┘        (any non-terminal) ──► Cancelled
//! ```
//!
//! Timeouts are lazy: the caller invokes [`TurnCoordinator::apply_timeout`]
//! before every read or write, and at most one pending timeout is applied per
//! call.

use chrono::{DateTime, Utc};
use rand::Rng;
use tracing::{debug, error, info, warn};

use crate::error::{DecisionError, EngineResult};
use crate::events::DecisionEvent;
use crate::result::DecisionResult;
use crate::selector::RandomSelector;
use crate::session::{
    EliminationRecord, EliminationSession, SessionStatus, SkipKind, TurnSlot, UserId,
};

/// Applies turn operations at a fixed instant with an injected RNG.
pub struct TurnCoordinator<'r, R: Rng + ?Sized> {
    now: DateTime<Utc>,
    rng: &'r mut R,
    events: Vec<DecisionEvent>,
}

impl<'r, R: Rng + ?Sized> TurnCoordinator<'r, R> {
    pub fn new(now: DateTime<Utc>, rng: &'r mut R) -> Self {
        Self {
            now,
            rng,
            events: Vec::new(),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Events produced so far.
    pub fn events(&self) -> &[DecisionEvent] {
        &self.events
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    /// Drop events recorded after `len`, used when an operation is rolled back.
    pub fn truncate_events(&mut self, len: usize) {
        self.events.truncate(len);
    }

    pub fn into_events(self) -> Vec<DecisionEvent> {
        self.events
    }

    /// Commit a shuffled elimination order and open round 1, or draw at once
    /// when the start set is already within the final set size.
    pub fn start(
        &mut self,
        session: &mut EliminationSession,
        participants: &[UserId],
    ) -> EngineResult<()> {
        if session.status != SessionStatus::Setup {
            return Err(DecisionError::InvalidTransition {
                from: session.status,
                to: SessionStatus::InProgress,
            });
        }
        if participants.len() != session.params.n as usize {
            return Err(DecisionError::invalid_parameters(format!(
                "N = {} but the group has {} participants",
                session.params.n,
                participants.len()
            )));
        }

        session.elimination_order = RandomSelector::shuffle_order(participants, &mut *self.rng);
        session.updated_at = self.now;
        self.events.push(DecisionEvent::SessionCreated {
            session_id: session.id.clone(),
            group_id: session.group_id.clone(),
            elimination_order: session.elimination_order.clone(),
            params: session.params,
            timestamp: self.now,
        });

        if session.params.skips_elimination() {
            info!(
                session_id = %session.id,
                candidates = session.current_candidates.len(),
                m = session.params.m,
                "Start set within final set size, drawing immediately"
            );
            return self.finalize(session);
        }

        session.transition(SessionStatus::InProgress, self.now)?;
        session.check_consistency()?;
        let first = session.elimination_order[0].clone();
        info!(
            session_id = %session.id,
            params = %session.params,
            order = ?session.elimination_order,
            "Elimination started"
        );
        self.begin_turn(session, &TurnSlot::new(first, 1, 0), false);
        Ok(())
    }

    /// Apply the pending timeout, if the current turn has expired.
    ///
    /// Regular rounds log a `timeout_skip` and move on. In catch-up every
    /// outstanding deferral of the turn holder is forfeited at once. Returns
    /// whether anything changed.
    pub fn apply_timeout(&mut self, session: &mut EliminationSession) -> EngineResult<bool> {
        if !session.is_turn_expired(self.now) {
            return Ok(false);
        }
        let slot = session.current_slot()?;

        match session.status {
            SessionStatus::InProgress => {
                session.skips_mut().record_timeout_skip(&slot, self.now);
                info!(
                    session_id = %session.id,
                    user_id = %slot.user_id,
                    round = slot.round,
                    "Turn timed out, deferring"
                );
                self.events.push(DecisionEvent::TurnSkipped {
                    session_id: session.id.clone(),
                    user_id: slot.user_id.clone(),
                    round: slot.round,
                    turn_index: slot.turn_index,
                    kind: SkipKind::TimeoutSkip,
                    timestamp: self.now,
                });
                session.updated_at = self.now;
                self.advance_regular(session)?;
            }
            SessionStatus::CatchUp => {
                let forfeited = session.skips_mut().forfeit_all(&slot.user_id, self.now);
                if forfeited.is_empty() {
                    error!(session_id = %session.id, slot = %slot, "Catch-up turn has no outstanding deferral");
                    return Err(DecisionError::internal(format!(
                        "catch-up slot {slot} is not an outstanding deferral"
                    )));
                }
                warn!(
                    session_id = %session.id,
                    user_id = %slot.user_id,
                    forfeited = forfeited.len(),
                    "Catch-up turn timed out, forfeiting deferred turns"
                );
                self.events.push(DecisionEvent::TurnsForfeited {
                    session_id: session.id.clone(),
                    user_id: slot.user_id.clone(),
                    slots: forfeited,
                    timestamp: self.now,
                });
                session.updated_at = self.now;
                self.advance_catch_up(session)?;
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    /// Remove `candidate_id` on behalf of the current turn holder.
    pub fn eliminate(
        &mut self,
        session: &mut EliminationSession,
        user_id: &str,
        candidate_id: &str,
    ) -> EngineResult<()> {
        let slot = self.holder_slot(session, user_id)?;
        let position = session
            .current_candidates
            .iter()
            .position(|c| c == candidate_id)
            .ok_or_else(|| DecisionError::CandidateNotFound {
                candidate_id: candidate_id.to_string(),
            })?;

        let removed = session.current_candidates.remove(position);
        let catch_up = session.is_catch_up();
        session.eliminations.push(EliminationRecord {
            user_id: slot.user_id.clone(),
            candidate_id: removed.clone(),
            round: slot.round,
            turn_index: slot.turn_index,
            catch_up,
            timestamp: self.now,
        });
        session.updated_at = self.now;
        debug!(
            session_id = %session.id,
            user_id,
            candidate_id = %removed,
            round = slot.round,
            remaining = session.current_candidates.len(),
            catch_up,
            "Candidate eliminated"
        );
        self.events.push(DecisionEvent::CandidateEliminated {
            session_id: session.id.clone(),
            user_id: slot.user_id.clone(),
            candidate_id: removed,
            round: slot.round,
            remaining: session.current_candidates.len(),
            timestamp: self.now,
        });

        if catch_up {
            session.skips_mut().mark_made_up(slot);
        }
        if session.current_candidates.len() <= session.params.m as usize {
            return self.finalize(session);
        }
        if catch_up {
            self.advance_catch_up(session)
        } else {
            self.advance_regular(session)
        }
    }

    /// Defer the current turn, spending one of the holder's K quick-skips.
    pub fn quick_skip(&mut self, session: &mut EliminationSession, user_id: &str) -> EngineResult<()> {
        let slot = self.holder_slot(session, user_id)?;

        let used = session.skips().skip_count(user_id);
        let limit = session.params.k;
        if used >= limit {
            return Err(DecisionError::SkipLimitExceeded {
                user_id: user_id.to_string(),
                used,
                limit,
            });
        }
        // Replayed catch-up slots always carry an entry, so this also stops
        // deferring a deferral
        if session.skips().has_entry_for(&slot) {
            return Err(DecisionError::AlreadyDeferred {
                user_id: user_id.to_string(),
                round: slot.round,
                turn_index: slot.turn_index,
            });
        }

        session.skips_mut().record_quick_skip(&slot, self.now);
        session.updated_at = self.now;
        debug!(
            session_id = %session.id,
            user_id,
            round = slot.round,
            used = used + 1,
            limit,
            "Turn quick-skipped"
        );
        self.events.push(DecisionEvent::TurnSkipped {
            session_id: session.id.clone(),
            user_id: slot.user_id.clone(),
            round: slot.round,
            turn_index: slot.turn_index,
            kind: SkipKind::QuickSkip,
            timestamp: self.now,
        });
        self.advance_regular(session)
    }

    /// Move a non-terminal session to `Cancelled`.
    pub fn cancel(&mut self, session: &mut EliminationSession) -> EngineResult<()> {
        if session.status.is_terminal() {
            return Err(DecisionError::SessionAlreadyTerminal {
                session_id: session.id.clone(),
                status: session.status,
            });
        }
        session.transition(SessionStatus::Cancelled, self.now)?;
        session.completed_at = Some(self.now);
        info!(session_id = %session.id, "Session cancelled");
        self.events.push(DecisionEvent::SessionCancelled {
            session_id: session.id.clone(),
            timestamp: self.now,
        });
        Ok(())
    }

    /// Active session, participant, and the caller holds the turn.
    fn holder_slot(&self, session: &EliminationSession, user_id: &str) -> EngineResult<TurnSlot> {
        session.ensure_active()?;
        session.ensure_participant(user_id)?;
        let slot = session.current_slot()?;
        if slot.user_id != user_id {
            return Err(DecisionError::NotYourTurn {
                user_id: user_id.to_string(),
                expected: slot.user_id,
            });
        }
        Ok(slot)
    }

    fn begin_turn(&mut self, session: &mut EliminationSession, slot: &TurnSlot, catch_up: bool) {
        session.set_turn(slot, self.now);
        debug!(session_id = %session.id, slot = %slot, catch_up, "Turn started");
        self.events.push(DecisionEvent::TurnAdvanced {
            session_id: session.id.clone(),
            user_id: slot.user_id.clone(),
            round: slot.round,
            turn_index: slot.turn_index,
            catch_up,
            deadline: session.turn_deadline(),
            timestamp: self.now,
        });
    }

    fn advance_regular(&mut self, session: &mut EliminationSession) -> EngineResult<()> {
        let mut index = session.current_turn_index + 1;
        let mut round = session.current_round;
        if index >= session.elimination_order.len() {
            index = 0;
            round += 1;
        }
        if round > session.params.k {
            return self.end_regular_rounds(session);
        }

        let user = session
            .elimination_order
            .get(index)
            .cloned()
            .ok_or_else(|| DecisionError::internal("elimination order is empty"))?;
        self.begin_turn(session, &TurnSlot::new(user, round, index), false);
        Ok(())
    }

    fn end_regular_rounds(&mut self, session: &mut EliminationSession) -> EngineResult<()> {
        let Some(slot) = session.skips().next_unresolved() else {
            return self.finalize(session);
        };

        session.transition(SessionStatus::CatchUp, self.now)?;
        let pending = session.skips().pending_count();
        info!(session_id = %session.id, pending, "Regular rounds done, starting catch-up");
        self.events.push(DecisionEvent::CatchUpStarted {
            session_id: session.id.clone(),
            pending,
            timestamp: self.now,
        });
        self.begin_turn(session, &slot, true);
        Ok(())
    }

    fn advance_catch_up(&mut self, session: &mut EliminationSession) -> EngineResult<()> {
        match session.skips().next_unresolved() {
            Some(slot) => {
                self.begin_turn(session, &slot, true);
                Ok(())
            }
            None => self.finalize(session),
        }
    }

    /// Draw the winner from what is left.
    fn finalize(&mut self, session: &mut EliminationSession) -> EngineResult<()> {
        let remaining = session.current_candidates.len();
        let m = session.params.m as usize;
        if remaining == 0 {
            return Err(DecisionError::NoCandidatesRemaining);
        }
        if remaining > m {
            let forfeited = session.skips().count_of(SkipKind::Forfeited);
            if forfeited == 0 {
                error!(
                    session_id = %session.id,
                    remaining,
                    m,
                    "Eliminations exhausted above the final set size"
                );
                return Err(DecisionError::internal(format!(
                    "{remaining} candidates remain with no turns left and no forfeits (M = {m})"
                )));
            }
            warn!(
                session_id = %session.id,
                remaining,
                m,
                forfeited,
                "Forfeited turns left the final set oversized, drawing from all remaining"
            );
        }

        let selection = RandomSelector::draw(&session.current_candidates, &mut *self.rng)?;
        session.transition(SessionStatus::Completed, self.now)?;
        session.final_selection = Some(selection.winner);
        session.runners_up = selection.runners_up;
        session.completed_at = Some(self.now);

        let result = DecisionResult::from_session(session)?;
        info!(
            session_id = %session.id,
            winner = %result.winner,
            finalists = remaining,
            "Decision completed"
        );
        self.events.push(DecisionEvent::DecisionCompleted {
            session_id: session.id.clone(),
            result: Box::new(result),
            timestamp: self.now,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::AlgorithmParams;
    use chrono::{Duration, TimeZone};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    const TIMEOUT: u32 = 30;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 18, 0, 0).unwrap()
    }

    fn people(n: usize) -> Vec<UserId> {
        ["alice", "bob", "carol", "dave", "erin", "frank", "grace", "heidi"][..n]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn started(k: u32, n: u32, m: u32, count: u32, rng: &mut ChaCha8Rng) -> EliminationSession {
        let ids = (1..=count).map(|i| format!("c{i}")).collect();
        let params = AlgorithmParams::new(k, n, m, count);
        params.validate().unwrap();
        let mut session = EliminationSession::new("g-1", ids, params, TIMEOUT, t0()).with_id("s-1");
        TurnCoordinator::new(t0(), rng)
            .start(&mut session, &people(n as usize))
            .unwrap();
        session
    }

    fn holder(session: &EliminationSession) -> String {
        session.current_turn_user().unwrap().to_string()
    }

    fn first_candidate(session: &EliminationSession) -> String {
        session.current_candidates[0].clone()
    }

    fn eliminate_current(session: &mut EliminationSession, rng: &mut ChaCha8Rng, at: DateTime<Utc>) {
        let user = holder(session);
        let candidate = first_candidate(session);
        TurnCoordinator::new(at, rng)
            .eliminate(session, &user, &candidate)
            .unwrap();
    }

    fn skip_current(session: &mut EliminationSession, rng: &mut ChaCha8Rng) -> String {
        let user = holder(session);
        TurnCoordinator::new(t0(), rng).quick_skip(session, &user).unwrap();
        user
    }

    #[test]
    fn test_start_opens_round_one() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let session = started(2, 3, 4, 10, &mut rng);

        assert_eq!(session.status, SessionStatus::InProgress);
        assert_eq!(session.current_round, 1);
        assert_eq!(session.current_turn_index, 0);
        assert_eq!(session.elimination_order.len(), 3);
        assert_eq!(session.turn_started_at, t0());
    }

    #[test]
    fn test_start_rejects_wrong_group_size() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let ids = (1..=10).map(|i| format!("c{i}")).collect();
        let mut session =
            EliminationSession::new("g-1", ids, AlgorithmParams::new(2, 3, 4, 10), TIMEOUT, t0());
        let err = TurnCoordinator::new(t0(), &mut rng)
            .start(&mut session, &people(2))
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_PARAMETERS");
    }

    #[test]
    fn test_small_start_set_draws_immediately() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let ids: Vec<String> = vec!["x".into(), "y".into()];
        let mut session =
            EliminationSession::new("g-1", ids.clone(), AlgorithmParams::new(0, 2, 3, 2), TIMEOUT, t0());
        let mut coord = TurnCoordinator::new(t0(), &mut rng);
        coord.start(&mut session, &people(2)).unwrap();

        assert_eq!(session.status, SessionStatus::Completed);
        assert!(ids.contains(session.final_selection.as_ref().unwrap()));
        assert_eq!(coord.events().last().unwrap().event_type(), "decision_completed");
    }

    #[test]
    fn test_full_run_leaves_count_minus_kn() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let mut session = started(3, 3, 4, 13, &mut rng);

        while session.status.is_active() {
            eliminate_current(&mut session, &mut rng, t0());
        }

        assert_eq!(session.status, SessionStatus::Completed);
        assert_eq!(session.current_candidates.len(), 13 - 9);
        assert_eq!(session.eliminations.len(), 9);
        assert!(session.eliminations_by_user().values().all(|&n| n == 3));
        let winner = session.final_selection.clone().unwrap();
        assert!(session.current_candidates.contains(&winner));
        let expected: Vec<_> = session
            .current_candidates
            .iter()
            .filter(|c| **c != winner)
            .cloned()
            .collect();
        assert_eq!(session.runners_up, expected);
    }

    #[test]
    fn test_not_your_turn_and_unknown_candidate() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let mut session = started(2, 3, 4, 10, &mut rng);
        let current = holder(&session);
        let other = session
            .elimination_order
            .iter()
            .find(|u| **u != current)
            .unwrap()
            .clone();

        let mut coord = TurnCoordinator::new(t0(), &mut rng);
        let err = coord.eliminate(&mut session, &other, "c1").unwrap_err();
        assert!(matches!(err, DecisionError::NotYourTurn { ref expected, .. } if *expected == current));

        let err = coord.eliminate(&mut session, &current, "nope").unwrap_err();
        assert_eq!(err.code(), "CANDIDATE_NOT_FOUND");

        let err = coord.eliminate(&mut session, "mallory", "c1").unwrap_err();
        assert_eq!(err.code(), "NOT_PARTICIPANT");
        assert_eq!(session.current_candidates.len(), 10);
    }

    #[test]
    fn test_round_wraps_after_last_participant() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut session = started(2, 3, 4, 10, &mut rng);
        for _ in 0..3 {
            eliminate_current(&mut session, &mut rng, t0());
        }
        assert_eq!(session.current_round, 2);
        assert_eq!(session.current_turn_index, 0);
    }

    #[test]
    fn test_quick_skip_defers_to_catch_up() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        // N=2, K=2, M=3, 7 candidates
        let mut session = started(2, 2, 3, 7, &mut rng);
        let skipper = skip_current(&mut session, &mut rng);
        assert_eq!(session.skips().skip_count(&skipper), 1);
        assert_ne!(holder(&session), skipper);

        // Remaining three regular turns
        for _ in 0..3 {
            eliminate_current(&mut session, &mut rng, t0());
        }
        assert_eq!(session.status, SessionStatus::CatchUp);
        assert_eq!(holder(&session), skipper);
        assert_eq!(session.current_round, 1);
        assert_eq!(session.current_turn_index, 0);

        eliminate_current(&mut session, &mut rng, t0());
        assert_eq!(session.status, SessionStatus::Completed);
        assert_eq!(session.current_candidates.len(), 3);
        assert_eq!(session.skips().made_up_turns().len(), 1);
        assert!(session.eliminations.last().unwrap().catch_up);
    }

    #[test]
    fn test_second_quick_skip_on_replayed_turn_is_already_deferred() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut session = started(2, 2, 3, 7, &mut rng);
        let skipper = skip_current(&mut session, &mut rng);
        for _ in 0..3 {
            eliminate_current(&mut session, &mut rng, t0());
        }
        assert_eq!(holder(&session), skipper);

        let mut coord = TurnCoordinator::new(t0(), &mut rng);
        for _ in 0..2 {
            let err = coord.quick_skip(&mut session, &skipper).unwrap_err();
            assert!(matches!(err, DecisionError::AlreadyDeferred { round: 1, turn_index: 0, .. }));
        }
        assert_eq!(session.skips().count_of(SkipKind::QuickSkip), 1);
    }

    #[test]
    fn test_third_quick_skip_with_k2_exceeds_limit() {
        let mut rng = ChaCha8Rng::seed_from_u64(6);
        let mut session = started(2, 2, 3, 7, &mut rng);

        let skipper = skip_current(&mut session, &mut rng);
        eliminate_current(&mut session, &mut rng, t0());
        assert_eq!(skip_current(&mut session, &mut rng), skipper);
        eliminate_current(&mut session, &mut rng, t0());

        // Catch-up replays the first deferral
        assert_eq!(session.status, SessionStatus::CatchUp);
        assert_eq!(holder(&session), skipper);
        let err = TurnCoordinator::new(t0(), &mut rng)
            .quick_skip(&mut session, &skipper)
            .unwrap_err();
        assert!(matches!(err, DecisionError::SkipLimitExceeded { used: 2, limit: 2, .. }));
        assert!(session.skips().skip_counts().values().all(|&c| c <= 2));
    }

    #[test]
    fn test_timeout_in_regular_round_defers_without_budget() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut session = started(2, 3, 4, 10, &mut rng);
        let slow = holder(&session);

        let later = t0() + Duration::minutes(i64::from(TIMEOUT));
        let mut coord = TurnCoordinator::new(later, &mut rng);
        assert!(coord.apply_timeout(&mut session).unwrap());
        // Already reset, a second check is a no-op
        assert!(!coord.apply_timeout(&mut session).unwrap());

        assert_ne!(holder(&session), slow);
        assert_eq!(session.turn_started_at, later);
        assert_eq!(session.skips().skip_count(&slow), 0);
        assert_eq!(session.skips().count_of(SkipKind::TimeoutSkip), 1);
    }

    #[test]
    fn test_timeout_applies_once_per_call() {
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        let mut session = started(2, 3, 4, 10, &mut rng);

        let much_later = t0() + Duration::hours(10);
        TurnCoordinator::new(much_later, &mut rng)
            .apply_timeout(&mut session)
            .unwrap();
        assert_eq!(session.skips().entries().len(), 1);
        assert_eq!(session.current_turn_index, 1);
    }

    #[test]
    fn test_catch_up_timeout_forfeits_all_outstanding_turns() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        // N=2, K=2, M=3, 7 candidates
        let mut session = started(2, 2, 3, 7, &mut rng);

        let skipper = skip_current(&mut session, &mut rng);
        eliminate_current(&mut session, &mut rng, t0());
        skip_current(&mut session, &mut rng);
        eliminate_current(&mut session, &mut rng, t0());

        assert_eq!(session.status, SessionStatus::CatchUp);
        assert_eq!(session.skips().outstanding_for(&skipper).len(), 2);

        let later = t0() + Duration::minutes(i64::from(TIMEOUT) + 1);
        let mut coord = TurnCoordinator::new(later, &mut rng);
        assert!(coord.apply_timeout(&mut session).unwrap());
        let forfeited = coord
            .events()
            .iter()
            .find_map(|e| match e {
                DecisionEvent::TurnsForfeited { slots, .. } => Some(slots.len()),
                _ => None,
            })
            .unwrap();
        assert_eq!(forfeited, 2);

        // Nothing else owed: the oversized final set is drawn from
        assert_eq!(session.skips().count_of(SkipKind::Forfeited), 2);
        assert_eq!(session.skips().pending_count(), 0);
        assert_eq!(session.status, SessionStatus::Completed);
        assert_eq!(session.current_candidates.len(), 5);
    }

    #[test]
    fn test_catch_up_timeout_moves_to_next_user() {
        let mut rng = ChaCha8Rng::seed_from_u64(10);
        // N=3, K=1, M=3, 6 candidates
        let mut session = started(1, 3, 3, 6, &mut rng);
        let first = skip_current(&mut session, &mut rng);
        let second = skip_current(&mut session, &mut rng);
        eliminate_current(&mut session, &mut rng, t0());

        assert_eq!(session.status, SessionStatus::CatchUp);
        assert_eq!(holder(&session), first);

        let later = t0() + Duration::minutes(i64::from(TIMEOUT));
        TurnCoordinator::new(later, &mut rng)
            .apply_timeout(&mut session)
            .unwrap();
        assert_eq!(session.status, SessionStatus::CatchUp);
        assert_eq!(holder(&session), second);
        assert_eq!(session.turn_started_at, later);

        eliminate_current(&mut session, &mut rng, later);
        assert_eq!(session.status, SessionStatus::Completed);
        assert_eq!(session.current_candidates.len(), 4);
    }

    #[test]
    fn test_cancel() {
        let mut rng = ChaCha8Rng::seed_from_u64(12);
        let mut session = started(2, 3, 4, 10, &mut rng);
        let mut coord = TurnCoordinator::new(t0(), &mut rng);
        coord.cancel(&mut session).unwrap();
        assert_eq!(session.status, SessionStatus::Cancelled);
        assert_eq!(session.completed_at, Some(t0()));

        let err = coord.cancel(&mut session).unwrap_err();
        assert_eq!(err.code(), "SESSION_ALREADY_TERMINAL");
        let err = coord.eliminate(&mut session, "alice", "c1").unwrap_err();
        assert_eq!(err.code(), "SESSION_ALREADY_TERMINAL");
    }

    #[test]
    fn test_no_duplicate_quick_skip_for_a_slot() {
        let mut rng = ChaCha8Rng::seed_from_u64(13);
        let mut session = started(3, 3, 4, 13, &mut rng);

        // Everyone skips whenever allowed, otherwise eliminates
        while session.status.is_active() {
            let user = holder(&session);
            let mut coord = TurnCoordinator::new(t0(), &mut rng);
            if coord.quick_skip(&mut session, &user).is_err() {
                let candidate = first_candidate(&session);
                coord.eliminate(&mut session, &user, &candidate).unwrap();
            }
        }

        let quick: Vec<TurnSlot> = session
            .skips()
            .entries()
            .iter()
            .filter(|e| e.kind == SkipKind::QuickSkip)
            .map(|e| e.slot())
            .collect();
        let mut deduped = quick.clone();
        deduped.dedup();
        assert_eq!(quick.len(), deduped.len());
        assert_eq!(session.current_candidates.len(), 4);
        assert!(session.skips().skip_counts().values().all(|&c| c <= 3));
    }
}
