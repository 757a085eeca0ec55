//! Elimination session state: status machine, turn position, candidates.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::ledger::{SkipLedger, TurnSlot, UserId};
use crate::error::{DecisionError, EngineResult};
use crate::filter::CandidateId;
use crate::params::AlgorithmParams;

/// Unique identifier for elimination sessions
pub type SessionId = String;

/// Unique identifier for the owning group
pub type GroupId = String;

/// Lifecycle of an elimination session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Filters applied and K/M fixed; order not yet committed.
    Setup,
    /// Regular rounds 1..=K.
    InProgress,
    /// Replaying deferred turns.
    CatchUp,
    /// Winner drawn.
    Completed,
    /// Explicitly cancelled.
    Cancelled,
}

impl SessionStatus {
    /// Whether this is a terminal status.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Whether turns are being taken.
    pub fn is_active(self) -> bool {
        matches!(self, Self::InProgress | Self::CatchUp)
    }

    /// Valid transitions from this status.
    pub fn valid_transitions(self) -> &'static [SessionStatus] {
        match self {
            Self::Setup => &[Self::InProgress, Self::Completed, Self::Cancelled],
            Self::InProgress => &[Self::CatchUp, Self::Completed, Self::Cancelled],
            Self::CatchUp => &[Self::Completed, Self::Cancelled],
            Self::Completed | Self::Cancelled => &[],
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Setup => write!(f, "setup"),
            Self::InProgress => write!(f, "in_progress"),
            Self::CatchUp => write!(f, "catch_up"),
            Self::Completed => write!(f, "completed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Who removed which candidate, and when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EliminationRecord {
    pub user_id: UserId,
    pub candidate_id: CandidateId,
    pub round: u32,
    pub turn_index: usize,
    /// Made up a deferred turn
    pub catch_up: bool,
    pub timestamp: DateTime<Utc>,
}

/// A group's elimination run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EliminationSession {
    /// Unique session identifier
    pub id: SessionId,
    /// Owning group
    pub group_id: GroupId,
    /// K/N/M fixed at creation
    pub params: AlgorithmParams,
    /// Shuffled participant order, fixed once committed
    pub elimination_order: Vec<UserId>,
    /// Index into `elimination_order` of the turn holder
    pub current_turn_index: usize,
    /// 1..=K in regular play; during catch-up, the round of the replayed turn
    pub current_round: u32,
    /// When the current turn began
    pub turn_started_at: DateTime<Utc>,
    pub turn_timeout_minutes: u32,
    /// Skip log, quick-skip counts, made-up slots
    #[serde(flatten)]
    skips: SkipLedger,
    /// Remaining candidates, original order preserved
    pub current_candidates: Vec<CandidateId>,
    /// Append-only elimination log
    #[serde(default)]
    pub eliminations: Vec<EliminationRecord>,
    pub status: SessionStatus,
    pub final_selection: Option<CandidateId>,
    #[serde(default)]
    pub runners_up: Vec<CandidateId>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Bumped by the store on every write
    #[serde(default)]
    pub version: u64,
}

impl EliminationSession {
    /// Create a session in `Setup`.
    pub fn new(
        group_id: &str,
        candidate_ids: Vec<CandidateId>,
        params: AlgorithmParams,
        turn_timeout_minutes: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            group_id: group_id.to_string(),
            params,
            elimination_order: Vec::new(),
            current_turn_index: 0,
            current_round: 0,
            turn_started_at: now,
            turn_timeout_minutes,
            skips: SkipLedger::new(),
            current_candidates: candidate_ids,
            eliminations: Vec::new(),
            status: SessionStatus::Setup,
            final_selection: None,
            runners_up: Vec::new(),
            completed_at: None,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    /// Override the generated id.
    pub fn with_id(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self
    }

    /// Read-only view of the skip ledger.
    pub fn skips(&self) -> &SkipLedger {
        &self.skips
    }

    pub(crate) fn skips_mut(&mut self) -> &mut SkipLedger {
        &mut self.skips
    }

    /// Move to `to`, rejecting transitions the status machine does not allow.
    pub fn transition(&mut self, to: SessionStatus, now: DateTime<Utc>) -> EngineResult<()> {
        if !self.status.valid_transitions().contains(&to) {
            return Err(DecisionError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.updated_at = now;
        Ok(())
    }

    /// Fail unless turns are being taken.
    pub fn ensure_active(&self) -> EngineResult<()> {
        match self.status {
            SessionStatus::InProgress | SessionStatus::CatchUp => Ok(()),
            SessionStatus::Completed | SessionStatus::Cancelled => {
                Err(DecisionError::SessionAlreadyTerminal {
                    session_id: self.id.clone(),
                    status: self.status,
                })
            }
            SessionStatus::Setup => Err(DecisionError::internal(format!(
                "session {} has no committed elimination order",
                self.id
            ))),
        }
    }

    pub fn is_participant(&self, user_id: &str) -> bool {
        self.elimination_order.iter().any(|u| u == user_id)
    }

    pub fn ensure_participant(&self, user_id: &str) -> EngineResult<()> {
        if self.is_participant(user_id) {
            Ok(())
        } else {
            Err(DecisionError::NotParticipant {
                user_id: user_id.to_string(),
                session_id: self.id.clone(),
            })
        }
    }

    pub fn is_catch_up(&self) -> bool {
        self.status == SessionStatus::CatchUp
    }

    /// Current turn holder while the session is active.
    pub fn current_turn_user(&self) -> Option<&str> {
        if !self.status.is_active() {
            return None;
        }
        self.elimination_order
            .get(self.current_turn_index)
            .map(String::as_str)
    }

    /// Current (user, round, turn index), or an error if the index is out of range.
    pub fn current_slot(&self) -> EngineResult<TurnSlot> {
        let user = self
            .elimination_order
            .get(self.current_turn_index)
            .ok_or_else(|| {
                DecisionError::internal(format!(
                    "turn index {} out of bounds for {} participants",
                    self.current_turn_index,
                    self.elimination_order.len()
                ))
            })?;
        Ok(TurnSlot::new(
            user.clone(),
            self.current_round,
            self.current_turn_index,
        ))
    }

    /// Point the turn at `slot` and restart the timer.
    pub(crate) fn set_turn(&mut self, slot: &TurnSlot, now: DateTime<Utc>) {
        self.current_round = slot.round;
        self.current_turn_index = slot.turn_index;
        self.turn_started_at = now;
        self.updated_at = now;
    }

    pub fn turn_timeout(&self) -> Duration {
        Duration::minutes(i64::from(self.turn_timeout_minutes))
    }

    pub fn turn_deadline(&self) -> DateTime<Utc> {
        self.turn_started_at + self.turn_timeout()
    }

    /// Whether the current turn's time budget is spent.
    pub fn is_turn_expired(&self, now: DateTime<Utc>) -> bool {
        self.status.is_active() && now - self.turn_started_at >= self.turn_timeout()
    }

    /// Time left on the current turn, floored at zero.
    pub fn time_remaining(&self, now: DateTime<Utc>) -> Duration {
        let remaining = self.turn_deadline() - now;
        if remaining < Duration::zero() {
            Duration::zero()
        } else {
            remaining
        }
    }

    pub fn eliminations_by_user(&self) -> BTreeMap<UserId, u32> {
        let mut counts: BTreeMap<UserId, u32> = self
            .elimination_order
            .iter()
            .map(|u| (u.clone(), 0))
            .collect();
        for record in &self.eliminations {
            *counts.entry(record.user_id.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Surface corrupted state instead of guessing a repair.
    pub fn check_consistency(&self) -> EngineResult<()> {
        if self.status == SessionStatus::Setup {
            return Ok(());
        }
        if self.elimination_order.is_empty() {
            return Err(DecisionError::internal(format!(
                "session {} has an empty elimination order",
                self.id
            )));
        }
        let mut seen = HashSet::new();
        if !self.elimination_order.iter().all(|u| seen.insert(u)) {
            return Err(DecisionError::internal(format!(
                "session {} lists a participant twice",
                self.id
            )));
        }
        if self.status.is_active() {
            self.current_slot()?;
        }
        for (user, count) in self.skips.skip_counts() {
            if !self.is_participant(user) {
                return Err(DecisionError::internal(format!(
                    "skip count recorded for non-participant {user}"
                )));
            }
            if *count > self.params.k {
                return Err(DecisionError::internal(format!(
                    "{user} has {count} quick-skips, above the limit of {}",
                    self.params.k
                )));
            }
        }
        for entry in self.skips.entries() {
            if self.elimination_order.get(entry.turn_index) != Some(&entry.user_id) {
                return Err(DecisionError::internal(format!(
                    "skip log entry for {} does not match turn {}",
                    entry.user_id, entry.turn_index
                )));
            }
        }
        Ok(())
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> EngineResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| DecisionError::internal(format!("session serialize failed: {e}")))
    }

    /// Deserialize from JSON.
    pub fn from_json(json: &str) -> EngineResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| DecisionError::internal(format!("session deserialize failed: {e}")))
    }

    /// Compact status line.
    pub fn status_line(&self) -> String {
        format!(
            "[{}] round {}/{} | turn {} | {} candidates left | {} skips logged | group={}",
            self.status,
            self.current_round,
            self.params.k,
            self.current_turn_user().unwrap_or("-"),
            self.current_candidates.len(),
            self.skips.entries().len(),
            self.group_id
        )
    }
}
