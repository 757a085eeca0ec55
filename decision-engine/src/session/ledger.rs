//! Skip bookkeeping owned by a session.
//!
//! The ledger holds the append-only skip log, the per-user quick-skip counts
//! and the list of deferred slots that were later made up during catch-up.
//! Only the turn coordinator mutates it.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for participants
pub type UserId = String;

/// How a turn was given up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipKind {
    /// Voluntary deferral, counts against the K budget
    QuickSkip,
    /// Turn timer ran out in a regular round
    TimeoutSkip,
    /// Deferred turn cancelled for good after a catch-up timeout
    Forfeited,
}

impl SkipKind {
    /// Deferrals owe a catch-up turn; forfeits settle one.
    pub fn is_deferral(self) -> bool {
        matches!(self, Self::QuickSkip | Self::TimeoutSkip)
    }
}

impl std::fmt::Display for SkipKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::QuickSkip => write!(f, "quick_skip"),
            Self::TimeoutSkip => write!(f, "timeout_skip"),
            Self::Forfeited => write!(f, "forfeited"),
        }
    }
}

/// A (user, round, turn index) position in the elimination schedule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TurnSlot {
    pub user_id: UserId,
    pub round: u32,
    pub turn_index: usize,
}

impl TurnSlot {
    pub fn new(user_id: impl Into<String>, round: u32, turn_index: usize) -> Self {
        Self {
            user_id: user_id.into(),
            round,
            turn_index,
        }
    }
}

impl std::fmt::Display for TurnSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}@r{}t{}",
            self.user_id, self.round, self.turn_index
        )
    }
}

/// One entry of the skip log. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedTurn {
    pub user_id: UserId,
    pub round: u32,
    pub turn_index: usize,
    pub kind: SkipKind,
    pub timestamp: DateTime<Utc>,
}

impl SkippedTurn {
    pub fn slot(&self) -> TurnSlot {
        TurnSlot::new(self.user_id.clone(), self.round, self.turn_index)
    }

    fn is_for(&self, slot: &TurnSlot) -> bool {
        self.user_id == slot.user_id && self.round == slot.round && self.turn_index == slot.turn_index
    }
}

/// Skip log, quick-skip counts and made-up slots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipLedger {
    #[serde(default)]
    skipped_users: Vec<SkippedTurn>,
    #[serde(default)]
    user_skip_counts: BTreeMap<UserId, u32>,
    #[serde(default)]
    made_up_turns: Vec<TurnSlot>,
}

impl SkipLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full skip log in append order.
    pub fn entries(&self) -> &[SkippedTurn] {
        &self.skipped_users
    }

    /// Quick-skips used by `user_id`.
    pub fn skip_count(&self, user_id: &str) -> u32 {
        self.user_skip_counts.get(user_id).copied().unwrap_or(0)
    }

    pub fn skip_counts(&self) -> &BTreeMap<UserId, u32> {
        &self.user_skip_counts
    }

    /// Deferred slots that were replayed with an elimination.
    pub fn made_up_turns(&self) -> &[TurnSlot] {
        &self.made_up_turns
    }

    /// Any log entry exists for this exact slot.
    pub fn has_entry_for(&self, slot: &TurnSlot) -> bool {
        self.skipped_users.iter().any(|e| e.is_for(slot))
    }

    pub fn count_of(&self, kind: SkipKind) -> usize {
        self.skipped_users.iter().filter(|e| e.kind == kind).count()
    }

    /// A deferral is settled once made up or forfeited.
    pub fn is_resolved(&self, slot: &TurnSlot) -> bool {
        self.made_up_turns.contains(slot)
            || self
                .skipped_users
                .iter()
                .any(|e| e.kind == SkipKind::Forfeited && e.is_for(slot))
    }

    /// Unsettled deferrals in the order they were recorded.
    pub fn unresolved(&self) -> impl Iterator<Item = &SkippedTurn> {
        self.skipped_users
            .iter()
            .filter(move |e| e.kind.is_deferral() && !self.is_resolved(&e.slot()))
    }

    /// Earliest unsettled deferral; the next catch-up turn.
    pub fn next_unresolved(&self) -> Option<TurnSlot> {
        self.unresolved().next().map(SkippedTurn::slot)
    }

    pub fn pending_count(&self) -> usize {
        self.unresolved().count()
    }

    /// Unsettled deferrals owed by one user.
    pub fn outstanding_for(&self, user_id: &str) -> Vec<TurnSlot> {
        self.unresolved()
            .filter(|e| e.user_id == user_id)
            .map(SkippedTurn::slot)
            .collect()
    }

    pub(crate) fn record_quick_skip(&mut self, slot: &TurnSlot, at: DateTime<Utc>) {
        self.append(slot, SkipKind::QuickSkip, at);
        *self
            .user_skip_counts
            .entry(slot.user_id.clone())
            .or_insert(0) += 1;
    }

    pub(crate) fn record_timeout_skip(&mut self, slot: &TurnSlot, at: DateTime<Utc>) {
        self.append(slot, SkipKind::TimeoutSkip, at);
    }

    pub(crate) fn mark_made_up(&mut self, slot: TurnSlot) {
        if !self.made_up_turns.contains(&slot) {
            self.made_up_turns.push(slot);
        }
    }

    /// Forfeit every outstanding deferral of `user_id`; returns the slots.
    pub(crate) fn forfeit_all(&mut self, user_id: &str, at: DateTime<Utc>) -> Vec<TurnSlot> {
        let outstanding = self.outstanding_for(user_id);
        for slot in &outstanding {
            self.append(slot, SkipKind::Forfeited, at);
        }
        outstanding
    }

    fn append(&mut self, slot: &TurnSlot, kind: SkipKind, at: DateTime<Utc>) {
        self.skipped_users.push(SkippedTurn {
            user_id: slot.user_id.clone(),
            round: slot.round,
            turn_index: slot.turn_index,
            kind,
            timestamp: at,
        });
    }
}
