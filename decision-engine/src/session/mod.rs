//! Elimination sessions
//!
//! A session is the mutable record of one group's KN+M run. It is created in
//! `Setup`, moves through `InProgress` and (when turns were deferred)
//! `CatchUp`, and ends `Completed` or `Cancelled`. Only the
//! [`TurnCoordinator`](crate::coordinator::TurnCoordinator) mutates it; once
//! terminal it never changes again.

pub mod ledger;
pub mod types;

pub use ledger::{SkipKind, SkipLedger, SkippedTurn, TurnSlot, UserId};
pub use types::{EliminationRecord, EliminationSession, GroupId, SessionId, SessionStatus};
