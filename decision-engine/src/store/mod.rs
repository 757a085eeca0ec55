//! Session persistence
//!
//! Sessions are stored with an optimistic version: every write names the
//! version it read, and the store refuses the write if someone else got there
//! first. Completed sessions also get a [`DecisionResult`] entry.

pub mod memory;
#[cfg(feature = "rocksdb-store")]
pub mod rocks;
pub mod schema;

use std::sync::Arc;

use crate::result::DecisionResult;
use crate::session::EliminationSession;

pub use memory::MemoryStore;
#[cfg(feature = "rocksdb-store")]
pub use rocks::RocksStore;

/// Error type for session store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Version conflict on {key}: expected {expected}, found {found}")]
    Conflict {
        key: String,
        expected: u64,
        found: u64,
    },

    #[error("Lock poisoned")]
    LockPoisoned,

    #[error("Column family not found: {0}")]
    ColumnFamilyNotFound(String),
}

impl StoreError {
    /// Worth retrying after re-reading
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Backend(_) | Self::Conflict { .. })
    }
}

/// Result type for session store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Shared reference to a session store
pub type SharedSessionStore = Arc<dyn SessionStore>;

/// Persistence seam for sessions and results.
pub trait SessionStore: Send + Sync {
    /// Load a session by id
    fn get_session(&self, session_id: &str) -> StoreResult<Option<EliminationSession>>;

    /// Write `session` if the stored version equals `expected_version`
    /// (0 = must not exist yet). Returns the new version.
    fn put_session(&self, session: &EliminationSession, expected_version: u64)
        -> StoreResult<u64>;

    /// All sessions, newest first
    fn list_sessions(&self) -> StoreResult<Vec<EliminationSession>>;

    fn put_result(&self, result: &DecisionResult) -> StoreResult<()>;

    fn get_result(&self, session_id: &str) -> StoreResult<Option<DecisionResult>>;
}
