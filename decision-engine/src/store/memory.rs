//! In-process session store.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::{schema, SessionStore, StoreError, StoreResult};
use crate::result::DecisionResult;
use crate::session::{EliminationSession, SessionId};

/// HashMap-backed store; state is lost on drop.
#[derive(Default)]
pub struct MemoryStore {
    sessions: RwLock<HashMap<SessionId, EliminationSession>>,
    results: RwLock<HashMap<SessionId, DecisionResult>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a shared reference to this store
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

impl SessionStore for MemoryStore {
    fn get_session(&self, session_id: &str) -> StoreResult<Option<EliminationSession>> {
        let sessions = self.sessions.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(sessions.get(session_id).cloned())
    }

    fn put_session(
        &self,
        session: &EliminationSession,
        expected_version: u64,
    ) -> StoreResult<u64> {
        let mut sessions = self.sessions.write().map_err(|_| StoreError::LockPoisoned)?;
        let found = sessions.get(&session.id).map(|s| s.version).unwrap_or(0);
        if found != expected_version {
            return Err(StoreError::Conflict {
                key: schema::keys::session(&session.id),
                expected: expected_version,
                found,
            });
        }

        let mut stored = session.clone();
        stored.version = expected_version + 1;
        sessions.insert(stored.id.clone(), stored);
        Ok(expected_version + 1)
    }

    fn list_sessions(&self) -> StoreResult<Vec<EliminationSession>> {
        let sessions = self.sessions.read().map_err(|_| StoreError::LockPoisoned)?;
        let mut all: Vec<EliminationSession> = sessions.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(all)
    }

    fn put_result(&self, result: &DecisionResult) -> StoreResult<()> {
        let mut results = self.results.write().map_err(|_| StoreError::LockPoisoned)?;
        results.insert(result.session_id.clone(), result.clone());
        Ok(())
    }

    fn get_result(&self, session_id: &str) -> StoreResult<Option<DecisionResult>> {
        let results = self.results.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(results.get(session_id).cloned())
    }
}
