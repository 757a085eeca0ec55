//! Decision service: the operations clients call.
//!
//! Each session-scoped call runs under that session's async mutex:
//!
//! ```text
//! lock ─► load ─► check consistency ─► lazy timeout ─► operation ─► store ─► publish
//! ```
//!
//! A failed operation is rolled back to the post-timeout state, so a timeout
//! noticed by a rejected request is still persisted. Stores reject writes
//! based on a stale version with [`DecisionError::VersionConflict`].

use std::collections::HashMap;
use std::sync::Arc;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{debug, error, info};

use crate::clock::{SharedClock, SystemClock};
use crate::config::EngineConfig;
use crate::coordinator::TurnCoordinator;
use crate::directory::SharedDirectory;
use crate::error::{DecisionError, EngineResult};
use crate::events::{DecisionEvent, EventBus, SharedEventBus};
use crate::filter::{Candidate, CandidateId, FilterConfiguration, FilterEngine, FilterReport};
use crate::params::{AlgorithmParams, ParameterSuggester, SuggestionSet};
use crate::result::DecisionResult;
use crate::session::{EliminationSession, SessionId, SessionStatus};
use crate::status::EliminationStatus;
use crate::store::{SharedSessionStore, StoreError};

/// Shared reference to DecisionService
pub type SharedDecisionService = Arc<DecisionService>;

/// Filtering, parameter suggestion and elimination sessions behind one API.
pub struct DecisionService {
    config: EngineConfig,
    store: SharedSessionStore,
    directory: SharedDirectory,
    events: SharedEventBus,
    clock: SharedClock,
    filter_engine: FilterEngine,
    suggester: ParameterSuggester,
    rng: std::sync::Mutex<ChaCha8Rng>,
    locks: RwLock<HashMap<SessionId, Arc<Mutex<()>>>>,
}

impl DecisionService {
    pub fn new(config: EngineConfig, store: SharedSessionStore, directory: SharedDirectory) -> Self {
        let rng = match config.rng_seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Self {
            events: EventBus::with_capacity(config.event_capacity).shared(),
            suggester: ParameterSuggester::with_max_k(config.max_suggested_k),
            config,
            store,
            directory,
            clock: Arc::new(SystemClock),
            filter_engine: FilterEngine::new(),
            rng: std::sync::Mutex::new(rng),
            locks: RwLock::new(HashMap::new()),
        }
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    /// Create a shared reference to this service
    pub fn shared(self) -> SharedDecisionService {
        Arc::new(self)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn event_bus(&self) -> &SharedEventBus {
        &self.events
    }

    /// Subscribe to all decision events
    pub fn subscribe(&self) -> broadcast::Receiver<DecisionEvent> {
        self.events.subscribe()
    }

    // =========================================================================
    // Stateless operations
    // =========================================================================

    /// Evaluate candidates against hard and soft filters.
    pub async fn apply_filters(
        &self,
        candidates: &[Candidate],
        configuration: &FilterConfiguration,
    ) -> EngineResult<FilterReport> {
        let report = self
            .filter_engine
            .apply(candidates, configuration, self.clock.now())?;
        if report.is_empty() {
            info!(
                relaxations = report.relaxation.len(),
                "No admissible candidates, relaxation suggested"
            );
        }
        Ok(report)
    }

    /// Propose K/N/M for a candidate and participant count.
    pub async fn suggest_parameters(
        &self,
        candidate_count: u32,
        participant_count: u32,
    ) -> EngineResult<SuggestionSet> {
        if participant_count == 0 || participant_count > self.config.max_participants {
            return Err(DecisionError::invalid_parameters(format!(
                "participant count must be 1..={}, got {participant_count}",
                self.config.max_participants
            )));
        }
        Ok(self.suggester.suggest_set(candidate_count, participant_count))
    }

    // =========================================================================
    // Session operations
    // =========================================================================

    /// Create a session and commit a shuffled elimination order.
    ///
    /// Participants come from the directory and must number `params.n`. A
    /// start set of at most M candidates completes immediately.
    pub async fn create_session(
        &self,
        group_id: &str,
        candidate_ids: Vec<CandidateId>,
        params: AlgorithmParams,
        turn_timeout_minutes: Option<u32>,
    ) -> EngineResult<EliminationSession> {
        let timeout = turn_timeout_minutes.unwrap_or(self.config.turn_timeout_minutes);
        if timeout == 0 {
            return Err(DecisionError::invalid_parameters(
                "turn timeout must be at least one minute",
            ));
        }
        if params.n > self.config.max_participants {
            return Err(DecisionError::invalid_parameters(format!(
                "at most {} participants supported, got {}",
                self.config.max_participants, params.n
            )));
        }
        if candidate_ids.len() != params.initial_count as usize {
            return Err(DecisionError::invalid_parameters(format!(
                "params expect {} candidates, got {}",
                params.initial_count,
                candidate_ids.len()
            )));
        }
        let mut unique = std::collections::HashSet::new();
        if let Some(dup) = candidate_ids.iter().find(|id| !unique.insert(id.as_str())) {
            return Err(DecisionError::invalid_parameters(format!(
                "candidate {dup} listed twice"
            )));
        }
        params.validate()?;

        let participants = self.directory.participants(group_id).await?;
        let now = self.clock.now();
        let mut session = EliminationSession::new(group_id, candidate_ids, params, timeout, now);

        let events = {
            let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
            let mut coord = TurnCoordinator::new(now, &mut *rng);
            coord.start(&mut session, &participants)?;
            coord.into_events()
        };

        self.persist(&mut session, 0)?;
        info!(
            session_id = %session.id,
            group_id,
            params = %session.params,
            status = %session.status,
            "Session created"
        );
        self.publish(events);
        Ok(session)
    }

    /// Eliminate a candidate on the caller's turn; returns the caller's view.
    pub async fn eliminate(
        &self,
        session_id: &str,
        user_id: &str,
        candidate_id: &str,
    ) -> EngineResult<EliminationStatus> {
        let (_, status) = self
            .run(session_id, Access::Write, |coord, session| {
                coord.eliminate(session, user_id, candidate_id)?;
                EliminationStatus::for_user(session, user_id, coord.now())
            })
            .await?;
        Ok(status)
    }

    /// Defer the caller's current turn; returns the caller's view.
    pub async fn quick_skip(
        &self,
        session_id: &str,
        user_id: &str,
    ) -> EngineResult<EliminationStatus> {
        let (_, status) = self
            .run(session_id, Access::Write, |coord, session| {
                coord.quick_skip(session, user_id)?;
                EliminationStatus::for_user(session, user_id, coord.now())
            })
            .await?;
        Ok(status)
    }

    /// Status for a participant, after applying any pending timeout.
    pub async fn get_status(
        &self,
        session_id: &str,
        user_id: &str,
    ) -> EngineResult<EliminationStatus> {
        let (_, status) = self
            .run(session_id, Access::Read, |coord, session| {
                EliminationStatus::for_user(session, user_id, coord.now())
            })
            .await?;
        Ok(status)
    }

    /// Cancel an active session.
    ///
    /// A pending turn timeout is not applied first, so cancelling never
    /// records a timeout or forfeits turns on the way out.
    pub async fn cancel(&self, session_id: &str) -> EngineResult<EliminationSession> {
        let (session, ()) = self
            .run(session_id, Access::Cancel, |coord, session| coord.cancel(session))
            .await?;
        Ok(session)
    }

    /// Full session record, after applying any pending timeout.
    pub async fn get_session(&self, session_id: &str) -> EngineResult<EliminationSession> {
        let (session, ()) = self.run(session_id, Access::Read, |_, _| Ok(())).await?;
        Ok(session)
    }

    /// Result of a completed session; `None` while it is still running or
    /// was cancelled.
    pub async fn get_result(&self, session_id: &str) -> EngineResult<Option<DecisionResult>> {
        let session = self.get_session(session_id).await?;
        if session.status != SessionStatus::Completed {
            return Ok(None);
        }
        match self.store.get_result(session_id)? {
            Some(result) => Ok(Some(result)),
            None => DecisionResult::from_session(&session).map(Some),
        }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn session_lock(&self, session_id: &str) -> Arc<Mutex<()>> {
        if let Some(lock) = self.locks.read().await.get(session_id) {
            return lock.clone();
        }
        self.locks
            .write()
            .await
            .entry(session_id.to_string())
            .or_default()
            .clone()
    }

    /// Drop the entry for `session_id` if only the table and `held` refer to it.
    async fn prune_lock(&self, session_id: &str, held: &Arc<Mutex<()>>) {
        let mut locks = self.locks.write().await;
        if let Some(entry) = locks.get(session_id) {
            if Arc::ptr_eq(entry, held) && Arc::strong_count(held) <= 2 {
                locks.remove(session_id);
            }
        }
    }

    fn load(&self, session_id: &str) -> EngineResult<EliminationSession> {
        let session = self
            .store
            .get_session(session_id)?
            .ok_or_else(|| DecisionError::session_not_found(session_id))?;
        if let Err(e) = session.check_consistency() {
            error!(session_id, error = %e, "Stored session failed consistency check");
            return Err(e);
        }
        Ok(session)
    }

    /// Run `op` on the session under its lock.
    ///
    /// The lock entry is pruned afterwards unless another caller is waiting
    /// on it, so unknown and idle sessions leave nothing behind.
    async fn run<T, F>(
        &self,
        session_id: &str,
        access: Access,
        op: F,
    ) -> EngineResult<(EliminationSession, T)>
    where
        F: FnOnce(&mut TurnCoordinator<'_, ChaCha8Rng>, &mut EliminationSession) -> EngineResult<T>,
    {
        let lock = self.session_lock(session_id).await;
        let guard = lock.lock().await;
        let outcome = self.run_locked(session_id, access, op);
        self.prune_lock(session_id, &lock).await;
        drop(guard);
        outcome
    }

    /// The session is stored when a timeout was applied or when a mutating
    /// operation succeeded.
    fn run_locked<T, F>(
        &self,
        session_id: &str,
        access: Access,
        op: F,
    ) -> EngineResult<(EliminationSession, T)>
    where
        F: FnOnce(&mut TurnCoordinator<'_, ChaCha8Rng>, &mut EliminationSession) -> EngineResult<T>,
    {
        let mut session = self.load(session_id)?;
        let expected = session.version;
        let now = self.clock.now();

        let (outcome, timed_out, events) = {
            let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
            let mut coord = TurnCoordinator::new(now, &mut *rng);
            let timeout = match access {
                Access::Cancel => Ok(false),
                Access::Read | Access::Write => coord.apply_timeout(&mut session),
            };
            match timeout {
                Err(e) => (Err(e), false, Vec::new()),
                Ok(timed_out) => {
                    let mark = coord.event_count();
                    let checkpoint = session.clone();
                    let outcome = op(&mut coord, &mut session);
                    if outcome.is_err() {
                        session = checkpoint;
                        coord.truncate_events(mark);
                    }
                    (outcome, timed_out, coord.into_events())
                }
            }
        };

        if timed_out || (access.mutates() && outcome.is_ok()) {
            self.persist(&mut session, expected)?;
        }
        if let Err(e) = &outcome {
            debug!(session_id, code = e.code(), "Operation rejected");
        }
        self.publish(events);

        let value = outcome?;
        Ok((session, value))
    }

    fn persist(&self, session: &mut EliminationSession, expected: u64) -> EngineResult<()> {
        session.version = self
            .store
            .put_session(session, expected)
            .map_err(|e| store_error(&session.id, e))?;
        if session.status == SessionStatus::Completed {
            self.store.put_result(&DecisionResult::from_session(session)?)?;
        }
        Ok(())
    }

    fn publish(&self, events: Vec<DecisionEvent>) {
        for event in events {
            let _ = self.events.publish(event);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    Read,
    Write,
    /// Writes without applying a pending timeout first
    Cancel,
}

impl Access {
    fn mutates(self) -> bool {
        !matches!(self, Access::Read)
    }
}

fn store_error(session_id: &str, err: StoreError) -> DecisionError {
    match err {
        StoreError::Conflict {
            expected, found, ..
        } => DecisionError::VersionConflict {
            session_id: session_id.to_string(),
            expected,
            found,
        },
        other => DecisionError::Store(other),
    }
}
