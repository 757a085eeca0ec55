//! Decision engine
//!
//! Helps a small group (2–8 participants) settle on one candidate:
//!
//! 1. **Filter**: hard filters exclude, soft filters rank by a
//!    priority-weighted score ([`filter`]).
//! 2. **Size**: pick K eliminations per participant and a final set of M
//!    ([`params`]).
//! 3. **Eliminate**: participants take turns removing candidates, with
//!    quick-skips, lazy timeouts and a catch-up phase for deferred turns
//!    ([`coordinator`]).
//! 4. **Draw**: a uniform random pick from the last M ([`selector`]).
//!
//! [`DecisionService`] ties these together with a session store, a
//! participant directory and an event bus.
//!
//! # Example
//!
//! ```ignore
//! use decision_engine::{AlgorithmParams, DecisionService, EngineConfig, MemoryStore, StaticDirectory};
//!
//! let directory = StaticDirectory::new().with_group("g-1", ["alice", "bob", "carol"]).shared();
//! let service = DecisionService::new(EngineConfig::default(), MemoryStore::new().shared(), directory);
//!
//! let suggestions = service.suggest_parameters(13, 3).await?;
//! let session = service
//!     .create_session("g-1", candidate_ids, suggestions.params[0], None)
//!     .await?;
//! let status = service.get_status(&session.id, "alice").await?;
//! ```

pub mod clock;
pub mod config;
pub mod coordinator;
pub mod directory;
pub mod error;
pub mod events;
pub mod filter;
pub mod params;
pub mod result;
pub mod selector;
pub mod service;
pub mod session;
pub mod status;
pub mod store;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use config::{ConfigError, EngineConfig};
pub use coordinator::TurnCoordinator;
pub use directory::{ParticipantDirectory, SharedDirectory, StaticDirectory};
pub use error::{DecisionError, EngineResult};
pub use events::{DecisionEvent, EventBus, EventFilter, SharedEventBus};
pub use filter::{
    Candidate, CandidateId, FilterConfiguration, FilterCriteria, FilterEngine, FilterItem,
    FilterReport, FilterResult,
};
pub use params::{AlgorithmParams, ParameterSuggester, SuggestionSet};
pub use result::DecisionResult;
pub use selector::{RandomSelector, Selection};
pub use service::{DecisionService, SharedDecisionService};
pub use session::{EliminationSession, SessionId, SessionStatus, SkipKind, SkippedTurn, UserId};
pub use status::EliminationStatus;
#[cfg(feature = "rocksdb-store")]
pub use store::RocksStore;
pub use store::{MemoryStore, SessionStore, SharedSessionStore, StoreError};
