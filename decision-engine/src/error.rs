//! Decision engine error types
//!
//! Every failure the engine reports is local and synchronous: it reflects a
//! mismatch between the caller's view and the session state. Only
//! [`DecisionError::VersionConflict`] (and transient store faults) are worth
//! retrying, after re-fetching status.

use thiserror::Error;

use crate::session::SessionStatus;
use crate::store::StoreError;

/// Result type alias for decision engine operations
pub type EngineResult<T> = Result<T, DecisionError>;

/// Errors that can occur while filtering candidates or running an elimination
#[derive(Error, Debug)]
pub enum DecisionError {
    /// Action attempted by someone other than the current turn holder
    #[error("Not your turn: {user_id} acted, but it is {expected}'s turn")]
    NotYourTurn { user_id: String, expected: String },

    /// Quick-skip budget (K per session) already used up
    #[error("Skip limit exceeded for {user_id}: {used}/{limit} quick-skips used")]
    SkipLimitExceeded {
        user_id: String,
        used: u32,
        limit: u32,
    },

    /// This exact turn slot was already deferred once
    #[error("Turn already deferred: {user_id} in round {round}, turn {turn_index}")]
    AlreadyDeferred {
        user_id: String,
        round: u32,
        turn_index: usize,
    },

    /// Targeted candidate is not among the remaining candidates
    #[error("Candidate not found among remaining candidates: {candidate_id}")]
    CandidateNotFound { candidate_id: String },

    /// Nothing left to draw a winner from
    #[error("No candidates remaining to select from")]
    NoCandidatesRemaining,

    /// K/N/M do not describe a runnable elimination
    #[error("Invalid parameters: {message}")]
    InvalidParameters { message: String },

    /// Malformed filter configuration
    #[error("Invalid filter '{filter_id}': {message}")]
    InvalidFilter { filter_id: String, message: String },

    /// Session does not exist in the store
    #[error("Session not found: {session_id}")]
    SessionNotFound { session_id: String },

    /// Session already completed or cancelled
    #[error("Session {session_id} is already {status}")]
    SessionAlreadyTerminal {
        session_id: String,
        status: SessionStatus,
    },

    /// Requester is not part of the session's elimination order
    #[error("User {user_id} is not a participant of session {session_id}")]
    NotParticipant { user_id: String, session_id: String },

    /// State machine rejected a transition
    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition {
        from: SessionStatus,
        to: SessionStatus,
    },

    /// Another writer stored the session first
    #[error("Version conflict on session {session_id}: expected {expected}, found {found}")]
    VersionConflict {
        session_id: String,
        expected: u64,
        found: u64,
    },

    /// Participant directory lookup failed
    #[error("Participant directory error: {message}")]
    Directory { message: String },

    /// Persistence failure
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Session state violates an engine invariant; never repaired silently
    #[error("Internal consistency error: {message}")]
    Internal { message: String },
}

impl DecisionError {
    /// Create an invalid parameters error
    pub fn invalid_parameters(message: impl Into<String>) -> Self {
        Self::InvalidParameters {
            message: message.into(),
        }
    }

    /// Create an invalid filter error
    pub fn invalid_filter(filter_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidFilter {
            filter_id: filter_id.into(),
            message: message.into(),
        }
    }

    /// Create a session not found error
    pub fn session_not_found(session_id: impl Into<String>) -> Self {
        Self::SessionNotFound {
            session_id: session_id.into(),
        }
    }

    /// Create a directory error
    pub fn directory(message: impl Into<String>) -> Self {
        Self::Directory {
            message: message.into(),
        }
    }

    /// Create an internal consistency error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotYourTurn { .. } => "NOT_YOUR_TURN",
            Self::SkipLimitExceeded { .. } => "SKIP_LIMIT_EXCEEDED",
            Self::AlreadyDeferred { .. } => "ALREADY_DEFERRED",
            Self::CandidateNotFound { .. } => "CANDIDATE_NOT_FOUND",
            Self::NoCandidatesRemaining => "NO_CANDIDATES_REMAINING",
            Self::InvalidParameters { .. } => "INVALID_PARAMETERS",
            Self::InvalidFilter { .. } => "INVALID_FILTER",
            Self::SessionNotFound { .. } => "SESSION_NOT_FOUND",
            Self::SessionAlreadyTerminal { .. } => "SESSION_ALREADY_TERMINAL",
            Self::NotParticipant { .. } => "NOT_PARTICIPANT",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::VersionConflict { .. } => "VERSION_CONFLICT",
            Self::Directory { .. } => "DIRECTORY_ERROR",
            Self::Store(_) => "STORE_ERROR",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    /// Check if the caller may retry after re-fetching status
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::VersionConflict { .. } => true,
            Self::Store(e) => e.is_transient(),
            _ => false,
        }
    }

    /// Get recovery suggestion for this error
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            Self::NotYourTurn { .. } => {
                Some("Wait for your turn. Poll the session status to see who is up.")
            }
            Self::SkipLimitExceeded { .. } => {
                Some("No quick-skips left. Eliminate a candidate to take your turn.")
            }
            Self::AlreadyDeferred { .. } => {
                Some("This turn was already deferred once. Eliminate a candidate now.")
            }
            Self::CandidateNotFound { .. } => {
                Some("Refresh the remaining candidates; it may already have been eliminated.")
            }
            Self::NoCandidatesRemaining => Some(
                "Every candidate was removed. Relax the hard filters and start a new session.",
            ),
            Self::InvalidParameters { .. } => Some(
                "Pick K and M from the parameter suggestions, or relax filters to change \
                 the candidate count.",
            ),
            Self::InvalidFilter { .. } => Some("Fix the filter definition and apply again."),
            Self::SessionNotFound { .. } => Some("Check the session id or create a new session."),
            Self::SessionAlreadyTerminal { .. } => {
                Some("The session is finished. Read its result or start a new session.")
            }
            Self::NotParticipant { .. } => {
                Some("Only members of the group that created the session can act on it.")
            }
            Self::VersionConflict { .. } => {
                Some("Another action landed first. Re-fetch status and retry.")
            }
            Self::Directory { .. } => Some("Verify the group exists and has members."),
            Self::InvalidTransition { .. } | Self::Store(_) | Self::Internal { .. } => None,
        }
    }
}
