//! Priority-weighted candidate filtering
//!
//! Turns raw candidates plus user criteria into a ranked admissible set.
//!
//! # Evaluation
//!
//! ```text
//! candidate ──► hard filters (all must pass) ──✗──► rejected (kept for diagnostics)
//!                      │ ✓
//!                      ▼
//!               soft filters (by priority) ──► priority score ──► ranked admissible
//! ```
//!
//! Soft filter `i` weighs `1 / (priority_i + 1)`; the score is the weighted
//! fraction passed. When hard filters leave nothing, the report lists which
//! hard filter to drop to restore the most candidates.

pub mod engine;
pub mod geo;
pub mod hours;
pub mod types;

pub use engine::{priority_score, rank, FilterEngine};
pub use types::{
    BusinessHours, Candidate, CandidateId, FilterConfiguration, FilterCriteria, FilterItem,
    FilterReport, FilterResult, FilterType, GeoPoint, HardFilterOutcome, OpeningPeriod,
    RelaxationSuggestion, SoftFilterOutcome, TagMatch,
};
