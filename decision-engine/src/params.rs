//! K/N/M parameters and the suggester that proposes them.
//!
//! A KN+M elimination removes `K` candidates per participant (`N`) and draws
//! the winner from the last `M`. The suggester looks for K values that leave a
//! final set between `target` and `2·target`, with `target = clamp(N, 3, 8)`.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{DecisionError, EngineResult};

/// Largest supported group
pub const MAX_PARTICIPANTS: u32 = 8;

/// Largest K the suggester tries
pub const DEFAULT_MAX_SUGGESTED_K: u32 = 5;

/// Parameters of one elimination run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AlgorithmParams {
    /// Eliminations per participant across the regular rounds
    pub k: u32,
    /// Participants (group size)
    pub n: u32,
    /// Final set size the winner is drawn from
    pub m: u32,
    /// Candidates at session start
    pub initial_count: u32,
}

impl AlgorithmParams {
    pub fn new(k: u32, n: u32, m: u32, initial_count: u32) -> Self {
        Self {
            k,
            n,
            m,
            initial_count,
        }
    }

    /// Total regular eliminations, `K·N`; `None` on overflow.
    pub fn total_eliminations(&self) -> Option<u32> {
        self.k.checked_mul(self.n)
    }

    /// No elimination needed: the start set is already small enough.
    pub fn skips_elimination(&self) -> bool {
        self.initial_count <= self.m
    }

    /// Check K/N/M describe a runnable elimination.
    pub fn validate(&self) -> EngineResult<()> {
        if self.n == 0 || self.n > MAX_PARTICIPANTS {
            return Err(DecisionError::invalid_parameters(format!(
                "participant count must be 1..={MAX_PARTICIPANTS}, got {}",
                self.n
            )));
        }
        if self.m < 1 {
            return Err(DecisionError::invalid_parameters("M must be at least 1"));
        }
        if self.skips_elimination() {
            return Ok(());
        }
        if self.k < 1 {
            return Err(DecisionError::invalid_parameters("K must be at least 1"));
        }
        if self.k >= self.initial_count {
            return Err(DecisionError::invalid_parameters(format!(
                "K = {} must be below the candidate count {}",
                self.k, self.initial_count
            )));
        }
        let eliminated = self
            .total_eliminations()
            .filter(|&e| e < self.initial_count)
            .ok_or_else(|| {
                DecisionError::invalid_parameters(format!(
                    "K·N ({}·{}) must be below the candidate count {}",
                    self.k, self.n, self.initial_count
                ))
            })?;
        let remaining = self.initial_count - eliminated;
        if remaining > self.m {
            return Err(DecisionError::invalid_parameters(format!(
                "K·N + M = {} does not cover {} candidates; {} would remain for a final set of {}",
                eliminated + self.m,
                self.initial_count,
                remaining,
                self.m
            )));
        }
        Ok(())
    }
}

impl std::fmt::Display for AlgorithmParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "K={} N={} M={} (from {})",
            self.k, self.n, self.m, self.initial_count
        )
    }
}

/// Suggestions plus whether they came from the fallback path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionSet {
    pub params: Vec<AlgorithmParams>,
    /// No K was viable; callers should prompt the group to relax filters
    /// or shrink the participant set.
    pub is_fallback: bool,
}

/// Proposes viable (K, N, M) triples for a candidate and participant count.
#[derive(Debug, Clone, Copy)]
pub struct ParameterSuggester {
    max_k: u32,
}

impl Default for ParameterSuggester {
    fn default() -> Self {
        Self {
            max_k: DEFAULT_MAX_SUGGESTED_K,
        }
    }
}

impl ParameterSuggester {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_k(max_k: u32) -> Self {
        Self { max_k }
    }

    /// Final-set size the suggester aims for.
    pub fn target(participant_count: u32) -> u32 {
        participant_count.clamp(3, 8)
    }

    /// Every viable K in `1..=max_k`, with `M` set to what remains.
    pub fn viable(&self, candidate_count: u32, participant_count: u32) -> Vec<AlgorithmParams> {
        let target = Self::target(participant_count);

        (1..=self.max_k)
            .filter_map(|k| {
                let eliminated = k.checked_mul(participant_count)?;
                let remaining = candidate_count.checked_sub(eliminated)?;
                (target..=2 * target).contains(&remaining).then(|| {
                    AlgorithmParams::new(k, participant_count, remaining, candidate_count)
                })
            })
            .collect()
    }

    /// Viable triples, or a single fallback when none exist.
    pub fn suggest(&self, candidate_count: u32, participant_count: u32) -> Vec<AlgorithmParams> {
        self.suggest_set(candidate_count, participant_count).params
    }

    /// Like [`suggest`](Self::suggest) but reports whether the fallback was used.
    pub fn suggest_set(&self, candidate_count: u32, participant_count: u32) -> SuggestionSet {
        let viable = self.viable(candidate_count, participant_count);
        if !viable.is_empty() {
            debug!(
                candidate_count,
                participant_count,
                suggestions = viable.len(),
                "Viable parameters found"
            );
            return SuggestionSet {
                params: viable,
                is_fallback: false,
            };
        }

        let k = match participant_count.checked_mul(2) {
            Some(per_round) if per_round > 0 => (candidate_count / per_round).min(2),
            _ => 0,
        };
        let m = candidate_count
            .saturating_sub(k.saturating_mul(participant_count))
            .min(3);

        debug!(
            candidate_count,
            participant_count, k, m, "No viable parameters, using fallback"
        );
        SuggestionSet {
            params: vec![AlgorithmParams::new(
                k,
                participant_count,
                m,
                candidate_count,
            )],
            is_fallback: true,
        }
    }
}
