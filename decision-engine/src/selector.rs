//! Uniform random draw over the final set.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{DecisionError, EngineResult};
use crate::filter::CandidateId;
use crate::session::UserId;

/// Winner plus the candidates it beat, in their original order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub winner: CandidateId,
    pub runners_up: Vec<CandidateId>,
}

/// Stateless draws driven by an injected RNG.
pub struct RandomSelector;

impl RandomSelector {
    /// Pick one candidate uniformly; everyone else becomes a runner-up.
    pub fn draw<R: Rng + ?Sized>(candidates: &[CandidateId], rng: &mut R) -> EngineResult<Selection> {
        if candidates.is_empty() {
            return Err(DecisionError::NoCandidatesRemaining);
        }
        let index = rng.gen_range(0..candidates.len());
        let winner = candidates[index].clone();
        let runners_up = candidates
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != index)
            .map(|(_, id)| id.clone())
            .collect();
        Ok(Selection { winner, runners_up })
    }

    /// Shuffle the participants into an elimination order.
    pub fn shuffle_order<R: Rng + ?Sized>(participants: &[UserId], rng: &mut R) -> Vec<UserId> {
        let mut order = participants.to_vec();
        order.shuffle(rng);
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::collections::HashMap;

    fn ids(n: usize) -> Vec<CandidateId> {
        (1..=n).map(|i| format!("c{i}")).collect()
    }

    #[test]
    fn test_empty_set_is_an_error() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let err = RandomSelector::draw(&[], &mut rng).unwrap_err();
        assert!(matches!(err, DecisionError::NoCandidatesRemaining));
    }

    #[test]
    fn test_runners_up_keep_order() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let candidates = ids(4);
        let selection = RandomSelector::draw(&candidates, &mut rng).unwrap();

        assert!(candidates.contains(&selection.winner));
        assert_eq!(selection.runners_up.len(), 3);
        let expected: Vec<_> = candidates
            .iter()
            .filter(|c| **c != selection.winner)
            .cloned()
            .collect();
        assert_eq!(selection.runners_up, expected);
    }

    #[test]
    fn test_same_seed_same_winner() {
        let candidates = ids(6);
        let a = RandomSelector::draw(&candidates, &mut ChaCha8Rng::seed_from_u64(42)).unwrap();
        let b = RandomSelector::draw(&candidates, &mut ChaCha8Rng::seed_from_u64(42)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_draw_reaches_every_candidate() {
        let candidates = ids(3);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut wins: HashMap<CandidateId, u32> = HashMap::new();
        for _ in 0..300 {
            let s = RandomSelector::draw(&candidates, &mut rng).unwrap();
            *wins.entry(s.winner).or_insert(0) += 1;
        }
        assert_eq!(wins.len(), 3);
        assert!(wins.values().all(|&n| n > 50));
    }

    #[test]
    fn test_shuffle_is_a_permutation() {
        let people: Vec<UserId> = ["alice", "bob", "carol", "dave"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let mut order = RandomSelector::shuffle_order(&people, &mut ChaCha8Rng::seed_from_u64(9));
        order.sort();
        let mut sorted = people.clone();
        sorted.sort();
        assert_eq!(order, sorted);
    }
}
