//! Attempt-order strategies for the fallback orchestrator.

use std::fmt::Debug;

use rand::seq::SliceRandom;

/// Decides the order in which adapters are attempted for one call.
///
/// Implementations return a fresh permutation of `0..len` per call and never
/// touch the adapter list itself, so concurrent calls cannot race.
pub trait AttemptStrategy: Send + Sync + Debug {
    fn order(&self, len: usize) -> Vec<usize>;
}

/// Configured order, every time.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sequential;

impl AttemptStrategy for Sequential {
    fn order(&self, len: usize) -> Vec<usize> {
        (0..len).collect()
    }
}

/// Independent Fisher–Yates shuffle per call.
#[derive(Debug, Default, Clone, Copy)]
pub struct Shuffled;

impl AttemptStrategy for Shuffled {
    fn order(&self, len: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..len).collect();
        indices.shuffle(&mut rand::thread_rng());
        indices
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_order() {
        assert_eq!(Sequential.order(3), vec![0, 1, 2]);
        assert!(Sequential.order(0).is_empty());
    }

    #[test]
    fn test_shuffled_is_permutation() {
        for _ in 0..50 {
            let mut order = Shuffled.order(5);
            order.sort_unstable();
            assert_eq!(order, vec![0, 1, 2, 3, 4]);
        }
    }

    #[test]
    fn test_shuffled_varies_first_choice() {
        let firsts: std::collections::HashSet<usize> = (0..200).map(|_| Shuffled.order(3)[0]).collect();
        assert!(firsts.len() > 1);
    }
}
