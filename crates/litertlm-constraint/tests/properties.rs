//! Property tests for the `spec.md` §8.1 invariants **grammar
//! monotonicity** and **terminal absorption**.

use litertlm_constraint::{Constraint, Engine, FixedSequenceEngine};
use proptest::prelude::*;

const VOCAB_SIZE: u32 = 16;
const EOS: u32 = 0;

fn constraint_for(sequence: Vec<u32>) -> Constraint {
    let engine = FixedSequenceEngine::new(sequence, VOCAB_SIZE);
    Constraint::new(Engine::FixedSequence(engine), EOS)
}

proptest! {
    /// Grammar monotonicity: `compute_next` only ever succeeds for a
    /// token the current state's bitmap allows, and every token the
    /// bitmap allows is itself accepted by `compute_next`.
    #[test]
    fn compute_next_agrees_with_compute_bitmap(
        sequence in prop::collection::vec(1u32..VOCAB_SIZE, 0..6),
        candidate in 0u32..VOCAB_SIZE,
    ) {
        let constraint = constraint_for(sequence);
        let state = constraint.start();
        let allowed = constraint.compute_bitmap(state).get(candidate);
        let accepted = constraint.compute_next(state, candidate).is_ok();
        prop_assert_eq!(allowed, accepted);
    }

    /// Terminal absorption: once a fixed sequence is fully consumed, the
    /// only token the bitmap allows is EOS, and every other token is
    /// rejected by `compute_next`.
    #[test]
    fn terminal_state_allows_only_eos(
        sequence in prop::collection::vec(1u32..VOCAB_SIZE, 0..6),
    ) {
        let constraint = constraint_for(sequence.clone());
        let mut state = constraint.start();
        for token in &sequence {
            state = constraint.compute_next(state, *token).unwrap();
        }
        prop_assert!(constraint.is_terminal(state));

        let bitmap = constraint.compute_bitmap(state);
        for token in 0..VOCAB_SIZE {
            prop_assert_eq!(bitmap.get(token), token == EOS);
        }
    }

    /// Committing the declared sequence token-by-token always reaches a
    /// terminal state, regardless of sequence contents (as long as no
    /// token collides with EOS, which would short-circuit early).
    #[test]
    fn consuming_the_full_sequence_always_terminates(
        sequence in prop::collection::vec(1u32..VOCAB_SIZE, 1..6),
    ) {
        let constraint = constraint_for(sequence.clone());
        let mut state = constraint.start();
        for (i, token) in sequence.iter().enumerate() {
            prop_assert!(!constraint.is_terminal(state), "terminated early before consuming token {i}");
            state = constraint.compute_next(state, *token).unwrap();
        }
        prop_assert!(constraint.is_terminal(state));
    }
}
