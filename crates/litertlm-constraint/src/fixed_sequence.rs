//! Accepts exactly one pre-declared token sequence, terminal once fully
//! consumed. Grounded in `original_source`'s `fake_constraint.{h,cc}`,
//! whose `FakeConstraint`/`FakeState` pair is a deterministic test double
//! for decoders that don't want a real grammar engine in the loop.

use litertlm_bitmap::{Bitmap, SingleAllowed};
use litertlm_error::{Error, Result};

#[derive(Debug, Clone)]
pub struct FixedSequenceEngine {
    token_ids: Vec<u32>,
    vocab_size: u32,
}

impl FixedSequenceEngine {
    pub fn new(token_ids: Vec<u32>, vocab_size: u32) -> Self {
        FixedSequenceEngine { token_ids, vocab_size }
    }

    pub fn vocab_size(&self) -> u32 {
        self.vocab_size
    }

    pub fn is_terminal(&self, index: usize) -> bool {
        index >= self.token_ids.len()
    }

    pub fn compute_bitmap(&self, index: usize) -> Box<dyn Bitmap> {
        if self.is_terminal(index) {
            // The caller is expected to have already routed terminal
            // states to the shared "EOS only" bitmap before reaching
            // here; this branch only guards a direct call.
            Box::new(SingleAllowed::new(u32::MAX, self.vocab_size))
        } else {
            Box::new(SingleAllowed::new(self.token_ids[index], self.vocab_size))
        }
    }

    pub fn compute_next(&self, index: usize, token: u32) -> Result<usize> {
        if self.is_terminal(index) || self.token_ids[index] != token {
            return Err(Error::invalid_argument(format!(
                "token {token} does not match the next expected token in the fixed sequence"
            )));
        }
        Ok(index + 1)
    }
}
