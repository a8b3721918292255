//! The no-constraint engine: every state is non-terminal, every token is
//! always allowed. Mirrors "no active constraints" in `spec.md` §3.2.

use litertlm_bitmap::{AllAllowed, Bitmap};

#[derive(Debug, Clone, Copy)]
pub struct PassThroughEngine {
    vocab_size: u32,
}

impl PassThroughEngine {
    pub fn new(vocab_size: u32) -> Self {
        PassThroughEngine { vocab_size }
    }

    pub fn vocab_size(&self) -> u32 {
        self.vocab_size
    }

    pub fn is_terminal(&self) -> bool {
        false
    }

    pub fn compute_bitmap(&self) -> Box<dyn Bitmap> {
        Box::new(AllAllowed::new(self.vocab_size))
    }
}
