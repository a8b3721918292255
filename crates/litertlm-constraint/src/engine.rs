//! The grammar-backed engine shared by the `Regex`, `JsonSchema`, and
//! `Lark`/`Internal` configuration kinds (§4.G), unified behind one
//! [`CompiledGrammar`] representation as described in `SPEC_FULL.md`
//! §4.E/F/G.

use std::sync::Arc;

use litertlm_bitmap::{Bitmap, DenseBits, SingleAllowed};
use litertlm_error::Result;

use crate::dfa::{self, DfaTable};
use crate::grammar::GrammarNode;
use crate::regex::RegexDfa;

pub enum CompiledGrammar {
    /// An arbitrary user regex, backed by `regex-automata`'s dense DFA.
    Regex(RegexDfa),
    /// A `JsonSchema`/`Lark`/`Internal` grammar, backed by the hand-rolled
    /// NFA-to-DFA pipeline in `nfa.rs`/`dfa.rs`.
    Hand(DfaTable),
}

impl CompiledGrammar {
    pub fn from_pattern(pattern: &str) -> Result<Self> {
        Ok(CompiledGrammar::Regex(RegexDfa::compile(pattern)?))
    }

    pub fn from_grammar_node(node: &GrammarNode) -> Self {
        let nfa = crate::nfa::build_nfa(node);
        CompiledGrammar::Hand(dfa::build_dfa(&nfa))
    }

    fn start(&self) -> u32 {
        match self {
            CompiledGrammar::Regex(r) => r.start(),
            CompiledGrammar::Hand(d) => d.start,
        }
    }

    fn is_dead_end(&self, state: u32) -> bool {
        match self {
            CompiledGrammar::Regex(r) => r.is_dead_end(state),
            CompiledGrammar::Hand(d) => d.is_dead_end(state),
        }
    }

    fn is_dead(&self, state: u32) -> bool {
        match self {
            CompiledGrammar::Regex(r) => r.is_dead(state),
            CompiledGrammar::Hand(d) => d.is_dead(state),
        }
    }

    fn step_all(&self, state: u32, bytes: &[u8]) -> u32 {
        match self {
            CompiledGrammar::Regex(r) => r.step_all(state, bytes),
            CompiledGrammar::Hand(d) => d.step_all(state, bytes),
        }
    }
}

/// A grammar engine plus the byte encoding of every vocabulary token,
/// shared by the `Regex`, `JsonSchema`, and `Lark`/`Internal` kinds.
pub struct GrammarEngine {
    grammar: Arc<CompiledGrammar>,
    token_bytes: Arc<Vec<Vec<u8>>>,
    vocab_size: u32,
}

impl GrammarEngine {
    pub fn new(grammar: CompiledGrammar, token_bytes: Vec<Vec<u8>>) -> Self {
        let vocab_size = token_bytes.len() as u32;
        GrammarEngine { grammar: Arc::new(grammar), token_bytes: Arc::new(token_bytes), vocab_size }
    }

    pub fn vocab_size(&self) -> u32 {
        self.vocab_size
    }

    pub fn start(&self) -> u32 {
        self.grammar.start()
    }

    pub fn is_terminal(&self, state: u32) -> bool {
        self.grammar.is_dead_end(state)
    }

    pub fn compute_bitmap(&self, state: u32) -> Box<dyn Bitmap> {
        if self.grammar.is_dead(state) {
            return Box::new(SingleAllowed::new(u32::MAX, self.vocab_size));
        }
        let mut bits = DenseBits::new(self.vocab_size);
        for (id, bytes) in self.token_bytes.iter().enumerate() {
            let next = self.grammar.step_all(state, bytes);
            if !self.grammar.is_dead(next) {
                bits.set(id as u32, true);
            }
        }
        Box::new(bits)
    }

    pub fn compute_next(&self, state: u32, token: u32) -> Result<u32> {
        let bytes = &self.token_bytes[token as usize];
        let next = self.grammar.step_all(state, bytes);
        if self.grammar.is_dead(next) {
            return Err(litertlm_error::Error::invalid_argument(format!(
                "token {token} is not a valid continuation of the current grammar state"
            )));
        }
        Ok(next)
    }
}

impl Clone for GrammarEngine {
    fn clone(&self) -> Self {
        GrammarEngine {
            grammar: Arc::clone(&self.grammar),
            token_bytes: Arc::clone(&self.token_bytes),
            vocab_size: self.vocab_size,
        }
    }
}
