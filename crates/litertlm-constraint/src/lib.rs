//! The `Constraint`/state-machine contract from `spec.md` §3.2/§4.F, plus
//! three concrete engines: [`PassThroughEngine`], [`FixedSequenceEngine`],
//! and a grammar-backed [`engine::GrammarEngine`] shared by the `Regex`,
//! `JsonSchema`, and `Lark`/`Internal` configuration kinds (§4.G).
//!
//! `State` is a plain, `Copy` tagged value: engines never share mutable
//! internal buffers across clones, so there is nothing to refcount. This
//! is a slight simplification of the Design Notes' "state abstraction
//! owns a refcount on a mutable engine-internal buffer" guidance, chosen
//! because every engine here represents position as either an index or a
//! DFA state id, both of which are already cheap to copy.

#![forbid(unsafe_code)]

pub mod dfa;
pub mod engine;
pub mod fixed_sequence;
pub mod grammar;
pub mod json_schema;
pub mod lark;
pub mod nfa;
pub mod pass_through;
pub mod regex;

use litertlm_bitmap::{Bitmap, SingleAllowed};
use litertlm_error::{Error, Result};

pub use engine::{CompiledGrammar, GrammarEngine};
pub use fixed_sequence::FixedSequenceEngine;
pub use pass_through::PassThroughEngine;

/// An immutable value identifying a grammar's position after zero or
/// more committed tokens (`spec.md` Glossary: **State**).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    PassThrough,
    FixedSequence(usize),
    Grammar(u32),
    /// Reached once EOS has been committed from a terminal state, or if
    /// the engine ever lands on an internally-inconsistent position; per
    /// `spec.md` §9, treated identically to any other terminal state
    /// (EOS-only bitmap, `is_terminal() == true`).
    Ended,
}

/// The underlying grammar/regex/JSON-schema implementation providing
/// mask and transition primitives (`spec.md` Glossary: **Engine**).
#[derive(Clone)]
pub enum Engine {
    PassThrough(PassThroughEngine),
    FixedSequence(FixedSequenceEngine),
    Grammar(GrammarEngine),
}

impl Engine {
    pub fn vocab_size(&self) -> u32 {
        match self {
            Engine::PassThrough(e) => e.vocab_size(),
            Engine::FixedSequence(e) => e.vocab_size(),
            Engine::Grammar(e) => e.vocab_size(),
        }
    }

    fn start(&self) -> State {
        match self {
            Engine::PassThrough(_) => State::PassThrough,
            Engine::FixedSequence(_) => State::FixedSequence(0),
            Engine::Grammar(e) => State::Grammar(e.start()),
        }
    }

    fn is_terminal(&self, state: State) -> bool {
        match (self, state) {
            (_, State::Ended) => true,
            (Engine::PassThrough(e), State::PassThrough) => e.is_terminal(),
            (Engine::FixedSequence(e), State::FixedSequence(idx)) => e.is_terminal(idx),
            (Engine::Grammar(e), State::Grammar(id)) => e.is_terminal(id),
            _ => true,
        }
    }

    fn compute_bitmap(&self, state: State) -> Box<dyn Bitmap> {
        match (self, state) {
            (Engine::PassThrough(e), State::PassThrough) => e.compute_bitmap(),
            (Engine::FixedSequence(e), State::FixedSequence(idx)) => e.compute_bitmap(idx),
            (Engine::Grammar(e), State::Grammar(id)) => e.compute_bitmap(id),
            _ => Box::new(SingleAllowed::new(u32::MAX, self.vocab_size())),
        }
    }

    fn compute_next(&self, state: State, token: u32) -> Result<State> {
        match (self, state) {
            (Engine::PassThrough(_), State::PassThrough) => Ok(State::PassThrough),
            (Engine::FixedSequence(e), State::FixedSequence(idx)) => Ok(State::FixedSequence(e.compute_next(idx, token)?)),
            (Engine::Grammar(e), State::Grammar(id)) => Ok(State::Grammar(e.compute_next(id, token)?)),
            _ => Err(Error::failed_precondition("state does not match the engine it was produced by")),
        }
    }
}

/// Pairs an [`Engine`] with the token id that terminates generation.
/// `spec.md` §3.2.
#[derive(Clone)]
pub struct Constraint {
    engine: Engine,
    eos_token_id: u32,
}

impl Constraint {
    pub fn new(engine: Engine, eos_token_id: u32) -> Self {
        Constraint { engine, eos_token_id }
    }

    pub fn vocab_size(&self) -> u32 {
        self.engine.vocab_size()
    }

    pub fn eos_token_id(&self) -> u32 {
        self.eos_token_id
    }

    pub fn start(&self) -> State {
        self.engine.start()
    }

    /// `spec.md` §9: calling `compute_bitmap`/`is_terminal` on an errored
    /// or otherwise terminal state returns EOS-only / `true`, uniformly.
    pub fn is_terminal(&self, state: State) -> bool {
        self.engine.is_terminal(state)
    }

    pub fn compute_bitmap(&self, state: State) -> Box<dyn Bitmap> {
        if self.is_terminal(state) {
            return Box::new(SingleAllowed::new(self.eos_token_id, self.vocab_size()));
        }
        self.engine.compute_bitmap(state)
    }

    /// **Grammar monotonicity** (`spec.md` §8.1): if `compute_bitmap(state)`
    /// disallows `token`, this returns an error rather than transitioning.
    pub fn compute_next(&self, state: State, token: u32) -> Result<State> {
        if token >= self.vocab_size() {
            return Err(Error::invalid_argument(format!("token {token} is out of range for a vocabulary of size {}", self.vocab_size())));
        }
        if !self.compute_bitmap(state).get(token) {
            return Err(Error::invalid_argument(format!("token {token} is not allowed by the current grammar state")));
        }
        if token == self.eos_token_id && self.is_terminal(state) {
            return Ok(State::Ended);
        }
        self.engine.compute_next(state, token)
    }
}
