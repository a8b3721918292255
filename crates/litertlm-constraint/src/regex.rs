//! Thin wrapper around `regex-automata`'s dense DFA for the `Regex`
//! configuration kind (§4.G). Unlike the hand-rolled engine used for
//! `JsonSchema`/`Lark`, an arbitrary user regex is handed to us as text,
//! so we lean on a battle-tested regex engine instead of writing our own
//! parser for general regex syntax.

use litertlm_error::{Error, Result};
use regex_automata::dfa::{dense, Automaton};
use regex_automata::{Anchored, Input};

pub struct RegexDfa {
    dfa: dense::DFA<Vec<u32>>,
    start: regex_automata::util::primitives::StateID,
}

impl RegexDfa {
    pub fn compile(pattern: &str) -> Result<Self> {
        // The grammar must match the *entire* committed token stream, not
        // merely contain a match somewhere in it (regex-automata's default
        // dense DFA is built for "find a match anywhere" search
        // semantics). Anchoring both ends with `\A`/`\z` (absolute
        // boundaries, unaffected by multi-line mode) turns it into a
        // whole-string matcher, which is what makes `is_dead_end` after a
        // complete match actually dead rather than still searching for a
        // later match.
        let anchored = format!(r"\A(?:{pattern})\z");
        let dfa = dense::DFA::new(&anchored)
            .map_err(|e| Error::invalid_argument(format!("invalid regex pattern {pattern:?}: {e}")))?;
        let start = dfa
            .start_state_forward(&Input::new(b"").anchored(Anchored::Yes))
            .map_err(|e| Error::invalid_argument(format!("regex pattern {pattern:?} has no anchored start state: {e}")))?;
        Ok(RegexDfa { dfa, start })
    }

    pub fn start(&self) -> u32 {
        self.start.as_u32()
    }

    fn to_state_id(&self, raw: u32) -> regex_automata::util::primitives::StateID {
        regex_automata::util::primitives::StateID::new(raw as usize).expect("state id round-trips through as_u32")
    }

    pub fn is_dead(&self, state: u32) -> bool {
        self.dfa.is_dead_state(self.to_state_id(state)) || self.dfa.is_quit_state(self.to_state_id(state))
    }

    pub fn step(&self, state: u32, byte: u8) -> u32 {
        self.dfa.next_state(self.to_state_id(state), byte).as_u32()
    }

    pub fn step_all(&self, state: u32, bytes: &[u8]) -> u32 {
        let mut cur = state;
        for &b in bytes {
            cur = self.step(cur, b);
            if self.is_dead(cur) {
                return cur;
            }
        }
        cur
    }

    /// `true` iff every byte transition out of `state` leads to a dead
    /// state: no further non-EOS token can extend the match.
    pub fn is_dead_end(&self, state: u32) -> bool {
        if self.is_dead(state) {
            return true;
        }
        (0u16..=255).all(|b| self.is_dead(self.step(state, b as u8)))
    }
}
