//! Subset construction: turns an [`Nfa`] into a dense, table-driven DFA
//! over bytes. Used for the `JsonSchema` and `Lark`/`Internal`
//! configuration kinds (§4.G); `Regex` goes through `regex-automata`
//! instead (see `engine.rs`).

use std::collections::{BTreeSet, HashMap};

use crate::nfa::{matches, Nfa};

pub const DEAD: u32 = u32::MAX;

#[derive(Debug)]
pub struct DfaTable {
    /// `transitions[state][byte]` is the next state, or [`DEAD`].
    transitions: Vec<[u32; 256]>,
    accept: Vec<bool>,
    pub start: u32,
}

impl DfaTable {
    pub fn is_dead(&self, state: u32) -> bool {
        state == DEAD || state as usize >= self.transitions.len()
    }

    pub fn is_accept(&self, state: u32) -> bool {
        !self.is_dead(state) && self.accept[state as usize]
    }

    pub fn step(&self, state: u32, byte: u8) -> u32 {
        if self.is_dead(state) {
            return DEAD;
        }
        self.transitions[state as usize][byte as usize]
    }

    pub fn step_all(&self, state: u32, bytes: &[u8]) -> u32 {
        let mut cur = state;
        for &b in bytes {
            cur = self.step(cur, b);
            if self.is_dead(cur) {
                return DEAD;
            }
        }
        cur
    }

    /// `true` iff every byte transition out of `state` is dead, i.e. no
    /// further non-EOS token can extend the current grammar state.
    pub fn is_dead_end(&self, state: u32) -> bool {
        if self.is_dead(state) {
            return true;
        }
        self.transitions[state as usize].iter().all(|&next| self.is_dead(next))
    }
}

fn epsilon_closure(nfa: &Nfa, seeds: &BTreeSet<usize>) -> BTreeSet<usize> {
    let mut closure: BTreeSet<usize> = seeds.clone();
    let mut stack: Vec<usize> = seeds.iter().copied().collect();
    while let Some(s) = stack.pop() {
        for &next in &nfa.states[s].eps {
            if closure.insert(next) {
                stack.push(next);
            }
        }
    }
    closure
}

/// Builds a dense DFA by subset construction over `nfa`, exploring states
/// reachable from the start reflexively (breadth-first, memoized by the
/// exact NFA-state set).
pub fn build_dfa(nfa: &Nfa) -> DfaTable {
    let start_set = epsilon_closure(nfa, &BTreeSet::from([nfa.start]));
    let mut seen: HashMap<BTreeSet<usize>, u32> = HashMap::new();
    let mut order: Vec<BTreeSet<usize>> = Vec::new();
    seen.insert(start_set.clone(), 0);
    order.push(start_set);

    let mut i = 0;
    while i < order.len() {
        let current = order[i].clone();
        for b in 0u16..=255 {
            let byte = b as u8;
            let mut next_seeds = BTreeSet::new();
            for &s in &current {
                for (m, target) in &nfa.states[s].byte_trans {
                    if matches(m, &nfa.ranges, byte) {
                        next_seeds.insert(*target);
                    }
                }
            }
            if next_seeds.is_empty() {
                continue;
            }
            let closure = epsilon_closure(nfa, &next_seeds);
            seen.entry(closure.clone()).or_insert_with(|| {
                order.push(closure);
                (order.len() - 1) as u32
            });
        }
        i += 1;
    }

    let accepts: std::collections::HashSet<usize> = nfa.accepts.iter().copied().collect();
    let mut transitions = vec![[DEAD; 256]; order.len()];
    let mut accept = vec![false; order.len()];
    for (idx, set) in order.iter().enumerate() {
        accept[idx] = set.iter().any(|s| accepts.contains(s));
        for b in 0u16..=255 {
            let byte = b as u8;
            let mut next_seeds = BTreeSet::new();
            for &s in set {
                for (m, target) in &nfa.states[s].byte_trans {
                    if matches(m, &nfa.ranges, byte) {
                        next_seeds.insert(*target);
                    }
                }
            }
            if next_seeds.is_empty() {
                continue;
            }
            let closure = epsilon_closure(nfa, &next_seeds);
            transitions[idx][byte as usize] = seen[&closure];
        }
    }

    DfaTable { transitions, accept, start: 0 }
}
