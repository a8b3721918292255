//! Thompson-style construction of a byte-level NFA from a `GrammarNode`
//! tree. Unlike a textbook character-at-a-time Thompson construction, each
//! combinator here builds a fully self-contained fragment (no dangling
//! patch list): control-flow nodes splice existing fragments together by
//! adding epsilon edges between their already-known accept and start
//! states, which keeps the implementation free of sentinel "unpatched"
//! transitions.

use crate::grammar::GrammarNode;

#[derive(Debug, Clone, Copy)]
pub enum ByteMatcher {
    Exact(u8),
    /// Index into `Nfa::ranges`; byte ranges are interned there rather
    /// than held inline since a dynamically-built grammar can't offer a
    /// `'static` slice.
    Ranges(usize),
    RangesNeg(usize),
}

impl ByteMatcher {
    fn matches(&self, ranges_table: &[Vec<(u8, u8)>], b: u8) -> bool {
        match self {
            ByteMatcher::Exact(e) => *e == b,
            ByteMatcher::Ranges(idx) => ranges_table[*idx].iter().any(|&(lo, hi)| b >= lo && b <= hi),
            ByteMatcher::RangesNeg(idx) => !ranges_table[*idx].iter().any(|&(lo, hi)| b >= lo && b <= hi),
        }
    }
}

#[derive(Debug, Default)]
pub struct NfaState {
    pub byte_trans: Vec<(ByteMatcher, usize)>,
    pub eps: Vec<usize>,
}

#[derive(Debug)]
pub struct Nfa {
    pub states: Vec<NfaState>,
    pub ranges: Vec<Vec<(u8, u8)>>,
    pub start: usize,
    pub accepts: Vec<usize>,
}

struct Fragment {
    start: usize,
    accepts: Vec<usize>,
}

struct Builder {
    states: Vec<NfaState>,
    ranges: Vec<Vec<(u8, u8)>>,
}

impl Builder {
    fn new_state(&mut self) -> usize {
        self.states.push(NfaState::default());
        self.states.len() - 1
    }

    fn add_eps(&mut self, from: usize, to: usize) {
        self.states[from].eps.push(to);
    }

    fn add_byte(&mut self, from: usize, m: ByteMatcher, to: usize) {
        self.states[from].byte_trans.push((m, to));
    }

    fn intern_ranges(&mut self, ranges: Vec<(u8, u8)>) -> usize {
        self.ranges.push(ranges);
        self.ranges.len() - 1
    }

    fn empty(&mut self) -> Fragment {
        let s = self.new_state();
        Fragment { start: s, accepts: vec![s] }
    }

    fn literal(&mut self, bytes: &[u8]) -> Fragment {
        let start = self.new_state();
        let mut cur = start;
        for &b in bytes {
            let next = self.new_state();
            self.add_byte(cur, ByteMatcher::Exact(b), next);
            cur = next;
        }
        Fragment { start, accepts: vec![cur] }
    }

    fn class(&mut self, ranges: Vec<(u8, u8)>, negate: bool) -> Fragment {
        let start = self.new_state();
        let end = self.new_state();
        let idx = self.intern_ranges(ranges);
        let matcher = if negate { ByteMatcher::RangesNeg(idx) } else { ByteMatcher::Ranges(idx) };
        self.add_byte(start, matcher, end);
        Fragment { start, accepts: vec![end] }
    }

    fn concat(&mut self, frags: Vec<Fragment>) -> Fragment {
        let mut iter = frags.into_iter();
        let Some(first) = iter.next() else { return self.empty() };
        let mut accepts = first.accepts;
        let start = first.start;
        for frag in iter {
            for &a in &accepts {
                self.add_eps(a, frag.start);
            }
            accepts = frag.accepts;
        }
        Fragment { start, accepts }
    }

    fn alt(&mut self, frags: Vec<Fragment>) -> Fragment {
        let start = self.new_state();
        let mut accepts = Vec::new();
        for frag in frags {
            self.add_eps(start, frag.start);
            accepts.extend(frag.accepts);
        }
        Fragment { start, accepts }
    }

    fn star(&mut self, frag: Fragment) -> Fragment {
        let start = self.new_state();
        self.add_eps(start, frag.start);
        for &a in &frag.accepts {
            self.add_eps(a, start);
        }
        Fragment { start, accepts: vec![start] }
    }

    /// Builds the Knuth-Morris-Pratt automaton for "never contains
    /// `needle`": states `0..=needle.len()` track the longest matched
    /// prefix of `needle`, state `needle.len()` is the dead/trap state
    /// (excluded from `accepts` and from `byte_trans`, so once reached the
    /// fragment never becomes live again), and every other state is an
    /// accept state (the empty string, and every string that hasn't yet
    /// completed the forbidden substring, is valid).
    fn not_containing(&mut self, needle: &[u8]) -> Fragment {
        let n = needle.len();
        if n == 0 {
            // Forbidding the empty substring forbids everything.
            let dead = self.new_state();
            return Fragment { start: dead, accepts: vec![] };
        }
        let table = kmp_automaton(needle);
        let ids: Vec<usize> = (0..=n).map(|_| self.new_state()).collect();
        for state in 0..n {
            for b in 0u16..=255 {
                let b = b as u8;
                let target = table[state][b as usize];
                self.add_byte(ids[state], ByteMatcher::Exact(b), ids[target]);
            }
        }
        Fragment { start: ids[0], accepts: ids[..n].to_vec() }
    }

    fn finish(self, fragment: Fragment) -> Nfa {
        Nfa { states: self.states, ranges: self.ranges, start: fragment.start, accepts: fragment.accepts }
    }
}

/// Standard KMP transition table: `table[state][byte]` is the automaton
/// state reached by reading `byte` while having matched a `state`-length
/// prefix of `pattern`. State `pattern.len()` means "`pattern` has just
/// been fully matched."
fn kmp_automaton(pattern: &[u8]) -> Vec<[usize; 256]> {
    let m = pattern.len();
    let mut table = vec![[0usize; 256]; m + 1];
    table[0][pattern[0] as usize] = 1;
    let mut fallback = 0usize;
    for j in 1..=m {
        for c in 0..256usize {
            table[j][c] = table[fallback][c];
        }
        if j < m {
            table[j][pattern[j] as usize] = j + 1;
            fallback = table[fallback][pattern[j] as usize];
        }
    }
    table
}

fn compile(node: &GrammarNode, b: &mut Builder) -> Fragment {
    match node {
        GrammarNode::Empty => b.empty(),
        GrammarNode::Literal(bytes) => b.literal(bytes),
        GrammarNode::Class(ranges, negate) => b.class(ranges.clone(), *negate),
        GrammarNode::Concat(parts) => {
            let frags = parts.iter().map(|p| compile(p, b)).collect();
            b.concat(frags)
        }
        GrammarNode::Alt(parts) => {
            let frags = parts.iter().map(|p| compile(p, b)).collect();
            b.alt(frags)
        }
        GrammarNode::Star(inner) => {
            let f = compile(inner, b);
            b.star(f)
        }
        GrammarNode::Plus(inner) => {
            let mandatory = compile(inner, b);
            let repeated = compile(inner, b);
            let tail = b.star(repeated);
            b.concat(vec![mandatory, tail])
        }
        GrammarNode::Optional(inner) => {
            let f = compile(inner, b);
            let e = b.empty();
            b.alt(vec![f, e])
        }
        GrammarNode::NotContaining(needle) => b.not_containing(needle),
    }
}

/// Builds a complete NFA from a grammar tree.
pub fn build_nfa(node: &GrammarNode) -> Nfa {
    let mut builder = Builder { states: Vec::new(), ranges: Vec::new() };
    let fragment = compile(node, &mut builder);
    builder.finish(fragment)
}

pub(crate) fn matches(m: &ByteMatcher, ranges: &[Vec<(u8, u8)>], b: u8) -> bool {
    m.matches(ranges, b)
}
