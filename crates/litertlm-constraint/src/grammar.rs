//! A small byte-level grammar AST used to build the hand-rolled NFA/DFA
//! backing the `JsonSchema` and `Lark` configuration kinds. See
//! `spec.md` §4.H.3 for the Lark fragment this feeds, and `json_schema.rs`
//! for the schema-to-`GrammarNode` compiler.

/// One node of a regular grammar over bytes. Built programmatically (never
/// parsed from text) by `json_schema.rs` and `lark.rs`; `regex.rs`'s
/// arbitrary user patterns go through `regex-automata` instead, not this
/// tree.
#[derive(Debug, Clone)]
pub enum GrammarNode {
    /// The empty string.
    Empty,
    /// An exact byte sequence.
    Literal(Vec<u8>),
    /// A set of inclusive byte ranges; `negate` complements the set.
    Class(Vec<(u8, u8)>, bool),
    /// Sequential composition.
    Concat(Vec<GrammarNode>),
    /// Ordered choice (order does not affect the accepted language, only
    /// mirrors how the node was authored).
    Alt(Vec<GrammarNode>),
    /// Zero or more repetitions.
    Star(Box<GrammarNode>),
    /// One or more repetitions.
    Plus(Box<GrammarNode>),
    /// Zero or one repetitions.
    Optional(Box<GrammarNode>),
    /// Any byte string that never contains `needle` as a contiguous
    /// substring. Used for the §4.H.3 `SAFE_TEXT` terminal (free text that
    /// must not contain a control-token fence).
    NotContaining(Vec<u8>),
}

impl GrammarNode {
    pub fn literal(bytes: impl Into<Vec<u8>>) -> Self {
        GrammarNode::Literal(bytes.into())
    }

    pub fn concat(parts: impl IntoIterator<Item = GrammarNode>) -> Self {
        GrammarNode::Concat(parts.into_iter().collect())
    }

    pub fn alt(parts: impl IntoIterator<Item = GrammarNode>) -> Self {
        GrammarNode::Alt(parts.into_iter().collect())
    }

    pub fn star(inner: GrammarNode) -> Self {
        GrammarNode::Star(Box::new(inner))
    }

    pub fn plus(inner: GrammarNode) -> Self {
        GrammarNode::Plus(Box::new(inner))
    }

    pub fn optional(inner: GrammarNode) -> Self {
        GrammarNode::Optional(Box::new(inner))
    }

    /// `[0-9]`.
    pub fn digit() -> Self {
        GrammarNode::Class(vec![(b'0', b'9')], false)
    }

    /// Any byte except `"`, used for the body of a JSON string.
    pub fn not_quote() -> Self {
        GrammarNode::Class(vec![(b'"', b'"')], true)
    }
}
