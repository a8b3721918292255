//! Compiles the §4.H.3 Lark fragment directly into a [`GrammarNode`],
//! parameterized by mode, declared tool names, and control tokens. This
//! is the executable counterpart of `litertlm-tool-grammar`'s textual
//! Lark renderer: both describe the same grammar, one as a string for
//! prompt-template/FFI consumers, one as a tree this crate can turn into
//! a DFA. Kept here (not shared via a dependency) since `litertlm-tool-
//! grammar` and `litertlm-constraint` are sibling crates with no edge
//! between them (see `SPEC_FULL.md` §0's crate-level data flow).

use litertlm_error::{Error, Result};

use crate::grammar::GrammarNode;

/// The five reserved textual markers that delimit function-call regions.
#[derive(Debug, Clone)]
pub struct ControlTokens {
    pub code_fence_start: String,
    pub code_fence_end: String,
    pub open_quote: String,
    pub close_quote: String,
    pub function_resp_start: String,
}

impl Default for ControlTokens {
    fn default() -> Self {
        ControlTokens {
            code_fence_start: "<start_function_call>".to_string(),
            code_fence_end: "<end_function_call>".to_string(),
            open_quote: "<escape>".to_string(),
            close_quote: "<escape>".to_string(),
            function_resp_start: "<start_function_response>".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    TextOnly,
    TextAndOrFunctionCalls,
    FunctionCallsOnly,
}

/// Generic JSON-value nesting (object-in-object, array-in-array) is
/// unrolled to this many levels before falling back to scalars only.
/// Function arguments in practice don't nest this deep; unrolling keeps
/// the grammar a flat DFA instead of requiring a true pushdown parser.
const MAX_VALUE_DEPTH: usize = 4;

fn lit(s: &str) -> GrammarNode {
    GrammarNode::literal(s.as_bytes().to_vec())
}

fn ws() -> GrammarNode {
    GrammarNode::star(GrammarNode::Class(vec![(b' ', b' '), (b'\t', b'\t'), (b'\n', b'\n'), (b'\r', b'\r')], false))
}

fn identifier() -> GrammarNode {
    let head = GrammarNode::Class(vec![(b'a', b'z'), (b'A', b'Z'), (b'_', b'_')], false);
    let tail = GrammarNode::Class(vec![(b'a', b'z'), (b'A', b'Z'), (b'0', b'9'), (b'_', b'_')], false);
    GrammarNode::concat([head, GrammarNode::star(tail)])
}

fn lark_string(control: &ControlTokens) -> GrammarNode {
    GrammarNode::concat([
        lit(&control.open_quote),
        GrammarNode::NotContaining(control.close_quote.as_bytes().to_vec()),
        lit(&control.close_quote),
    ])
}

fn number() -> GrammarNode {
    let digit = GrammarNode::digit();
    let integer = GrammarNode::concat([GrammarNode::optional(lit("-")), GrammarNode::plus(digit.clone())]);
    GrammarNode::concat([integer, GrammarNode::optional(GrammarNode::concat([lit("."), GrammarNode::plus(digit)]))])
}

fn scalar(control: &ControlTokens) -> GrammarNode {
    GrammarNode::alt([lark_string(control), number(), lit("true"), lit("false"), lit("null")])
}

fn value(depth: usize, control: &ControlTokens) -> GrammarNode {
    if depth == 0 {
        scalar(control)
    } else {
        GrammarNode::alt([scalar(control), object(depth, control), array(depth, control)])
    }
}

fn object(depth: usize, control: &ControlTokens) -> GrammarNode {
    let pair = GrammarNode::concat([identifier(), ws(), lit(":"), ws(), value(depth.saturating_sub(1), control)]);
    let rest = GrammarNode::star(GrammarNode::concat([ws(), lit(","), ws(), pair.clone()]));
    let body = GrammarNode::optional(GrammarNode::concat([pair, rest]));
    GrammarNode::concat([lit("{"), ws(), body, ws(), lit("}")])
}

fn array(depth: usize, control: &ControlTokens) -> GrammarNode {
    let item = value(depth.saturating_sub(1), control);
    let rest = GrammarNode::star(GrammarNode::concat([ws(), lit(","), ws(), item.clone()]));
    let body = GrammarNode::optional(GrammarNode::concat([item, rest]));
    GrammarNode::concat([lit("["), ws(), body, ws(), lit("]")])
}

fn safe_text(control: &ControlTokens) -> GrammarNode {
    GrammarNode::NotContaining(control.code_fence_start.as_bytes().to_vec())
}

/// Deduplicates tool names by first occurrence (per `spec.md` §9's
/// resolution of the "duplicate tool names" open question) and builds
/// the `TOOL_UNION` alternation.
fn tool_union(tool_names: &[String]) -> GrammarNode {
    let mut seen = std::collections::HashSet::new();
    let mut branches = Vec::new();
    for name in tool_names {
        if seen.insert(name.clone()) {
            branches.push(lit(name));
        }
    }
    GrammarNode::alt(branches)
}

fn function_block(tool_names: &[String], control: &ControlTokens) -> GrammarNode {
    let one_call = GrammarNode::concat([
        lit(&control.code_fence_start),
        lit("call:"),
        tool_union(tool_names),
        object(MAX_VALUE_DEPTH, control),
        lit(&control.code_fence_end),
    ]);
    GrammarNode::concat([GrammarNode::plus(one_call), lit(&control.function_resp_start)])
}

/// Builds the grammar for `mode` over `tool_names`, per `spec.md` §4.H.3's
/// mode-composition table.
pub fn compile(mode: Mode, tool_names: &[String], control: &ControlTokens) -> Result<GrammarNode> {
    match mode {
        Mode::TextOnly => Ok(safe_text(control)),
        Mode::FunctionCallsOnly => {
            if tool_names.is_empty() {
                return Err(Error::invalid_argument("FunctionCallsOnly mode requires at least one declared tool"));
            }
            Ok(function_block(tool_names, control))
        }
        Mode::TextAndOrFunctionCalls => {
            if tool_names.is_empty() {
                return Ok(safe_text(control));
            }
            Ok(GrammarNode::concat([
                GrammarNode::optional(safe_text(control)),
                GrammarNode::optional(function_block(tool_names, control)),
            ]))
        }
    }
}
