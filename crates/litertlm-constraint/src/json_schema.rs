//! Compiles a JSON-schema subset (`type`, `properties`/`required` for
//! objects, `items` for arrays) into a [`GrammarNode`]. This is the
//! "hand-walked recursive descent over a JSON-schema subset" named in
//! `spec.md` §4.F/§4.G: since the schema itself is a finite tree (no
//! `$ref` support), recursion here always terminates.
//!
//! Whitespace between tokens is not modeled: the compiled grammar expects
//! compact JSON, matching how a constrained decoder typically drives a
//! model (no incidental formatting tokens to choose between).

use litertlm_error::{Error, Result};

use crate::grammar::GrammarNode;

fn lit(s: &str) -> GrammarNode {
    GrammarNode::literal(s.as_bytes().to_vec())
}

fn string_node() -> GrammarNode {
    GrammarNode::concat([lit("\""), GrammarNode::star(GrammarNode::not_quote()), lit("\"")])
}

fn integer_node() -> GrammarNode {
    GrammarNode::concat([GrammarNode::optional(lit("-")), GrammarNode::plus(GrammarNode::digit())])
}

fn number_node() -> GrammarNode {
    GrammarNode::concat([
        integer_node(),
        GrammarNode::optional(GrammarNode::concat([lit("."), GrammarNode::plus(GrammarNode::digit())])),
    ])
}

fn boolean_node() -> GrammarNode {
    GrammarNode::alt([lit("true"), lit("false")])
}

/// Any one JSON scalar (string, number, boolean, or null); used as the
/// fallback for schema-less array items and untyped schema nodes, since
/// the engine must always compile to *something* finite.
fn any_scalar_node() -> GrammarNode {
    GrammarNode::alt([string_node(), number_node(), boolean_node(), lit("null")])
}

/// Compiles `schema` (a JSON-schema object, as produced by
/// `litertlm-tool-grammar::canonicalize`) into a grammar that accepts
/// exactly the compact-JSON encodings of values satisfying it.
pub fn compile(schema: &serde_json::Value) -> Result<GrammarNode> {
    let Some(obj) = schema.as_object() else {
        return Err(Error::invalid_argument("JSON schema must be a JSON object"));
    };
    match obj.get("type").and_then(|v| v.as_str()) {
        Some("string") => Ok(string_node()),
        Some("boolean") => Ok(boolean_node()),
        Some("null") => Ok(lit("null")),
        Some("integer") => Ok(integer_node()),
        Some("number") => Ok(number_node()),
        Some("array") => compile_array(obj),
        Some("object") => compile_object(obj),
        Some(other) => Err(Error::invalid_argument(format!("unsupported JSON schema type {other:?}"))),
        None => Ok(any_scalar_node()),
    }
}

fn compile_array(obj: &serde_json::Map<String, serde_json::Value>) -> Result<GrammarNode> {
    let item_node = match obj.get("items") {
        Some(items_schema) => compile(items_schema)?,
        None => any_scalar_node(),
    };
    let non_empty = GrammarNode::concat([
        item_node.clone(),
        GrammarNode::star(GrammarNode::concat([lit(","), item_node])),
    ]);
    Ok(GrammarNode::concat([lit("["), GrammarNode::optional(non_empty), lit("]")]))
}

/// Above this many optional properties, enumerating every present/absent
/// combination would blow up the compiled grammar's state count; beyond
/// it we fall back to requiring every declared property (documented in
/// DESIGN.md as a deliberate limitation rather than full JSON-schema
/// object semantics, which would need a real pushdown parser).
const MAX_ENUMERATED_OPTIONAL_PROPERTIES: usize = 6;

fn compile_object(obj: &serde_json::Map<String, serde_json::Value>) -> Result<GrammarNode> {
    let properties = obj.get("properties").and_then(|v| v.as_object());
    let Some(properties) = properties else {
        return Ok(lit("{}"));
    };
    let required: Vec<&str> = obj
        .get("required")
        .and_then(|v| v.as_array())
        .map(|a| a.iter().filter_map(|x| x.as_str()).collect())
        .unwrap_or_default();

    let mut entries = Vec::with_capacity(properties.len());
    for (key, value_schema) in properties {
        let value_node = compile(value_schema)?;
        let pair = GrammarNode::concat([lit(&format!("\"{key}\":")), value_node]);
        let is_required = required.contains(&key.as_str());
        entries.push((pair, is_required));
    }

    let optional_count = entries.iter().filter(|(_, required)| !required).count();
    let body = if optional_count <= MAX_ENUMERATED_OPTIONAL_PROPERTIES {
        enumerate_object_bodies(&entries)
    } else {
        // Fallback: every declared property is present, in declaration
        // order, comma-joined.
        let mut parts = Vec::with_capacity(entries.len() * 2);
        for (i, (pair, _)) in entries.iter().enumerate() {
            if i > 0 {
                parts.push(lit(","));
            }
            parts.push(pair.clone());
        }
        GrammarNode::concat(parts)
    };
    Ok(GrammarNode::concat([lit("{"), body, lit("}")]))
}

/// Builds `Alt` over every subset of the optional entries (required
/// entries always included), each rendered as a comma-joined `Concat` in
/// declaration order, so the compiled grammar never accepts a malformed
/// leading or stray comma.
fn enumerate_object_bodies(entries: &[(GrammarNode, bool)]) -> GrammarNode {
    let optional_indices: Vec<usize> =
        entries.iter().enumerate().filter(|(_, (_, required))| !required).map(|(i, _)| i).collect();
    let combinations = 1usize << optional_indices.len();
    let mut bodies = Vec::with_capacity(combinations);
    for mask in 0..combinations {
        let mut included: Vec<bool> = entries.iter().map(|(_, required)| *required).collect();
        for (bit, &idx) in optional_indices.iter().enumerate() {
            if mask & (1 << bit) != 0 {
                included[idx] = true;
            }
        }
        let mut parts = Vec::new();
        for (i, (pair, _)) in entries.iter().enumerate() {
            if included[i] {
                if !parts.is_empty() {
                    parts.push(lit(","));
                }
                parts.push(pair.clone());
            }
        }
        bodies.push(if parts.is_empty() { GrammarNode::Empty } else { GrammarNode::concat(parts) });
    }
    GrammarNode::alt(bodies)
}
