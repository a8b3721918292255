//! Tool-declaration canonicalization (`spec.md` §3.3).
//!
//! Accepts both the bare `{name, description, parameters}` form and the
//! `{"type": "function", "function": {...}}` wrapper some tool-calling
//! APIs use, following `original_source`'s `fc_tool_format_utils.cc` /
//! `python_tool_format_utils.cc`, both of which unwrap on the mere
//! presence of a `"function"` key rather than checking `"type"` first.

use litertlm_error::{Error, Result};
use serde_json::{Map, Value};

/// A canonicalized tool declaration: its name plus every other key of
/// the (unwrapped) function object, in the order they appeared in the
/// source JSON.
#[derive(Debug, Clone)]
pub struct Tool {
    pub name: String,
    /// The full function object, including `"name"`. Kept intact (not
    /// split into separate `description`/`parameters` fields) so FC
    /// rendering can iterate "every non-name key" per `spec.md` §4.H.1
    /// without the renderer needing to know the whole field set.
    pub fields: Map<String, Value>,
}

impl Tool {
    pub fn description(&self) -> Option<&str> {
        self.fields.get("description").and_then(|v| v.as_str())
    }

    pub fn parameters(&self) -> Option<&Value> {
        self.fields.get("parameters")
    }

    /// `(name, schema)` pairs from `parameters.properties`, in
    /// declaration order; empty if the tool declares no parameters.
    pub fn properties(&self) -> Vec<(&str, &Value)> {
        self.parameters()
            .and_then(|p| p.get("properties"))
            .and_then(|p| p.as_object())
            .map(|props| props.iter().map(|(k, v)| (k.as_str(), v)).collect())
            .unwrap_or_default()
    }

    /// The `parameters.required` array, as a set of parameter names.
    pub fn required(&self) -> std::collections::HashSet<&str> {
        self.parameters()
            .and_then(|p| p.get("required"))
            .and_then(|r| r.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_str()).collect())
            .unwrap_or_default()
    }
}

fn unwrap_function_object(entry: &Value) -> Result<&Map<String, Value>> {
    let obj = entry
        .as_object()
        .ok_or_else(|| Error::invalid_argument(format!("tool declaration must be a JSON object, got {entry}")))?;
    match obj.get("function") {
        Some(function) => function
            .as_object()
            .ok_or_else(|| Error::invalid_argument("tool declaration's \"function\" wrapper must be a JSON object")),
        None => Ok(obj),
    }
}

/// Canonicalizes an array of tool declarations (`spec.md` §3.3), each
/// either bare or `{"type": "function", "function": {...}}`-wrapped.
pub fn canonicalize(tools: &Value) -> Result<Vec<Tool>> {
    let array = tools
        .as_array()
        .ok_or_else(|| Error::invalid_argument("tool declarations must be a JSON array"))?;
    let mut out = Vec::with_capacity(array.len());
    for entry in array {
        let function = unwrap_function_object(entry)?;
        let name = function
            .get("name")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::invalid_argument("tool declaration is missing a string \"name\""))?
            .to_string();
        out.push(Tool {
            name,
            fields: function.clone(),
        });
    }
    Ok(out)
}

/// Tool names in declaration order, deduplicated by first occurrence
/// (`spec.md` §9's resolution of the "duplicate tool names" open
/// question).
pub fn tool_names(tools: &[Tool]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut names = Vec::with_capacity(tools.len());
    for tool in tools {
        if seen.insert(tool.name.clone()) {
            names.push(tool.name.clone());
        }
    }
    names
}
