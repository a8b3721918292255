//! FC-format rendering (`spec.md` §4.H.1), ported from
//! `original_source`'s `fc_tool_format_utils.cc`: keys are bare
//! identifiers (not quoted), strings are wrapped in `<escape>` markers
//! instead of `"`, and no whitespace is inserted between tokens.

use litertlm_error::Result;
use serde_json::{Map, Value};

use crate::tool::Tool;

const SCHEMA_TYPE_NAMES: [&str; 7] = ["string", "number", "integer", "object", "array", "boolean", "null"];

/// Recursively uppercases the value of any `"type"` key whose string
/// value is one of the seven JSON-schema primitive type names, leaving
/// every other key and value untouched. Ported from
/// `fc_tool_format_utils.cc`'s `UppercaseTypes`.
fn uppercase_types(value: &Value) -> Value {
    match value {
        Value::Object(obj) => {
            let mut out = Map::with_capacity(obj.len());
            for (key, val) in obj {
                if key == "type" {
                    if let Value::String(s) = val {
                        if SCHEMA_TYPE_NAMES.contains(&s.as_str()) {
                            out.insert(key.clone(), Value::String(s.to_uppercase()));
                            continue;
                        }
                    }
                }
                out.insert(key.clone(), uppercase_types(val));
            }
            Value::Object(out)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(uppercase_types).collect()),
        other => other.clone(),
    }
}

/// Renders a JSON value in FC format (`spec.md` §8.1's normative
/// examples): `null`/booleans/numbers render as their JSON text, strings
/// are `<escape>`-delimited, object keys are bare (unquoted)
/// identifiers, and no whitespace separates any token.
pub fn format_value(value: &Value) -> Result<String> {
    match value {
        Value::Null => Ok("null".to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::String(s) => Ok(format!("<escape>{s}<escape>")),
        Value::Array(arr) => {
            let parts: Result<Vec<String>> = arr.iter().map(format_value).collect();
            Ok(format!("[{}]", parts?.join(",")))
        }
        Value::Object(obj) => format_object(obj),
    }
}

fn format_object(obj: &Map<String, Value>) -> Result<String> {
    let mut parts = Vec::with_capacity(obj.len());
    for (key, value) in obj {
        parts.push(format!("{key}:{}", format_value(value)?));
    }
    Ok(format!("{{{}}}", parts.join(",")))
}

/// Renders `tool` as `declaration:<name>{<fields>}`, where `<fields>` is
/// the FC rendering of every key but `"name"` in the function object,
/// with schema `"type"` values uppercased first (`spec.md` §4.H.1).
pub fn format_tool_declaration(tool: &Tool) -> Result<String> {
    let uppercased = uppercase_types(&Value::Object(tool.fields.clone()));
    let mut fields = match uppercased {
        Value::Object(obj) => obj,
        _ => unreachable!("uppercase_types preserves the Object variant"),
    };
    fields.remove("name");
    Ok(format!("declaration:{}{}", tool.name, format_object(&fields)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::canonicalize;
    use serde_json::json;

    /// `spec.md` §8.1 FC-format invariants.
    #[test]
    fn format_value_matches_normative_examples() {
        assert_eq!(format_value(&Value::Null).unwrap(), "null");
        assert_eq!(format_value(&json!(true)).unwrap(), "true");
        assert_eq!(format_value(&json!("x")).unwrap(), "<escape>x<escape>");
        assert_eq!(format_value(&json!([1, "two"])).unwrap(), "[1,<escape>two<escape>]");
        assert_eq!(format_value(&json!({"k": "v"})).unwrap(), "{k:<escape>v<escape>}");
    }

    #[test]
    fn format_tool_declaration_uppercases_schema_type_values() {
        let tools = canonicalize(&json!([{
            "name": "get_weather",
            "parameters": {
                "type": "object",
                "properties": {"location": {"type": "string"}}
            }
        }]))
        .unwrap();
        let rendered = format_tool_declaration(&tools[0]).unwrap();
        assert!(rendered.starts_with("declaration:get_weather{"));
        assert!(rendered.contains("type:<escape>OBJECT<escape>"));
        assert!(rendered.contains("STRING"));
        assert!(!rendered.contains("name:"));
    }

    #[test]
    fn format_tool_declaration_handles_a_tool_with_only_a_name() {
        let tools = canonicalize(&json!([{"name": "noop"}])).unwrap();
        assert_eq!(format_tool_declaration(&tools[0]).unwrap(), "declaration:noop{}");
    }
}
