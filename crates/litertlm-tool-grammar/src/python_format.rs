//! Python-signature rendering (`spec.md` §4.H.2), ported from
//! `original_source`'s `python_tool_format_utils.cc`.

use serde_json::Value;

use crate::tool::Tool;

/// Renders a JSON value the way a Python literal of the same shape would
/// print: objects that carry a `"type"` key render as a constructor call
/// (`Type(kw=val, ...)` with `"type"` itself excluded from the kwargs),
/// every other object renders as a `dict` literal.
pub fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "None".to_string(),
        Value::Bool(b) => if *b { "True" } else { "False" }.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => format!("\"{s}\""),
        Value::Array(arr) => format!("[{}]", arr.iter().map(format_value).collect::<Vec<_>>().join(", ")),
        Value::Object(obj) => match obj.get("type").and_then(|v| v.as_str()) {
            Some(ctor) => {
                let kwargs: Vec<String> = obj
                    .iter()
                    .filter(|(k, _)| k.as_str() != "type")
                    .map(|(k, v)| format!("{k}={}", format_value(v)))
                    .collect();
                format!("{ctor}({})", kwargs.join(", "))
            }
            None => {
                let entries: Vec<String> = obj.iter().map(|(k, v)| format!("\"{k}\": {}", format_value(v))).collect();
                format!("{{{}}}", entries.join(", "))
            }
        },
    }
}

fn py_type(schema: &Value) -> String {
    match schema.get("type").and_then(|v| v.as_str()) {
        Some("boolean") => "bool".to_string(),
        Some("integer") => "int".to_string(),
        Some("number") => "float".to_string(),
        Some("string") => "str".to_string(),
        Some("array") => {
            let item_ty = schema.get("items").filter(|s| s.is_object()).map(py_type).unwrap_or_else(|| "Any".to_string());
            format!("list[{item_ty}]")
        }
        Some("object") => "dict".to_string(),
        _ => "Any".to_string(),
    }
}

fn format_parameter_type(schema: &Value, is_required: bool) -> String {
    let ty = py_type(schema);
    if is_required {
        ty
    } else {
        format!("{ty} | None = None")
    }
}

fn generate_docstring(tool: &Tool) -> String {
    let mut doc = String::new();
    if let Some(description) = tool.description() {
        doc.push_str(description);
        doc.push('\n');
    }
    let properties = tool.properties();
    if !properties.is_empty() {
        doc.push_str("\n  Args:\n");
        for (name, schema) in &properties {
            doc.push_str(&format!("    {name}"));
            if let Some(description) = schema.get("description").and_then(|v| v.as_str()) {
                doc.push_str(&format!(": {description}\n"));
            } else {
                doc.push('\n');
            }
        }
    }
    doc
}

/// Renders `tool` as a Python function signature with a docstring
/// (`spec.md` §4.H.2), e.g.:
///
/// ```text
/// def get_weather(
///     location: str,
/// ) -> dict:
///   """Gets the weather.
///
///   Args:
///     location: City name.
///   """
/// ```
pub fn format_tool_signature(tool: &Tool) -> String {
    let required = tool.required();
    let properties = tool.properties();

    let mut signature = format!("def {}(", tool.name);
    if !properties.is_empty() {
        signature.push('\n');
        for (name, schema) in &properties {
            let is_required = required.contains(name);
            signature.push_str(&format!("    {name}: {},\n", format_parameter_type(schema, is_required)));
        }
    }
    signature.push_str(") -> dict:\n");

    let docstring = generate_docstring(tool);
    if !docstring.is_empty() {
        signature.push_str("  \"\"\"");
        signature.push_str(&docstring);
        signature.push_str("  \"\"\"\n");
    }
    signature
}
