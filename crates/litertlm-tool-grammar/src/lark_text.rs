//! Renders the §4.H.3 Lark grammar fragment as grammar *text*, for hosts
//! that link an external Lark-based engine rather than this workspace's
//! own `litertlm-constraint::lark` (which builds the same grammar
//! directly as an executable `GrammarNode`, never going through text).
//! The two are siblings describing the same language; see
//! `SPEC_FULL.md` §4.H and that module's doc comment for why they don't
//! share an implementation.

use litertlm_error::{Error, Result};

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

/// Escapes a literal string for use inside a Lark `/regex/` terminal.
fn regex_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if "\\.^$|?*+()[]{}".contains(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Quotes a literal string for use inside a Lark grammar rule body.
fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

fn json_value_rules(control: &ControlTokens) -> String {
    format!(
        "value: lark_string | number | \"true\" | \"false\" | \"null\" | object | array\n\
         lark_string: {open} /[^{close_class}]*/ {close}\n\
         number: /-?[0-9]+(\\.[0-9]+)?/\n\
         object: \"{{\" [pair (\",\" pair)*] \"}}\"\n\
         pair: IDENTIFIER \":\" value\n\
         array: \"[\" [value (\",\" value)*] \"]\"\n\
         IDENTIFIER: /[a-zA-Z_][a-zA-Z0-9_]*/\n\
         %ignore /[ \\t\\n\\r]+/\n",
        open = quote(&control.open_quote),
        close = quote(&control.close_quote),
        close_class = regex_escape(&control.close_quote),
    )
}

fn function_block_rules(tool_names: &[String], control: &ControlTokens) -> String {
    let mut seen = std::collections::HashSet::new();
    let union: Vec<String> = tool_names
        .iter()
        .filter(|name| seen.insert(name.as_str()))
        .map(|name| quote(name))
        .collect();
    format!(
        "function_block: (\"{fence_start}\" \"call:\" TOOL_UNION object \"{fence_end}\")+ \"{resp_start}\"\n\
         TOOL_UNION: {union}\n\
         {value_rules}",
        fence_start = control.code_fence_start,
        fence_end = control.code_fence_end,
        resp_start = control.function_resp_start,
        union = union.join(" | "),
        value_rules = json_value_rules(control),
    )
}

fn safe_text_rule(control: &ControlTokens) -> String {
    format!(
        "SAFE_TEXT: /(.|\\n)*/ & ~/.*{}.*/ \n",
        regex_escape(&control.code_fence_start)
    )
}

/// Renders the Lark grammar text for `mode` over `tool_names`
/// (`spec.md` §4.H.3's mode-composition table).
pub fn render(mode: Mode, tool_names: &[String], control: &ControlTokens) -> Result<String> {
    match mode {
        Mode::TextOnly => Ok(format!("start: SAFE_TEXT\n{}", safe_text_rule(control))),
        Mode::FunctionCallsOnly => {
            if tool_names.is_empty() {
                return Err(Error::invalid_argument("FunctionCallsOnly mode requires at least one declared tool"));
            }
            Ok(format!("start: function_block\n{}", function_block_rules(tool_names, control)))
        }
        Mode::TextAndOrFunctionCalls => {
            if tool_names.is_empty() {
                return render(Mode::TextOnly, tool_names, control);
            }
            Ok(format!(
                "start: SAFE_TEXT? function_block_opt\n\
                 function_block_opt: function_block |\n\
                 {safe_text}{function_block}",
                safe_text = safe_text_rule(control),
                function_block = function_block_rules(tool_names, control),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_only_grammar_has_a_single_safe_text_start_rule() {
        let grammar = render(Mode::TextOnly, &[], &ControlTokens::default()).unwrap();
        assert!(grammar.starts_with("start: SAFE_TEXT"));
        assert!(grammar.contains("SAFE_TEXT:"));
    }

    #[test]
    fn function_calls_only_requires_at_least_one_tool() {
        let err = render(Mode::FunctionCallsOnly, &[], &ControlTokens::default()).unwrap_err();
        assert_eq!(err.code(), "invalid_argument");
    }

    #[test]
    fn function_calls_only_renders_the_tool_union() {
        let grammar = render(
            Mode::FunctionCallsOnly,
            &["get_weather".to_string(), "get_time".to_string()],
            &ControlTokens::default(),
        )
        .unwrap();
        assert!(grammar.contains("TOOL_UNION: \"get_weather\" | \"get_time\""));
        assert!(grammar.contains("<start_function_call>"));
    }

    #[test]
    fn text_and_or_function_calls_collapses_to_text_only_with_no_tools() {
        let grammar = render(Mode::TextAndOrFunctionCalls, &[], &ControlTokens::default()).unwrap();
        assert_eq!(grammar, render(Mode::TextOnly, &[], &ControlTokens::default()).unwrap());
    }

    #[test]
    fn tool_union_deduplicates_by_first_occurrence() {
        let grammar = render(
            Mode::FunctionCallsOnly,
            &["a".to_string(), "b".to_string(), "a".to_string()],
            &ControlTokens::default(),
        )
        .unwrap();
        assert!(grammar.contains("TOOL_UNION: \"a\" | \"b\""));
    }
}
