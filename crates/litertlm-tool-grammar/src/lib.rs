//! Translates a tool-declaration list into the textual representations
//! a session needs (`spec.md` §4.H): the FC-format string rendered
//! inside tool-call regions (§4.H.1), the Python-signature form used in
//! prompt templates (§4.H.2), and the Lark grammar text that constrains
//! model output (§4.H.3).
//!
//! Grounded in `original_source`'s `fc_tool_format_utils.{h,cc}` and
//! `python_tool_format_utils.{h,cc}` for §4.H.1/§4.H.2; the Lark text in
//! `lark_text.rs` mirrors the grammar `litertlm-constraint::lark` builds
//! directly as a `GrammarNode` tree, kept independent per that module's
//! doc comment.

#![forbid(unsafe_code)]

pub mod fc_format;
pub mod lark_text;
pub mod python_format;
pub mod tool;

pub use lark_text::{ControlTokens, Mode};
pub use tool::{canonicalize, tool_names, Tool};
