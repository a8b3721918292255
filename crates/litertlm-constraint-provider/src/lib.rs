//! Resolves a [`ConstraintArg`] configuration discriminant (`spec.md`
//! §4.G) into a ready-to-use [`litertlm_constraint::Constraint`].
//!
//! Grounded in `original_source`'s `constraint_provider_factory.{h,cc}`,
//! `constraint_provider_config.h`, and `llg_constraint_provider.{h,cc}`.
//! The C++ `LlgConstraintProvider` builds a tokenizer adapter once
//! (`token_lens_`/`token_bytes_`, flattened and re-sliced per token) and
//! reuses it across every `CreateConstraint` call; [`VocabLayout`] plays
//! the same role here.

#![forbid(unsafe_code)]

use litertlm_constraint::engine::{CompiledGrammar, GrammarEngine};
use litertlm_constraint::{lark, Constraint, Engine};
use litertlm_error::{Error, Result};
use litertlm_tool_grammar::Tool;

/// Anything that can enumerate a vocabulary's tokens as raw bytes.
/// Mirrors the `TokenLens`/`TokenBytes`/`TokenizeFn` triple the C++
/// provider takes from its host tokenizer.
pub trait Tokenizer {
    /// Number of tokens in the vocabulary.
    fn vocab_size(&self) -> u32;

    /// The raw byte encoding of `token_id`, e.g. `"hello"` for a
    /// whole-word token or a single UTF-8 continuation byte for a
    /// byte-fallback token. Must return `&[]` for an out-of-range id
    /// rather than panicking, matching the C++ adapter's bounds-checked
    /// `token_bytes(id)` accessor.
    fn token_bytes(&self, token_id: u32) -> &[u8];
}

/// A flattened, owned copy of a [`Tokenizer`]'s vocabulary, built once
/// and shared across every [`Constraint`] the factory produces — the
/// same amortization `llg_constraint_provider.cc`'s `token_lens_`/
/// `token_bytes_` fields perform against a (possibly FFI) tokenizer.
#[derive(Clone)]
pub struct VocabLayout {
    token_bytes: Vec<Vec<u8>>,
}

impl VocabLayout {
    pub fn from_tokenizer(tokenizer: &dyn Tokenizer) -> Self {
        let vocab_size = tokenizer.vocab_size();
        let token_bytes = (0..vocab_size).map(|id| tokenizer.token_bytes(id).to_vec()).collect();
        VocabLayout { token_bytes }
    }

    pub fn vocab_size(&self) -> u32 {
        self.token_bytes.len() as u32
    }

    fn clone_bytes(&self) -> Vec<Vec<u8>> {
        self.token_bytes.clone()
    }
}

/// Infers the end-of-sequence token id the way `constraint_provider_
/// factory.cc`'s `CreateConstraintProvider` does: prefer an explicit
/// `eos_id` override, otherwise scan `stop_token_ids` in order and take
/// the first single-token stop sequence's id. Fails with
/// `InvalidArgument` (matching the C++ `absl::InvalidArgumentError`)
/// when neither is present.
pub fn resolve_eos_id(eos_id: Option<u32>, stop_token_ids: &[Vec<u32>]) -> Result<u32> {
    if let Some(id) = eos_id {
        return Ok(id);
    }
    for stop_sequence in stop_token_ids {
        if stop_sequence.len() == 1 {
            return Ok(stop_sequence[0]);
        }
    }
    Err(Error::invalid_argument(
        "eos_id wasn't set and no single-token stop sequence was found in stop_token_ids",
    ))
}

/// A compiled grammar source for the `Lark`/`Internal` configuration
/// kind (`spec.md` §4.G), built directly as a [`GrammarNode`] rather
/// than through the textual Lark the `External` kind expects.
///
/// [`GrammarNode`]: litertlm_constraint::grammar::GrammarNode
#[derive(Debug, Clone)]
pub struct LarkSpec {
    pub mode: lark::Mode,
    pub tool_names: Vec<String>,
    pub control: lark::ControlTokens,
}

/// The grammar source half of a [`ConstraintArg::Grammar`] entry.
/// `spec.md` §4.G names `Regex | JsonSchema | Lark | Internal`; this
/// workspace collapses `Lark` and `Internal` into one variant (see
/// `DESIGN.md`'s Open Question resolution) since no general-purpose
/// Lark-text parser is in scope here — the textual grammar a host would
/// hand to an external Lark engine is still available separately via
/// `litertlm_tool_grammar::lark_text::render`.
#[derive(Debug, Clone)]
pub enum GrammarSpec {
    Regex(String),
    JsonSchema(serde_json::Value),
    Lark(LarkSpec),
}

/// The configuration discriminant `spec.md` §4.G passes to the factory,
/// mirroring the C++ `ConstraintArg` tagged union in
/// `constraint_provider_config.h`.
#[derive(Debug, Clone)]
pub enum ConstraintArg {
    PassThrough,
    FixedSequence(Vec<u32>),
    Grammar(GrammarSpec),
}

/// Builds [`Constraint`]s against one fixed [`VocabLayout`] and eos id,
/// the way a single `LlgConstraintProvider` instance is constructed once
/// per tokenizer and reused across a session's constraint requests.
pub struct ConstraintProviderFactory {
    vocab: VocabLayout,
    eos_token_id: u32,
}

impl ConstraintProviderFactory {
    /// `eos_id` is an explicit override (`spec.md` §4.G's "optional EOS
    /// override"); `stop_token_ids` is the ordered list of stop-token
    /// sequences the session was configured with. When `eos_id` is
    /// `None`, the first single-token entry in `stop_token_ids` is used
    /// instead (see [`resolve_eos_id`]).
    pub fn new(tokenizer: &dyn Tokenizer, eos_id: Option<u32>, stop_token_ids: &[Vec<u32>]) -> Result<Self> {
        let eos_token_id = resolve_eos_id(eos_id, stop_token_ids)?;
        Ok(ConstraintProviderFactory { vocab: VocabLayout::from_tokenizer(tokenizer), eos_token_id })
    }

    pub fn vocab_size(&self) -> u32 {
        self.vocab.vocab_size()
    }

    pub fn eos_token_id(&self) -> u32 {
        self.eos_token_id
    }

    /// Dispatches on `arg`'s discriminant, following
    /// `constraint_provider_factory.cc`'s `CreateConstraint` switch.
    pub fn create_constraint(&self, arg: &ConstraintArg) -> Result<Constraint> {
        let engine = match arg {
            ConstraintArg::PassThrough => Engine::PassThrough(litertlm_constraint::PassThroughEngine::new(self.vocab.vocab_size())),
            ConstraintArg::FixedSequence(tokens) => {
                for &token in tokens {
                    if token >= self.vocab.vocab_size() {
                        return Err(Error::invalid_argument(format!("fixed-sequence token {token} is out of range for a vocabulary of size {}", self.vocab.vocab_size())));
                    }
                }
                Engine::FixedSequence(litertlm_constraint::FixedSequenceEngine::new(tokens.clone(), self.vocab.vocab_size()))
            }
            ConstraintArg::Grammar(spec) => {
                let grammar = match spec {
                    GrammarSpec::Regex(pattern) => CompiledGrammar::from_pattern(pattern)?,
                    GrammarSpec::JsonSchema(schema) => {
                        let node = litertlm_constraint::json_schema::compile(schema)?;
                        CompiledGrammar::from_grammar_node(&node)
                    }
                    GrammarSpec::Lark(lark_spec) => {
                        let node = lark::compile(lark_spec.mode, &lark_spec.tool_names, &lark_spec.control)?;
                        CompiledGrammar::from_grammar_node(&node)
                    }
                };
                Engine::Grammar(GrammarEngine::new(grammar, self.vocab.clone_bytes()))
            }
        };
        Ok(Constraint::new(engine, self.eos_token_id))
    }
}

/// Convenience bridging canonicalized tool declarations straight to a
/// `Lark`-mode [`GrammarSpec`], so a caller holding `litertlm_tool_
/// grammar::Tool`s doesn't need to extract names itself.
pub fn grammar_spec_from_tools(mode: lark::Mode, tools: &[Tool], control: lark::ControlTokens) -> GrammarSpec {
    GrammarSpec::Lark(LarkSpec { mode, tool_names: litertlm_tool_grammar::tool_names(tools), control })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedVocab {
        tokens: Vec<Vec<u8>>,
    }

    impl Tokenizer for FixedVocab {
        fn vocab_size(&self) -> u32 {
            self.tokens.len() as u32
        }

        fn token_bytes(&self, token_id: u32) -> &[u8] {
            self.tokens.get(token_id as usize).map(|v| v.as_slice()).unwrap_or(&[])
        }
    }

    fn vocab() -> FixedVocab {
        FixedVocab {
            tokens: vec![b"<pad>".to_vec(), b"</s>".to_vec(), b"a".to_vec(), b"b".to_vec(), b"\"".to_vec()],
        }
    }

    #[test]
    fn resolve_eos_id_prefers_the_explicit_override() {
        assert_eq!(resolve_eos_id(Some(0), &[vec![1]]).unwrap(), 0);
    }

    #[test]
    fn resolve_eos_id_falls_back_to_the_first_single_token_stop_sequence() {
        assert_eq!(resolve_eos_id(None, &[vec![2, 3], vec![1], vec![4]]).unwrap(), 1);
    }

    #[test]
    fn resolve_eos_id_errors_when_nothing_matches() {
        let err = resolve_eos_id(None, &[vec![2, 3], vec![4, 5]]).unwrap_err();
        assert_eq!(err.code(), "invalid_argument");
    }

    #[test]
    fn resolve_eos_id_errors_on_empty_stop_sequences() {
        let err = resolve_eos_id(None, &[]).unwrap_err();
        assert_eq!(err.code(), "invalid_argument");
    }

    #[test]
    fn factory_builds_a_pass_through_constraint() {
        let factory = ConstraintProviderFactory::new(&vocab(), Some(1), &[]).unwrap();
        let constraint = factory.create_constraint(&ConstraintArg::PassThrough).unwrap();
        let s0 = constraint.start();
        assert!(!constraint.is_terminal(s0));
        assert_eq!(constraint.eos_token_id(), 1);
    }

    #[test]
    fn factory_builds_a_fixed_sequence_constraint() {
        let factory = ConstraintProviderFactory::new(&vocab(), Some(1), &[]).unwrap();
        let constraint = factory.create_constraint(&ConstraintArg::FixedSequence(vec![2, 3])).unwrap();
        let s0 = constraint.start();
        let s1 = constraint.compute_next(s0, 2).unwrap();
        let s2 = constraint.compute_next(s1, 3).unwrap();
        assert!(constraint.is_terminal(s2));
    }

    #[test]
    fn factory_rejects_out_of_range_fixed_sequence_tokens() {
        let factory = ConstraintProviderFactory::new(&vocab(), Some(1), &[]).unwrap();
        let err = factory.create_constraint(&ConstraintArg::FixedSequence(vec![99])).unwrap_err();
        assert_eq!(err.code(), "invalid_argument");
    }

    #[test]
    fn factory_builds_a_regex_grammar_constraint() {
        let factory = ConstraintProviderFactory::new(&vocab(), Some(1), &[]).unwrap();
        let constraint = factory.create_constraint(&ConstraintArg::Grammar(GrammarSpec::Regex("a".to_string()))).unwrap();
        let s0 = constraint.start();
        assert!(constraint.compute_bitmap(s0).get(2));
        assert!(!constraint.compute_bitmap(s0).get(3));
    }

    #[test]
    fn factory_builds_a_json_schema_grammar_constraint() {
        let factory = ConstraintProviderFactory::new(&vocab(), Some(1), &[]).unwrap();
        let schema = serde_json::json!({"type": "string"});
        let constraint = factory.create_constraint(&ConstraintArg::Grammar(GrammarSpec::JsonSchema(schema))).unwrap();
        let s0 = constraint.start();
        assert!(constraint.compute_bitmap(s0).get(4));
    }

    #[test]
    fn grammar_spec_from_tools_collects_names_in_declaration_order() {
        let tools = litertlm_tool_grammar::canonicalize(&serde_json::json!([{"name": "get_weather"}])).unwrap();
        let spec = grammar_spec_from_tools(lark::Mode::FunctionCallsOnly, &tools, lark::ControlTokens::default());
        match spec {
            GrammarSpec::Lark(lark_spec) => assert_eq!(lark_spec.tool_names, vec!["get_weather".to_string()]),
            _ => panic!("expected a Lark grammar spec"),
        }
    }

    #[test]
    fn factory_builds_a_lark_function_call_constraint() {
        let factory = ConstraintProviderFactory::new(&vocab(), Some(1), &[]).unwrap();
        let spec = GrammarSpec::Lark(LarkSpec {
            mode: lark::Mode::FunctionCallsOnly,
            tool_names: vec!["a".to_string()],
            control: lark::ControlTokens::default(),
        });
        let constraint = factory.create_constraint(&ConstraintArg::Grammar(spec)).unwrap();
        assert!(!constraint.is_terminal(constraint.start()));
    }
}
