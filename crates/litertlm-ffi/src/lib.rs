//! The stable C ABI bridge from `spec.md` §6.4.
//!
//! Grounded in `examples/other_examples`'s `llguidance` FFI bridge for
//! the ownership and error-reporting shape (opaque handles crossing via
//! `Box::into_raw`/`Box::from_raw`, a per-handle `last_error` slot,
//! `catch_unwind` wrapping every entry point) and in `original_source`'s
//! `llg_constraint_provider.{h,cc}` for what a real binding populates a
//! provider's vocabulary from.
//!
//! `unsafe` is confined to this crate's boundary functions, which accept
//! raw pointers by construction; everything they call into is safe Rust
//! — the same `#![forbid(unsafe_code)]`-except-the-shim split the
//! workspace's ambient convention (mirrored from `tokmd-ffi-envelope`'s
//! header) asks every crate to use.

#![deny(unsafe_op_in_unsafe_fn)]

use std::ffi::{c_char, CStr};
use std::panic::{self, AssertUnwindSafe};

use byteorder::{ByteOrder, LittleEndian};

use litertlm_constraint::lark::{ControlTokens, Mode};
use litertlm_constraint::State;
use litertlm_constraint_provider::{grammar_spec_from_tools, ConstraintArg, ConstraintProviderFactory, Tokenizer};
use litertlm_error::{Error, Result};

/// This workspace's own vocabulary wire format, used in place of the
/// real protobuf `SentencePieceModel` a production binding would parse:
/// a sequence of `[u32 length (LE)][length bytes]` entries, one per
/// vocabulary token in id order, with no trailing padding. A host that
/// owns a real SentencePiece model is expected to re-encode its piece
/// list into this shape before calling [`litertlm_create`].
pub fn parse_vocab_blob(bytes: &[u8]) -> Result<Vec<Vec<u8>>> {
    let mut tokens = Vec::new();
    let mut offset = 0usize;
    while offset < bytes.len() {
        if bytes.len() - offset < 4 {
            return Err(Error::invalid_format("vocab blob truncated inside a length prefix"));
        }
        let len = LittleEndian::read_u32(&bytes[offset..offset + 4]) as usize;
        offset += 4;
        if bytes.len() - offset < len {
            return Err(Error::invalid_format("vocab blob truncated inside a token's bytes"));
        }
        tokens.push(bytes[offset..offset + len].to_vec());
        offset += len;
    }
    Ok(tokens)
}

struct StaticVocabTokenizer {
    tokens: Vec<Vec<u8>>,
}

impl Tokenizer for StaticVocabTokenizer {
    fn vocab_size(&self) -> u32 {
        self.tokens.len() as u32
    }

    fn token_bytes(&self, token_id: u32) -> &[u8] {
        self.tokens.get(token_id as usize).map(|v| v.as_slice()).unwrap_or(&[])
    }
}

/// The opaque `Provider*` handle: a constraint factory plus the
/// stop-token-sequence lists supplied at construction.
pub struct Provider {
    factory: ConstraintProviderFactory,
    stop_sequences: Vec<Vec<u32>>,
    last_error: Option<String>,
}

/// The opaque `Constraint*` handle: a compiled constraint plus its
/// current walk state.
pub struct Constraint {
    constraint: litertlm_constraint::Constraint,
    state: State,
    last_error: Option<String>,
}

/// Mirrors `spec.md` §4.H.3's mode-composition table; `#[repr(u32)]` so
/// hosts can pass it by value across the ABI.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LitertlmMode {
    TextOnly = 0,
    TextAndOrFunctionCalls = 1,
    FunctionCallsOnly = 2,
}

impl From<LitertlmMode> for Mode {
    fn from(mode: LitertlmMode) -> Self {
        match mode {
            LitertlmMode::TextOnly => Mode::TextOnly,
            LitertlmMode::TextAndOrFunctionCalls => Mode::TextAndOrFunctionCalls,
            LitertlmMode::FunctionCallsOnly => Mode::FunctionCallsOnly,
        }
    }
}

/// Carries the five control-token strings and the mode enum (`spec.md`
/// §6.4). A null control-token field falls back to [`ControlTokens::default`]'s
/// spelling for that field.
#[repr(C)]
pub struct LitertlmOptions {
    pub mode: LitertlmMode,
    pub code_fence_start: *const c_char,
    pub code_fence_end: *const c_char,
    pub open_quote: *const c_char,
    pub close_quote: *const c_char,
    pub function_resp_start: *const c_char,
}

unsafe fn opt_c_str(ptr: *const c_char, fallback: &str) -> Result<String> {
    if ptr.is_null() {
        return Ok(fallback.to_string());
    }
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map(str::to_string)
        .map_err(|_| Error::invalid_argument("control token string is not valid UTF-8"))
}

unsafe fn control_tokens_from_options(options: &LitertlmOptions) -> Result<ControlTokens> {
    let default = ControlTokens::default();
    Ok(ControlTokens {
        code_fence_start: unsafe { opt_c_str(options.code_fence_start, &default.code_fence_start) }?,
        code_fence_end: unsafe { opt_c_str(options.code_fence_end, &default.code_fence_end) }?,
        open_quote: unsafe { opt_c_str(options.open_quote, &default.open_quote) }?,
        close_quote: unsafe { opt_c_str(options.close_quote, &default.close_quote) }?,
        function_resp_start: unsafe { opt_c_str(options.function_resp_start, &default.function_resp_start) }?,
    })
}

unsafe fn read_stop_sequences(stop_token_ids: *const u32, stop_lengths: *const u32, num_lists: usize) -> Vec<Vec<u32>> {
    if num_lists == 0 || stop_token_ids.is_null() || stop_lengths.is_null() {
        return Vec::new();
    }
    let lengths = unsafe { std::slice::from_raw_parts(stop_lengths, num_lists) };
    let total: usize = lengths.iter().map(|&l| l as usize).sum();
    let flat = unsafe { std::slice::from_raw_parts(stop_token_ids, total) };
    let mut out = Vec::with_capacity(num_lists);
    let mut offset = 0usize;
    for &len in lengths {
        let len = len as usize;
        out.push(flat[offset..offset + len].to_vec());
        offset += len;
    }
    out
}

fn catch_ffi<T>(label: &str, body: impl FnOnce() -> Result<T>) -> Option<T> {
    match panic::catch_unwind(AssertUnwindSafe(body)) {
        Ok(Ok(value)) => Some(value),
        Ok(Err(err)) => {
            tracing::warn!(call = label, error = %err, "ffi call failed");
            None
        }
        Err(_) => {
            tracing::error!(call = label, "ffi call panicked");
            None
        }
    }
}

/// Builds a [`Provider`] from a vocabulary blob (see [`parse_vocab_blob`])
/// and an ordered list of stop-token sequences (`stop_token_ids`/
/// `stop_lengths`, flattened the way `token_lens`/`token_bytes` are in
/// `original_source`'s tokenizer-adapter construction). No `eos_id`
/// override is exposed over this ABI, so the factory's eos id is always
/// inferred from `stop_token_ids` (`spec.md` §4.G, §8.1): the first
/// single-token sequence in order. Returns null, including when no
/// single-token stop sequence is present to infer an eos id from, on
/// failure.
///
/// # Safety
/// `serialized_sp_model` must point to `len` readable bytes.
/// `stop_token_ids` must point to the flattened concatenation of
/// `num_lists` stop-token sequences whose individual lengths are given
/// by the `num_lists` `u32`s at `stop_lengths`; both may be null iff
/// `num_lists` is `0`.
#[no_mangle]
pub unsafe extern "C" fn litertlm_create(
    serialized_sp_model: *const u8,
    len: usize,
    stop_token_ids: *const u32,
    stop_lengths: *const u32,
    num_lists: usize,
) -> *mut Provider {
    let result = catch_ffi("litertlm_create", || {
        if serialized_sp_model.is_null() {
            return Err(Error::invalid_argument("serialized_sp_model must not be null"));
        }
        let blob = unsafe { std::slice::from_raw_parts(serialized_sp_model, len) };
        let tokens = parse_vocab_blob(blob)?;
        let stop_sequences = unsafe { read_stop_sequences(stop_token_ids, stop_lengths, num_lists) };
        let tokenizer = StaticVocabTokenizer { tokens };
        let factory = ConstraintProviderFactory::new(&tokenizer, None, &stop_sequences)?;
        Ok(Provider { factory, stop_sequences, last_error: None })
    });
    match result {
        Some(provider) => Box::into_raw(Box::new(provider)),
        None => std::ptr::null_mut(),
    }
}

/// Builds a [`Constraint`] constraining output to a tool call over the
/// canonicalized JSON tool declarations in `json_tools`. Returns null on
/// failure; call [`litertlm_provider_last_error`] to see why.
///
/// # Safety
/// `provider` must be a live pointer returned by [`litertlm_create`].
/// `json_tools` must be a NUL-terminated, valid-UTF-8 C string. `options`
/// must point to a live `LitertlmOptions`, whose own string fields (if
/// non-null) must each be NUL-terminated valid UTF-8.
#[no_mangle]
pub unsafe extern "C" fn litertlm_create_constraint_from_tools(
    provider: *mut Provider,
    json_tools: *const c_char,
    options: *const LitertlmOptions,
) -> *mut Constraint {
    if provider.is_null() || json_tools.is_null() || options.is_null() {
        return std::ptr::null_mut();
    }
    let provider = unsafe { &mut *provider };
    let result = catch_ffi("litertlm_create_constraint_from_tools", || {
        let json_tools = unsafe { CStr::from_ptr(json_tools) }
            .to_str()
            .map_err(|_| Error::invalid_argument("json_tools is not valid UTF-8"))?;
        let tools_value: serde_json::Value =
            serde_json::from_str(json_tools).map_err(|e| Error::invalid_argument(format!("json_tools is not valid JSON: {e}")))?;
        let tools = litertlm_tool_grammar::canonicalize(&tools_value)?;
        let options = unsafe { &*options };
        let control = unsafe { control_tokens_from_options(options) }?;
        let spec = grammar_spec_from_tools(options.mode.into(), &tools, control);
        let constraint = provider.factory.create_constraint(&ConstraintArg::Grammar(spec))?;
        let state = constraint.start();
        Ok(Constraint { constraint, state, last_error: None })
    });
    match result {
        Some(constraint) => Box::into_raw(Box::new(constraint)),
        None => {
            provider.last_error = Some("failed to create constraint from tools".to_string());
            std::ptr::null_mut()
        }
    }
}

/// Frees a [`Constraint`] previously returned by
/// [`litertlm_create_constraint_from_tools`]. A null pointer is a no-op.
///
/// # Safety
/// `constraint`, if non-null, must be a pointer this crate returned and
/// must not have already been passed to this function.
#[no_mangle]
pub unsafe extern "C" fn litertlm_destroy_constraint(constraint: *mut Constraint) {
    if !constraint.is_null() {
        drop(unsafe { Box::from_raw(constraint) });
    }
}

/// Frees a [`Provider`] previously returned by [`litertlm_create`]. A
/// null pointer is a no-op.
///
/// # Safety
/// `provider`, if non-null, must be a pointer this crate returned and
/// must not have already been passed to this function.
#[no_mangle]
pub unsafe extern "C" fn litertlm_destroy_provider(provider: *mut Provider) {
    if !provider.is_null() {
        drop(unsafe { Box::from_raw(provider) });
    }
}

/// Returns `provider`'s stop-token-sequence count, as recorded at
/// [`litertlm_create`] time. Returns `0` for a null pointer.
///
/// # Safety
/// `provider`, if non-null, must be a live pointer returned by
/// [`litertlm_create`].
#[no_mangle]
pub unsafe extern "C" fn litertlm_provider_num_stop_sequences(provider: *const Provider) -> usize {
    if provider.is_null() {
        return 0;
    }
    unsafe { &*provider }.stop_sequences.len()
}

/// Returns a pointer to `provider`'s last recorded error message, or
/// null if none. The pointer is valid only until the next call on this
/// `provider`.
///
/// # Safety
/// `provider`, if non-null, must be a live pointer returned by
/// [`litertlm_create`].
#[no_mangle]
pub unsafe extern "C" fn litertlm_provider_last_error(provider: *const Provider) -> *const c_char {
    if provider.is_null() {
        return std::ptr::null();
    }
    match &unsafe { &*provider }.last_error {
        Some(msg) => msg.as_ptr() as *const c_char,
        None => std::ptr::null(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_vocab(tokens: &[&[u8]]) -> Vec<u8> {
        let mut blob = Vec::new();
        for token in tokens {
            let mut len = [0u8; 4];
            LittleEndian::write_u32(&mut len, token.len() as u32);
            blob.extend_from_slice(&len);
            blob.extend_from_slice(token);
        }
        blob
    }

    #[test]
    fn parse_vocab_blob_round_trips_a_few_tokens() {
        let blob = encode_vocab(&[b"<pad>", b"</s>", b"a"]);
        let tokens = parse_vocab_blob(&blob).unwrap();
        assert_eq!(tokens, vec![b"<pad>".to_vec(), b"</s>".to_vec(), b"a".to_vec()]);
    }

    #[test]
    fn parse_vocab_blob_rejects_a_truncated_length_prefix() {
        let err = parse_vocab_blob(&[1, 0, 0]).unwrap_err();
        assert_eq!(err.code(), "invalid_format");
    }

    #[test]
    fn create_and_destroy_round_trip_through_the_c_abi() {
        let blob = encode_vocab(&[b"<pad>", b"</s>", b"a", b"b", b"\""]);
        let stop_ids: Vec<u32> = vec![1];
        let stop_lens: Vec<u32> = vec![1];
        let provider = unsafe { litertlm_create(blob.as_ptr(), blob.len(), stop_ids.as_ptr(), stop_lens.as_ptr(), 1) };
        assert!(!provider.is_null());
        assert_eq!(unsafe { litertlm_provider_num_stop_sequences(provider) }, 1);
        unsafe { litertlm_destroy_provider(provider) };
    }

    #[test]
    fn create_constraint_from_tools_builds_a_usable_constraint() {
        let blob = encode_vocab(&[b"<pad>", b"</s>", b"get_weather", b"{", b"}"]);
        let stop_ids: Vec<u32> = vec![1];
        let stop_lens: Vec<u32> = vec![1];
        let provider = unsafe { litertlm_create(blob.as_ptr(), blob.len(), stop_ids.as_ptr(), stop_lens.as_ptr(), 1) };
        assert!(!provider.is_null());

        let json_tools = std::ffi::CString::new(r#"[{"name": "get_weather"}]"#).unwrap();
        let options = LitertlmOptions {
            mode: LitertlmMode::FunctionCallsOnly,
            code_fence_start: std::ptr::null(),
            code_fence_end: std::ptr::null(),
            open_quote: std::ptr::null(),
            close_quote: std::ptr::null(),
            function_resp_start: std::ptr::null(),
        };
        let constraint = unsafe { litertlm_create_constraint_from_tools(provider, json_tools.as_ptr(), &options) };
        assert!(!constraint.is_null());

        unsafe { litertlm_destroy_constraint(constraint) };
        unsafe { litertlm_destroy_provider(provider) };
    }

    #[test]
    fn create_rejects_a_malformed_vocab_blob() {
        let blob = vec![0xff, 0xff, 0xff, 0xff];
        let provider = unsafe { litertlm_create(blob.as_ptr(), blob.len(), std::ptr::null(), std::ptr::null(), 0) };
        assert!(provider.is_null());
    }

    #[test]
    fn create_rejects_a_vocab_with_no_eos_inferable_from_stop_sequences() {
        let blob = encode_vocab(&[b"<pad>", b"a", b"b"]);
        let provider = unsafe { litertlm_create(blob.as_ptr(), blob.len(), std::ptr::null(), std::ptr::null(), 0) };
        assert!(provider.is_null());
    }

    #[test]
    fn stop_sequences_are_recorded_from_the_flattened_arrays() {
        let blob = encode_vocab(&[b"<pad>", b"</s>", b"a"]);
        let stop_ids: Vec<u32> = vec![1, 2, 1];
        let stop_lens: Vec<u32> = vec![1, 2];
        let provider = unsafe { litertlm_create(blob.as_ptr(), blob.len(), stop_ids.as_ptr(), stop_lens.as_ptr(), 2) };
        assert!(!provider.is_null());
        assert_eq!(unsafe { litertlm_provider_num_stop_sequences(provider) }, 2);
        unsafe { litertlm_destroy_provider(provider) };
    }
}
