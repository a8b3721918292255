//! `LlmMetadata` wire message.
//!
//! Hand-derived against `prost::Message` rather than generated by
//! `prost-build`/`protoc`, since this workspace never invokes an external
//! code generator. Field set covers what `get_llm_metadata` exposes;
//! extend here if a consumer needs more of the original schema.

/// A single named token, e.g. the BOS token for a model's chat template.
#[derive(Clone, PartialEq, Eq, ::prost::Message)]
pub struct TokenInfo {
    #[prost(int32, tag = "1")]
    pub token_id: i32,
    #[prost(string, tag = "2")]
    pub token_str: String,
}

/// Top-level metadata describing how to prompt and decode a model.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LlmMetadata {
    #[prost(message, optional, tag = "1")]
    pub start_token: Option<TokenInfo>,
    #[prost(message, repeated, tag = "2")]
    pub stop_tokens: Vec<TokenInfo>,
    #[prost(string, tag = "3")]
    pub prompt_template: String,
}
