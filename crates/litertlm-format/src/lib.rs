//! On-disk data model for the LiteRTLM container format.
//!
//! See `spec.md` §3.1 (Archive) and §6.1 (bit-exact on-disk layout). This
//! crate owns the shared vocabulary (`DataType`, `ModelKind`,
//! `MetadataValue`, `SectionRecord`, `Header`) and the FlatBuffers header
//! codec (`codec` module); `litertlm-writer` and `litertlm-reader` build
//! on top of it.

#![forbid(unsafe_code)]

pub mod codec;

use std::collections::BTreeMap;

/// Archive magic, written at offset 0, 8 ASCII bytes with no terminator.
pub const MAGIC: &[u8; 8] = b"LITERTLM";

/// Alignment unit separating the header from section payloads, and each
/// section payload from the next.
pub const BLOCK_SIZE: u64 = 16_384;

/// The only major version this crate can read or write.
pub const SUPPORTED_MAJOR_VERSION: u32 = 1;

/// Round `offset` up to the next multiple of [`BLOCK_SIZE`].
pub const fn align_to_block(offset: u64) -> u64 {
    let rem = offset % BLOCK_SIZE;
    if rem == 0 {
        offset
    } else {
        offset + (BLOCK_SIZE - rem)
    }
}

/// The kind of payload a section carries.
///
/// Maps 1:1 onto the wire-level `AnySectionDataType` FlatBuffers enum
/// (`spec.md` §6.1); `AnySectionDataType::NONE` and `::Deprecated` have no
/// `DataType` counterpart and are rejected by the reader as
/// `InvalidFormat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DataType {
    TFLiteModel,
    SentencePieceTokenizer,
    HuggingFaceTokenizerZlib,
    LlmMetadataProto,
    GenericBinaryData,
}

impl DataType {
    /// The wire-level `AnySectionDataType` discriminant.
    pub fn wire_code(self) -> i8 {
        match self {
            DataType::TFLiteModel => 2,
            DataType::SentencePieceTokenizer => 3,
            DataType::LlmMetadataProto => 4,
            DataType::GenericBinaryData => 5,
            DataType::HuggingFaceTokenizerZlib => 6,
        }
    }

    /// Parse a wire-level `AnySectionDataType` discriminant. `0` (NONE)
    /// and `1` (Deprecated) have no corresponding `DataType` and return
    /// `None`.
    pub fn from_wire_code(code: i8) -> Option<Self> {
        match code {
            2 => Some(DataType::TFLiteModel),
            3 => Some(DataType::SentencePieceTokenizer),
            4 => Some(DataType::LlmMetadataProto),
            5 => Some(DataType::GenericBinaryData),
            6 => Some(DataType::HuggingFaceTokenizerZlib),
            _ => None,
        }
    }

    /// The writer-CLI metadata name conventionally attached to a section
    /// of this type (`spec.md` §6.3).
    pub fn default_metadata_name(self) -> &'static str {
        match self {
            DataType::TFLiteModel => "tflite",
            DataType::SentencePieceTokenizer => "tokenizer",
            DataType::HuggingFaceTokenizerZlib => "hf_tokenizer_zlib",
            DataType::LlmMetadataProto => "llm_metadata",
            DataType::GenericBinaryData => "binary_data",
        }
    }
}

/// Which TFLite sub-model a `TFLiteModel` section holds.
///
/// Only meaningful when the section's `data_type` is `TFLiteModel`;
/// resolved by the reader from the section metadata's `"name"` string key
/// (`spec.md` §4.D step 5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ModelKind {
    PrefillDecode,
    Embedder,
    VisionEncoder,
    VisionAdapter,
    AudioEncoder,
    AudioAdapter,
}

impl ModelKind {
    /// Resolve a model kind from the section metadata's `"name"` string
    /// value. Absent or `"none"` resolves to `PrefillDecode`, matching
    /// the original implementation's default.
    pub fn from_name(name: Option<&str>) -> ModelKind {
        match name {
            None | Some("none") => ModelKind::PrefillDecode,
            Some("tf_lite_prefill_decode") => ModelKind::PrefillDecode,
            Some("tf_lite_embedder") => ModelKind::Embedder,
            Some("tf_lite_vision_encoder") => ModelKind::VisionEncoder,
            Some("tf_lite_vision_adapter") => ModelKind::VisionAdapter,
            Some("tf_lite_audio_encoder") => ModelKind::AudioEncoder,
            Some("tf_lite_audio_adapter") => ModelKind::AudioAdapter,
            Some(_) => ModelKind::PrefillDecode,
        }
    }

    /// The canonical `"name"` string this model kind is written under.
    pub fn metadata_name(self) -> &'static str {
        match self {
            ModelKind::PrefillDecode => "tf_lite_prefill_decode",
            ModelKind::Embedder => "tf_lite_embedder",
            ModelKind::VisionEncoder => "tf_lite_vision_encoder",
            ModelKind::VisionAdapter => "tf_lite_vision_adapter",
            ModelKind::AudioEncoder => "tf_lite_audio_encoder",
            ModelKind::AudioAdapter => "tf_lite_audio_adapter",
        }
    }
}

/// A single typed metadata value (`spec.md` §3.1).
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    Int32(i32),
    Int64(i64),
    UInt32(u32),
    UInt64(u64),
    Float32(f32),
    Bool(bool),
    String(String),
}

/// An ordered key/value metadata list, preserving insertion order as
/// required by §3.1 ("ordered mapping from string key to typed value").
pub type MetadataList = Vec<(String, MetadataValue)>;

/// One section's metadata record, as it appears in the parsed header
/// (`spec.md` §3.1). The payload bytes themselves live outside the
/// header, at `[begin_offset, end_offset)` in the containing file.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionRecord {
    pub data_type: DataType,
    pub model_kind: ModelKind,
    pub begin_offset: u64,
    pub end_offset: u64,
    pub items: MetadataList,
}

impl SectionRecord {
    pub fn len(&self) -> u64 {
        self.end_offset - self.begin_offset
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up a string-valued metadata key.
    pub fn string_item(&self, key: &str) -> Option<&str> {
        self.items.iter().find(|(k, _)| k == key).and_then(|(_, v)| match v {
            MetadataValue::String(s) => Some(s.as_str()),
            _ => None,
        })
    }
}

/// The parsed archive header: the three version integers, the global
/// metadata list, and every section's record in on-disk order.
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub major_version: u32,
    pub minor_version: u32,
    pub patch_version: u32,
    pub system_metadata: MetadataList,
    pub sections: Vec<SectionRecord>,
}

impl Header {
    /// Build an index from `(data_type, model_kind)` to the *first*
    /// section index carrying that key, per the "first match" duplicate
    /// resolution rule in §3.1. Returns the set of keys that had more
    /// than one section, so callers can surface the recoverable warning
    /// the spec calls for.
    pub fn index_sections(&self) -> (BTreeMap<(DataType, ModelKind), usize>, Vec<(DataType, ModelKind)>) {
        let mut index = BTreeMap::new();
        let mut duplicates = Vec::new();
        for (i, section) in self.sections.iter().enumerate() {
            let key = (section.data_type, section.model_kind);
            if index.contains_key(&key) {
                duplicates.push(key);
            } else {
                index.insert(key, i);
            }
        }
        (index, duplicates)
    }
}
