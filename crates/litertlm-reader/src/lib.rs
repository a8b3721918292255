//! Memory-mapped LiteRTLM container reader.
//!
//! See `spec.md` §4.D for the parse algorithm this module implements.

#![forbid(unsafe_code)]

pub mod proto;

use std::collections::BTreeMap;
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian};
use litertlm_error::{Error, Result};
use litertlm_format::codec::decode_header;
use litertlm_format::{DataType, Header, ModelKind, BLOCK_SIZE, MAGIC, SUPPORTED_MAJOR_VERSION};
use litertlm_mmap::MappedView;
use litertlm_section_stream::decompress_zlib_section;
use prost::Message;

use crate::proto::LlmMetadata;

/// Peek a byte buffer's first 8 bytes to tell if it looks like a
/// LiteRTLM archive, without parsing the rest of the header.
pub fn is_container(bytes: &[u8]) -> bool {
    bytes.len() >= MAGIC.len() && &bytes[..MAGIC.len()] == MAGIC
}

/// A parsed, memory-mapped LiteRTLM archive.
///
/// Section lookups are order-independent and safe to call concurrently
/// from multiple threads; each call that returns a view creates its own
/// clone of the underlying mapping. The index built at construction time
/// is immutable thereafter.
pub struct ContainerReader {
    view: MappedView,
    header: Header,
    header_end: u64,
    index: BTreeMap<(DataType, ModelKind), usize>,
}

impl ContainerReader {
    /// Open and parse an archive at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let view = MappedView::open(path)?;
        Self::from_view(view)
    }

    fn from_view(view: MappedView) -> Result<Self> {
        if view.len() < 32 {
            return Err(Error::invalid_format("archive shorter than the fixed-size preamble"));
        }
        if !is_container(&view) {
            return Err(Error::invalid_format("magic bytes do not match \"LITERTLM\""));
        }

        let major = LittleEndian::read_u32(&view[8..12]);
        if major != SUPPORTED_MAJOR_VERSION {
            return Err(Error::unsupported_version(format!(
                "archive major version {major} is not supported (expected {SUPPORTED_MAJOR_VERSION})"
            )));
        }
        let minor = LittleEndian::read_u32(&view[12..16]);
        let patch = LittleEndian::read_u32(&view[16..20]);
        // Bytes [20, 24) are reserved and intentionally not validated.
        let header_end = LittleEndian::read_u64(&view[24..32]);

        if header_end < 32 || header_end as usize > view.len() {
            return Err(Error::invalid_format(format!(
                "header_end_offset {header_end} is out of bounds for a {}-byte archive",
                view.len()
            )));
        }

        let header_bytes = &view[32..header_end as usize];
        let header = decode_header(header_bytes, major, minor, patch)?;

        let mut index = BTreeMap::new();
        for (i, section) in header.sections.iter().enumerate() {
            let key = (section.data_type, section.model_kind);
            if index.contains_key(&key) {
                tracing::warn!(
                    data_type = ?section.data_type,
                    model_kind = ?section.model_kind,
                    "duplicate section key in archive header; keeping the first occurrence"
                );
            } else {
                index.insert(key, i);
            }
        }

        Ok(ContainerReader {
            view,
            header,
            header_end,
            index,
        })
    }

    /// The parsed header, including the three version integers and every
    /// section's metadata record.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// The absolute file offset one past the end of the FlatBuffers
    /// header payload, as patched by the writer.
    pub fn header_end(&self) -> u64 {
        self.header_end
    }

    fn lookup(&self, data_type: DataType, model_kind: ModelKind) -> Result<&litertlm_format::SectionRecord> {
        let idx = self
            .index
            .get(&(data_type, model_kind))
            .ok_or_else(|| Error::not_found(format!("no {data_type:?}/{model_kind:?} section in archive")))?;
        Ok(&self.header.sections[*idx])
    }

    /// The `[begin, end)` byte range of the section identified by
    /// `(data_type, model_kind)`, for use with a memory-mapped view at
    /// the caller's discretion.
    pub fn get_section_range(&self, data_type: DataType, model_kind: ModelKind) -> Result<(u64, u64)> {
        let section = self.lookup(data_type, model_kind)?;
        Ok((section.begin_offset, section.end_offset))
    }

    fn section_view(&self, data_type: DataType, model_kind: ModelKind) -> Result<MappedView> {
        let section = self.lookup(data_type, model_kind)?;
        self.view
            .sub_range(section.begin_offset as usize, section.len() as usize)
    }

    /// A shared-ownership mapped view of the TFLite payload for `kind`.
    /// The view stays valid even if the reader is dropped afterward.
    pub fn get_tflite_model(&self, kind: ModelKind) -> Result<MappedView> {
        self.section_view(DataType::TFLiteModel, kind)
    }

    /// A mapped view of the raw SentencePiece model, if present.
    pub fn get_sentencepiece_tokenizer(&self) -> Result<Option<MappedView>> {
        match self.section_view(DataType::SentencePieceTokenizer, ModelKind::PrefillDecode) {
            Ok(view) => Ok(Some(view)),
            Err(e) if e.code() == "not_found" => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Decompresses and decodes the HuggingFace tokenizer JSON text.
    pub fn get_huggingface_tokenizer(&self) -> Result<String> {
        let view = self.section_view(DataType::HuggingFaceTokenizerZlib, ModelKind::PrefillDecode)?;
        let bytes = decompress_zlib_section(&view)?;
        String::from_utf8(bytes).map_err(|e| Error::data_loss(format!("tokenizer JSON is not valid UTF-8: {e}")))
    }

    /// Parses the `LlmMetadataProto` section.
    pub fn get_llm_metadata(&self) -> Result<LlmMetadata> {
        let view = self.section_view(DataType::LlmMetadataProto, ModelKind::PrefillDecode)?;
        LlmMetadata::decode(&view[..]).map_err(|e| Error::invalid_format(format!("malformed LlmMetadata: {e}")))
    }

    /// The raw bytes of a `GenericBinaryData` section, keyed the same
    /// way every other section is: by model kind (defaulting to
    /// `PrefillDecode` for payloads with no meaningful sub-model split).
    pub fn get_generic_binary(&self, kind: ModelKind) -> Result<Vec<u8>> {
        let view = self.section_view(DataType::GenericBinaryData, kind)?;
        Ok(view.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_container_checks_magic_prefix() {
        assert!(is_container(b"LITERTLMxxxx"));
        assert!(!is_container(b"LITERTXXxxxx"));
        assert!(!is_container(b"short"));
    }

    #[test]
    fn open_rejects_bad_magic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.litertlm");
        let mut bytes = vec![0u8; BLOCK_SIZE as usize];
        bytes[0..8].copy_from_slice(b"LITERTXX");
        std::fs::write(&path, &bytes).unwrap();
        let err = ContainerReader::open(&path).unwrap_err();
        assert_eq!(err.code(), "invalid_format");
    }

    #[test]
    fn open_rejects_unsupported_major_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("future.litertlm");
        let mut bytes = vec![0u8; BLOCK_SIZE as usize];
        bytes[0..8].copy_from_slice(MAGIC);
        LittleEndian::write_u32(&mut bytes[8..12], SUPPORTED_MAJOR_VERSION + 1);
        LittleEndian::write_u64(&mut bytes[24..32], 32);
        std::fs::write(&path, &bytes).unwrap();
        let err = ContainerReader::open(&path).unwrap_err();
        assert_eq!(err.code(), "unsupported_version");
    }
}
