//! Extension-based input dispatch (`spec.md` §6.3's table).

use std::path::Path;

use litertlm_error::{Error, Result};
use litertlm_format::{DataType, ModelKind};
use litertlm_section_stream::{FileStream, SectionStream, ZlibStream};
use litertlm_writer::SectionInput;

use crate::section_metadata::ParsedSection;

fn data_type_for(path: &Path) -> Result<DataType> {
    if path.file_name().and_then(|n| n.to_str()) == Some("tokenizer.json") {
        return Ok(DataType::HuggingFaceTokenizerZlib);
    }
    let data_type = match path.extension().and_then(|e| e.to_str()) {
        Some("tflite") => DataType::TFLiteModel,
        Some("pb") | Some("proto") => DataType::LlmMetadataProto,
        Some("pbtext") | Some("prototext") => DataType::LlmMetadataProto,
        Some("spiece") => DataType::SentencePieceTokenizer,
        _ => DataType::GenericBinaryData,
    };
    Ok(data_type)
}

fn model_kind_for(data_type: DataType, items: &[(String, litertlm_format::MetadataValue)]) -> ModelKind {
    if data_type != DataType::TFLiteModel {
        return ModelKind::PrefillDecode;
    }
    let name = items.iter().find(|(k, _)| k == "name").and_then(|(_, v)| match v {
        litertlm_format::MetadataValue::String(s) => Some(s.as_str()),
        _ => None,
    });
    ModelKind::from_name(name)
}

fn stream_for(data_type: DataType, path: &Path) -> Box<dyn SectionStream> {
    match data_type {
        DataType::HuggingFaceTokenizerZlib => Box::new(ZlibStream::new(FileStream::new(path))),
        _ => Box::new(FileStream::new(path)),
    }
}

/// Builds one [`SectionInput`] per `(path, section)` pair, validating
/// that a non-empty `section.label` matches the extension-dispatched
/// `DataType::default_metadata_name` (a caller typo check, `spec.md`
/// §6.3).
pub fn build_section_inputs(paths: &[std::path::PathBuf], sections: &[ParsedSection]) -> Result<Vec<SectionInput>> {
    paths
        .iter()
        .zip(sections)
        .map(|(path, section)| {
            let data_type = data_type_for(path)?;
            if !section.label.is_empty() && section.label != data_type.default_metadata_name() {
                return Err(Error::invalid_argument(format!(
                    "section_spec label {:?} does not match {}'s dispatched metadata name {:?}",
                    section.label,
                    path.display(),
                    data_type.default_metadata_name()
                )));
            }
            let model_kind = model_kind_for(data_type, &section.items);
            tracing::debug!(path = %path.display(), data_type = ?data_type, model_kind = ?model_kind, "dispatched input file");
            Ok(SectionInput::new(data_type, model_kind, section.items.clone(), stream_for(data_type, path)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::section_metadata::parse_section_metadata;
    use std::path::PathBuf;

    #[test]
    fn tflite_extension_dispatches_to_tflite_model() {
        assert_eq!(data_type_for(Path::new("model.tflite")).unwrap(), DataType::TFLiteModel);
    }

    #[test]
    fn tokenizer_json_dispatches_to_hf_zlib_regardless_of_directory() {
        assert_eq!(data_type_for(Path::new("/a/b/tokenizer.json")).unwrap(), DataType::HuggingFaceTokenizerZlib);
    }

    #[test]
    fn unknown_extension_dispatches_to_generic_binary() {
        assert_eq!(data_type_for(Path::new("weights.bin")).unwrap(), DataType::GenericBinaryData);
    }

    #[test]
    fn build_section_inputs_rejects_a_label_mismatch() {
        let paths = vec![PathBuf::from("model.tflite")];
        let sections = parse_section_metadata(Some("tokenizer:"), 1).unwrap();
        let err = build_section_inputs(&paths, &sections).unwrap_err();
        assert_eq!(err.code(), "invalid_argument");
    }

    #[test]
    fn build_section_inputs_accepts_a_matching_label() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.tflite");
        std::fs::write(&path, b"fake").unwrap();
        let sections = parse_section_metadata(Some("tflite:name=tf_lite_embedder"), 1).unwrap();
        let inputs = build_section_inputs(&[path], &sections).unwrap();
        assert_eq!(inputs.len(), 1);
        assert_eq!(inputs[0].data_type, DataType::TFLiteModel);
        assert_eq!(inputs[0].model_kind, ModelKind::Embedder);
    }

    #[test]
    fn empty_label_skips_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.tflite");
        std::fs::write(&path, b"fake").unwrap();
        let sections = parse_section_metadata(None, 1).unwrap();
        let inputs = build_section_inputs(&[path], &sections).unwrap();
        assert_eq!(inputs.len(), 1);
    }
}
