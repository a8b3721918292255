//! Parses the `--section_metadata` grammar (`spec.md` §6.3):
//! `section_spec ( ';' section_spec )*`, `section_spec := name ':' [ kv
//! ( ',' kv )* ]`, `kv := key '=' value`.
//!
//! `name` labels which input file a `section_spec` belongs to and is
//! checked against that file's extension-dispatched
//! [`litertlm_format::DataType::default_metadata_name`] — a mismatch is
//! a caller typo worth catching, not a value carried into the archive.
//! The `kv` pairs become the section's metadata items verbatim, in the
//! order parsed (including a `name=...` pair, used for the §4.D
//! `ModelKind` resolution of `TFLiteModel` sections — distinct from the
//! label before the colon).

use litertlm_error::{Error, Result};
use litertlm_format::MetadataValue;

/// One parsed `section_spec`: its label and ordered `kv` items.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSection {
    pub label: String,
    pub items: Vec<(String, MetadataValue)>,
}

fn parse_value(raw: &str) -> MetadataValue {
    if let Ok(v) = raw.parse::<i32>() {
        return MetadataValue::Int32(v);
    }
    if let Ok(v) = raw.parse::<i64>() {
        return MetadataValue::Int64(v);
    }
    if let Ok(v) = raw.parse::<u32>() {
        return MetadataValue::UInt32(v);
    }
    if let Ok(v) = raw.parse::<u64>() {
        return MetadataValue::UInt64(v);
    }
    if let Ok(v) = raw.parse::<f32>() {
        return MetadataValue::Float32(v);
    }
    if let Ok(v) = raw.parse::<bool>() {
        return MetadataValue::Bool(v);
    }
    MetadataValue::String(raw.to_string())
}

fn parse_kv(raw: &str) -> Result<(String, MetadataValue)> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| Error::invalid_argument(format!("malformed key=value pair: {raw:?}")))?;
    if key.is_empty() {
        return Err(Error::invalid_argument(format!("empty key in key=value pair: {raw:?}")));
    }
    Ok((key.to_string(), parse_value(value)))
}

fn parse_section_spec(raw: &str) -> Result<ParsedSection> {
    let (label, rest) = raw
        .split_once(':')
        .ok_or_else(|| Error::invalid_argument(format!("section_spec missing ':': {raw:?}")))?;
    if label.is_empty() {
        return Err(Error::invalid_argument(format!("section_spec has an empty name: {raw:?}")));
    }
    let items = if rest.is_empty() {
        Vec::new()
    } else {
        rest.split(',').map(parse_kv).collect::<Result<Vec<_>>>()?
    };
    Ok(ParsedSection { label: label.to_string(), items })
}

/// Parses `spec` into exactly `num_inputs` [`ParsedSection`]s, in order.
/// A missing or empty `spec` yields `num_inputs` empty-label, empty-item
/// sections (no per-file metadata, no label to validate).
pub fn parse_section_metadata(spec: Option<&str>, num_inputs: usize) -> Result<Vec<ParsedSection>> {
    let spec = spec.map(str::trim).filter(|s| !s.is_empty());
    let Some(spec) = spec else {
        return Ok((0..num_inputs).map(|_| ParsedSection { label: String::new(), items: Vec::new() }).collect());
    };
    let sections = spec.split(';').map(parse_section_spec).collect::<Result<Vec<_>>>()?;
    if sections.len() != num_inputs {
        return Err(Error::invalid_argument(format!(
            "--section_metadata has {} section_specs but {num_inputs} input files were given",
            sections.len()
        )));
    }
    Ok(sections)
}
