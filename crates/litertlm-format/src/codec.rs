//! Hand-written FlatBuffers encode/decode for the archive header, built
//! directly against `flatbuffers`'s builder and table primitives rather
//! than `flatc`-generated bindings. The wire shape is documented in
//! `schema/litertlm.fbs`; field offsets below follow that schema's
//! declaration order (vtable slot N == field N, 0-indexed).

use flatbuffers::{
    FlatBufferBuilder, Follow, ForwardsUOffset, Table, UnionWIPOffset, Vector, WIPOffset,
};
use litertlm_error::{Error, Result};

use crate::{DataType, Header, MetadataList, MetadataValue, ModelKind, SectionRecord};

// VData union discriminants, matching the declaration order of the
// `union VData { ... }` members in schema/litertlm.fbs (flatbuffers
// union enums always reserve 0 for NONE).
const VDATA_NONE: u8 = 0;
const VDATA_STRING: u8 = 1;
const VDATA_INT32: u8 = 2;
const VDATA_INT64: u8 = 3;
const VDATA_UINT32: u8 = 4;
const VDATA_UINT64: u8 = 5;
const VDATA_FLOAT32: u8 = 6;
const VDATA_BOOL: u8 = 7;

// KeyValuePair vtable slots.
const KV_KEY: usize = 0;
const KV_VALUE_TYPE: usize = 1;
const KV_VALUE: usize = 2;

// SectionObject vtable slots.
const SO_ITEMS: usize = 0;
const SO_BEGIN_OFFSET: usize = 1;
const SO_END_OFFSET: usize = 2;
const SO_DATA_TYPE: usize = 3;

// SectionMetadata / SystemMetadata / LiteRTLMMetaData slots.
const SM_OBJECTS: usize = 0;
const SYSM_ITEMS: usize = 0;
const ROOT_SYSTEM_METADATA: usize = 0;
const ROOT_SECTION_METADATA: usize = 1;

/// Encode a [`Header`] as a FlatBuffers `LiteRTLMMetaData` root table.
pub fn encode_header(header: &Header) -> Vec<u8> {
    let mut builder = FlatBufferBuilder::new();

    let system_metadata = build_kv_list(&mut builder, &header.system_metadata);
    let system_metadata_table = {
        let start = builder.start_table();
        builder.push_slot_always(SYSM_ITEMS, system_metadata);
        builder.end_table(start)
    };

    let section_objects: Vec<_> = header
        .sections
        .iter()
        .map(|s| build_section_object(&mut builder, s))
        .collect();
    let objects_vector = builder.create_vector(&section_objects);
    let section_metadata_table = {
        let start = builder.start_table();
        builder.push_slot_always(SM_OBJECTS, objects_vector);
        builder.end_table(start)
    };

    let root = {
        let start = builder.start_table();
        builder.push_slot_always(ROOT_SYSTEM_METADATA, system_metadata_table);
        builder.push_slot_always(ROOT_SECTION_METADATA, section_metadata_table);
        builder.end_table(start)
    };

    builder.finish(root, None);
    builder.finished_data().to_vec()
}

fn build_kv_list(
    builder: &mut FlatBufferBuilder<'_>,
    items: &MetadataList,
) -> WIPOffset<Vector<'static, ForwardsUOffset<Table<'static>>>> {
    let offsets: Vec<_> = items
        .iter()
        .map(|(key, value)| build_kv_pair(builder, key, value))
        .collect();
    builder.create_vector(&offsets)
}

fn build_kv_pair(
    builder: &mut FlatBufferBuilder<'_>,
    key: &str,
    value: &MetadataValue,
) -> WIPOffset<Table<'static>> {
    let key_offset = builder.create_string(key);
    let (value_type, value_offset) = build_vdata(builder, value);

    let start = builder.start_table();
    builder.push_slot_always(KV_KEY, key_offset);
    builder.push_slot_always(KV_VALUE_TYPE, value_type);
    builder.push_slot_always(KV_VALUE, value_offset);
    builder.end_table(start)
}

fn build_vdata(
    builder: &mut FlatBufferBuilder<'_>,
    value: &MetadataValue,
) -> (u8, WIPOffset<UnionWIPOffset>) {
    let wrap = |start: WIPOffset<Table<'static>>| WIPOffset::new(start.value());
    match value {
        MetadataValue::String(s) => {
            let str_offset = builder.create_string(s);
            let start = builder.start_table();
            builder.push_slot_always(0usize, str_offset);
            (VDATA_STRING, wrap(builder.end_table(start)))
        }
        MetadataValue::Int32(v) => {
            let start = builder.start_table();
            builder.push_slot_always(0usize, *v);
            (VDATA_INT32, wrap(builder.end_table(start)))
        }
        MetadataValue::Int64(v) => {
            let start = builder.start_table();
            builder.push_slot_always(0usize, *v);
            (VDATA_INT64, wrap(builder.end_table(start)))
        }
        MetadataValue::UInt32(v) => {
            let start = builder.start_table();
            builder.push_slot_always(0usize, *v);
            (VDATA_UINT32, wrap(builder.end_table(start)))
        }
        MetadataValue::UInt64(v) => {
            let start = builder.start_table();
            builder.push_slot_always(0usize, *v);
            (VDATA_UINT64, wrap(builder.end_table(start)))
        }
        MetadataValue::Float32(v) => {
            let start = builder.start_table();
            builder.push_slot_always(0usize, *v);
            (VDATA_FLOAT32, wrap(builder.end_table(start)))
        }
        MetadataValue::Bool(v) => {
            let start = builder.start_table();
            builder.push_slot_always(0usize, *v);
            (VDATA_BOOL, wrap(builder.end_table(start)))
        }
    }
}

fn build_section_object(
    builder: &mut FlatBufferBuilder<'_>,
    section: &SectionRecord,
) -> WIPOffset<Table<'static>> {
    let items = build_kv_list(builder, &section.items);

    let start = builder.start_table();
    builder.push_slot_always(SO_ITEMS, items);
    builder.push_slot_always(SO_BEGIN_OFFSET, section.begin_offset);
    builder.push_slot_always(SO_END_OFFSET, section.end_offset);
    builder.push_slot_always(SO_DATA_TYPE, section.data_type.wire_code());
    builder.end_table(start)
}

/// Decode a FlatBuffers `LiteRTLMMetaData` root table written by
/// [`encode_header`] back into a [`Header`]. `major_version`,
/// `minor_version`, `patch_version` come from the surrounding archive
/// header and are not themselves part of the FlatBuffers payload;
/// callers splice them in.
pub fn decode_header(
    bytes: &[u8],
    major_version: u32,
    minor_version: u32,
    patch_version: u32,
) -> Result<Header> {
    let root = flatbuffers::root::<Table>(bytes)
        .map_err(|e| Error::invalid_format(format!("malformed FlatBuffers header: {e}")))?;

    let system_metadata = root
        .get::<ForwardsUOffset<Table>>(field_offset(ROOT_SYSTEM_METADATA), None)
        .map(|t| decode_kv_list(&t, field_offset(SYSM_ITEMS)))
        .transpose()?
        .unwrap_or_default();

    let section_metadata = root
        .get::<ForwardsUOffset<Table>>(field_offset(ROOT_SECTION_METADATA), None)
        .ok_or_else(|| Error::invalid_format("header is missing section_metadata"))?;

    let objects = section_metadata
        .get::<ForwardsUOffset<Vector<ForwardsUOffset<Table>>>>(field_offset(SM_OBJECTS), None);

    let mut sections = Vec::new();
    if let Some(objects) = objects {
        for i in 0..objects.len() {
            sections.push(decode_section_object(objects.get(i))?);
        }
    }

    Ok(Header {
        major_version,
        minor_version,
        patch_version,
        system_metadata,
        sections,
    })
}

fn decode_section_object(table: Table) -> Result<SectionRecord> {
    let items = table
        .get::<ForwardsUOffset<Vector<ForwardsUOffset<Table>>>>(field_offset(SO_ITEMS), None)
        .map(decode_kv_vector)
        .transpose()?
        .unwrap_or_default();

    let begin_offset = table
        .get::<u64>(field_offset(SO_BEGIN_OFFSET), Some(0))
        .unwrap_or(0);
    let end_offset = table
        .get::<u64>(field_offset(SO_END_OFFSET), Some(0))
        .unwrap_or(0);
    let wire_code = table.get::<i8>(field_offset(SO_DATA_TYPE), Some(0)).unwrap_or(0);

    let data_type = DataType::from_wire_code(wire_code)
        .ok_or_else(|| Error::invalid_format(format!("unknown section data_type code {wire_code}")))?;

    let model_kind = ModelKind::from_name(find_string_item(&items, "name"));

    Ok(SectionRecord {
        data_type,
        model_kind,
        begin_offset,
        end_offset,
        items,
    })
}

fn decode_kv_list(table: &Table, slot: usize) -> Result<MetadataList> {
    match table.get::<ForwardsUOffset<Vector<ForwardsUOffset<Table>>>>(field_offset(slot), None) {
        Some(v) => decode_kv_vector(v),
        None => Ok(Vec::new()),
    }
}

fn decode_kv_vector(vector: Vector<ForwardsUOffset<Table>>) -> Result<MetadataList> {
    let mut items = Vec::with_capacity(vector.len());
    for i in 0..vector.len() {
        items.push(decode_kv_pair(vector.get(i))?);
    }
    Ok(items)
}

fn decode_kv_pair(table: Table) -> Result<(String, MetadataValue)> {
    let key = table
        .get::<ForwardsUOffset<&str>>(field_offset(KV_KEY), None)
        .ok_or_else(|| Error::invalid_format("metadata entry is missing its key"))?
        .to_owned();

    let value_type = table
        .get::<u8>(field_offset(KV_VALUE_TYPE), Some(VDATA_NONE))
        .unwrap_or(VDATA_NONE);

    let value_table = table.get::<ForwardsUOffset<Table>>(field_offset(KV_VALUE), None);

    let value = match (value_type, value_table) {
        (VDATA_NONE, _) | (_, None) => {
            return Err(Error::invalid_format(format!("metadata key {key:?} has no value")))
        }
        (VDATA_STRING, Some(t)) => MetadataValue::String(
            t.get::<ForwardsUOffset<&str>>(0, None).unwrap_or_default().to_owned(),
        ),
        (VDATA_INT32, Some(t)) => MetadataValue::Int32(t.get::<i32>(0, Some(0)).unwrap_or(0)),
        (VDATA_INT64, Some(t)) => MetadataValue::Int64(t.get::<i64>(0, Some(0)).unwrap_or(0)),
        (VDATA_UINT32, Some(t)) => MetadataValue::UInt32(t.get::<u32>(0, Some(0)).unwrap_or(0)),
        (VDATA_UINT64, Some(t)) => MetadataValue::UInt64(t.get::<u64>(0, Some(0)).unwrap_or(0)),
        (VDATA_FLOAT32, Some(t)) => MetadataValue::Float32(t.get::<f32>(0, Some(0.0)).unwrap_or(0.0)),
        (VDATA_BOOL, Some(t)) => MetadataValue::Bool(t.get::<bool>(0, Some(false)).unwrap_or(false)),
        (other, Some(_)) => {
            return Err(Error::invalid_format(format!("unknown VData discriminant {other}")))
        }
    };

    Ok((key, value))
}

fn find_string_item<'a>(items: &'a MetadataList, key: &str) -> Option<&'a str> {
    items.iter().find(|(k, _)| k == key).and_then(|(_, v)| match v {
        MetadataValue::String(s) => Some(s.as_str()),
        _ => None,
    })
}

/// FlatBuffers vtable slots are numbered `4 + 2*field_index` in on-wire
/// terms, but the `flatbuffers` crate's `Table::get`/builder
/// `push_slot_always` take the pre-scaled "voffset" the generated code
/// would normally compute; this crate has no codegen step, so the
/// scaling happens here, once, for every field access.
fn field_offset(field_index: usize) -> flatbuffers::VOffsetT {
    (flatbuffers::VTABLE_METADATA_FIELDS + field_index * 2) as flatbuffers::VOffsetT
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DataType, ModelKind};

    fn sample_header() -> Header {
        Header {
            major_version: 1,
            minor_version: 0,
            patch_version: 0,
            system_metadata: vec![
                ("start_token_id".to_string(), MetadataValue::Int32(2)),
                ("build".to_string(), MetadataValue::String("test".to_string())),
            ],
            sections: vec![SectionRecord {
                data_type: DataType::GenericBinaryData,
                model_kind: ModelKind::PrefillDecode,
                begin_offset: 16384,
                end_offset: 20480,
                items: vec![("name".to_string(), MetadataValue::String("none".to_string()))],
            }],
        }
    }

    #[test]
    fn round_trips_header_with_mixed_metadata_types() {
        let header = sample_header();
        let bytes = encode_header(&header);
        let decoded = decode_header(&bytes, 1, 0, 0).unwrap();
        assert_eq!(decoded.system_metadata, header.system_metadata);
        assert_eq!(decoded.sections, header.sections);
    }

    #[test]
    fn round_trips_empty_header() {
        let header = Header {
            major_version: 1,
            minor_version: 2,
            patch_version: 3,
            system_metadata: vec![],
            sections: vec![],
        };
        let bytes = encode_header(&header);
        let decoded = decode_header(&bytes, 1, 2, 3).unwrap();
        assert!(decoded.system_metadata.is_empty());
        assert!(decoded.sections.is_empty());
    }

    #[test]
    fn rejects_truncated_payload() {
        let err = decode_header(&[0, 1, 2], 1, 0, 0).unwrap_err();
        assert_eq!(err.code(), "invalid_format");
    }

    #[test]
    fn preserves_all_seven_value_kinds() {
        let header = Header {
            major_version: 1,
            minor_version: 0,
            patch_version: 0,
            system_metadata: vec![
                ("a".into(), MetadataValue::Int32(-7)),
                ("b".into(), MetadataValue::Int64(-7_000_000_000)),
                ("c".into(), MetadataValue::UInt32(42)),
                ("d".into(), MetadataValue::UInt64(9_000_000_000)),
                ("e".into(), MetadataValue::Float32(1.5)),
                ("f".into(), MetadataValue::Bool(true)),
                ("g".into(), MetadataValue::String("hi".into())),
            ],
            sections: vec![],
        };
        let bytes = encode_header(&header);
        let decoded = decode_header(&bytes, 1, 0, 0).unwrap();
        assert_eq!(decoded.system_metadata, header.system_metadata);
    }
}
