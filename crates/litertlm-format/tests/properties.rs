//! Property tests for `spec.md` §8.1's **block alignment**, **header
//! round-trip**, and **wire-code round-trip** invariants.

use litertlm_format::codec::{decode_header, encode_header};
use litertlm_format::{align_to_block, DataType, Header, MetadataValue, ModelKind, SectionRecord, BLOCK_SIZE};
use proptest::prelude::*;

fn arb_data_type() -> impl Strategy<Value = DataType> {
    prop_oneof![
        Just(DataType::TFLiteModel),
        Just(DataType::SentencePieceTokenizer),
        Just(DataType::HuggingFaceTokenizerZlib),
        Just(DataType::LlmMetadataProto),
        Just(DataType::GenericBinaryData),
    ]
}

fn arb_model_kind() -> impl Strategy<Value = ModelKind> {
    prop_oneof![
        Just(ModelKind::PrefillDecode),
        Just(ModelKind::Embedder),
        Just(ModelKind::VisionEncoder),
        Just(ModelKind::VisionAdapter),
        Just(ModelKind::AudioEncoder),
        Just(ModelKind::AudioAdapter),
    ]
}

fn arb_metadata_value() -> impl Strategy<Value = MetadataValue> {
    prop_oneof![
        any::<i32>().prop_map(MetadataValue::Int32),
        any::<i64>().prop_map(MetadataValue::Int64),
        any::<u32>().prop_map(MetadataValue::UInt32),
        any::<u64>().prop_map(MetadataValue::UInt64),
        any::<bool>().prop_map(MetadataValue::Bool),
        "[a-z0-9_]{0,16}".prop_map(MetadataValue::String),
    ]
}

/// A section whose `items` carry a `"name"` key matching `model_kind`,
/// since the codec re-derives `model_kind` from that key on decode
/// (`spec.md` §4.D step 5) rather than encoding it directly.
fn arb_section() -> impl Strategy<Value = SectionRecord> {
    (arb_data_type(), arb_model_kind(), 0u64..1_000_000, prop::collection::vec(("[a-z]{1,8}", arb_metadata_value()), 0..3)).prop_map(
        |(data_type, model_kind, begin_offset, mut items)| {
            items.push(("name".to_string(), MetadataValue::String(model_kind.metadata_name().to_string())));
            SectionRecord {
                data_type,
                model_kind,
                begin_offset,
                end_offset: begin_offset + 4,
                items,
            }
        },
    )
}

proptest! {
    /// Block alignment: `align_to_block` always rounds up to a multiple
    /// of `BLOCK_SIZE`, never moves an already-aligned offset, and never
    /// moves an offset backward.
    #[test]
    fn align_to_block_rounds_up_to_a_multiple_of_block_size(offset in 0u64..10_000_000) {
        let aligned = align_to_block(offset);
        prop_assert_eq!(aligned % BLOCK_SIZE, 0);
        prop_assert!(aligned >= offset);
        prop_assert!(aligned - offset < BLOCK_SIZE);
    }

    /// Wire-code round trip: every `DataType` survives `wire_code` /
    /// `from_wire_code`.
    #[test]
    fn data_type_wire_code_round_trips(dt in arb_data_type()) {
        prop_assert_eq!(DataType::from_wire_code(dt.wire_code()), Some(dt));
    }

    /// Header round trip: an arbitrary header with arbitrary section
    /// metadata survives `encode_header`/`decode_header` unchanged.
    #[test]
    fn header_round_trips_through_the_flatbuffers_codec(
        sections in prop::collection::vec(arb_section(), 0..4),
        system_items in prop::collection::vec(("[a-z]{1,8}", arb_metadata_value()), 0..4),
    ) {
        let header = Header {
            major_version: 1,
            minor_version: 0,
            patch_version: 0,
            system_metadata: system_items,
            sections,
        };
        let bytes = encode_header(&header);
        let decoded = decode_header(&bytes, 1, 0, 0).unwrap();
        prop_assert_eq!(decoded.system_metadata, header.system_metadata);
        prop_assert_eq!(decoded.sections, header.sections);
    }
}
