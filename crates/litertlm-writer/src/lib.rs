//! Single forward-pass container writer with one seek-back at the end.
//!
//! See `spec.md` §4.C for the write algorithm and §6.1 for the bit-exact
//! on-disk layout this module produces.

#![forbid(unsafe_code)]

use std::fs::File;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

use byteorder::{LittleEndian, WriteBytesExt};
use litertlm_error::{Error, Result};
use litertlm_format::codec::encode_header;
use litertlm_format::{align_to_block, DataType, Header, MetadataList, ModelKind, SectionRecord, BLOCK_SIZE, MAGIC, SUPPORTED_MAJOR_VERSION};
use litertlm_section_stream::SectionStream;

/// One section awaiting a slot in the archive: its classification, its
/// metadata items, and the stream that produces its payload bytes.
pub struct SectionInput {
    pub data_type: DataType,
    pub model_kind: ModelKind,
    pub items: MetadataList,
    pub stream: Box<dyn SectionStream>,
}

impl SectionInput {
    pub fn new(
        data_type: DataType,
        model_kind: ModelKind,
        items: MetadataList,
        stream: impl SectionStream + 'static,
    ) -> Self {
        SectionInput {
            data_type,
            model_kind,
            items,
            stream: Box::new(stream),
        }
    }
}

/// Writes `sections` (in order) to a fresh archive at `path`, with global
/// `system_metadata` in the header.
///
/// On any error the output file is left in an indeterminate state — the
/// writer fails fast and does not attempt to produce a partial-but-valid
/// archive. Callers should delete the file on error.
pub fn write_archive(
    path: impl AsRef<Path>,
    system_metadata: MetadataList,
    sections: Vec<SectionInput>,
) -> Result<()> {
    let path = path.as_ref();
    let mut file = File::create(path)?;
    let result = write_archive_to(&mut file, system_metadata, sections);
    if result.is_err() {
        tracing::warn!(path = %path.display(), "writer failed; archive left in an indeterminate state");
    }
    result
}

fn write_archive_to(
    file: &mut File,
    system_metadata: MetadataList,
    sections: Vec<SectionInput>,
) -> Result<()> {
    // Step 1: magic + version triple + reserved + placeholder header_end.
    file.write_all(MAGIC)?;
    file.write_u32::<LittleEndian>(SUPPORTED_MAJOR_VERSION)?;
    file.write_u32::<LittleEndian>(0)?; // minor
    file.write_u32::<LittleEndian>(0)?; // patch
    file.write_u32::<LittleEndian>(0)?; // reserved
    file.write_u64::<LittleEndian>(0)?; // header_end_offset placeholder

    // Step 2: pad to the next block boundary. Offset 32 always rounds up
    // to BLOCK_SIZE since BLOCK_SIZE > 32.
    let mut offset = 32u64;
    pad_to(file, &mut offset, align_to_block(offset))?;

    // Step 3: stream each section's payload, recording begin/end offsets.
    let mut records = Vec::with_capacity(sections.len());
    for mut input in sections {
        input.stream.prepare()?;
        let begin = offset;

        let bytes = input.stream.stream()?;
        file.write_all(bytes)?;
        offset += bytes.len() as u64;
        let end = offset;

        input.stream.finalize()?;
        pad_to(file, &mut offset, align_to_block(offset))?;

        records.push(SectionRecord {
            data_type: input.data_type,
            model_kind: input.model_kind,
            begin_offset: begin,
            end_offset: end,
            items: input.items,
        });
    }

    // Step 4: seek to offset 32, build and write the FlatBuffers header.
    file.seek(SeekFrom::Start(32))?;
    let header = Header {
        major_version: SUPPORTED_MAJOR_VERSION,
        minor_version: 0,
        patch_version: 0,
        system_metadata,
        sections: records,
    };
    let header_bytes = encode_header(&header);
    file.write_all(&header_bytes)?;

    // Step 5: verify the header fit in the first block.
    let header_end = 32 + header_bytes.len() as u64;
    if header_end > BLOCK_SIZE {
        return Err(Error::internal(format!(
            "header of {} bytes does not fit in the first {BLOCK_SIZE}-byte block",
            header_bytes.len()
        )));
    }

    // Step 6: seek to offset 24, patch header_end_offset, close.
    file.seek(SeekFrom::Start(24))?;
    file.write_u64::<LittleEndian>(header_end)?;
    file.flush()?;

    Ok(())
}

fn pad_to(file: &mut File, offset: &mut u64, target: u64) -> Result<()> {
    if target > *offset {
        let padding = vec![0u8; (target - *offset) as usize];
        file.write_all(&padding)?;
        *offset = target;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use litertlm_format::MetadataValue;
    use litertlm_reader::ContainerReader;
    use litertlm_section_stream::BlobStream;

    #[test]
    fn round_trip_three_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("archive.litertlm");

        let sections = vec![
            SectionInput::new(
                DataType::TFLiteModel,
                ModelKind::PrefillDecode,
                vec![(
                    "name".to_string(),
                    MetadataValue::String("tf_lite_prefill_decode".to_string()),
                )],
                BlobStream::new(vec![0xDE, 0xAD, 0xBE, 0xEF]),
            ),
            SectionInput::new(
                DataType::SentencePieceTokenizer,
                ModelKind::PrefillDecode,
                vec![],
                BlobStream::new(vec![0x01, 0x02, 0x03]),
            ),
        ];

        write_archive(&path, vec![], sections).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[0..8], MAGIC);

        let reader = ContainerReader::open(&path).unwrap();
        let header = reader.header();
        assert_eq!(header.sections[0].begin_offset, 16384);
        assert_eq!(header.sections[0].end_offset, 16388);
        assert_eq!(&bytes[16384..16388], &[0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(header.sections[1].begin_offset, 32768);
    }

    #[test]
    fn every_section_begins_on_a_block_boundary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("archive.litertlm");

        let sections = vec![
            SectionInput::new(
                DataType::GenericBinaryData,
                ModelKind::PrefillDecode,
                vec![],
                BlobStream::new(vec![1; 100]),
            ),
            SectionInput::new(
                DataType::GenericBinaryData,
                ModelKind::Embedder,
                vec![],
                BlobStream::new(vec![2; 50_000]),
            ),
        ];
        write_archive(&path, vec![], sections).unwrap();

        let reader = ContainerReader::open(&path).unwrap();
        for section in &reader.header().sections {
            assert_eq!(section.begin_offset % BLOCK_SIZE, 0);
        }
    }

    #[test]
    fn magic_is_preserved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("archive.litertlm");
        write_archive(&path, vec![], vec![]).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[0..8], b"LITERTLM");
    }

    #[test]
    fn header_end_never_exceeds_first_block() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("archive.litertlm");
        write_archive(&path, vec![], vec![]).unwrap();
        let reader = ContainerReader::open(&path).unwrap();
        assert!(reader.header_end() <= BLOCK_SIZE);
    }
}
