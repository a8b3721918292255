//! Lazy byte-producer abstractions for a single archive section.
//!
//! Every variant implements [`SectionStream`]: `prepare` must run before
//! `stream`/`buffer_size` are callable, and `finalize` releases whatever
//! the variant was holding. Callers (the writer) drive one stream at a
//! time: `prepare`, copy `stream()` to the output, `finalize`.

#![forbid(unsafe_code)]

use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, WriteBytesExt};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use litertlm_error::{Error, Result};
use prost::Message;

/// Chunk size used when draining the inner stream of a
/// [`ZlibStream`], matching the 16 KiB the writer's block alignment is
/// already tuned around.
const ZLIB_CHUNK_SIZE: usize = 16 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    NotPrepared,
    Prepared,
    Finalized,
}

fn require_prepared(state: Lifecycle) -> Result<()> {
    match state {
        Lifecycle::Prepared => Ok(()),
        Lifecycle::NotPrepared => Err(Error::failed_precondition(
            "stream accessed before prepare() was called",
        )),
        Lifecycle::Finalized => Err(Error::failed_precondition(
            "stream accessed after finalize() released its buffer",
        )),
    }
}

/// A lazy byte source for one archive section payload.
pub trait SectionStream {
    /// Make the stream's bytes available. Idempotent: calling it again
    /// after it has already succeeded is a no-op.
    fn prepare(&mut self) -> Result<()>;

    /// The prepared bytes, in the order they must be written.
    ///
    /// Fails with `FailedPrecondition` if called before `prepare` or
    /// after `finalize`.
    fn stream(&mut self) -> Result<&[u8]>;

    /// Total payload length, valid only after `prepare`.
    fn buffer_size(&self) -> Result<u64>;

    /// Release whatever backing resources `prepare` acquired.
    fn finalize(&mut self) -> Result<()>;
}

/// Reads an entire file into memory on `prepare`.
pub struct FileStream {
    path: PathBuf,
    state: Lifecycle,
    buffer: Vec<u8>,
}

impl FileStream {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileStream {
            path: path.into(),
            state: Lifecycle::NotPrepared,
            buffer: Vec::new(),
        }
    }
}

impl SectionStream for FileStream {
    fn prepare(&mut self) -> Result<()> {
        if self.state == Lifecycle::Prepared {
            return Ok(());
        }
        self.buffer = fs::read(&self.path)?;
        self.state = Lifecycle::Prepared;
        Ok(())
    }

    fn stream(&mut self) -> Result<&[u8]> {
        require_prepared(self.state)?;
        Ok(&self.buffer)
    }

    fn buffer_size(&self) -> Result<u64> {
        require_prepared(self.state)?;
        Ok(self.buffer.len() as u64)
    }

    fn finalize(&mut self) -> Result<()> {
        self.buffer = Vec::new();
        self.state = Lifecycle::Finalized;
        Ok(())
    }
}

/// Wraps a caller-owned byte string. `prepare` is a no-op since the bytes
/// are already resident.
pub struct BlobStream {
    buffer: Vec<u8>,
    state: Lifecycle,
}

impl BlobStream {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        BlobStream {
            buffer: bytes.into(),
            state: Lifecycle::Prepared,
        }
    }
}

impl SectionStream for BlobStream {
    fn prepare(&mut self) -> Result<()> {
        if self.state == Lifecycle::Finalized {
            return Err(Error::failed_precondition(
                "blob stream prepared after it was finalized",
            ));
        }
        self.state = Lifecycle::Prepared;
        Ok(())
    }

    fn stream(&mut self) -> Result<&[u8]> {
        require_prepared(self.state)?;
        Ok(&self.buffer)
    }

    fn buffer_size(&self) -> Result<u64> {
        require_prepared(self.state)?;
        Ok(self.buffer.len() as u64)
    }

    fn finalize(&mut self) -> Result<()> {
        self.buffer = Vec::new();
        self.state = Lifecycle::Finalized;
        Ok(())
    }
}

/// Serializes a protobuf message during `prepare`, owning the serialized
/// buffer until `finalize`.
pub struct ProtoStream<M: Message> {
    message: Option<M>,
    buffer: Vec<u8>,
    state: Lifecycle,
}

impl<M: Message> ProtoStream<M> {
    pub fn new(message: M) -> Self {
        ProtoStream {
            message: Some(message),
            buffer: Vec::new(),
            state: Lifecycle::NotPrepared,
        }
    }
}

impl<M: Message> SectionStream for ProtoStream<M> {
    fn prepare(&mut self) -> Result<()> {
        if self.state == Lifecycle::Prepared {
            return Ok(());
        }
        let message = self
            .message
            .take()
            .ok_or_else(|| Error::failed_precondition("proto stream prepared twice"))?;
        self.buffer = message.encode_to_vec();
        self.state = Lifecycle::Prepared;
        Ok(())
    }

    fn stream(&mut self) -> Result<&[u8]> {
        require_prepared(self.state)?;
        Ok(&self.buffer)
    }

    fn buffer_size(&self) -> Result<u64> {
        require_prepared(self.state)?;
        Ok(self.buffer.len() as u64)
    }

    fn finalize(&mut self) -> Result<()> {
        self.buffer = Vec::new();
        self.state = Lifecycle::Finalized;
        Ok(())
    }
}

/// Wraps another stream; during `prepare`, drains it in 16 KiB chunks,
/// compresses the whole thing with DEFLATE, and emits `u64
/// uncompressed_length` (little-endian) followed by the compressed
/// bytes.
pub struct ZlibStream<S: SectionStream> {
    inner: S,
    buffer: Vec<u8>,
    state: Lifecycle,
}

impl<S: SectionStream> ZlibStream<S> {
    pub fn new(inner: S) -> Self {
        ZlibStream {
            inner,
            buffer: Vec::new(),
            state: Lifecycle::NotPrepared,
        }
    }
}

impl<S: SectionStream> SectionStream for ZlibStream<S> {
    fn prepare(&mut self) -> Result<()> {
        if self.state == Lifecycle::Prepared {
            return Ok(());
        }
        self.inner.prepare()?;
        let uncompressed_len = self.inner.buffer_size()?;
        let raw = self.inner.stream()?;

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        for chunk in raw.chunks(ZLIB_CHUNK_SIZE) {
            encoder
                .write_all(chunk)
                .map_err(|e| Error::internal(format!("zlib compression failed: {e}")))?;
        }
        let compressed = encoder
            .finish()
            .map_err(|e| Error::internal(format!("zlib finish failed: {e}")))?;

        self.inner.finalize()?;

        let mut out = Vec::with_capacity(8 + compressed.len());
        out.write_u64::<LittleEndian>(uncompressed_len)
            .expect("writing to a Vec cannot fail");
        out.extend_from_slice(&compressed);

        self.buffer = out;
        self.state = Lifecycle::Prepared;
        Ok(())
    }

    fn stream(&mut self) -> Result<&[u8]> {
        require_prepared(self.state)?;
        Ok(&self.buffer)
    }

    fn buffer_size(&self) -> Result<u64> {
        require_prepared(self.state)?;
        Ok(self.buffer.len() as u64)
    }

    fn finalize(&mut self) -> Result<()> {
        self.buffer = Vec::new();
        self.state = Lifecycle::Finalized;
        Ok(())
    }
}

/// Inflate a `[u64 uncompressed_length LE][DEFLATE stream]` payload
/// (`spec.md` §6.2 / §4.B variant 4), returning `DataLoss` if the
/// inflated size disagrees with the declared length.
pub fn decompress_zlib_section(payload: &[u8]) -> Result<Vec<u8>> {
    use byteorder::ReadBytesExt;
    use flate2::read::ZlibDecoder;
    use std::io::Read;

    if payload.len() < 8 {
        return Err(Error::data_loss("zlib section shorter than its length prefix"));
    }
    let mut prefix = &payload[..8];
    let uncompressed_length = prefix
        .read_u64::<LittleEndian>()
        .map_err(|e| Error::data_loss(format!("malformed length prefix: {e}")))?;

    let mut decoder = ZlibDecoder::new(&payload[8..]);
    let mut out = Vec::with_capacity(uncompressed_length as usize);
    decoder
        .read_to_end(&mut out)
        .map_err(|e| Error::data_loss(format!("zlib inflate failed: {e}")))?;

    if out.len() as u64 != uncompressed_length {
        return Err(Error::data_loss(format!(
            "zlib length mismatch: declared {uncompressed_length}, inflated {}",
            out.len()
        )));
    }

    Ok(out)
}

impl SectionStream for Box<dyn SectionStream> {
    fn prepare(&mut self) -> Result<()> {
        (**self).prepare()
    }

    fn stream(&mut self) -> Result<&[u8]> {
        (**self).stream()
    }

    fn buffer_size(&self) -> Result<u64> {
        (**self).buffer_size()
    }

    fn finalize(&mut self) -> Result<()> {
        (**self).finalize()
    }
}

/// Path extension dispatch used by the writer CLI (`spec.md` §6.3) is
/// intentionally not here: this crate only knows how to *produce* bytes
/// for a section, not how to classify an input file's section type.
pub fn is_section_stream_path(path: &Path) -> bool {
    path.exists()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_stream_is_prepared_from_construction() {
        let mut s = BlobStream::new(b"hello".to_vec());
        assert_eq!(s.stream().unwrap(), b"hello");
        assert_eq!(s.buffer_size().unwrap(), 5);
    }

    #[test]
    fn file_stream_fails_before_prepare() {
        let mut s = FileStream::new("/nonexistent");
        let err = s.stream().unwrap_err();
        assert_eq!(err.code(), "failed_precondition");
    }

    #[test]
    fn file_stream_reads_contents_on_prepare() {
        let f = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(f.path(), b"archive bytes").unwrap();
        let mut s = FileStream::new(f.path());
        s.prepare().unwrap();
        assert_eq!(s.stream().unwrap(), b"archive bytes");
        assert_eq!(s.buffer_size().unwrap(), 13);
        s.finalize().unwrap();
        assert!(s.stream().is_err());
    }

    #[test]
    fn proto_stream_encodes_on_prepare() {
        let msg = prost_types::Duration {
            seconds: 5,
            nanos: 0,
        };
        let mut s = ProtoStream::new(msg.clone());
        s.prepare().unwrap();
        let expected = msg.encode_to_vec();
        assert_eq!(s.stream().unwrap(), expected.as_slice());
    }

    #[test]
    fn zlib_stream_round_trips_through_decompress_zlib_section() {
        let payload = b"the quick brown fox jumps over the lazy dog".repeat(50);
        let mut s = ZlibStream::new(BlobStream::new(payload.clone()));
        s.prepare().unwrap();
        let compressed = s.stream().unwrap().to_vec();
        assert!(compressed.len() < payload.len());

        let decompressed = decompress_zlib_section(&compressed).unwrap();
        assert_eq!(decompressed, payload);
    }

    #[test]
    fn decompress_zlib_section_rejects_length_mismatch() {
        let payload = b"short payload for compression".to_vec();
        let mut s = ZlibStream::new(BlobStream::new(payload));
        s.prepare().unwrap();
        let mut corrupted = s.stream().unwrap().to_vec();
        corrupted[0] = corrupted[0].wrapping_add(1);
        let err = decompress_zlib_section(&corrupted).unwrap_err();
        assert_eq!(err.code(), "data_loss");
    }

    #[test]
    fn decompress_zlib_section_rejects_truncated_payload() {
        let err = decompress_zlib_section(&[1, 2, 3]).unwrap_err();
        assert_eq!(err.code(), "data_loss");
    }
}
