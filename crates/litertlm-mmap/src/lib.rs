//! Scoped, shared-ownership memory-mapped file views.
//!
//! A [`MappedView`] exposes a contiguous `[u8]` slice over a file region.
//! Release of the underlying kernel mapping is guaranteed on drop of the
//! last clone; there is no explicit `close()` to forget to call.

#![forbid(unsafe_code)]

use std::fs::{File, OpenOptions};
use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;

use litertlm_error::{Error, Result};
use memmap2::{Mmap, MmapMut, MmapOptions};

/// Either flavor of backing mapping. Kept behind one `Arc` so a
/// [`MappedView`] clone shares the kernel-level mapping with its siblings
/// regardless of mutability.
enum Backing {
    ReadOnly(Mmap),
    ReadWrite(MmapMut),
}

impl Backing {
    fn as_slice(&self) -> &[u8] {
        match self {
            Backing::ReadOnly(m) => m,
            Backing::ReadWrite(m) => m,
        }
    }
}

/// A shared-ownership view over `[data, data+length)` of a mapped file.
///
/// Cloning is cheap: it bumps a reference count on the mapping, it does
/// not re-map. Sub-views produced by [`MappedView::sub_range`] borrow from
/// the same parent mapping.
#[derive(Clone)]
pub struct MappedView {
    backing: Arc<Backing>,
    offset: usize,
    len: usize,
}

impl MappedView {
    /// Open the entire file read-only.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::from_file(&file, false)
    }

    /// Open the entire file; `mutable` selects a writable mapping whose
    /// changes are visible to other mappings and persisted to disk.
    pub fn open_with_mode(path: impl AsRef<Path>, mutable: bool) -> Result<Self> {
        let file = if mutable {
            OpenOptions::new().read(true).write(true).open(path.as_ref())?
        } else {
            File::open(path.as_ref())?
        };
        Self::from_file(&file, mutable)
    }

    fn from_file(file: &File, mutable: bool) -> Result<Self> {
        let metadata = file.metadata()?;
        let len = metadata.len() as usize;
        let backing = if mutable {
            // SAFETY: callers are responsible for not concurrently
            // truncating the file out from under the mapping, the same
            // caveat every memmap-backed API carries.
            let mmap = unsafe { MmapMut::map_mut(file) }
                .map_err(|e| Error::internal(format!("mmap failed: {e}")))?;
            Backing::ReadWrite(mmap)
        } else {
            let mmap = unsafe { Mmap::map(file) }
                .map_err(|e| Error::internal(format!("mmap failed: {e}")))?;
            Backing::ReadOnly(mmap)
        };
        Ok(MappedView {
            backing: Arc::new(backing),
            offset: 0,
            len,
        })
    }

    /// Map a specific byte range `[offset, offset+length)` of an
    /// already-open file handle.
    ///
    /// `offset` must be a multiple of [`page_granularity`]. If `length`
    /// is `0`, the range extends from `offset` to the end of the file.
    pub fn open_range(file: &File, offset: u64, length: u64) -> Result<Self> {
        let granularity = page_granularity() as u64;
        if offset % granularity != 0 {
            return Err(Error::invalid_argument(format!(
                "offset {offset} is not a multiple of the page granularity {granularity}"
            )));
        }

        let file_len = file.metadata()?.len();
        if offset > file_len {
            return Err(Error::invalid_argument(format!(
                "offset {offset} exceeds file size {file_len}"
            )));
        }

        let map_len = if length == 0 { file_len - offset } else { length };
        if offset + map_len > file_len {
            return Err(Error::invalid_argument(format!(
                "range [{offset}, {}) exceeds file size {file_len}",
                offset + map_len
            )));
        }

        let mmap = unsafe {
            MmapOptions::new()
                .offset(offset)
                .len(map_len as usize)
                .map(file)
        }
        .map_err(|e| Error::internal(format!("mmap failed: {e}")))?;

        Ok(MappedView {
            backing: Arc::new(Backing::ReadOnly(mmap)),
            offset: 0,
            len: map_len as usize,
        })
    }

    /// Map `[offset, offset+length)` against `file`, accepting any
    /// `offset`: it is rounded down to the page granularity internally
    /// and the returned view's pointer/length are adjusted so the caller
    /// still sees exactly the requested range.
    pub fn open_auto_aligned(file: &File, offset: u64, length: u64) -> Result<Self> {
        let granularity = page_granularity() as u64;
        let aligned_offset = (offset / granularity) * granularity;
        let pad = (offset - aligned_offset) as usize;

        let file_len = file.metadata()?.len();
        let requested_len = if length == 0 {
            file_len.saturating_sub(offset)
        } else {
            length
        };
        let map_len = requested_len + pad as u64;

        if aligned_offset + map_len > file_len {
            return Err(Error::invalid_argument(format!(
                "auto-aligned range [{aligned_offset}, {}) exceeds file size {file_len}",
                aligned_offset + map_len
            )));
        }

        let mmap = unsafe {
            MmapOptions::new()
                .offset(aligned_offset)
                .len(map_len as usize)
                .map(file)
        }
        .map_err(|e| Error::internal(format!("mmap failed: {e}")))?;

        Ok(MappedView {
            backing: Arc::new(Backing::ReadOnly(mmap)),
            offset: pad,
            len: requested_len as usize,
        })
    }

    /// Borrow a sub-range `[start, start+len)` of this view without
    /// mapping again; the returned view shares this view's mapping.
    pub fn sub_range(&self, start: usize, len: usize) -> Result<Self> {
        if start + len > self.len {
            return Err(Error::invalid_argument(format!(
                "sub-range [{start}, {}) exceeds view length {}",
                start + len,
                self.len
            )));
        }
        Ok(MappedView {
            backing: Arc::clone(&self.backing),
            offset: self.offset + start,
            len,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Deref for MappedView {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.backing.as_slice()[self.offset..self.offset + self.len]
    }
}

impl AsRef<[u8]> for MappedView {
    fn as_ref(&self) -> &[u8] {
        self
    }
}

/// The platform's memory-mapping offset granularity: 4 KiB on typical
/// POSIX systems, 64 KiB on Windows.
pub fn page_granularity() -> usize {
    if cfg!(target_os = "windows") {
        65536
    } else {
        4096
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(bytes: &[u8]) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(bytes).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn open_whole_file_reads_all_bytes() {
        let f = write_temp(b"hello mapped world");
        let view = MappedView::open(f.path()).unwrap();
        assert_eq!(&view[..], b"hello mapped world");
    }

    #[test]
    fn open_range_rejects_unaligned_offset() {
        let f = write_temp(&vec![0u8; page_granularity() * 2]);
        let file = File::open(f.path()).unwrap();
        let err = MappedView::open_range(&file, 1, 4096).unwrap_err();
        assert_eq!(err.code(), "invalid_argument");
    }

    #[test]
    fn open_range_zero_length_maps_to_end_of_file() {
        let granularity = page_granularity() as u64;
        let f = write_temp(&vec![7u8; (granularity * 2) as usize]);
        let file = File::open(f.path()).unwrap();
        let view = MappedView::open_range(&file, granularity, 0).unwrap();
        assert_eq!(view.len(), granularity as usize);
        assert!(view.iter().all(|&b| b == 7));
    }

    #[test]
    fn open_range_rejects_out_of_bounds() {
        let f = write_temp(&vec![0u8; 4096]);
        let file = File::open(f.path()).unwrap();
        let err = MappedView::open_range(&file, 4096, 4096).unwrap_err();
        assert_eq!(err.code(), "invalid_argument");
    }

    #[test]
    fn auto_aligned_accepts_unaligned_offset() {
        let granularity = page_granularity() as u64;
        let mut data = vec![0u8; (granularity * 2) as usize];
        for (i, b) in data.iter_mut().enumerate() {
            *b = (i % 256) as u8;
        }
        let f = write_temp(&data);
        let file = File::open(f.path()).unwrap();

        let offset = granularity + 17;
        let view = MappedView::open_auto_aligned(&file, offset, 100).unwrap();
        assert_eq!(view.len(), 100);
        assert_eq!(&view[..], &data[offset as usize..offset as usize + 100]);
    }

    #[test]
    fn sub_range_shares_parent_mapping() {
        let f = write_temp(b"0123456789");
        let view = MappedView::open(f.path()).unwrap();
        let sub = view.sub_range(2, 4).unwrap();
        assert_eq!(&sub[..], b"2345");
        drop(view);
        assert_eq!(&sub[..], b"2345");
    }

    #[test]
    fn sub_range_out_of_bounds_is_invalid_argument() {
        let f = write_temp(b"short");
        let view = MappedView::open(f.path()).unwrap();
        let err = view.sub_range(1, 100).unwrap_err();
        assert_eq!(err.code(), "invalid_argument");
    }

    #[test]
    fn open_missing_file_is_not_found() {
        let err = MappedView::open("/nonexistent/path/for/litertlm/test").unwrap_err();
        assert_eq!(err.code(), "not_found");
    }
}
