//! Physical byte sources for pull-mode delivery

use crate::{buffer::Buffer, error::Result};
use bytes::{Bytes, BytesMut};
use std::io::{ErrorKind, Read, Seek, SeekFrom};

/// Upstream storage the random-access assembler pulls original bytes from
pub trait PhysicalSource {
    /// Read `size` bytes starting at `offset`
    ///
    /// Returns fewer bytes only when the range runs past the end of the
    /// stream.
    fn fetch_physical_range(&mut self, offset: u64, size: u32) -> Result<Buffer>;

    /// Total length of the original stream, if known
    fn query_physical_duration(&mut self) -> Option<u64>;
}

impl<S: PhysicalSource + ?Sized> PhysicalSource for &mut S {
    fn fetch_physical_range(&mut self, offset: u64, size: u32) -> Result<Buffer> {
        (**self).fetch_physical_range(offset, size)
    }

    fn query_physical_duration(&mut self) -> Option<u64> {
        (**self).query_physical_duration()
    }
}

/// In-memory source; ranges are handed out as shared, zero-copy slices
#[derive(Debug, Clone)]
pub struct MemorySource {
    data: Bytes,
}

impl MemorySource {
    /// Wrap bytes already in memory
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }
}

impl PhysicalSource for MemorySource {
    fn fetch_physical_range(&mut self, offset: u64, size: u32) -> Result<Buffer> {
        let len = self.data.len() as u64;
        let start = offset.min(len) as usize;
        let end = offset.saturating_add(size as u64).min(len) as usize;
        Ok(Buffer::Shared(self.data.slice(start..end)))
    }

    fn query_physical_duration(&mut self) -> Option<u64> {
        Some(self.data.len() as u64)
    }
}

/// Source over any seekable reader (files, cursors)
#[derive(Debug)]
pub struct ReadSeekSource<R: Read + Seek> {
    reader: R,
    length: Option<u64>,
}

impl<R: Read + Seek> ReadSeekSource<R> {
    /// Wrap a reader, measuring its length by seeking to the end
    pub fn new(mut reader: R) -> Result<Self> {
        let length = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;
        Ok(Self {
            reader,
            length: Some(length),
        })
    }

    /// Wrap a reader whose length must not be relied upon
    pub fn without_length(reader: R) -> Self {
        Self {
            reader,
            length: None,
        }
    }

    /// Consume the source and return the reader
    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: Read + Seek> PhysicalSource for ReadSeekSource<R> {
    fn fetch_physical_range(&mut self, offset: u64, size: u32) -> Result<Buffer> {
        self.reader.seek(SeekFrom::Start(offset))?;

        let mut buffer = BytesMut::zeroed(size as usize);
        let mut filled = 0;
        while filled < buffer.len() {
            match self.reader.read(&mut buffer[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        buffer.truncate(filled);
        Ok(Buffer::Unique(buffer))
    }

    fn query_physical_duration(&mut self) -> Option<u64> {
        self.length
    }
}

/// Memory-mapped file source; ranges are zero-copy views of the map
#[cfg(feature = "memory-mapped")]
#[derive(Debug, Clone)]
pub struct MmapSource {
    map: Bytes,
}

#[cfg(feature = "memory-mapped")]
impl MmapSource {
    /// Map a file read-only
    ///
    /// The file must not be truncated by another process while the map is
    /// alive.
    pub fn open<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        // SAFETY: the map is read-only; callers guarantee the file is not
        // truncated for the lifetime of the source.
        let mmap = unsafe { memmap2::Mmap::map(&file)? };
        Ok(Self {
            map: Bytes::from_owner(mmap),
        })
    }
}

#[cfg(feature = "memory-mapped")]
impl PhysicalSource for MmapSource {
    fn fetch_physical_range(&mut self, offset: u64, size: u32) -> Result<Buffer> {
        let len = self.map.len() as u64;
        let start = offset.min(len) as usize;
        let end = offset.saturating_add(size as u64).min(len) as usize;
        Ok(Buffer::Shared(self.map.slice(start..end)))
    }

    fn query_physical_duration(&mut self) -> Option<u64> {
        Some(self.map.len() as u64)
    }
}
