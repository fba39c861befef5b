//! Chunk descriptors and the frozen chunk set
//!
//! A [`Chunk`] is either a range of the original stream that must disappear
//! from the logical stream (strip) or literal bytes that must appear in it
//! (inject). [`ChunkSet::build`] validates both lists, computes where every
//! inject chunk lands in the logical stream and partitions the inject chunks
//! that sit at the very end of the original stream into an [`AppendBuffer`].

use crate::error::{Error, Result};
use bytes::{Bytes, BytesMut};

/// Largest original offset a chunk may reach; window arithmetic is signed
const MAX_OFFSET: u64 = i64::MAX as u64;

/// Logical classification of a chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChunkKind {
    /// EXIF metadata
    Exif,
    /// XMP metadata
    Xmp,
    /// IPTC metadata
    Iptc,
    /// Anything else a parser decided to strip or inject
    Other,
}

impl ChunkKind {
    /// Get a string representation of this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exif => "exif",
            Self::Xmp => "xmp",
            Self::Iptc => "iptc",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for ChunkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One entry of the strip list or the inject list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Where the chunk begins in the original stream
    ///
    /// For inject chunks this is the splice point: the data is inserted
    /// immediately before the original byte at this offset.
    pub offset_original: u64,

    /// Where the chunk begins in the logical stream (inject chunks only)
    pub offset_logical: u64,

    /// Number of bytes occupied by the chunk
    pub size: u32,

    /// Literal bytes to splice in (inject chunks only)
    pub data: Option<Bytes>,

    /// What the chunk carries
    pub kind: ChunkKind,
}

impl Chunk {
    /// Create a strip chunk covering `[offset, offset + size)` of the original stream
    pub fn strip(offset: u64, size: u32, kind: ChunkKind) -> Self {
        Self {
            offset_original: offset,
            offset_logical: 0,
            size,
            data: None,
            kind,
        }
    }

    /// Create an inject chunk spliced in before original byte `offset`
    pub fn inject(offset: u64, data: impl Into<Bytes>, kind: ChunkKind) -> Result<Self> {
        let data = data.into();
        let size = u32::try_from(data.len()).map_err(|_| Error::DataTooLarge {
            size: data.len(),
            max: u32::MAX as usize,
        })?;
        Ok(Self {
            offset_original: offset,
            offset_logical: 0,
            size,
            data: Some(data),
            kind,
        })
    }

    /// End offset in the original stream (exclusive)
    pub fn end_original(&self) -> u64 {
        self.offset_original.saturating_add(self.size as u64)
    }

    /// End offset in the logical stream (exclusive, inject chunks only)
    pub fn end_logical(&self) -> u64 {
        self.offset_logical.saturating_add(self.size as u64)
    }

    /// Literal bytes of an inject chunk (empty for strip chunks)
    pub fn bytes(&self) -> &[u8] {
        self.data.as_deref().unwrap_or(&[])
    }

    /// Check if this chunk carries inject data
    pub fn is_inject(&self) -> bool {
        self.data.is_some()
    }
}

/// Strip and inject candidates as reported by a format parser
#[derive(Debug, Clone, Default)]
pub struct ChunkLists {
    /// Ranges to remove, ascending by original offset
    pub strip: Vec<Chunk>,
    /// Data to insert, ascending by original offset
    pub inject: Vec<Chunk>,
}

impl ChunkLists {
    /// Check if the parser found nothing to change
    pub fn is_empty(&self) -> bool {
        self.strip.is_empty() && self.inject.is_empty()
    }
}

/// Inject chunks whose splice point is the end of the original stream,
/// concatenated in order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppendBuffer {
    data: Bytes,
}

impl AppendBuffer {
    /// Number of bytes to append
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if there is nothing to append
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The bytes to append
    pub fn bytes(&self) -> &Bytes {
        &self.data
    }
}

/// Frozen, validated strip and inject lists for one stream
///
/// Once built a chunk set is never mutated, so it can be shared freely
/// (typically behind an `Arc`) between the assemblers and translators of a
/// session.
#[derive(Debug, Clone, Default)]
pub struct ChunkSet {
    strip: Vec<Chunk>,
    inject: Vec<Chunk>,
    duration_original: Option<u64>,
    stripped: u64,
    injected: u64,
    appended: u64,
}

impl ChunkSet {
    /// Validate and freeze the chunk lists of a stream of known length
    ///
    /// Empty inject chunks are dropped. Inject chunks spliced at
    /// `duration_original` are moved out of the inject list into the returned
    /// [`AppendBuffer`].
    pub fn build(
        strip: Vec<Chunk>,
        inject: Vec<Chunk>,
        duration_original: u64,
    ) -> Result<(ChunkSet, AppendBuffer)> {
        Self::build_inner(strip, inject, Some(duration_original))
    }

    /// Validate and freeze the chunk lists of a stream of unknown length
    ///
    /// Nothing is partitioned into an append buffer and the logical duration
    /// stays unknown.
    pub fn build_open(strip: Vec<Chunk>, inject: Vec<Chunk>) -> Result<ChunkSet> {
        let (set, _) = Self::build_inner(strip, inject, None)?;
        Ok(set)
    }

    fn build_inner(
        strip: Vec<Chunk>,
        mut inject: Vec<Chunk>,
        duration_original: Option<u64>,
    ) -> Result<(ChunkSet, AppendBuffer)> {
        inject.retain(|c| c.size != 0 || c.data.as_ref().is_some_and(|d| !d.is_empty()));

        validate_strip(&strip, duration_original)?;
        validate_inject(&inject, duration_original)?;
        validate_splice_points(&strip, &inject)?;

        // Two-pointer merge: strip chunks entirely before each splice point
        let mut cursor = 0;
        let mut stripped_before = 0u64;
        let mut injected_before = 0u64;
        for chunk in inject.iter_mut() {
            while cursor < strip.len() && strip[cursor].offset_original < chunk.offset_original {
                stripped_before += strip[cursor].size as u64;
                cursor += 1;
            }
            chunk.offset_logical = chunk.offset_original - stripped_before + injected_before;
            injected_before += chunk.size as u64;
        }

        let trailing = match duration_original {
            Some(end) => {
                let keep = inject
                    .iter()
                    .rposition(|c| c.offset_original != end)
                    .map_or(0, |i| i + 1);
                inject.split_off(keep)
            }
            None => Vec::new(),
        };

        let mut append = BytesMut::with_capacity(trailing.iter().map(|c| c.size as usize).sum());
        for chunk in &trailing {
            append.extend_from_slice(chunk.bytes());
        }

        let stripped = strip.iter().map(|c| c.size as u64).sum();
        let injected = inject.iter().map(|c| c.size as u64).sum();

        let set = ChunkSet {
            strip,
            inject,
            duration_original,
            stripped,
            injected,
            appended: append.len() as u64,
        };

        tracing::debug!(
            strip = set.strip.len(),
            inject = set.inject.len(),
            stripped = set.stripped,
            injected = set.injected,
            appended = set.appended,
            duration_original = ?set.duration_original,
            duration_logical = ?set.duration_logical(),
            "chunk set frozen"
        );

        Ok((
            set,
            AppendBuffer {
                data: append.freeze(),
            },
        ))
    }

    /// Strip chunks, ascending by original offset
    pub fn strip(&self) -> &[Chunk] {
        &self.strip
    }

    /// Mid-stream inject chunks, ascending by original (and logical) offset
    pub fn inject(&self) -> &[Chunk] {
        &self.inject
    }

    /// Length of the original stream, if known
    pub fn duration_original(&self) -> Option<u64> {
        self.duration_original
    }

    /// Length of the logical stream, if known
    ///
    /// `duration_original - stripped + injected`, counting the append buffer
    /// as injected bytes.
    pub fn duration_logical(&self) -> Option<u64> {
        self.duration_original
            .map(|d| d - self.stripped + self.injected + self.appended)
    }

    /// Logical offset where the append buffer starts, if the length is known
    pub fn append_offset_logical(&self) -> Option<u64> {
        self.duration_logical().map(|d| d - self.appended)
    }

    /// Total bytes removed by strip chunks
    pub fn stripped_bytes(&self) -> u64 {
        self.stripped
    }

    /// Total bytes added by mid-stream inject chunks
    pub fn injected_bytes(&self) -> u64 {
        self.injected
    }

    /// Total bytes in the append buffer
    pub fn appended_bytes(&self) -> u64 {
        self.appended
    }

    /// Check if this set leaves every stream untouched
    pub fn is_empty(&self) -> bool {
        self.strip.is_empty() && self.inject.is_empty() && self.appended == 0
    }
}

fn violated(reason: String) -> Error {
    Error::InvariantViolated(reason)
}

/// End of `chunk` in the original stream, if it stays addressable
fn checked_end(chunk: &Chunk) -> Result<u64> {
    chunk
        .offset_original
        .checked_add(chunk.size as u64)
        .filter(|&end| end <= MAX_OFFSET)
        .ok_or_else(|| {
            violated(format!(
                "chunk at offset {} with size {} exceeds the addressable range",
                chunk.offset_original, chunk.size
            ))
        })
}

fn validate_strip(strip: &[Chunk], duration: Option<u64>) -> Result<()> {
    for chunk in strip {
        if chunk.size == 0 {
            return Err(violated(format!(
                "empty strip chunk at offset {}",
                chunk.offset_original
            )));
        }
        let chunk_end = checked_end(chunk)?;
        if let Some(end) = duration {
            if chunk_end > end {
                return Err(violated(format!(
                    "strip chunk {}..{} extends past stream end {}",
                    chunk.offset_original, chunk_end, end
                )));
            }
        }
    }
    for pair in strip.windows(2) {
        if pair[0].end_original() > pair[1].offset_original {
            return Err(violated(format!(
                "strip chunks {}..{} and {}..{} are unsorted or overlap",
                pair[0].offset_original,
                pair[0].end_original(),
                pair[1].offset_original,
                pair[1].end_original()
            )));
        }
    }
    Ok(())
}

fn validate_inject(inject: &[Chunk], duration: Option<u64>) -> Result<()> {
    for chunk in inject {
        let len = chunk.data.as_ref().map(|d| d.len());
        if len != Some(chunk.size as usize) {
            return Err(violated(format!(
                "inject chunk at offset {} has size {} but {:?} data bytes",
                chunk.offset_original, chunk.size, len
            )));
        }
        checked_end(chunk)?;
        if let Some(end) = duration {
            if chunk.offset_original > end {
                return Err(violated(format!(
                    "inject chunk at offset {} lies past stream end {}",
                    chunk.offset_original, end
                )));
            }
        }
    }
    for pair in inject.windows(2) {
        if pair[0].offset_original > pair[1].offset_original {
            return Err(violated(format!(
                "inject chunks at {} and {} are unsorted",
                pair[0].offset_original, pair[1].offset_original
            )));
        }
    }
    Ok(())
}

fn validate_splice_points(strip: &[Chunk], inject: &[Chunk]) -> Result<()> {
    let mut cursor = 0;
    for chunk in inject {
        while cursor < strip.len() && strip[cursor].end_original() <= chunk.offset_original {
            cursor += 1;
        }
        if let Some(s) = strip.get(cursor) {
            if s.offset_original < chunk.offset_original {
                return Err(violated(format!(
                    "inject point {} falls inside strip chunk {}..{}",
                    chunk.offset_original,
                    s.offset_original,
                    s.end_original()
                )));
            }
        }
    }
    Ok(())
}
