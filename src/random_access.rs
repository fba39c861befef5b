//! Pull-mode delivery
//!
//! [`RandomAccessAssembler`] serves arbitrary logical ranges by translating
//! them to original ranges, fetching those from a [`PhysicalSource`] and
//! rewriting the fetched window.

use crate::{
    chunk::{AppendBuffer, ChunkSet},
    edits::DEFAULT_CHUNK_SIZE,
    error::{Error, Result},
    parser::{ChunkParser, ParseResult},
    sink::OutputBuffer,
    source::PhysicalSource,
    surgeon::BufferSurgeon,
    translate::PositionTranslator,
};
use bytes::{Bytes, BytesMut};
use std::sync::Arc;

/// Pull-mode driver for one session
pub struct RandomAccessAssembler<S: PhysicalSource> {
    source: S,
    chunks: Arc<ChunkSet>,
    append: AppendBuffer,
}

impl<S: PhysicalSource> RandomAccessAssembler<S> {
    /// Discover chunks by pulling the windows `parser` asks for
    pub fn open<P: ChunkParser>(mut source: S, mut parser: P) -> Result<Self> {
        let duration = source.query_physical_duration();
        let mut offset = 0u64;
        let mut need = 0u32;

        loop {
            let size = need.max(DEFAULT_CHUNK_SIZE as u32);
            let window = source.fetch_physical_range(offset, size)?;
            if window.len() < need as usize {
                return Err(Error::InvalidFormat(format!(
                    "stream ended at {} while parser needed {} bytes at offset {}",
                    offset + window.len() as u64,
                    need,
                    offset
                )));
            }

            match parser.parse(window.as_ref(), offset) {
                ParseResult::NeedMoreData {
                    next_offset,
                    next_size,
                } => {
                    let satisfied = next_offset.saturating_add(next_size as u64)
                        <= offset + window.len() as u64;
                    if next_offset == offset && satisfied {
                        return Err(Error::Parse(format!(
                            "parser made no progress at offset {}",
                            offset
                        )));
                    }
                    tracing::trace!(next_offset, next_size, "parser needs more data");
                    offset = next_offset;
                    need = next_size;
                }
                ParseResult::Parsed => break,
                ParseResult::Error { reason } => return Err(Error::Parse(reason)),
            }
        }

        let lists = parser.take_chunks();
        let (chunks, append) = match duration {
            Some(end) => ChunkSet::build(lists.strip, lists.inject, end)?,
            None => (
                ChunkSet::build_open(lists.strip, lists.inject)?,
                AppendBuffer::default(),
            ),
        };
        tracing::debug!(
            duration_original = ?duration,
            duration_logical = ?chunks.duration_logical(),
            "pull-mode parsing complete"
        );
        Ok(Self::from_chunks(source, Arc::new(chunks), append))
    }

    /// Serve an already-frozen chunk set
    pub fn from_chunks(source: S, chunks: Arc<ChunkSet>, append: AppendBuffer) -> Self {
        Self {
            source,
            chunks,
            append,
        }
    }

    /// The frozen chunk set
    pub fn chunks(&self) -> &Arc<ChunkSet> {
        &self.chunks
    }

    /// Length of the logical stream, if known
    pub fn duration_logical(&self) -> Option<u64> {
        self.chunks.duration_logical()
    }

    /// Get a mutable reference to the source
    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Consume the assembler and return the source
    pub fn into_source(self) -> S {
        self.source
    }

    /// Produce logical bytes `[logical_offset, logical_offset + logical_size)`
    ///
    /// The range is clamped to the logical duration when it is known. For a
    /// stream of unknown length the result may be short at the end of the
    /// stream.
    pub fn read_logical_range(
        &mut self,
        logical_offset: u64,
        logical_size: u32,
    ) -> Result<OutputBuffer> {
        let empty = OutputBuffer {
            offset_logical: logical_offset,
            data: Bytes::new(),
        };

        let mut size = logical_size as u64;
        if let Some(end) = self.chunks.duration_logical() {
            if logical_offset >= end {
                return Ok(empty);
            }
            size = size.min(end - logical_offset);
        }
        if size == 0 {
            return Ok(empty);
        }

        let append_start = self.chunks.append_offset_logical().unwrap_or(u64::MAX);
        if logical_offset >= append_start {
            let skip = (logical_offset - append_start) as usize;
            return Ok(OutputBuffer {
                offset_logical: logical_offset,
                data: self.append.bytes().slice(skip..skip + size as usize),
            });
        }

        let mid = size.min(append_start - logical_offset);
        let tail = (size - mid) as usize;
        let mut data = self.read_mid(logical_offset, mid)?;

        if tail > 0 && data.len() as u64 == mid {
            let mut joined = BytesMut::with_capacity(data.len() + tail);
            joined.extend_from_slice(&data);
            joined.extend_from_slice(&self.append.bytes()[..tail]);
            data = joined.freeze();
        }

        tracing::trace!(
            logical_offset,
            requested = logical_size,
            served = data.len(),
            "logical range read"
        );
        Ok(OutputBuffer {
            offset_logical: logical_offset,
            data,
        })
    }

    /// Logical bytes before the append region, `size` >= 1
    fn read_mid(&mut self, logical_offset: u64, size: u64) -> Result<Bytes> {
        let chunks = Arc::clone(&self.chunks);
        let translator = PositionTranslator::new(&chunks);
        let start = translator.logical_to_original(logical_offset);

        if let Some(synthesized) = &start.synthesized {
            if synthesized.len() as u64 >= size {
                return Ok(synthesized.slice(..size as usize));
            }
        }

        // The last requested byte is either original byte `pos_original` or
        // injected before the splice point `pos_original`; both need the
        // window to reach one past it.
        let end = translator.logical_to_original(logical_offset + size - 1);
        let physical_end = end.pos_original + 1;
        let physical_size = physical_end.saturating_sub(start.pos_original);
        let physical_size = u32::try_from(physical_size).map_err(|_| Error::DataTooLarge {
            size: physical_size as usize,
            max: u32::MAX as usize,
        })?;

        let window = self
            .source
            .fetch_physical_range(start.pos_original, physical_size)?;
        let rewritten =
            BufferSurgeon::new(&chunks).rewrite_resumed(window, start.pos_original, start.resume())?;

        let mut data = rewritten.buffer.freeze();
        data.truncate(size as usize);
        Ok(data)
    }
}
