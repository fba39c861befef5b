//! Interface to the format parsers that discover strip and inject chunks

use crate::chunk::ChunkLists;

/// Outcome of feeding bytes to a [`ChunkParser`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseResult {
    /// The parser needs the window `[next_offset, next_offset + next_size)`
    /// before it can make progress
    NeedMoreData {
        /// Original offset the next window must start at
        next_offset: u64,
        /// Minimum number of bytes the next window must hold
        next_size: u32,
    },
    /// All chunks are known; collect them with [`ChunkParser::take_chunks`]
    Parsed,
    /// The stream is not in a form this parser understands
    Error {
        /// Human-readable description of the problem
        reason: String,
    },
}

/// Incremental discovery of metadata chunks
///
/// The driver starts by handing the parser a window at offset 0 and from then
/// on always hands it a window starting at the `next_offset` it asked for.
/// A window may hold more bytes than requested.
pub trait ChunkParser {
    /// Examine `data`, which holds original bytes starting at `offset`
    fn parse(&mut self, data: &[u8], offset: u64) -> ParseResult;

    /// Take the chunks discovered so far, leaving the parser empty
    fn take_chunks(&mut self) -> ChunkLists;

    /// Forget all progress and start over at offset 0
    fn reset(&mut self);
}

impl<P: ChunkParser + ?Sized> ChunkParser for Box<P> {
    fn parse(&mut self, data: &[u8], offset: u64) -> ParseResult {
        (**self).parse(data, offset)
    }

    fn take_chunks(&mut self) -> ChunkLists {
        (**self).take_chunks()
    }

    fn reset(&mut self) {
        (**self).reset()
    }
}

/// A parser that immediately reports a fixed set of chunks
///
/// Useful when the strip and inject lists are already known, for example
/// from an earlier pass over the same stream.
#[derive(Debug, Clone, Default)]
pub struct FixedChunks {
    chunks: ChunkLists,
    taken: Option<ChunkLists>,
}

impl FixedChunks {
    /// Report `chunks` on the first call to `parse`
    pub fn new(chunks: ChunkLists) -> Self {
        Self {
            chunks,
            taken: None,
        }
    }
}

impl ChunkParser for FixedChunks {
    fn parse(&mut self, _data: &[u8], _offset: u64) -> ParseResult {
        if self.taken.is_none() {
            self.taken = Some(self.chunks.clone());
        }
        ParseResult::Parsed
    }

    fn take_chunks(&mut self) -> ChunkLists {
        self.taken.take().unwrap_or_default()
    }

    fn reset(&mut self) {
        self.taken = None;
    }
}
