//! Translation between logical and original stream positions

use crate::{
    chunk::ChunkSet,
    surgeon::Resume,
};
use bytes::{Bytes, BytesMut};

/// Outcome of translating a logical position into the original stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    /// Original offset to resume physical reading from
    pub pos_original: u64,

    /// True if the logical position lies inside injected bytes
    ///
    /// `pos_original` is then the splice point of the injected chunk and the
    /// rest of the injected bytes are in `synthesized`.
    pub inside_injected: bool,

    /// Injected bytes from the logical position up to the first physical byte
    pub synthesized: Option<Bytes>,

    /// Index of the first inject chunk still to be spliced when reading
    /// resumes at `pos_original`
    pub first_inject: usize,
}

impl Translation {
    /// Surgeon resume point for a window starting at `pos_original`
    pub fn resume(&self) -> Resume {
        Resume {
            prepend: self.synthesized.clone(),
            first_inject: self.first_inject,
        }
    }
}

/// Maps positions between the original and the logical stream of a chunk set
#[derive(Debug, Clone, Copy)]
pub struct PositionTranslator<'a> {
    chunks: &'a ChunkSet,
}

impl<'a> PositionTranslator<'a> {
    /// Create a translator for a frozen chunk set
    pub fn new(chunks: &'a ChunkSet) -> Self {
        Self { chunks }
    }

    /// Translate a logical position into the original stream
    pub fn logical_to_original(&self, pos_logical: u64) -> Translation {
        let inject = self.chunks.inject();
        let duration_original = self.chunks.duration_original();

        if let (Some(logical_end), Some(original_end)) =
            (self.chunks.duration_logical(), duration_original)
        {
            if pos_logical >= logical_end {
                return Translation {
                    pos_original: original_end,
                    inside_injected: false,
                    synthesized: None,
                    first_inject: inject.len(),
                };
            }
        }

        let clamp = |pos: u64| match duration_original {
            Some(end) if pos >= end => end.saturating_sub(1),
            _ => pos,
        };

        // Inject chunks whose logical range ends at or before the position
        let before = inject.partition_point(|c| c.end_logical() <= pos_logical);

        if let Some(chunk) = inject.get(before).filter(|c| c.offset_logical <= pos_logical) {
            let splice = chunk.offset_original;
            let skip = (pos_logical - chunk.offset_logical) as usize;

            let mut next = before + 1;
            while inject.get(next).is_some_and(|c| c.offset_original == splice) {
                next += 1;
            }

            let synthesized = match (&chunk.data, next - before) {
                (Some(data), 1) => data.slice(skip..),
                _ => {
                    let rest: usize = inject[before + 1..next].iter().map(|c| c.size as usize).sum();
                    let mut out = BytesMut::with_capacity(chunk.size as usize - skip + rest);
                    out.extend_from_slice(&chunk.bytes()[skip..]);
                    for c in &inject[before + 1..next] {
                        out.extend_from_slice(c.bytes());
                    }
                    out.freeze()
                }
            };

            return Translation {
                pos_original: clamp(splice),
                inside_injected: true,
                synthesized: Some(synthesized),
                first_inject: next,
            };
        }

        let injected_before: u64 = inject[..before].iter().map(|c| c.size as u64).sum();
        let mut pos = pos_logical - injected_before;
        for chunk in self.chunks.strip() {
            if chunk.offset_original <= pos {
                pos += chunk.size as u64;
            } else {
                break;
            }
        }

        Translation {
            pos_original: clamp(pos),
            inside_injected: false,
            synthesized: None,
            first_inject: before,
        }
    }

    /// Translate an open-ended stop position; `None` stays `None`
    pub fn translate_stop(&self, pos_logical: Option<u64>) -> Option<u64> {
        pos_logical.map(|pos| self.logical_to_original(pos).pos_original)
    }

    /// Translate an original position into the logical stream
    ///
    /// A position inside a strip chunk maps to where that chunk was cut.
    /// Inject chunks spliced at the position count as preceding it.
    pub fn original_to_logical(&self, pos_original: u64) -> u64 {
        if let (Some(original_end), Some(logical_end)) = (
            self.chunks.duration_original(),
            self.chunks.duration_logical(),
        ) {
            if pos_original >= original_end {
                return logical_end;
            }
        }

        let mut stripped = 0u64;
        for chunk in self.chunks.strip() {
            if chunk.end_original() <= pos_original {
                stripped += chunk.size as u64;
            } else {
                if chunk.offset_original < pos_original {
                    stripped += pos_original - chunk.offset_original;
                }
                break;
            }
        }

        let injected: u64 = self
            .chunks
            .inject()
            .iter()
            .take_while(|c| c.offset_original <= pos_original)
            .map(|c| c.size as u64)
            .sum();

        pos_original - stripped + injected
    }
}
