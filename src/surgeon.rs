//! Rewriting of physical buffer windows into logical bytes
//!
//! [`BufferSurgeon`] takes a window of original-stream bytes and produces the
//! logical bytes for the same nominal region: overlapping parts of strip
//! chunks are cut out, inject chunks whose splice point falls inside the
//! window are spliced in, and an optional prepend buffer is put in front.

use crate::{
    buffer::Buffer,
    chunk::{Chunk, ChunkSet},
    error::{Error, Result},
    intersect::{intersect, Intersection},
};
use bytes::Bytes;

/// Where physical reading resumes after a position translation
#[derive(Debug, Clone, Default)]
pub struct Resume {
    /// Logical bytes that precede the first physical byte of the window
    pub prepend: Option<Bytes>,
    /// Index of the first inject chunk that still has to be spliced
    pub first_inject: usize,
}

impl Resume {
    /// Resume with only a prepend buffer
    pub fn with_prepend(prepend: Option<Bytes>) -> Self {
        Self {
            prepend,
            first_inject: 0,
        }
    }
}

/// Result of rewriting one window
#[derive(Debug)]
pub struct Rewritten {
    /// Logical bytes for the window
    pub buffer: Buffer,
    /// True if any strip or inject chunk touched the window
    pub modified: bool,
    /// Bytes cut out of the window
    pub stripped: usize,
    /// Bytes spliced into the window (prepend excluded)
    pub injected: usize,
}

/// Applies a [`ChunkSet`] to physical buffer windows
#[derive(Debug, Clone, Copy)]
pub struct BufferSurgeon<'a> {
    chunks: &'a ChunkSet,
}

impl<'a> BufferSurgeon<'a> {
    /// Create a surgeon for a frozen chunk set
    pub fn new(chunks: &'a ChunkSet) -> Self {
        Self { chunks }
    }

    /// Rewrite `buf`, which holds original bytes starting at `buf_offset_original`
    ///
    /// A window that no chunk touches is passed through untouched, without
    /// copying, and reported as not modified.
    pub fn rewrite(
        &self,
        buf: Buffer,
        buf_offset_original: u64,
        prepend: Option<Bytes>,
    ) -> Result<Rewritten> {
        self.rewrite_resumed(buf, buf_offset_original, Resume::with_prepend(prepend))
    }

    /// Rewrite `buf`, skipping inject chunks before `resume.first_inject`
    pub fn rewrite_resumed(
        &self,
        buf: Buffer,
        buf_offset_original: u64,
        resume: Resume,
    ) -> Result<Rewritten> {
        let len = buf.len();
        let buf_size = u32::try_from(len)
            .map_err(|_| overflow(format!("buffer of {} bytes exceeds u32 window", len)))?;
        let window = buf_offset_original
            .checked_add(len as u64)
            .and_then(|end| i64::try_from(end).ok())
            .map(|_| buf_offset_original as i64)
            .ok_or_else(|| overflow(format!("window at {} exceeds the addressable range", buf_offset_original)))?;

        let cuts = self.plan_cuts(window, buf_size);
        let splices = self.plan_splices(window, buf_size, resume.first_inject);
        let prepend = resume.prepend.filter(|p| !p.is_empty());

        if cuts.is_empty() && splices.is_empty() && prepend.is_none() {
            return Ok(Rewritten {
                buffer: buf,
                modified: false,
                stripped: 0,
                injected: 0,
            });
        }

        let stripped: usize = cuts.iter().map(|&(_, n)| n).sum();
        let injected: usize = splices.iter().map(|&(_, c)| c.size as usize).sum();
        let prepend_len = prepend.as_ref().map_or(0, |p| p.len());
        let new_len = (len - stripped)
            .checked_add(injected)
            .and_then(|n| n.checked_add(prepend_len))
            .ok_or_else(|| overflow("rewritten window size overflows".into()))?;

        let mut data = buf.into_mut();

        // Strip pass: compact surviving regions leftward
        if !cuts.is_empty() {
            let mut write = 0;
            let mut read = 0;
            for &(start, n) in &cuts {
                data.copy_within(read..start, write);
                write += start - read;
                read = start + n;
            }
            data.copy_within(read..len, write);
            write += len - read;
            data.truncate(write);
        }

        // Capacity pass: grows only if injected + prepend exceed stripped
        let mut current = data.len();
        data.resize(new_len, 0);

        // Inject pass: splice points are in unstripped window coordinates
        let mut cut = 0;
        let mut stripped_before = 0;
        let mut injected_so_far = 0;
        for &(local, chunk) in &splices {
            while cut < cuts.len() && cuts[cut].0 < local {
                stripped_before += cuts[cut].1;
                cut += 1;
            }
            let pos = local - stripped_before + injected_so_far;
            let size = chunk.size as usize;
            data.copy_within(pos..current, pos + size);
            data[pos..pos + size].copy_from_slice(chunk.bytes());
            current += size;
            injected_so_far += size;
        }

        // Prepend pass
        if let Some(prepend) = prepend {
            data.copy_within(0..current, prepend_len);
            data[..prepend_len].copy_from_slice(&prepend);
            current += prepend_len;
        }

        if current != new_len {
            return Err(Error::InvariantViolated(format!(
                "rewritten window is {} bytes, expected {}",
                current, new_len
            )));
        }

        tracing::trace!(
            offset = buf_offset_original,
            size = len,
            stripped,
            injected,
            prepended = prepend_len,
            "window rewritten"
        );

        Ok(Rewritten {
            buffer: Buffer::Unique(data),
            modified: stripped > 0 || injected > 0,
            stripped,
            injected,
        })
    }

    /// Window-local `(start, len)` ranges to cut, ascending
    fn plan_cuts(&self, window: i64, buf_size: u32) -> Vec<(usize, usize)> {
        let strip = self.chunks.strip();
        let first = strip.partition_point(|c| (c.end_original() as i64) <= window);

        let mut cuts = Vec::new();
        for chunk in &strip[first..] {
            match intersect(window, buf_size, chunk.offset_original as i64, chunk.size) {
                Intersection::Before => continue,
                Intersection::After => break,
                Intersection::Overlap {
                    buffer_local_offset,
                    overlap_size,
                    ..
                } => {
                    if overlap_size > 0 {
                        cuts.push((buffer_local_offset as usize, overlap_size as usize));
                    }
                }
            }
        }
        cuts
    }

    /// Window-local splice points with their inject chunks, ascending
    ///
    /// A splice point belongs to the window iff it addresses one of the
    /// window's original bytes, so it is probed as a one-byte segment.
    fn plan_splices(
        &self,
        window: i64,
        buf_size: u32,
        first_inject: usize,
    ) -> Vec<(usize, &'a Chunk)> {
        let inject = self.chunks.inject();
        let first = inject
            .partition_point(|c| (c.offset_original as i64) < window)
            .max(first_inject);

        let mut splices = Vec::new();
        for chunk in inject.iter().skip(first) {
            match intersect(window, buf_size, chunk.offset_original as i64, 1) {
                Intersection::Before => continue,
                Intersection::After => break,
                Intersection::Overlap {
                    buffer_local_offset,
                    ..
                } => splices.push((buffer_local_offset as usize, chunk)),
            }
        }
        splices
    }
}

fn overflow(reason: String) -> Error {
    Error::InvariantViolated(reason)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{Chunk, ChunkKind};

    fn original(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    fn inject(offset: u64, data: &'static [u8]) -> Chunk {
        Chunk::inject(offset, Bytes::from_static(data), ChunkKind::Other).unwrap()
    }

    #[test]
    fn test_untouched_window_passes_through() {
        let (set, _) =
            ChunkSet::build(vec![Chunk::strip(100, 50, ChunkKind::Exif)], vec![], 1000).unwrap();
        let shared = Bytes::from(original(1000)).slice(200..300);
        let out = BufferSurgeon::new(&set)
            .rewrite(Buffer::Shared(shared.clone()), 200, None)
            .unwrap();

        assert!(!out.modified);
        assert!(!out.buffer.is_writable(), "no copy for untouched windows");
        assert_eq!(out.buffer.as_ref(), &shared[..]);
    }

    #[test]
    fn test_strip_inside_window() {
        let data = original(1000);
        let (set, _) =
            ChunkSet::build(vec![Chunk::strip(100, 50, ChunkKind::Exif)], vec![], 1000).unwrap();
        let out = BufferSurgeon::new(&set)
            .rewrite(Buffer::from(&data[90..160]), 90, None)
            .unwrap();

        assert!(out.modified);
        assert_eq!(out.buffer.len(), 20);
        let mut expected = data[90..100].to_vec();
        expected.extend_from_slice(&data[150..160]);
        assert_eq!(out.buffer.as_ref(), &expected[..]);
    }

    #[test]
    fn test_strip_exactly_spanning_window() {
        let data = original(200);
        let (set, _) =
            ChunkSet::build(vec![Chunk::strip(64, 32, ChunkKind::Xmp)], vec![], 200).unwrap();
        let out = BufferSurgeon::new(&set)
            .rewrite(Buffer::from(&data[64..96]), 64, None)
            .unwrap();

        assert!(out.modified);
        assert!(out.buffer.is_empty());
    }

    #[test]
    fn test_strip_starting_before_window() {
        let data = original(300);
        let (set, _) =
            ChunkSet::build(vec![Chunk::strip(50, 100, ChunkKind::Exif)], vec![], 300).unwrap();
        let out = BufferSurgeon::new(&set)
            .rewrite(Buffer::from(&data[100..200]), 100, None)
            .unwrap();
        assert_eq!(out.buffer.as_ref(), &data[150..200]);
        assert_eq!(out.stripped, 50);
    }

    #[test]
    fn test_inject_after_strip_in_same_window() {
        let data = original(100);
        let strip = vec![Chunk::strip(10, 10, ChunkKind::Exif)];
        let injects = vec![inject(10, b"AB"), inject(30, b"CDE")];
        let (set, _) = ChunkSet::build(strip, injects, 100).unwrap();

        let out = BufferSurgeon::new(&set)
            .rewrite(Buffer::from(&data[..]), 0, None)
            .unwrap();

        let mut expected = data[..10].to_vec();
        expected.extend_from_slice(b"AB");
        expected.extend_from_slice(&data[20..30]);
        expected.extend_from_slice(b"CDE");
        expected.extend_from_slice(&data[30..]);
        assert_eq!(out.buffer.as_ref(), &expected[..]);
        assert_eq!(out.injected, 5);
        assert_eq!(out.stripped, 10);
    }

    #[test]
    fn test_splice_at_window_end_belongs_to_next_window() {
        let data = original(100);
        let (set, _) = ChunkSet::build(vec![], vec![inject(50, b"XY")], 100).unwrap();
        let surgeon = BufferSurgeon::new(&set);

        let first = surgeon.rewrite(Buffer::from(&data[..50]), 0, None).unwrap();
        assert!(!first.modified);

        let second = surgeon.rewrite(Buffer::from(&data[50..]), 50, None).unwrap();
        assert!(second.modified);
        assert_eq!(&second.buffer.as_ref()[..3], &[b'X', b'Y', data[50]]);
    }

    #[test]
    fn test_prepend_and_skipped_injects() {
        let data = original(40);
        let (set, _) = ChunkSet::build(vec![], vec![inject(10, b"abcd"), inject(10, b"ef")], 40)
            .unwrap();

        let resume = Resume {
            prepend: Some(Bytes::from_static(b"cd")),
            first_inject: 1,
        };
        let out = BufferSurgeon::new(&set)
            .rewrite_resumed(Buffer::from(&data[10..20]), 10, resume)
            .unwrap();

        let mut expected = b"cdef".to_vec();
        expected.extend_from_slice(&data[10..20]);
        assert_eq!(out.buffer.as_ref(), &expected[..]);
    }

    #[test]
    fn test_shared_input_is_not_mutated() {
        let data = Bytes::from(original(100));
        let held = data.clone();
        let (set, _) =
            ChunkSet::build(vec![Chunk::strip(0, 10, ChunkKind::Exif)], vec![], 100).unwrap();
        let out = BufferSurgeon::new(&set)
            .rewrite(Buffer::Shared(data), 0, None)
            .unwrap();

        assert_eq!(out.buffer.len(), 90);
        assert_eq!(&held[..], &original(100)[..]);
    }

    #[test]
    fn test_window_beyond_addressable_range() {
        let (set, _) = ChunkSet::build(vec![], vec![], 10).unwrap();
        let surgeon = BufferSurgeon::new(&set);

        let err = surgeon
            .rewrite(Buffer::from(&b"abcd"[..]), i64::MAX as u64 - 2, None)
            .unwrap_err();
        assert!(matches!(err, Error::InvariantViolated(_)));
        assert!(surgeon.rewrite(Buffer::new(), u64::MAX, None).is_err());
    }

    #[test]
    fn test_empty_window() {
        let (set, _) = ChunkSet::build(vec![], vec![inject(0, b"zz")], 10).unwrap();
        let out = BufferSurgeon::new(&set)
            .rewrite(Buffer::new(), 0, None)
            .unwrap();
        assert!(!out.modified);
        assert!(out.buffer.is_empty());
    }
}
