//! Classification of a chunk against a physical buffer window

/// How a segment relates to a buffer window
///
/// Both the window and the segment are half-open ranges in original-stream
/// coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intersection {
    /// The segment ends at or before the window start
    Before,
    /// The segment starts at or after the window end
    After,
    /// The segment and the window share at least one byte
    Overlap {
        /// Where the shared bytes start, relative to the window
        buffer_local_offset: u32,
        /// Number of shared bytes
        overlap_size: u32,
        /// Where the shared bytes start, relative to the segment
        segment_local_offset: u32,
    },
}

impl Intersection {
    /// Check if this is an overlap
    pub fn is_overlap(&self) -> bool {
        matches!(self, Self::Overlap { .. })
    }
}

/// Classify segment `[seg_offset, seg_offset + seg_size)` against window
/// `[buf_offset, buf_offset + buf_size)`
pub fn intersect(buf_offset: i64, buf_size: u32, seg_offset: i64, seg_size: u32) -> Intersection {
    let buf_end = buf_offset + buf_size as i64;
    let seg_end = seg_offset + seg_size as i64;

    if seg_end <= buf_offset {
        return Intersection::Before;
    }
    if seg_offset >= buf_end {
        return Intersection::After;
    }

    if seg_offset < buf_offset {
        let segment_local_offset = (buf_offset - seg_offset) as u32;
        Intersection::Overlap {
            buffer_local_offset: 0,
            overlap_size: (seg_size - segment_local_offset).min(buf_size),
            segment_local_offset,
        }
    } else {
        let buffer_local_offset = (seg_offset - buf_offset) as u32;
        Intersection::Overlap {
            buffer_local_offset,
            overlap_size: seg_size.min(buf_size - buffer_local_offset),
            segment_local_offset: 0,
        }
    }
}
