//! Streaming metadata splicing for media assets.
//!
//! This crate rewrites a byte stream on the fly so that ranges of the
//! original stream disappear (strip chunks) and new bytes appear at chosen
//! points (inject chunks), while offering a consistent view of the resulting
//! *logical* stream both to sequential readers and to random-access readers.
//!
//! # Design Principles
//!
//! - **Streaming**: Buffers are rewritten as they pass, never the whole file
//! - **Zero-copy**: Windows no chunk touches are forwarded untouched
//! - **Two delivery modes**: Push buffers through a [`StreamingAssembler`] or
//!   pull arbitrary logical ranges from a [`RandomAccessAssembler`]
//! - **Media type agnostic**: Container parsers only find chunks; the
//!   splicing machinery knows nothing about JPEG or PNG
//!
//! # Quick Start
//!
//! The simplest way to use this library is [`rewrite_stream`], which
//! detects the container automatically:
//!
//! ```no_run
//! use asset_splice::{rewrite_file, Edits};
//!
//! # fn main() -> asset_splice::Result<()> {
//! let edits = Edits::new()
//!     .strip_exif()
//!     .set_xmp(b"<x:xmpmeta xmlns:x=\"adobe:ns:meta/\"/>".to_vec());
//! let summary = rewrite_file("image.jpg", "output.jpg", &edits)?;
//! println!("removed {} bytes, added {}", summary.stripped, summary.injected);
//! # Ok(())
//! # }
//! ```
//!
//! # Working with Chunks Directly
//!
//! For more control, build a [`ChunkSet`] yourself and drive an assembler:
//!
//! ```
//! use asset_splice::{Buffer, Chunk, ChunkKind, ChunkSet, OutputBuffer, StreamingAssembler};
//! use std::sync::Arc;
//!
//! # fn main() -> asset_splice::Result<()> {
//! let original = b"0123456789".to_vec();
//! let (chunks, append) = ChunkSet::build(
//!     vec![Chunk::strip(2, 3, ChunkKind::Other)],
//!     vec![Chunk::inject(10, &b"!"[..], ChunkKind::Other)?],
//!     original.len() as u64,
//! )?;
//!
//! let mut assembler = StreamingAssembler::from_chunks(Arc::new(chunks), append, Vec::new());
//! assembler.push(Buffer::from(original))?;
//! assembler.finish()?;
//!
//! let logical: Vec<u8> = assembler
//!     .sink()
//!     .iter()
//!     .flat_map(|b: &OutputBuffer| b.data.iter().copied())
//!     .collect();
//! assert_eq!(logical, b"0156789!");
//! # Ok(())
//! # }
//! ```

mod buffer;
mod chunk;
pub mod containers;
mod edits;
mod error;
mod intersect;
mod parser;
mod random_access;
mod rewrite;
mod sink;
mod source;
mod state;
mod streaming;
mod surgeon;
mod translate;

pub use buffer::Buffer;
pub use chunk::{AppendBuffer, Chunk, ChunkKind, ChunkLists, ChunkSet};
pub use containers::{
    detect_container, detect_from_extension, detect_from_mime, parser_for, AnyParser,
    ContainerKind, ContainerParser,
};
#[cfg(feature = "jpeg")]
pub use containers::JpegParser;
#[cfg(feature = "png")]
pub use containers::PngParser;
pub use edits::{Edits, MetadataUpdate, DEFAULT_CHUNK_SIZE};
pub use error::{Error, Result};
pub use intersect::{intersect, Intersection};
pub use parser::{ChunkParser, FixedChunks, ParseResult};
pub use random_access::RandomAccessAssembler;
pub use rewrite::{
    open_random_access, rewrite_file, rewrite_stream, rewrite_stream_with_processor,
    RewriteSummary,
};
pub use sink::{OutputBuffer, Sink, WriteSink};
#[cfg(feature = "memory-mapped")]
pub use source::MmapSource;
pub use source::{MemorySource, PhysicalSource, ReadSeekSource};
pub use state::{ParseState, StreamState};
pub use streaming::{SeekTarget, StreamingAssembler};
pub use surgeon::{BufferSurgeon, Resume, Rewritten};
pub use translate::{PositionTranslator, Translation};

// Test utilities - only compiled for tests or when explicitly enabled
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
