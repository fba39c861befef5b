//! One-call rewriting of whole assets
//!
//! These helpers detect the container, build its parser from [`Edits`] and
//! drive one of the assemblers to completion.

use crate::{
    buffer::Buffer,
    containers::{detect_container, parser_for, ContainerKind, DETECT_HEADER_SIZE},
    edits::Edits,
    error::{Error, Result},
    random_access::RandomAccessAssembler,
    sink::WriteSink,
    source::PhysicalSource,
    streaming::StreamingAssembler,
};
use bytes::BytesMut;
use std::{
    fs::File,
    io::{BufWriter, ErrorKind, Read, Seek, SeekFrom, Write},
    path::Path,
};

/// What a rewrite did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewriteSummary {
    /// Detected container
    pub container: ContainerKind,
    /// Original bytes read
    pub bytes_read: u64,
    /// Logical bytes written
    pub bytes_written: u64,
    /// Bytes removed by strip chunks
    pub stripped: u64,
    /// Bytes added by inject chunks, including any appended at the end
    pub injected: u64,
}

/// Rewrite `reader` into `writer` in a single streaming pass
///
/// # Example
///
/// ```
/// use asset_splice::{rewrite_stream, test_utils::JpegBuilder, Edits};
/// use std::io::Cursor;
///
/// let jpeg = JpegBuilder::new().exif(b"II*\0").build();
/// let mut output = Vec::new();
/// let summary = rewrite_stream(&mut Cursor::new(&jpeg), &mut output, &Edits::strip_all())?;
///
/// assert_eq!(summary.bytes_written, output.len() as u64);
/// assert!(output.len() < jpeg.len());
/// # Ok::<(), asset_splice::Error>(())
/// ```
pub fn rewrite_stream<R: Read + Seek, W: Write>(
    reader: &mut R,
    writer: &mut W,
    edits: &Edits,
) -> Result<RewriteSummary> {
    rewrite_stream_with_processor(reader, writer, edits, |_: &[u8]| {})
}

/// Rewrite `reader` into `writer`, passing every written buffer to `processor`
///
/// This allows processing the logical stream (e.g., hashing) while it is
/// being written, without re-reading the output.
pub fn rewrite_stream_with_processor<R: Read + Seek, W: Write, F: FnMut(&[u8])>(
    reader: &mut R,
    writer: &mut W,
    edits: &Edits,
    processor: F,
) -> Result<RewriteSummary> {
    let length = reader.seek(SeekFrom::End(0))?;
    reader.seek(SeekFrom::Start(0))?;

    let chunk_size = edits.chunk_size();
    let mut buffer = read_chunk(reader, chunk_size.max(DETECT_HEADER_SIZE))?;
    let container = detect(&buffer)?;
    let parser = parser_for(container, edits)?;

    let sink = WriteSink::with_processor(writer, processor);
    let mut assembler = StreamingAssembler::new(parser, sink, Some(length));

    let mut bytes_read = 0u64;
    while !buffer.is_empty() {
        bytes_read += buffer.len() as u64;
        assembler.push(Buffer::Unique(buffer))?;
        buffer = read_chunk(reader, chunk_size)?;
    }
    assembler.finish()?;

    let (stripped, injected) = assembler
        .chunks()
        .map(|c| (c.stripped_bytes(), c.injected_bytes() + c.appended_bytes()))
        .unwrap_or_default();
    let mut sink = assembler.into_sink();
    sink.flush()?;

    let summary = RewriteSummary {
        container,
        bytes_read,
        bytes_written: sink.written(),
        stripped,
        injected,
    };
    tracing::debug!(?summary, "rewrite complete");
    Ok(summary)
}

/// Rewrite the file at `source` into a new file at `destination`
pub fn rewrite_file<P: AsRef<Path>, Q: AsRef<Path>>(
    source: P,
    destination: Q,
    edits: &Edits,
) -> Result<RewriteSummary> {
    let mut input = File::open(source)?;
    let mut output = BufWriter::new(File::create(destination)?);
    let summary = rewrite_stream(&mut input, &mut output, edits)?;
    output.flush()?;
    Ok(summary)
}

/// Open a pull-mode view of `source` with `edits` applied
///
/// ```
/// use asset_splice::{open_random_access, test_utils::PngBuilder, Edits, MemorySource};
///
/// let png = PngBuilder::new().exif(b"MM\0*").build();
/// let mut view = open_random_access(MemorySource::new(png.clone()), &Edits::strip_all())?;
///
/// assert_eq!(view.duration_logical(), Some(png.len() as u64 - 16));
/// let head = view.read_logical_range(0, 8)?;
/// assert_eq!(&head.data[..], &png[..8]);
/// # Ok::<(), asset_splice::Error>(())
/// ```
pub fn open_random_access<S: PhysicalSource>(
    mut source: S,
    edits: &Edits,
) -> Result<RandomAccessAssembler<S>> {
    let header = source.fetch_physical_range(0, DETECT_HEADER_SIZE as u32)?;
    let container = detect(header.as_ref())?;
    let parser = parser_for(container, edits)?;
    RandomAccessAssembler::open(source, parser)
}

fn detect(header: &[u8]) -> Result<ContainerKind> {
    if header.len() < 2 {
        return Err(Error::InvalidFormat("File too small".into()));
    }
    detect_container(header).ok_or(Error::UnsupportedFormat)
}

/// Read up to `size` bytes, stopping early only at end of stream
fn read_chunk<R: Read>(reader: &mut R, size: usize) -> Result<BytesMut> {
    let mut buffer = BytesMut::zeroed(size);
    let mut filled = 0;
    while filled < size {
        match reader.read(&mut buffer[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    buffer.truncate(filled);
    Ok(buffer)
}
