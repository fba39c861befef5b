//! Safety tests - hostile and truncated inputs
//!
//! These tests verify that malformed streams end in errors rather than
//! panics or runaway allocations. Comprehensive testing should be done with
//! fuzzing (cargo-fuzz).

use asset_splice::{Buffer, ChunkParser, Error, ParseResult, StreamingAssembler};

#[cfg(any(feature = "jpeg", feature = "png"))]
use asset_splice::Edits;

#[cfg(feature = "jpeg")]
use asset_splice::{rewrite_stream, test_utils::JpegBuilder};

#[cfg(feature = "png")]
use asset_splice::{ContainerParser, PngParser};

#[test]
#[cfg(feature = "png")]
fn test_png_chunk_length_limit() {
    let mut file = b"\x89PNG\r\n\x1a\n".to_vec();
    file.extend_from_slice(&0xFFFF_FFF0u32.to_be_bytes());
    file.extend_from_slice(b"IHDR");

    let mut parser = PngParser::with_edits(&Edits::strip_all()).unwrap();
    let mut offset = 0u64;
    let result = loop {
        match parser.parse(&file[offset as usize..], offset) {
            ParseResult::NeedMoreData { next_offset, .. } => offset = next_offset,
            other => break other,
        }
    };
    assert!(matches!(result, ParseResult::Error { .. }));
}

#[test]
#[cfg(feature = "jpeg")]
fn test_truncated_jpeg_header() {
    let file = JpegBuilder::new().jfif().exif(&[0u8; 200]).build();
    let truncated = &file[..60];

    let mut output = Vec::new();
    let err = rewrite_stream(
        &mut std::io::Cursor::new(truncated),
        &mut output,
        &Edits::strip_all(),
    )
    .unwrap_err();
    assert!(matches!(err, Error::InvalidFormat(_)));
    assert!(output.is_empty(), "nothing is forwarded before parsing completes");
}

#[test]
#[cfg(feature = "jpeg")]
fn test_zero_length_jpeg_segment() {
    let mut file = vec![0xFF, 0xD8, 0xFF, 0xE1, 0x00, 0x00];
    file.extend_from_slice(&[0u8; 32]);

    let mut output = Vec::new();
    let err = rewrite_stream(&mut std::io::Cursor::new(&file), &mut output, &Edits::new())
        .unwrap_err();
    assert!(matches!(err, Error::Parse(_)));
}

#[test]
#[cfg(feature = "jpeg")]
fn test_garbage_between_markers() {
    let mut file = vec![0xFF, 0xD8, 0x00, 0x11, 0x22, 0x33];
    file.extend_from_slice(&[0u8; 32]);

    let mut output = Vec::new();
    let err = rewrite_stream(&mut std::io::Cursor::new(&file), &mut output, &Edits::new())
        .unwrap_err();
    assert!(matches!(err, Error::Parse(_)));
}

#[test]
fn test_parser_that_never_advances_is_stopped() {
    struct Stuck;
    impl ChunkParser for Stuck {
        fn parse(&mut self, _: &[u8], _: u64) -> ParseResult {
            ParseResult::NeedMoreData {
                next_offset: 0,
                next_size: 4,
            }
        }
        fn take_chunks(&mut self) -> asset_splice::ChunkLists {
            Default::default()
        }
        fn reset(&mut self) {}
    }

    let mut assembler = StreamingAssembler::new(Stuck, Vec::new(), Some(64));
    let err = assembler.push(Buffer::from(vec![0u8; 64])).unwrap_err();
    assert!(matches!(err, Error::Parse(_)));
    assert!(matches!(
        assembler.push(Buffer::new()),
        Err(Error::SessionAborted)
    ));
}

#[test]
#[cfg(feature = "memory-mapped")]
fn test_mmap_reads_past_end_are_truncated() {
    use asset_splice::{MmapSource, PhysicalSource};
    use std::io::Write;

    let temp_path = std::env::temp_dir().join("asset_splice_mmap_safety.jpg");
    {
        let mut file = std::fs::File::create(&temp_path).unwrap();
        file.write_all(&[0xFF, 0xD8, 0xFF, 0xD9]).unwrap();
    }

    let mut source = MmapSource::open(&temp_path).unwrap();
    assert_eq!(source.query_physical_duration(), Some(4));
    assert_eq!(source.fetch_physical_range(2, 100).unwrap().len(), 2);
    assert!(source.fetch_physical_range(u64::MAX - 1, 100).unwrap().is_empty());

    std::fs::remove_file(&temp_path).ok();
}
