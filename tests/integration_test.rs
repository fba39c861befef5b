// Integration tests comparing both assemblers against a byte-by-byte reference

use asset_splice::{
    test_utils::{patterned, reference_rewrite},
    Buffer, Chunk, ChunkKind, ChunkSet, Error, FixedChunks, MemorySource, OutputBuffer,
    RandomAccessAssembler, StreamingAssembler,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

/// Random valid strip and inject lists over a stream of `len` bytes
fn random_chunks(rng: &mut StdRng, len: u64) -> (Vec<Chunk>, Vec<Chunk>) {
    let mut strip = Vec::new();
    let mut pos = 0u64;
    while pos < len {
        pos += rng.gen_range(0..90);
        let size = rng.gen_range(1..40u32);
        if pos + size as u64 > len {
            break;
        }
        if rng.gen_bool(0.6) {
            strip.push(Chunk::strip(pos, size, ChunkKind::Other));
        }
        pos += size as u64;
    }

    let mut inject = Vec::new();
    let mut pos = 0u64;
    loop {
        pos += rng.gen_range(0..120);
        if pos > len {
            break;
        }
        let inside_strip = strip
            .iter()
            .any(|s| s.offset_original < pos && pos < s.end_original());
        if !inside_strip {
            for _ in 0..rng.gen_range(1..3) {
                let size = rng.gen_range(1..25usize);
                let data: Vec<u8> = (0..size).map(|_| rng.gen()).collect();
                inject.push(Chunk::inject(pos, data, ChunkKind::Other).unwrap());
            }
        }
    }
    if rng.gen_bool(0.3) {
        inject.push(Chunk::inject(len, &b"<appended>"[..], ChunkKind::Other).unwrap());
    }
    (strip, inject)
}

fn concat(out: &[OutputBuffer]) -> Vec<u8> {
    let mut all = Vec::new();
    for buffer in out {
        assert_eq!(buffer.offset_logical, all.len() as u64, "gap in logical output");
        all.extend_from_slice(&buffer.data);
    }
    all
}

/// Push `original` through a streaming assembler in random-sized pieces
fn stream(rng: &mut StdRng, original: &[u8], set: Arc<ChunkSet>, append: asset_splice::AppendBuffer) -> Vec<u8> {
    let mut assembler = StreamingAssembler::from_chunks(set, append, Vec::new());
    let mut pos = 0;
    while pos < original.len() {
        let n = rng.gen_range(1..64).min(original.len() - pos);
        assembler.push(Buffer::from(&original[pos..pos + n])).unwrap();
        pos += n;
    }
    assembler.finish().unwrap();
    concat(assembler.sink())
}

#[test]
fn test_streaming_matches_reference() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..300 {
        let len = rng.gen_range(1..600u64);
        let original = patterned(len as usize);
        let (strip, inject) = random_chunks(&mut rng, len);
        let expected = reference_rewrite(&original, &strip, &inject);

        let (set, append) = ChunkSet::build(strip, inject, len).unwrap();
        assert_eq!(set.duration_logical(), Some(expected.len() as u64));

        let got = stream(&mut rng, &original, Arc::new(set), append);
        assert_eq!(got, expected);
    }
}

#[test]
fn test_random_access_matches_reference() {
    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..200 {
        let len = rng.gen_range(1..500u64);
        let original = patterned(len as usize);
        let (strip, inject) = random_chunks(&mut rng, len);
        let expected = reference_rewrite(&original, &strip, &inject);

        let (set, append) = ChunkSet::build(strip, inject, len).unwrap();
        let mut ra = RandomAccessAssembler::from_chunks(
            MemorySource::new(original.clone()),
            Arc::new(set),
            append,
        );

        for _ in 0..40 {
            let offset = rng.gen_range(0..expected.len() as u64 + 5);
            let size = rng.gen_range(0..80u32);
            let out = ra.read_logical_range(offset, size).unwrap();

            let start = (offset as usize).min(expected.len());
            let end = (start + size as usize).min(expected.len());
            assert_eq!(
                &out.data[..],
                &expected[start..end],
                "range {}+{} of {}",
                offset,
                size,
                expected.len()
            );
        }
    }
}

#[test]
fn test_sequential_random_access_reads_concatenate() {
    let mut rng = StdRng::seed_from_u64(3);
    let len = 2000u64;
    let original = patterned(len as usize);
    let (strip, inject) = random_chunks(&mut rng, len);
    let expected = reference_rewrite(&original, &strip, &inject);

    let (set, append) = ChunkSet::build(strip, inject, len).unwrap();
    let mut ra =
        RandomAccessAssembler::from_chunks(MemorySource::new(original), Arc::new(set), append);

    let mut all = Vec::new();
    let mut offset = 0;
    loop {
        let out = ra.read_logical_range(offset, 33).unwrap();
        if out.is_empty() {
            break;
        }
        offset += out.len() as u64;
        all.extend_from_slice(&out.data);
    }
    assert_eq!(all, expected);
}

#[test]
fn test_seek_then_stream_matches_reference_suffix() {
    let mut rng = StdRng::seed_from_u64(5);
    for _ in 0..100 {
        let len = rng.gen_range(1..400u64);
        let original = patterned(len as usize);
        let (strip, inject) = random_chunks(&mut rng, len);
        let expected = reference_rewrite(&original, &strip, &inject);
        let (set, append) = ChunkSet::build(strip, inject, len).unwrap();

        let target = rng.gen_range(0..=expected.len() as u64);
        let mut assembler = StreamingAssembler::from_chunks(Arc::new(set), append, Vec::new());
        let resume = assembler.seek_logical(target).unwrap() as usize;
        if resume < original.len() {
            assembler.push(Buffer::from(&original[resume..])).unwrap();
        }
        assembler.finish().unwrap();

        let out = assembler.sink();
        let got: Vec<u8> = out.iter().flat_map(|b| b.data.iter().copied()).collect();
        if let Some(first) = out.first() {
            assert_eq!(first.offset_logical, target);
        }
        assert_eq!(got, &expected[target as usize..], "seek to {}", target);
    }
}

#[test]
fn test_append_buffer_forwarded_once_after_seek_back() {
    let original = patterned(200);
    let strip = vec![Chunk::strip(120, 30, ChunkKind::Exif)];
    let inject = vec![
        Chunk::inject(60, &b"mid"[..], ChunkKind::Xmp).unwrap(),
        Chunk::inject(200, &b"<appended>"[..], ChunkKind::Other).unwrap(),
    ];
    let expected = reference_rewrite(&original, &strip, &inject);
    let (set, append) = ChunkSet::build(strip, inject, 200).unwrap();
    let mut assembler = StreamingAssembler::from_chunks(Arc::new(set), append, Vec::new());

    // first pass runs into the append region
    for piece in original.chunks(64) {
        assembler.push(Buffer::from(piece)).unwrap();
    }
    assert_eq!(concat(assembler.sink()), expected);

    // seek back to the middle and cross the end again
    let target = 100u64;
    let resume = assembler.seek_logical(target).unwrap() as usize;
    assembler.sink_mut().clear();
    for piece in original[resume..].chunks(37) {
        assembler.push(Buffer::from(piece)).unwrap();
    }
    assembler.finish().unwrap();

    let out = assembler.sink();
    let appended = out.iter().filter(|b| b.data.ends_with(b"<appended>")).count();
    assert_eq!(appended, 1);
    assert_eq!(out[0].offset_logical, target);
    let got: Vec<u8> = out.iter().flat_map(|b| b.data.iter().copied()).collect();
    assert_eq!(got, &expected[target as usize..]);
}

#[test]
fn test_push_mode_parsing_with_fixed_chunks() {
    let original = patterned(100);
    let strip = vec![Chunk::strip(0, 10, ChunkKind::Exif)];
    let inject = vec![Chunk::inject(50, &b"xyz"[..], ChunkKind::Xmp).unwrap()];
    let expected = reference_rewrite(&original, &strip, &inject);

    let parser = FixedChunks::new(asset_splice::ChunkLists { strip, inject });
    let mut assembler = StreamingAssembler::new(parser, Vec::new(), Some(100));
    for piece in original.chunks(30) {
        assembler.push(Buffer::from(piece)).unwrap();
    }
    assembler.finish().unwrap();
    assert_eq!(concat(assembler.sink()), expected);
}

#[test]
fn test_inject_only_at_start() {
    // 500 original bytes, 20 injected at 0
    let original = patterned(500);
    let inject = vec![Chunk::inject(0, vec![0xAA; 20], ChunkKind::Xmp).unwrap()];
    let (set, append) = ChunkSet::build(vec![], inject, 500).unwrap();
    let set = Arc::new(set);
    assert_eq!(set.duration_logical(), Some(520));

    let mut ra =
        RandomAccessAssembler::from_chunks(MemorySource::new(original.clone()), set.clone(), append.clone());
    let out = ra.read_logical_range(10, 20).unwrap();
    let mut expected = vec![0xAA; 10];
    expected.extend_from_slice(&original[..10]);
    assert_eq!(&out.data[..], &expected[..]);

    // first window emitted in push mode starts with the injected bytes
    let mut assembler = StreamingAssembler::from_chunks(set, append, Vec::new());
    assembler.push(Buffer::from(&original[..64])).unwrap();
    let first = &assembler.sink()[0];
    assert_eq!(first.offset_logical, 0);
    assert_eq!(&first.data[..20], &[0xAA; 20][..]);
    assert_eq!(first.len(), 84);
}

#[test]
fn test_invalid_chunk_lists_rejected() {
    let result = ChunkSet::build(
        vec![Chunk::strip(10, 10, ChunkKind::Exif)],
        vec![Chunk::inject(15, &b"x"[..], ChunkKind::Xmp).unwrap()],
        100,
    );
    assert!(matches!(result, Err(Error::InvariantViolated(_))));
}

#[test]
fn test_unknown_length_stream() {
    let original = patterned(300);
    let strip = vec![Chunk::strip(100, 20, ChunkKind::Other)];
    let inject = vec![
        Chunk::inject(40, &b"mid"[..], ChunkKind::Other).unwrap(),
        Chunk::inject(300, &b"end"[..], ChunkKind::Other).unwrap(),
    ];
    let expected = reference_rewrite(&original, &strip, &inject);

    let parser = FixedChunks::new(asset_splice::ChunkLists { strip, inject });
    let mut assembler = StreamingAssembler::new(parser, Vec::new(), None);
    for piece in original.chunks(41) {
        assembler.push(Buffer::from(piece)).unwrap();
    }
    assembler.finish().unwrap();

    assert_eq!(assembler.state().duration_logical, None);
    assert_eq!(concat(assembler.sink()), expected);
}

#[cfg(all(feature = "jpeg", feature = "png"))]
mod containers {
    use super::*;
    use asset_splice::{
        open_random_access, rewrite_stream, test_utils::{JpegBuilder, PngBuilder}, Edits,
    };
    use std::io::Cursor;

    #[test]
    fn test_push_and_pull_agree_on_jpeg() {
        let original = JpegBuilder::new()
            .jfif()
            .exif(&[7u8; 300])
            .xmp(&[b'x'; 500])
            .iptc(b"\x1c\x02\x00\x00\x02\x00\x04")
            .scan(&patterned(4000))
            .build();
        let edits = Edits::new()
            .strip_exif()
            .set_xmp(b"<x:xmpmeta>replaced</x:xmpmeta>".to_vec())
            .strip_iptc()
            .with_chunk_size(100);

        let mut pushed = Vec::new();
        rewrite_stream(&mut Cursor::new(&original), &mut pushed, &edits).unwrap();

        let mut view = open_random_access(MemorySource::new(original.clone()), &edits).unwrap();
        assert_eq!(view.duration_logical(), Some(pushed.len() as u64));

        let mut pulled = Vec::new();
        let mut offset = 0;
        while offset < pushed.len() as u64 {
            let out = view.read_logical_range(offset, 77).unwrap();
            offset += out.len() as u64;
            pulled.extend_from_slice(&out.data);
        }
        assert_eq!(pulled, pushed);
        assert!(pushed.windows(9).any(|w| w == b"replaced<"));
    }

    #[test]
    fn test_png_rewrite_is_a_valid_png() {
        let original = PngBuilder::new()
            .exif(b"MM\0*\0\0\0\x08")
            .text(b"tEXt", b"Raw profile type iptc", b"\nIPTC\n")
            .idat(&patterned(1000))
            .build();
        let edits = Edits::strip_all().set_xmp(b"<x/>".to_vec());

        let mut output = Vec::new();
        rewrite_stream(&mut Cursor::new(&original), &mut output, &edits).unwrap();

        let expected = PngBuilder::new().xmp(b"<x/>").idat(&patterned(1000)).build();
        assert_eq!(output, expected);
    }

    #[test]
    fn test_png_metadata_after_image_data_is_stripped() {
        let original = PngBuilder::new()
            .idat(&patterned(500))
            .trailer_xmp(b"<x:xmpmeta>late</x:xmpmeta>")
            .trailer(b"zTXt", b"Raw profile type iptc\0\0\x78\x9c")
            .build();

        let mut output = Vec::new();
        let summary =
            rewrite_stream(&mut Cursor::new(&original), &mut output, &Edits::strip_all()).unwrap();

        assert_eq!(output, PngBuilder::new().idat(&patterned(500)).build());
        assert!(!output.windows(4).any(|w| w == b"late"));
        assert_eq!(summary.stripped, (original.len() - output.len()) as u64);
    }
}
