//! Test utilities for building synthetic assets.
//!
//! This module provides helpers for tests and benchmarks:
//! - [`JpegBuilder`] and [`PngBuilder`] assemble minimal but well-framed
//!   files carrying whatever metadata a test needs
//! - [`reference_rewrite`] applies strip and inject lists the slow, obvious
//!   way, for checking the assemblers against
//!
//! # Usage
//!
//! ```
//! use asset_splice::test_utils::*;
//!
//! let jpeg = JpegBuilder::new().jfif().exif(b"II*\0").build();
//! assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
//! ```

use crate::chunk::Chunk;

/// Builds a minimal JPEG: SOI, APPn segments, a tiny scan and EOI
#[cfg(feature = "jpeg")]
#[derive(Debug, Clone, Default)]
pub struct JpegBuilder {
    segments: Vec<Vec<u8>>,
    scan: Vec<u8>,
}

#[cfg(feature = "jpeg")]
impl JpegBuilder {
    /// Start an empty JPEG
    pub fn new() -> Self {
        Self {
            segments: Vec::new(),
            scan: vec![0x12, 0x34, 0xFF, 0x00, 0x56],
        }
    }

    /// Add a marker segment with a raw payload
    pub fn segment(mut self, marker: u8, payload: &[u8]) -> Self {
        let length = (payload.len() + 2) as u16;
        let mut segment = vec![0xFF, marker];
        segment.extend_from_slice(&length.to_be_bytes());
        segment.extend_from_slice(payload);
        self.segments.push(segment);
        self
    }

    /// Add a JFIF APP0 segment
    pub fn jfif(self) -> Self {
        self.segment(
            0xE0,
            &[b'J', b'F', b'I', b'F', 0, 1, 1, 0, 0, 1, 0, 1, 0, 0],
        )
    }

    /// Add an APP1 EXIF segment
    pub fn exif(self, tiff: &[u8]) -> Self {
        self.segment(0xE1, &[b"Exif\0\0".as_slice(), tiff].concat())
    }

    /// Add an APP1 XMP segment
    pub fn xmp(self, packet: &[u8]) -> Self {
        self.segment(
            0xE1,
            &[b"http://ns.adobe.com/xap/1.0/\0".as_slice(), packet].concat(),
        )
    }

    /// Add an APP13 Photoshop segment holding an IPTC resource block
    pub fn iptc(self, iim: &[u8]) -> Self {
        let mut payload = b"Photoshop 3.0\08BIM\x04\x04\0\0".to_vec();
        payload.extend_from_slice(&(iim.len() as u32).to_be_bytes());
        payload.extend_from_slice(iim);
        if iim.len() % 2 == 1 {
            payload.push(0);
        }
        self.segment(0xED, &payload)
    }

    /// Replace the entropy-coded scan data
    pub fn scan(mut self, data: &[u8]) -> Self {
        self.scan = data.to_vec();
        self
    }

    /// Assemble the file
    pub fn build(self) -> Vec<u8> {
        let mut out = vec![0xFF, 0xD8];
        for segment in &self.segments {
            out.extend_from_slice(segment);
        }
        // SOS with a one-component header
        out.extend_from_slice(&[0xFF, 0xDA, 0x00, 0x08, 0x01, 0x01, 0x00, 0x00, 0x3F, 0x00]);
        out.extend_from_slice(&self.scan);
        out.extend_from_slice(&[0xFF, 0xD9]);
        out
    }
}

/// Builds a minimal PNG: signature, IHDR, ancillary chunks, IDAT, trailing
/// chunks and IEND
#[cfg(feature = "png")]
#[derive(Debug, Clone, Default)]
pub struct PngBuilder {
    chunks: Vec<Vec<u8>>,
    idat: Vec<u8>,
    trailer: Vec<Vec<u8>>,
}

#[cfg(feature = "png")]
impl PngBuilder {
    /// Start a 1x1 greyscale PNG
    pub fn new() -> Self {
        Self {
            chunks: Vec::new(),
            idat: vec![0x78, 0x9C, 0x63, 0x60, 0x00, 0x00, 0x00, 0x02, 0x00, 0x01],
            trailer: Vec::new(),
        }
    }

    /// Add a chunk with a raw payload
    pub fn chunk(mut self, chunk_type: &[u8; 4], data: &[u8]) -> Self {
        self.chunks.push(framed(chunk_type, data));
        self
    }

    /// Add a text chunk (`tEXt`, `zTXt` or `iTXt`); `rest` follows the keyword's NUL
    pub fn text(self, chunk_type: &[u8; 4], keyword: &[u8], rest: &[u8]) -> Self {
        self.chunk(chunk_type, &[keyword, b"\0", rest].concat())
    }

    /// Add an `eXIf` chunk
    pub fn exif(self, tiff: &[u8]) -> Self {
        self.chunk(b"eXIf", tiff)
    }

    /// Add an uncompressed XMP `iTXt` chunk
    pub fn xmp(self, packet: &[u8]) -> Self {
        self.text(b"iTXt", b"XML:com.adobe.xmp", &[b"\0\0\0\0".as_slice(), packet].concat())
    }

    /// Replace the compressed image data
    pub fn idat(mut self, data: &[u8]) -> Self {
        self.idat = data.to_vec();
        self
    }

    /// Add a chunk between the first IDAT and IEND
    pub fn trailer(mut self, chunk_type: &[u8; 4], data: &[u8]) -> Self {
        self.trailer.push(framed(chunk_type, data));
        self
    }

    /// Add an uncompressed XMP `iTXt` chunk after the image data
    pub fn trailer_xmp(self, packet: &[u8]) -> Self {
        let data = [b"XML:com.adobe.xmp\0\0\0\0\0".as_slice(), packet].concat();
        self.trailer(b"iTXt", &data)
    }

    /// Assemble the file
    pub fn build(self) -> Vec<u8> {
        let mut out = b"\x89PNG\r\n\x1a\n".to_vec();
        // width 1, height 1, depth 8, greyscale
        out.extend(framed(b"IHDR", &[0, 0, 0, 1, 0, 0, 0, 1, 8, 0, 0, 0, 0]));
        for chunk in &self.chunks {
            out.extend_from_slice(chunk);
        }
        out.extend(framed(b"IDAT", &self.idat));
        for chunk in &self.trailer {
            out.extend_from_slice(chunk);
        }
        out.extend(framed(b"IEND", &[]));
        out
    }
}

#[cfg(feature = "png")]
fn framed(chunk_type: &[u8; 4], data: &[u8]) -> Vec<u8> {
    let mut chunk = (data.len() as u32).to_be_bytes().to_vec();
    chunk.extend_from_slice(chunk_type);
    chunk.extend_from_slice(data);
    let crc = crate::containers::png::calculate_crc(chunk_type, data);
    chunk.extend_from_slice(&crc.to_be_bytes());
    chunk
}

/// Apply strip and inject lists byte by byte
///
/// Inject chunks are given by original splice point; `offset_logical` is
/// ignored, so the lists need not come from a built chunk set.
pub fn reference_rewrite(original: &[u8], strip: &[Chunk], inject: &[Chunk]) -> Vec<u8> {
    let mut out = Vec::with_capacity(original.len());
    let mut injects = inject.iter().peekable();

    for pos in 0..=original.len() as u64 {
        while let Some(chunk) = injects.next_if(|c| c.offset_original == pos) {
            out.extend_from_slice(chunk.bytes());
        }
        if pos == original.len() as u64 {
            break;
        }
        let stripped = strip
            .iter()
            .any(|s| s.offset_original <= pos && pos < s.end_original());
        if !stripped {
            out.push(original[pos as usize]);
        }
    }
    out
}

/// A deterministic original stream of `len` bytes
pub fn patterned(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 251) as u8).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkKind;

    #[test]
    fn test_reference_rewrite() {
        let original = b"0123456789";
        let strip = [Chunk::strip(2, 3, ChunkKind::Other)];
        let inject = [
            Chunk::inject(0, &b"<"[..], ChunkKind::Other).unwrap(),
            Chunk::inject(5, &b"ab"[..], ChunkKind::Other).unwrap(),
            Chunk::inject(10, &b">"[..], ChunkKind::Other).unwrap(),
        ];
        assert_eq!(reference_rewrite(original, &strip, &inject), b"<01ab56789>");
    }
}
