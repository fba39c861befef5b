//! PNG chunk discovery

use super::{ContainerKind, ContainerParser};
use crate::{
    chunk::{Chunk, ChunkKind, ChunkLists},
    edits::Edits,
    error::{Error, Result},
    parser::{ChunkParser, ParseResult},
};
use byteorder::{BigEndian, ByteOrder, WriteBytesExt};

// PNG signature
const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

// Metadata chunk types
const EXIF: &[u8; 4] = b"eXIf";
const ITXT: &[u8; 4] = b"iTXt";
const TEXT: &[u8; 4] = b"tEXt";
const ZTXT: &[u8; 4] = b"zTXt";

// Keywords of text chunks that carry metadata
const XMP_KEYWORD: &[u8] = b"XML:com.adobe.xmp";
const IPTC_KEYWORD: &[u8] = b"Raw profile type iptc";
const EXIF_KEYWORD: &[u8] = b"Raw profile type exif";
const MAX_KEYWORD_SIZE: usize = 80;

const MAX_CHUNK_SIZE: u64 = 0x7FFF_FFFF;

/// Progress of one parsing step
enum Step {
    Advance(u64),
    Need(u32),
    Done,
    Fail(String),
}

/// Walks PNG chunks from the signature to IEND
///
/// `eXIf` chunks, `iTXt` XMP chunks and the ImageMagick-style raw profile
/// text chunks are reported as strip chunks when the edits ask to remove or
/// replace that kind, including text chunks that follow the image data.
/// IDAT bodies are skipped without being inspected. Replacement payloads are
/// framed as complete chunks with a valid CRC and spliced in right after IHDR.
#[derive(Debug, Clone)]
pub struct PngParser {
    strip_exif: bool,
    strip_xmp: bool,
    strip_iptc: bool,
    inject: Vec<Chunk>,
    pos: u64,
    anchor: Option<u64>,
    strip: Vec<Chunk>,
    done: bool,
}

impl PngParser {
    fn strips(&self, kind: ChunkKind) -> bool {
        match kind {
            ChunkKind::Exif => self.strip_exif,
            ChunkKind::Xmp => self.strip_xmp,
            ChunkKind::Iptc => self.strip_iptc,
            ChunkKind::Other => false,
        }
    }

    /// Splice point for new chunks, known once IHDR has been seen
    pub fn anchor(&self) -> Option<u64> {
        self.anchor
    }

    fn step(&mut self, bytes: &[u8]) -> Step {
        if self.pos == 0 {
            if bytes.len() < PNG_SIGNATURE.len() {
                return Step::Need(PNG_SIGNATURE.len() as u32);
            }
            if &bytes[..PNG_SIGNATURE.len()] != PNG_SIGNATURE {
                return Step::Fail("Not a PNG file".into());
            }
            return Step::Advance(PNG_SIGNATURE.len() as u64);
        }

        if bytes.len() < 8 {
            return Step::Need(8);
        }
        let chunk_len = BigEndian::read_u32(&bytes[..4]) as u64;
        let chunk_type: [u8; 4] = [bytes[4], bytes[5], bytes[6], bytes[7]];

        // Validate chunk length to prevent allocation attacks
        if chunk_len > MAX_CHUNK_SIZE {
            return Step::Fail(format!(
                "Chunk length too large at offset {}: {}",
                self.pos, chunk_len
            ));
        }
        let total = 8 + chunk_len + 4; // length + type + data + CRC

        if self.pos == PNG_SIGNATURE.len() as u64 {
            if &chunk_type != b"IHDR" {
                return Step::Fail("PNG file does not start with IHDR".into());
            }
            self.anchor = Some(self.pos + total);
            return Step::Advance(total);
        }

        let kind = match &chunk_type {
            b"IEND" => return Step::Done,
            EXIF => Some(ChunkKind::Exif),
            ITXT | TEXT | ZTXT => {
                let n = (chunk_len as usize).min(MAX_KEYWORD_SIZE);
                let Some(data) = bytes.get(8..8 + n) else {
                    return Step::Need((8 + n) as u32);
                };
                let keyword = data.split(|&b| b == 0).next().unwrap_or_default();
                match keyword {
                    XMP_KEYWORD if &chunk_type == ITXT => Some(ChunkKind::Xmp),
                    IPTC_KEYWORD => Some(ChunkKind::Iptc),
                    EXIF_KEYWORD => Some(ChunkKind::Exif),
                    _ => None,
                }
            }
            _ => None,
        };

        if let Some(kind) = kind.filter(|&k| self.strips(k)) {
            tracing::trace!(
                offset = self.pos,
                size = total,
                chunk = %String::from_utf8_lossy(&chunk_type),
                %kind,
                "png strip candidate"
            );
            self.strip.push(Chunk::strip(self.pos, total as u32, kind));
        }
        Step::Advance(total)
    }
}

impl ChunkParser for PngParser {
    fn parse(&mut self, data: &[u8], offset: u64) -> ParseResult {
        if self.done {
            return ParseResult::Parsed;
        }
        loop {
            let bytes = match self.pos.checked_sub(offset) {
                Some(local) => data.get(local as usize..).unwrap_or(&[]),
                None => &[],
            };
            match self.step(bytes) {
                Step::Advance(n) => self.pos += n,
                Step::Need(n) => {
                    return ParseResult::NeedMoreData {
                        next_offset: self.pos,
                        next_size: n,
                    }
                }
                Step::Done => {
                    self.done = true;
                    tracing::debug!(
                        iend_offset = self.pos,
                        strip = self.strip.len(),
                        "png metadata parsed"
                    );
                    return ParseResult::Parsed;
                }
                Step::Fail(reason) => return ParseResult::Error { reason },
            }
        }
    }

    fn take_chunks(&mut self) -> ChunkLists {
        let anchor = self.anchor.unwrap_or(self.pos);
        let inject = self
            .inject
            .iter()
            .cloned()
            .map(|mut c| {
                c.offset_original = anchor;
                c
            })
            .collect();
        ChunkLists {
            strip: std::mem::take(&mut self.strip),
            inject,
        }
    }

    fn reset(&mut self) {
        self.pos = 0;
        self.anchor = None;
        self.strip.clear();
        self.done = false;
    }
}

impl ContainerParser for PngParser {
    fn container_type() -> ContainerKind {
        ContainerKind::Png
    }

    fn extensions() -> &'static [&'static str] {
        &["png"]
    }

    fn mime_types() -> &'static [&'static str] {
        &["image/png"]
    }

    fn detect(header: &[u8]) -> Option<ContainerKind> {
        // PNG signature: 89 50 4E 47 0D 0A 1A 0A
        if header.len() >= 8 && &header[0..8] == PNG_SIGNATURE {
            Some(ContainerKind::Png)
        } else {
            None
        }
    }

    fn with_edits(edits: &Edits) -> Result<Self> {
        if edits.get(ChunkKind::Iptc).payload().is_some() {
            return Err(Error::UnsupportedFormat);
        }

        let mut inject = Vec::new();
        if let Some(exif) = edits.get(ChunkKind::Exif).payload() {
            inject.push(Chunk::inject(0, frame_chunk(EXIF, exif)?, ChunkKind::Exif)?);
        }
        if let Some(xmp) = edits.get(ChunkKind::Xmp).payload() {
            inject.push(Chunk::inject(0, xmp_chunk(xmp)?, ChunkKind::Xmp)?);
        }

        Ok(Self {
            strip_exif: edits.get(ChunkKind::Exif).strips(),
            strip_xmp: edits.get(ChunkKind::Xmp).strips(),
            strip_iptc: edits.get(ChunkKind::Iptc).strips(),
            inject,
            pos: 0,
            anchor: None,
            strip: Vec::new(),
            done: false,
        })
    }
}

/// Calculate CRC32 for PNG chunk
pub(crate) fn calculate_crc(chunk_type: &[u8], data: &[u8]) -> u32 {
    let mut crc = 0xFFFFFFFF_u32;
    for &byte in chunk_type.iter().chain(data) {
        crc ^= byte as u32;
        for _ in 0..8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ 0xEDB88320;
            } else {
                crc >>= 1;
            }
        }
    }
    crc ^ 0xFFFFFFFF
}

/// Frame `data` as a complete PNG chunk with proper CRC
pub(crate) fn frame_chunk(chunk_type: &[u8; 4], data: &[u8]) -> Result<Vec<u8>> {
    if data.len() as u64 > MAX_CHUNK_SIZE {
        return Err(Error::DataTooLarge {
            size: data.len(),
            max: MAX_CHUNK_SIZE as usize,
        });
    }

    let mut chunk = Vec::with_capacity(12 + data.len());
    chunk.write_u32::<BigEndian>(data.len() as u32)?;
    chunk.extend_from_slice(chunk_type);
    chunk.extend_from_slice(data);
    chunk.write_u32::<BigEndian>(calculate_crc(chunk_type, data))?;
    Ok(chunk)
}

/// Frame XMP as an uncompressed iTXt chunk
fn xmp_chunk(xmp: &[u8]) -> Result<Vec<u8>> {
    // keyword\0 + compression flag + compression method + language\0 + translated keyword\0
    let mut data = Vec::with_capacity(XMP_KEYWORD.len() + 5 + xmp.len());
    data.extend_from_slice(XMP_KEYWORD);
    data.extend_from_slice(&[0, 0, 0, 0, 0]);
    data.extend_from_slice(xmp);
    frame_chunk(ITXT, &data)
}
