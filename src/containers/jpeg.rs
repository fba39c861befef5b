//! JPEG chunk discovery

use super::{ContainerKind, ContainerParser};
use crate::{
    chunk::{Chunk, ChunkKind, ChunkLists},
    edits::Edits,
    error::{Error, Result},
    parser::{ChunkParser, ParseResult},
};
use byteorder::{BigEndian, ByteOrder, WriteBytesExt};

// JPEG markers
const SOI: u8 = 0xD8; // Start of Image
const EOI: u8 = 0xD9; // End of Image
const SOS: u8 = 0xDA; // Start of Scan (image data follows)
const APP0: u8 = 0xE0; // JFIF
const APP1: u8 = 0xE1; // XMP / EXIF
const APP13: u8 = 0xED; // Photoshop IRB (IPTC)

// Special markers without length
const TEM: u8 = 0x01;
const RST0: u8 = 0xD0;
const RST7: u8 = 0xD7;

const JFIF_SIGNATURE: &[u8] = b"JFIF\0";
const XMP_SIGNATURE: &[u8] = b"http://ns.adobe.com/xap/1.0/\0";
const XMP_EXTENDED_SIGNATURE: &[u8] = b"http://ns.adobe.com/xmp/extension/\0";
const EXIF_SIGNATURE: &[u8] = b"Exif\0\0";
const PHOTOSHOP_SIGNATURE: &[u8] = b"Photoshop 3.0\0";
const IRB_SIGNATURE: &[u8] = b"8BIM";
const IPTC_RESOURCE_ID: u16 = 0x0404;
const MAX_MARKER_SIZE: usize = 65533; // Max payload for a JPEG marker segment

/// Progress of one parsing step
enum Step {
    Advance(u64),
    Need(u32),
    Done,
    Fail(String),
}

/// Walks JPEG markers from SOI to the first SOS (or EOI)
///
/// APP1 EXIF and XMP segments (including extended XMP) and APP13 Photoshop
/// segments are reported as strip chunks when the edits ask to remove or
/// replace that kind. Replacement payloads are framed as complete APPn
/// segments and spliced in after SOI, or after a leading JFIF APP0 segment.
#[derive(Debug, Clone)]
pub struct JpegParser {
    strip_exif: bool,
    strip_xmp: bool,
    strip_iptc: bool,
    inject: Vec<Chunk>,
    pos: u64,
    anchor: u64,
    strip: Vec<Chunk>,
    done: bool,
}

impl JpegParser {
    fn strips(&self, kind: ChunkKind) -> bool {
        match kind {
            ChunkKind::Exif => self.strip_exif,
            ChunkKind::Xmp => self.strip_xmp,
            ChunkKind::Iptc => self.strip_iptc,
            ChunkKind::Other => false,
        }
    }

    /// Splice point for new segments
    pub fn anchor(&self) -> u64 {
        self.anchor
    }

    fn step(&mut self, bytes: &[u8]) -> Step {
        if self.pos == 0 {
            if bytes.len() < 2 {
                return Step::Need(2);
            }
            if bytes[0] != 0xFF || bytes[1] != SOI {
                return Step::Fail("Not a JPEG file".into());
            }
            return Step::Advance(2);
        }

        if bytes.len() < 2 {
            return Step::Need(2);
        }
        if bytes[0] != 0xFF {
            return Step::Fail(format!(
                "Expected 0xFF at offset {}, got 0x{:02X}",
                self.pos, bytes[0]
            ));
        }

        let marker = bytes[1];
        match marker {
            // fill byte
            0xFF => return Step::Advance(1),
            SOS | EOI => return Step::Done,
            TEM | RST0..=RST7 => return Step::Advance(2),
            _ => {}
        }

        if bytes.len() < 4 {
            return Step::Need(4);
        }
        let length = BigEndian::read_u16(&bytes[2..4]) as usize;
        if length < 2 {
            return Step::Fail(format!(
                "Invalid segment length {} at offset {}",
                length, self.pos
            ));
        }
        let total = 2 + length as u64;
        let payload = length - 2;

        let kind = match marker {
            APP0 if self.pos == 2 => match signature(bytes, payload, JFIF_SIGNATURE.len()) {
                Ok(sig) => {
                    if sig == JFIF_SIGNATURE {
                        self.anchor = self.pos + total;
                    }
                    None
                }
                Err(need) => return Step::Need(need),
            },
            APP1 => match signature(bytes, payload, XMP_EXTENDED_SIGNATURE.len()) {
                Ok(sig) if sig.starts_with(EXIF_SIGNATURE) => Some(ChunkKind::Exif),
                Ok(sig)
                    if sig.starts_with(XMP_SIGNATURE) || sig.starts_with(XMP_EXTENDED_SIGNATURE) =>
                {
                    Some(ChunkKind::Xmp)
                }
                Ok(_) => None,
                Err(need) => return Step::Need(need),
            },
            APP13 => match signature(bytes, payload, PHOTOSHOP_SIGNATURE.len()) {
                Ok(sig) if sig == PHOTOSHOP_SIGNATURE => Some(ChunkKind::Iptc),
                Ok(_) => None,
                Err(need) => return Step::Need(need),
            },
            _ => None,
        };

        if let Some(kind) = kind.filter(|&k| self.strips(k)) {
            tracing::trace!(offset = self.pos, size = total, %kind, "jpeg strip candidate");
            self.strip.push(Chunk::strip(self.pos, total as u32, kind));
        }
        Step::Advance(total)
    }
}

impl ChunkParser for JpegParser {
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
                        scan_offset = self.pos,
                        strip = self.strip.len(),
                        "jpeg metadata parsed"
                    );
                    return ParseResult::Parsed;
                }
                Step::Fail(reason) => return ParseResult::Error { reason },
            }
        }
    }

    fn take_chunks(&mut self) -> ChunkLists {
        let inject = self
            .inject
            .iter()
            .cloned()
            .map(|mut c| {
                c.offset_original = self.anchor;
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
        self.anchor = 2;
        self.strip.clear();
        self.done = false;
    }
}

impl ContainerParser for JpegParser {
    fn container_type() -> ContainerKind {
        ContainerKind::Jpeg
    }

    fn extensions() -> &'static [&'static str] {
        &["jpg", "jpeg", "jpe", "jfif"]
    }

    fn mime_types() -> &'static [&'static str] {
        &["image/jpeg", "image/jpg"]
    }

    fn detect(header: &[u8]) -> Option<ContainerKind> {
        // JPEG magic bytes: FF D8
        if header.len() >= 2 && header[0] == 0xFF && header[1] == SOI {
            Some(ContainerKind::Jpeg)
        } else {
            None
        }
    }

    fn with_edits(edits: &Edits) -> Result<Self> {
        let mut inject = Vec::new();

        if let Some(exif) = edits.get(ChunkKind::Exif).payload() {
            let segment = frame_segment(APP1, EXIF_SIGNATURE, exif)?;
            inject.push(Chunk::inject(0, segment, ChunkKind::Exif)?);
        }
        if let Some(xmp) = edits.get(ChunkKind::Xmp).payload() {
            let segment = frame_segment(APP1, XMP_SIGNATURE, xmp)?;
            inject.push(Chunk::inject(0, segment, ChunkKind::Xmp)?);
        }
        if let Some(iptc) = edits.get(ChunkKind::Iptc).payload() {
            let segment = frame_segment(APP13, PHOTOSHOP_SIGNATURE, &iptc_resource(iptc)?)?;
            inject.push(Chunk::inject(0, segment, ChunkKind::Iptc)?);
        }

        Ok(Self {
            strip_exif: edits.get(ChunkKind::Exif).strips(),
            strip_xmp: edits.get(ChunkKind::Xmp).strips(),
            strip_iptc: edits.get(ChunkKind::Iptc).strips(),
            inject,
            pos: 0,
            anchor: 2,
            strip: Vec::new(),
            done: false,
        })
    }
}

/// Leading payload bytes of a segment, or the window size needed to see them
fn signature(bytes: &[u8], payload: usize, wanted: usize) -> std::result::Result<&[u8], u32> {
    let n = wanted.min(payload);
    bytes.get(4..4 + n).ok_or((4 + n) as u32)
}

/// Frame `payload` as a complete APPn segment
fn frame_segment(marker: u8, signature: &[u8], payload: &[u8]) -> Result<Vec<u8>> {
    let body = signature.len() + payload.len();
    if body > MAX_MARKER_SIZE {
        return Err(Error::DataTooLarge {
            size: payload.len(),
            max: MAX_MARKER_SIZE - signature.len(),
        });
    }

    let mut segment = Vec::with_capacity(4 + body);
    segment.write_u8(0xFF)?;
    segment.write_u8(marker)?;
    segment.write_u16::<BigEndian>((body + 2) as u16)?;
    segment.extend_from_slice(signature);
    segment.extend_from_slice(payload);
    Ok(segment)
}

/// Wrap IPTC-IIM data in a Photoshop image resource block
fn iptc_resource(iptc: &[u8]) -> Result<Vec<u8>> {
    let size = u32::try_from(iptc.len()).map_err(|_| Error::DataTooLarge {
        size: iptc.len(),
        max: u32::MAX as usize,
    })?;

    let mut block = Vec::with_capacity(12 + iptc.len() + 1);
    block.extend_from_slice(IRB_SIGNATURE);
    block.write_u16::<BigEndian>(IPTC_RESOURCE_ID)?;
    // empty Pascal name, padded to even length
    block.extend_from_slice(&[0, 0]);
    block.write_u32::<BigEndian>(size)?;
    block.extend_from_slice(iptc);
    if iptc.len() % 2 == 1 {
        block.push(0);
    }
    Ok(block)
}
