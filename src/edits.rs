//! Metadata edits and processing options

use crate::chunk::ChunkKind;

/// Default read size for streaming operations (64 KiB)
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// What to do with one kind of metadata
///
/// By default, existing metadata is kept unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum MetadataUpdate {
    /// Keep existing metadata (default)
    #[default]
    Keep,
    /// Strip existing metadata
    Remove,
    /// Strip existing metadata and inject this payload instead
    Set(Vec<u8>),
}

impl MetadataUpdate {
    /// Check if existing carriers of this kind must be stripped
    pub fn strips(&self) -> bool {
        !matches!(self, Self::Keep)
    }

    /// Payload to inject, if any
    pub fn payload(&self) -> Option<&[u8]> {
        match self {
            Self::Set(data) => Some(data),
            _ => None,
        }
    }
}

/// Edits to apply while rewriting an asset
///
/// Builder where the default is to keep all existing metadata.
///
/// # Example
///
/// ```
/// use asset_splice::{ChunkKind, Edits, MetadataUpdate};
///
/// let edits = Edits::new()
///     .strip_exif()
///     .set_xmp(b"<x:xmpmeta/>".to_vec())
///     .with_chunk_size(4096);
///
/// assert_eq!(edits.get(ChunkKind::Exif), &MetadataUpdate::Remove);
/// assert_eq!(edits.get(ChunkKind::Iptc), &MetadataUpdate::Keep);
/// assert_eq!(edits.chunk_size(), 4096);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Edits {
    exif: MetadataUpdate,
    xmp: MetadataUpdate,
    iptc: MetadataUpdate,
    chunk_size: Option<usize>,
}

impl Edits {
    /// Create edits that change nothing
    pub fn new() -> Self {
        Self::default()
    }

    /// Create edits that strip every supported kind of metadata
    pub fn strip_all() -> Self {
        Self::new().strip_exif().strip_xmp().strip_iptc()
    }

    /// Remove EXIF metadata
    pub fn strip_exif(mut self) -> Self {
        self.exif = MetadataUpdate::Remove;
        self
    }

    /// Replace EXIF metadata with a TIFF-structured payload
    pub fn set_exif(mut self, exif: Vec<u8>) -> Self {
        self.exif = MetadataUpdate::Set(exif);
        self
    }

    /// Keep existing EXIF metadata (explicit, same as default)
    pub fn keep_exif(mut self) -> Self {
        self.exif = MetadataUpdate::Keep;
        self
    }

    /// Remove XMP metadata
    pub fn strip_xmp(mut self) -> Self {
        self.xmp = MetadataUpdate::Remove;
        self
    }

    /// Replace XMP metadata with a serialized XMP packet
    pub fn set_xmp(mut self, xmp: Vec<u8>) -> Self {
        self.xmp = MetadataUpdate::Set(xmp);
        self
    }

    /// Keep existing XMP metadata (explicit, same as default)
    pub fn keep_xmp(mut self) -> Self {
        self.xmp = MetadataUpdate::Keep;
        self
    }

    /// Remove IPTC metadata
    pub fn strip_iptc(mut self) -> Self {
        self.iptc = MetadataUpdate::Remove;
        self
    }

    /// Replace IPTC metadata with an IPTC-IIM payload
    ///
    /// JPEG stores the payload in a Photoshop resource block; PNG has no
    /// standard carrier and rejects it.
    pub fn set_iptc(mut self, iptc: Vec<u8>) -> Self {
        self.iptc = MetadataUpdate::Set(iptc);
        self
    }

    /// Keep existing IPTC metadata (explicit, same as default)
    pub fn keep_iptc(mut self) -> Self {
        self.iptc = MetadataUpdate::Keep;
        self
    }

    /// Set the read size for streaming operations
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = Some(size);
        self
    }

    /// Effective read size (uses [`DEFAULT_CHUNK_SIZE`] if not set)
    pub fn chunk_size(&self) -> usize {
        self.chunk_size.filter(|&n| n > 0).unwrap_or(DEFAULT_CHUNK_SIZE)
    }

    /// The update for one kind of metadata
    pub fn get(&self, kind: ChunkKind) -> &MetadataUpdate {
        const KEEP: MetadataUpdate = MetadataUpdate::Keep;
        match kind {
            ChunkKind::Exif => &self.exif,
            ChunkKind::Xmp => &self.xmp,
            ChunkKind::Iptc => &self.iptc,
            ChunkKind::Other => &KEEP,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_keeps_everything() {
        let edits = Edits::default();
        assert_eq!(edits.chunk_size(), DEFAULT_CHUNK_SIZE);
        for kind in [ChunkKind::Exif, ChunkKind::Xmp, ChunkKind::Iptc] {
            assert_eq!(edits.get(kind), &MetadataUpdate::Keep);
        }
    }

    #[test]
    fn test_set_strips_and_injects() {
        let edits = Edits::new().set_exif(vec![1, 2, 3]);
        let update = edits.get(ChunkKind::Exif);
        assert!(update.strips());
        assert_eq!(update.payload(), Some(&[1u8, 2, 3][..]));
    }

    #[test]
    fn test_strip_all_then_keep_one() {
        let edits = Edits::strip_all().keep_iptc();
        assert!(edits.get(ChunkKind::Exif).strips());
        assert!(edits.get(ChunkKind::Xmp).strips());
        assert!(!edits.get(ChunkKind::Iptc).strips());
        assert!(!edits.get(ChunkKind::Other).strips());
    }

    #[test]
    fn test_zero_chunk_size_falls_back() {
        assert_eq!(Edits::new().with_chunk_size(0).chunk_size(), DEFAULT_CHUNK_SIZE);
    }
}
