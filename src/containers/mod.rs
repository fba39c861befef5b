//! Container-specific chunk discovery
//!
//! Each container format (JPEG, PNG) has a parser that walks the framing of
//! the file, reports the metadata carriers that the [`Edits`] ask to remove
//! as strip chunks and builds framed carriers for new metadata as inject
//! chunks. Parsers only look at framing; the metadata itself is never
//! decoded.

use crate::{
    chunk::ChunkLists,
    error::Result,
    parser::{ChunkParser, ParseResult},
    Edits,
};

/// Container format - defines how a file is structured on disk
///
/// Note: The actual variants are determined by enabled features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    /// JPEG container (JFIF/Exif marker structure)
    #[cfg(feature = "jpeg")]
    Jpeg,

    /// PNG container (chunk-based structure)
    #[cfg(feature = "png")]
    Png,
}

/// A [`ChunkParser`] for one container format
pub trait ContainerParser: ChunkParser + Sized {
    /// ContainerKind this parser handles
    fn container_type() -> ContainerKind;

    /// File extensions this parser accepts (e.g., ["jpg", "jpeg"])
    fn extensions() -> &'static [&'static str];

    /// MIME types this parser accepts
    fn mime_types() -> &'static [&'static str];

    /// Try to detect if this parser can handle the given header
    /// Returns Some(ContainerKind) if confident, None if unsure
    fn detect(header: &[u8]) -> Option<ContainerKind>;

    /// Create a parser that applies `edits`
    ///
    /// Fails when a replacement payload cannot be carried by the container.
    fn with_edits(edits: &Edits) -> Result<Self>;
}

#[cfg(feature = "jpeg")]
pub(crate) mod jpeg;

#[cfg(feature = "png")]
pub(crate) mod png;

#[cfg(feature = "jpeg")]
pub use jpeg::JpegParser;

#[cfg(feature = "png")]
pub use png::PngParser;

/// Number of header bytes [`detect_container`] looks at
pub const DETECT_HEADER_SIZE: usize = 16;

// ============================================================================
// ContainerKind Registration Macro
// ============================================================================

macro_rules! register_containers {
    ($(
        $(#[$meta:meta])*
        $variant:ident => $parser:ident
    ),* $(,)?) => {
        /// Parser for whichever container was detected (zero-cost dispatch)
        pub enum AnyParser {
            $(
                $(#[$meta])*
                #[doc = concat!("Parser for ", stringify!($variant))]
                $variant($parser),
            )*
        }

        impl ChunkParser for AnyParser {
            fn parse(&mut self, data: &[u8], offset: u64) -> ParseResult {
                match self {
                    $(
                        $(#[$meta])*
                        AnyParser::$variant(p) => p.parse(data, offset),
                    )*
                }
            }

            fn take_chunks(&mut self) -> ChunkLists {
                match self {
                    $(
                        $(#[$meta])*
                        AnyParser::$variant(p) => p.take_chunks(),
                    )*
                }
            }

            fn reset(&mut self) {
                match self {
                    $(
                        $(#[$meta])*
                        AnyParser::$variant(p) => p.reset(),
                    )*
                }
            }
        }

        impl ContainerKind {
            /// Get all containers that are available in this build
            pub fn all() -> &'static [ContainerKind] {
                &[
                    $(
                        $(#[$meta])*
                        ContainerKind::$variant,
                    )*
                ]
            }

            /// File extensions for this container
            pub fn extensions(&self) -> &'static [&'static str] {
                match self {
                    $(
                        $(#[$meta])*
                        ContainerKind::$variant => $parser::extensions(),
                    )*
                }
            }

            /// MIME types for this container
            pub fn mime_types(&self) -> &'static [&'static str] {
                match self {
                    $(
                        $(#[$meta])*
                        ContainerKind::$variant => $parser::mime_types(),
                    )*
                }
            }
        }

        /// Detect the container from the first bytes of a stream
        ///
        /// Returns `None` when no enabled container recognises the header.
        pub fn detect_container(header: &[u8]) -> Option<ContainerKind> {
            $(
                $(#[$meta])*
                if let Some(container) = $parser::detect(header) {
                    return Some(container);
                }
            )*
            None
        }

        /// Create the parser for `container` configured with `edits`
        pub fn parser_for(container: ContainerKind, edits: &Edits) -> Result<AnyParser> {
            match container {
                $(
                    $(#[$meta])*
                    ContainerKind::$variant => Ok(AnyParser::$variant($parser::with_edits(edits)?)),
                )*
            }
        }

        /// Look up a container by file extension (case-insensitive)
        pub fn detect_from_extension(ext: &str) -> Option<ContainerKind> {
            let ext_lower = ext.to_lowercase();
            $(
                $(#[$meta])*
                if $parser::extensions().contains(&ext_lower.as_str()) {
                    return Some($parser::container_type());
                }
            )*
            None
        }

        /// Look up a container by MIME type (case-insensitive)
        pub fn detect_from_mime(mime: &str) -> Option<ContainerKind> {
            let mime_lower = mime.to_lowercase();
            $(
                $(#[$meta])*
                if $parser::mime_types().contains(&mime_lower.as_str()) {
                    return Some($parser::container_type());
                }
            )*
            None
        }
    };
}

register_containers! {
    #[cfg(feature = "jpeg")]
    Jpeg => JpegParser,
    #[cfg(feature = "png")]
    Png => PngParser,
}

impl std::fmt::Debug for AnyParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AnyParser")
    }
}

#[cfg(all(test, feature = "jpeg", feature = "png"))]
mod tests {
    use super::*;

    #[test]
    fn test_detect_container() {
        assert_eq!(
            detect_container(&[0xFF, 0xD8, 0xFF, 0xE0]),
            Some(ContainerKind::Jpeg)
        );
        assert_eq!(
            detect_container(b"\x89PNG\r\n\x1a\n\0\0\0\x0dIHDR"),
            Some(ContainerKind::Png)
        );
        assert_eq!(detect_container(b"GIF89a"), None);
        assert_eq!(detect_container(&[]), None);
    }

    #[test]
    fn test_detect_from_extension_and_mime() {
        assert_eq!(detect_from_extension("JPG"), Some(ContainerKind::Jpeg));
        assert_eq!(detect_from_extension("png"), Some(ContainerKind::Png));
        assert_eq!(detect_from_extension("gif"), None);
        assert_eq!(detect_from_mime("image/png"), Some(ContainerKind::Png));
        assert_eq!(ContainerKind::Jpeg.mime_types()[0], "image/jpeg");
        assert_eq!(ContainerKind::all().len(), 2);
    }

    #[test]
    fn test_parser_for_rejects_unsupported_payload() {
        let edits = Edits::new().set_iptc(vec![0x1C, 0x02, 0x00]);
        assert!(parser_for(ContainerKind::Jpeg, &edits).is_ok());
        assert!(matches!(
            parser_for(ContainerKind::Png, &edits),
            Err(crate::Error::UnsupportedFormat)
        ));
    }
}
