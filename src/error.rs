//! Error types for asset-splice

use std::io;

/// Result type for asset-splice operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while parsing, rewriting or delivering a stream
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Invalid file format
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// Unsupported file format or operation for this container
    #[error("Unsupported format")]
    UnsupportedFormat,

    /// Data size exceeds maximum allowed
    #[error("Data too large: {size} bytes (max: {max})")]
    DataTooLarge { size: usize, max: usize },

    /// The format parser rejected the stream
    #[error("Parse error: {0}")]
    Parse(String),

    /// The downstream consumer refused a forwarded buffer
    #[error("Downstream rejected buffer: {0}")]
    Downstream(String),

    /// A chunk set or size computation broke a structural invariant
    #[error("Invariant violated: {0}")]
    InvariantViolated(String),

    /// A seek request could not be resolved to a logical position
    #[error("Invalid seek: {0}")]
    InvalidSeek(String),

    /// Operation requires a parsed chunk set
    #[error("Stream metadata not parsed yet")]
    NotParsed,

    /// A previous fatal error ended the session
    #[error("Session aborted by an earlier fatal error")]
    SessionAborted,
}
