//! Per-session mutable stream state

use bytes::Bytes;

/// Lifecycle of chunk discovery for one session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseState {
    /// No bytes seen yet
    #[default]
    Unparsed,
    /// Bytes are being accumulated and handed to the parser
    Parsing,
    /// The chunk set and durations are frozen
    Parsed,
}

/// Mutable state owned by whichever assembler drives the session
#[derive(Debug, Clone, Default)]
pub struct StreamState {
    /// Where chunk discovery stands
    pub state: ParseState,
    /// Length of the original stream, if known
    pub duration_original: Option<u64>,
    /// Length of the logical stream, known once parsed and the original length is known
    pub duration_logical: Option<u64>,
    /// Logical offset of the next forwarded byte
    pub cursor_logical: u64,
    /// Original offset of the next physical byte
    pub cursor_original: u64,
    /// Logical bytes to forward ahead of the next physical buffer
    pub pending_prepend: Option<Bytes>,
    /// First inject chunk still to be spliced after a seek
    pub first_inject: usize,
    /// True once the append buffer has been forwarded
    pub append_sent: bool,
}

impl StreamState {
    /// Fresh state for a stream of the given original length
    pub fn new(duration_original: Option<u64>) -> Self {
        Self {
            duration_original,
            ..Default::default()
        }
    }

    /// Check if the chunk set is frozen
    pub fn is_parsed(&self) -> bool {
        self.state == ParseState::Parsed
    }

    /// Rewind the cursors to the start of the stream
    pub fn rewind(&mut self) {
        self.cursor_logical = 0;
        self.cursor_original = 0;
        self.pending_prepend = None;
        self.first_inject = 0;
        self.append_sent = false;
    }
}
