//! Push-mode delivery
//!
//! [`StreamingAssembler`] consumes physical buffers in stream order. Until
//! the parser has discovered every chunk the bytes are held back; afterwards
//! each buffer is rewritten against running cursors and forwarded to the
//! sink, followed once by the append buffer when the last physical byte has
//! gone through.

use crate::{
    buffer::Buffer,
    chunk::{AppendBuffer, ChunkSet},
    error::{Error, Result},
    parser::{ChunkParser, FixedChunks, ParseResult},
    sink::{OutputBuffer, Sink},
    state::{ParseState, StreamState},
    surgeon::{BufferSurgeon, Resume},
    translate::PositionTranslator,
};
use bytes::{Bytes, BytesMut};
use std::{io::SeekFrom, sync::Arc};

/// A seek request translated into the original stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeekTarget {
    /// Original offset from which the host must resume pushing
    pub start_original: u64,
    /// Original offset where the host may stop pushing, if the seek is bounded
    pub stop_original: Option<u64>,
}

/// Push-mode driver for one session
pub struct StreamingAssembler<P: ChunkParser, S: Sink> {
    parser: P,
    sink: S,
    state: StreamState,
    adapter: BytesMut,
    parse_offset: u64,
    parse_need: u64,
    chunks: Option<Arc<ChunkSet>>,
    append: AppendBuffer,
    aborted: bool,
}

impl<P: ChunkParser, S: Sink> StreamingAssembler<P, S> {
    /// Create a session that discovers its chunks with `parser`
    pub fn new(parser: P, sink: S, duration_original: Option<u64>) -> Self {
        Self {
            parser,
            sink,
            state: StreamState::new(duration_original),
            adapter: BytesMut::new(),
            parse_offset: 0,
            parse_need: 0,
            chunks: None,
            append: AppendBuffer::default(),
            aborted: false,
        }
    }

    /// Current stream state
    pub fn state(&self) -> &StreamState {
        &self.state
    }

    /// The frozen chunk set, once parsed
    pub fn chunks(&self) -> Option<&Arc<ChunkSet>> {
        self.chunks.as_ref()
    }

    /// The append buffer, once parsed
    pub fn append_buffer(&self) -> &AppendBuffer {
        &self.append
    }

    /// Get a reference to the sink
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Get a mutable reference to the sink
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Consume the assembler and return the sink
    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Feed the next physical buffer
    pub fn push(&mut self, buffer: Buffer) -> Result<()> {
        if self.aborted {
            return Err(Error::SessionAborted);
        }
        let result = match self.state.state {
            ParseState::Parsed => self.forward(buffer),
            ParseState::Unparsed | ParseState::Parsing => self.accumulate(buffer),
        };
        self.check(result)
    }

    /// Signal end of stream
    ///
    /// Forwards whatever logical bytes follow the last physical byte: pending
    /// prepend bytes, the append buffer and, for streams of unknown length,
    /// inject chunks spliced at the final offset.
    pub fn finish(&mut self) -> Result<()> {
        if self.aborted {
            return Err(Error::SessionAborted);
        }
        let result = self.finish_inner();
        self.check(result)
    }

    /// Reposition the session at a logical offset
    ///
    /// Returns the original offset from which the host must resume pushing
    /// physical buffers.
    pub fn seek_logical(&mut self, pos_logical: u64) -> Result<u64> {
        self.seek(SeekFrom::Start(pos_logical), None)
            .map(|target| target.start_original)
    }

    /// Reposition the session and translate an optional stop position
    ///
    /// `Current` starts are relative to the logical cursor and `End` starts
    /// to the logical duration, which must be known. A relative stop is
    /// resolved against the new start. A failed seek leaves the session
    /// untouched.
    pub fn seek(&mut self, start: SeekFrom, stop: Option<SeekFrom>) -> Result<SeekTarget> {
        if self.aborted {
            return Err(Error::SessionAborted);
        }
        let chunks = self.chunks.clone().ok_or(Error::NotParsed)?;

        let start_logical = self.resolve(start, self.state.cursor_logical)?;
        let stop_logical = stop
            .map(|pos| self.resolve(pos, start_logical))
            .transpose()?;
        if let Some(stop) = stop_logical.filter(|&stop| stop < start_logical) {
            return Err(Error::InvalidSeek(format!(
                "stop {} lies before start {}",
                stop, start_logical
            )));
        }

        let start_original = self.reposition(&chunks, start_logical);
        let stop_original = PositionTranslator::new(&chunks).translate_stop(stop_logical);
        tracing::debug!(
            start_logical,
            start_original,
            stop_logical = ?stop_logical,
            stop_original = ?stop_original,
            "seek"
        );
        Ok(SeekTarget {
            start_original,
            stop_original,
        })
    }

    /// Reposition the session at percentages of the logical duration
    pub fn seek_percent(&mut self, start: u32, stop: Option<u32>) -> Result<SeekTarget> {
        if self.aborted {
            return Err(Error::SessionAborted);
        }
        if self.chunks.is_none() {
            return Err(Error::NotParsed);
        }
        let duration = self.state.duration_logical.ok_or_else(|| {
            Error::InvalidSeek("percent seek on a stream of unknown length".into())
        })?;
        let at = |percent: u32| (duration as u128 * percent.min(100) as u128 / 100) as u64;
        self.seek(SeekFrom::Start(at(start)), stop.map(|p| SeekFrom::Start(at(p))))
    }

    fn resolve(&self, pos: SeekFrom, current: u64) -> Result<u64> {
        let (base, delta) = match pos {
            SeekFrom::Start(offset) => return Ok(offset),
            SeekFrom::Current(delta) => (current, delta),
            SeekFrom::End(delta) => {
                let end = self.state.duration_logical.ok_or_else(|| {
                    Error::InvalidSeek("end-relative seek on a stream of unknown length".into())
                })?;
                (end, delta)
            }
        };
        base.checked_add_signed(delta).ok_or_else(|| {
            Error::InvalidSeek(format!("offset {} {:+} is out of range", base, delta))
        })
    }

    /// Move the cursors to `pos_logical`, returning the original resume offset
    fn reposition(&mut self, chunks: &ChunkSet, pos_logical: u64) -> u64 {
        if let Some(append_start) = chunks.append_offset_logical() {
            if pos_logical >= append_start {
                let skip = ((pos_logical - append_start) as usize).min(self.append.len());
                let rest = self.append.bytes().slice(skip..);
                let end = chunks.duration_original().unwrap_or_default();

                self.state.cursor_original = end;
                self.state.cursor_logical = append_start + skip as u64;
                self.state.pending_prepend = (!rest.is_empty()).then_some(rest);
                self.state.first_inject = chunks.inject().len();
                self.state.append_sent = true;

                tracing::trace!(pos_logical, pos_original = end, "cursor in append region");
                return end;
            }
        }

        let t = PositionTranslator::new(chunks).logical_to_original(pos_logical);
        self.state.cursor_original = t.pos_original;
        self.state.cursor_logical = pos_logical;
        self.state.pending_prepend = t.synthesized;
        self.state.first_inject = t.first_inject;
        self.state.append_sent = false;

        tracing::trace!(
            pos_logical,
            pos_original = t.pos_original,
            inside_injected = t.inside_injected,
            "cursor repositioned"
        );
        t.pos_original
    }

    /// Flush-to-ready: rewind a parsed session, or forget an unfinished parse
    pub fn reset(&mut self) {
        self.aborted = false;
        self.state.rewind();
        if !self.state.is_parsed() {
            self.state.state = ParseState::Unparsed;
            self.adapter.clear();
            self.parse_offset = 0;
            self.parse_need = 0;
            self.parser.reset();
        }
        tracing::debug!(state = ?self.state.state, "session reset");
    }

    fn check(&mut self, result: Result<()>) -> Result<()> {
        if let Err(e) = &result {
            self.aborted = true;
            tracing::warn!(error = %e, "session aborted");
        }
        result
    }

    fn accumulate(&mut self, buffer: Buffer) -> Result<()> {
        if self.state.state == ParseState::Unparsed {
            self.state.state = ParseState::Parsing;
            tracing::debug!("parsing started");
        }
        self.adapter.extend_from_slice(buffer.as_ref());

        loop {
            let available = self.adapter.len() as u64;
            if available < self.parse_need {
                return Ok(());
            }

            let start = self.parse_offset.min(available) as usize;
            match self.parser.parse(&self.adapter[start..], self.parse_offset) {
                ParseResult::NeedMoreData {
                    next_offset,
                    next_size,
                } => {
                    let need = next_offset.saturating_add(next_size as u64);
                    // asking again for a window it already holds would spin forever
                    if next_offset == self.parse_offset && need <= available {
                        return Err(Error::Parse(format!(
                            "parser made no progress at offset {}",
                            next_offset
                        )));
                    }
                    self.parse_offset = next_offset;
                    self.parse_need = need;
                }
                ParseResult::Parsed => {
                    self.freeze()?;
                    let held = self.adapter.split();
                    return self.forward(Buffer::Unique(held));
                }
                ParseResult::Error { reason } => return Err(Error::Parse(reason)),
            }
        }
    }

    fn freeze(&mut self) -> Result<()> {
        let lists = self.parser.take_chunks();
        let (set, append) = match self.state.duration_original {
            Some(end) => ChunkSet::build(lists.strip, lists.inject, end)?,
            None => (
                ChunkSet::build_open(lists.strip, lists.inject)?,
                AppendBuffer::default(),
            ),
        };
        self.state.duration_logical = set.duration_logical();
        self.state.state = ParseState::Parsed;
        self.chunks = Some(Arc::new(set));
        self.append = append;
        tracing::debug!(
            duration_original = ?self.state.duration_original,
            duration_logical = ?self.state.duration_logical,
            "parsing complete"
        );
        Ok(())
    }

    fn forward(&mut self, buffer: Buffer) -> Result<()> {
        let chunks = self.chunks.clone().ok_or(Error::NotParsed)?;
        let physical = buffer.len() as u64;
        let resume = Resume {
            prepend: self.state.pending_prepend.take(),
            first_inject: self.state.first_inject,
        };

        let rewritten =
            BufferSurgeon::new(&chunks).rewrite_resumed(buffer, self.state.cursor_original, resume)?;
        self.state.cursor_original += physical;
        self.emit(rewritten.buffer.freeze())?;

        let at_end = self
            .state
            .duration_original
            .is_some_and(|end| self.state.cursor_original >= end);
        if at_end && !self.state.append_sent {
            self.state.append_sent = true;
            if !self.append.is_empty() {
                tracing::debug!(size = self.append.len(), "forwarding append buffer");
                self.emit(self.append.bytes().clone())?;
            }
        }
        Ok(())
    }

    fn finish_inner(&mut self) -> Result<()> {
        match self.state.state {
            ParseState::Unparsed => return Ok(()),
            ParseState::Parsing => {
                return Err(Error::InvalidFormat(
                    "stream ended before metadata parsing completed".into(),
                ))
            }
            ParseState::Parsed => {}
        }
        let chunks = self.chunks.clone().ok_or(Error::NotParsed)?;

        if let Some(pending) = self.state.pending_prepend.take() {
            self.emit(pending)?;
        }

        if !self.state.append_sent {
            self.state.append_sent = true;
            if !self.append.is_empty() {
                tracing::debug!(size = self.append.len(), "forwarding append buffer at end of stream");
                self.emit(self.append.bytes().clone())?;
            }
        }

        if chunks.duration_original().is_none() {
            let inject = chunks.inject();
            let first = inject
                .partition_point(|c| c.offset_original < self.state.cursor_original)
                .max(self.state.first_inject);
            let mut tail = BytesMut::new();
            for chunk in &inject[first..] {
                tail.extend_from_slice(chunk.bytes());
            }
            self.state.first_inject = inject.len();
            self.emit(tail.freeze())?;
        }
        Ok(())
    }

    fn emit(&mut self, data: Bytes) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        let len = data.len() as u64;
        self.sink.push(OutputBuffer {
            offset_logical: self.state.cursor_logical,
            data,
        })?;
        self.state.cursor_logical += len;
        Ok(())
    }
}

impl<S: Sink> StreamingAssembler<FixedChunks, S> {
    /// Create an already-parsed session from a frozen chunk set
    pub fn from_chunks(chunks: Arc<ChunkSet>, append: AppendBuffer, sink: S) -> Self {
        let mut state = StreamState::new(chunks.duration_original());
        state.duration_logical = chunks.duration_logical();
        state.state = ParseState::Parsed;
        Self {
            parser: FixedChunks::default(),
            sink,
            state,
            adapter: BytesMut::new(),
            parse_offset: 0,
            parse_need: 0,
            chunks: Some(chunks),
            append,
            aborted: false,
        }
    }
}
