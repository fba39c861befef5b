//! Downstream consumers of rewritten logical buffers
//!
//! The streaming assembler forwards every rewritten buffer to a [`Sink`].
//! [`WriteSink`] adapts any `Write` and can also run each forwarded buffer
//! through a callback, which enables single-pass operations like hashing the
//! logical stream while it is being written.

use crate::error::{Error, Result};
use bytes::Bytes;
use std::io::Write;

/// A rewritten buffer tagged with its position in the logical stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputBuffer {
    /// Logical offset of the first byte
    pub offset_logical: u64,
    /// Logical bytes
    pub data: Bytes,
}

impl OutputBuffer {
    /// Logical size of this buffer
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Receiver of rewritten buffers
///
/// An error returned from `push` aborts the session that forwarded the
/// buffer.
pub trait Sink {
    /// Accept one buffer
    fn push(&mut self, buffer: OutputBuffer) -> Result<()>;
}

impl Sink for Vec<OutputBuffer> {
    fn push(&mut self, buffer: OutputBuffer) -> Result<()> {
        Vec::push(self, buffer);
        Ok(())
    }
}

impl<S: Sink + ?Sized> Sink for &mut S {
    fn push(&mut self, buffer: OutputBuffer) -> Result<()> {
        (**self).push(buffer)
    }
}

/// A sink that writes the logical stream to a writer
///
/// Buffers must arrive in logical order without gaps; anything else is
/// rejected.
///
/// # Example
///
/// ```rust
/// use asset_splice::{OutputBuffer, Sink, WriteSink};
/// use bytes::Bytes;
///
/// let mut output = Vec::new();
/// let mut seen = 0;
/// let mut sink = WriteSink::with_processor(&mut output, |data: &[u8]| seen += data.len());
///
/// sink.push(OutputBuffer { offset_logical: 0, data: Bytes::from_static(b"hello") })?;
/// sink.push(OutputBuffer { offset_logical: 5, data: Bytes::from_static(b" world") })?;
/// drop(sink);
///
/// assert_eq!(output, b"hello world");
/// assert_eq!(seen, 11);
/// # Ok::<(), asset_splice::Error>(())
/// ```
pub struct WriteSink<W: Write, F: FnMut(&[u8]) = fn(&[u8])> {
    writer: W,
    processor: F,
    written: u64,
}

impl<W: Write> WriteSink<W> {
    /// Create a sink that only writes
    pub fn new(writer: W) -> Self {
        fn ignore(_: &[u8]) {}
        Self {
            writer,
            processor: ignore,
            written: 0,
        }
    }
}

impl<W: Write, F: FnMut(&[u8])> WriteSink<W, F> {
    /// Create a sink that passes every buffer to `processor` before writing it
    pub fn with_processor(writer: W, processor: F) -> Self {
        Self {
            writer,
            processor,
            written: 0,
        }
    }

    /// Logical bytes written so far
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Flush the underlying writer
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Consume the sink and return the underlying writer
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write, F: FnMut(&[u8])> Sink for WriteSink<W, F> {
    fn push(&mut self, buffer: OutputBuffer) -> Result<()> {
        if buffer.offset_logical != self.written {
            return Err(Error::Downstream(format!(
                "expected logical offset {}, got {}",
                self.written, buffer.offset_logical
            )));
        }
        (self.processor)(&buffer.data);
        self.writer.write_all(&buffer.data)?;
        self.written += buffer.data.len() as u64;
        Ok(())
    }
}
