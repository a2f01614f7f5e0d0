//! Bounded stream wrappers
//!
//! All the records of a container share a single underlying byte stream. The readers in
//! this module give one record a forward-only window over that stream, which can never
//! deliver more than the record's declared length:
//! - [MaxLengthReader] enforces a hard byte ceiling.
//! - [RecordingReader] does the same and keeps a copy of every byte it delivers.
//! - [ByteCountingReader] tracks the absolute position inside the container, so that
//!   record and member offsets can be reported and checked.
//!
//! None of them can rewind: mark/reset is not supported.

use std::io::{self, BufRead, Read};

use encoding::all::WINDOWS_1252;
use encoding::{DecoderTrap, Encoding};

/// Size of the scratch buffer used when skipping bytes.
const SKIP_BUFFER_SIZE: usize = 1024;

/// Reader delivering at most `limit` bytes from an underlying source.
///
/// Once the limit is reached, every read returns end-of-stream without
/// touching the underlying source, even if it still holds more bytes.
///
/// Dropping the reader (or calling [MaxLengthReader::into_inner]) does not close
/// the underlying source and does not skip the unread part of the window.
#[derive(Debug)]
pub struct MaxLengthReader<R> {
    inner: R,
    remaining: u64,
}

impl<R: Read> MaxLengthReader<R> {
    /// Creates a reader with a maximum number of bytes available from `inner`.
    ///
    /// A limit of 0 is valid and yields an empty stream.
    pub fn new(inner: R, limit: u64) -> Self {
        MaxLengthReader {
            inner,
            remaining: limit,
        }
    }

    /// Number of bytes which may still be delivered.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    /// Remaining bytes, saturated to what a `usize` can represent.
    pub fn available(&self) -> usize {
        saturate(self.remaining)
    }

    /// Always false, the stream is forward-only.
    pub fn mark_supported(&self) -> bool {
        false
    }

    /// Accepted and ignored.
    pub fn mark(&mut self, _read_limit: usize) {}

    /// Always fails with [io::ErrorKind::Unsupported].
    pub fn reset(&mut self) -> io::Result<()> {
        Err(unsupported_reset())
    }

    /// Reads a single byte, `Ok(None)` at end-of-stream.
    pub fn read_byte(&mut self) -> io::Result<Option<u8>> {
        read_single(self)
    }

    /// Skips up to `n` bytes, clamped to the remaining window.
    ///
    /// Returns the number of bytes actually skipped, which is smaller than `n` only
    /// if the limit or the end of the underlying source was reached.
    pub fn skip(&mut self, n: u64) -> io::Result<u64> {
        skip_by_reading(self, n)
    }

    /// Gets a reference to the underlying source.
    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Releases the underlying source, leaving it where the window stopped.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for MaxLengthReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let max = clamp(buf.len(), self.remaining);
        let n = self.inner.read(&mut buf[..max])?;
        self.remaining -= n as u64;
        Ok(n)
    }
}

/// Length-bounded reader that records every byte it delivers.
///
/// Bytes skipped with [RecordingReader::skip] count as delivered and are recorded too.
/// The recording always holds exactly the bytes handed out, never more, never fewer.
#[derive(Debug)]
pub struct RecordingReader<R> {
    inner: MaxLengthReader<R>,
    recording: Vec<u8>,
}

impl<R: Read> RecordingReader<R> {
    /// Creates a recording reader with a maximum number of bytes available from `inner`.
    pub fn new(inner: R, limit: u64) -> Self {
        RecordingReader {
            inner: MaxLengthReader::new(inner, limit),
            recording: Vec::new(),
        }
    }

    /// Bytes recorded so far.
    pub fn recording(&self) -> &[u8] {
        &self.recording
    }

    /// Number of bytes which may still be delivered.
    pub fn remaining(&self) -> u64 {
        self.inner.remaining()
    }

    /// Remaining bytes, saturated to what a `usize` can represent.
    pub fn available(&self) -> usize {
        self.inner.available()
    }

    /// Always false, the stream is forward-only.
    pub fn mark_supported(&self) -> bool {
        false
    }

    /// Accepted and ignored.
    pub fn mark(&mut self, _read_limit: usize) {}

    /// Always fails with [io::ErrorKind::Unsupported].
    pub fn reset(&mut self) -> io::Result<()> {
        Err(unsupported_reset())
    }

    /// Reads a single byte, `Ok(None)` at end-of-stream.
    pub fn read_byte(&mut self) -> io::Result<Option<u8>> {
        read_single(self)
    }

    /// Skips up to `n` bytes, clamped to the remaining window. Skipped bytes are recorded.
    pub fn skip(&mut self, n: u64) -> io::Result<u64> {
        skip_by_reading(self, n)
    }

    /// Closes the recording and returns it.
    ///
    /// The underlying source is neither closed nor advanced: the caller is responsible
    /// for draining or repositioning it.
    pub fn close(self) -> Vec<u8> {
        self.recording
    }

    /// Splits the reader into the underlying source and the recording.
    pub fn into_parts(self) -> (R, Vec<u8>) {
        (self.inner.into_inner(), self.recording)
    }
}

impl<R: Read> Read for RecordingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.recording.extend_from_slice(&buf[..n]);
        Ok(n)
    }
}

/// Buffered reader keeping track of the number of bytes consumed.
///
/// Used by container readers to know the absolute offset of each record or member.
#[derive(Debug)]
pub struct ByteCountingReader<R> {
    inner: R,
    position: u64,
}

impl<R: BufRead> ByteCountingReader<R> {
    /// Wraps `inner`, starting to count at 0.
    pub fn new(inner: R) -> Self {
        Self::with_position(inner, 0)
    }

    /// Wraps `inner`, whose current position in the container is `position`.
    pub fn with_position(inner: R, position: u64) -> Self {
        ByteCountingReader { inner, position }
    }

    /// Number of bytes consumed so far (plus the starting position).
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Consumes bytes until `target` is reached or the source is exhausted.
    ///
    /// Returns the number of bytes skipped. Targets behind the current position are ignored.
    pub fn skip_to(&mut self, target: u64) -> io::Result<u64> {
        let start = self.position;
        while self.position < target {
            let available = match self.inner.fill_buf() {
                Ok(buf) => buf.len(),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            if available == 0 {
                break;
            }
            let step = clamp(available, target - self.position);
            self.consume(step);
        }
        Ok(self.position - start)
    }

    /// Checks whether the source is exhausted.
    pub fn is_eof(&mut self) -> io::Result<bool> {
        Ok(self.inner.fill_buf()?.is_empty())
    }

    /// Releases the underlying reader.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: BufRead> Read for ByteCountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.position += n as u64;
        Ok(n)
    }
}

impl<R: BufRead> BufRead for ByteCountingReader<R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.inner.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.inner.consume(amt);
        self.position += amt as u64;
    }
}

fn saturate(value: u64) -> usize {
    usize::try_from(value).unwrap_or(usize::MAX)
}

/// `min(requested, remaining)` without truncating `remaining` on 32-bit targets.
fn clamp(requested: usize, remaining: u64) -> usize {
    requested.min(saturate(remaining))
}

fn unsupported_reset() -> io::Error {
    io::Error::new(io::ErrorKind::Unsupported, "mark/reset is not supported")
}

fn read_single<R: Read>(reader: &mut R) -> io::Result<Option<u8>> {
    let mut byte = [0u8; 1];
    loop {
        match reader.read(&mut byte) {
            Ok(0) => return Ok(None),
            Ok(_) => return Ok(Some(byte[0])),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}

fn skip_by_reading<R: Read>(reader: &mut R, n: u64) -> io::Result<u64> {
    let mut scratch = [0u8; SKIP_BUFFER_SIZE];
    let mut skipped = 0u64;
    while skipped < n {
        let want = clamp(SKIP_BUFFER_SIZE, n - skipped);
        match reader.read(&mut scratch[..want]) {
            Ok(0) => break,
            Ok(read) => skipped += read as u64,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(skipped)
}

/// A header line read from a record stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RawLine {
    /// Line text, without the line terminator
    pub text: String,
    /// Whether the line exceeded the maximum length and was cut
    pub truncated: bool,
}

/// Reads one `\n`-terminated line, stripping `\n` or `\r\n`.
///
/// At most `max` bytes are kept, the rest of an oversized line is consumed and dropped.
/// Lines which are not valid UTF-8 are decoded as Windows-1252 (a superset of Latin-1).
///
/// # Returns
/// `Ok(None)` if the input is already exhausted.
pub(crate) fn read_line<R: BufRead>(input: &mut R, max: usize) -> io::Result<Option<RawLine>> {
    let mut bytes = Vec::new();
    let mut truncated = false;
    let mut seen_any = false;
    loop {
        let buf = match input.fill_buf() {
            Ok(buf) => buf,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        if buf.is_empty() {
            break;
        }
        seen_any = true;
        let (chunk_len, content_len, terminated) = match buf.iter().position(|&b| b == b'\n') {
            Some(idx) => (idx + 1, idx, true),
            None => (buf.len(), buf.len(), false),
        };
        let keep = content_len.min(max.saturating_sub(bytes.len()));
        truncated |= keep < content_len;
        bytes.extend_from_slice(&buf[..keep]);
        input.consume(chunk_len);
        if terminated {
            break;
        }
    }
    if !seen_any {
        return Ok(None);
    }
    if bytes.last() == Some(&b'\r') {
        bytes.pop();
    }
    Ok(Some(RawLine {
        text: decode_text(bytes),
        truncated,
    }))
}

/// Decodes header bytes, falling back to Windows-1252 when they are not UTF-8.
pub(crate) fn decode_text(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => {
            let bytes = err.into_bytes();
            WINDOWS_1252
                .decode(&bytes, DecoderTrap::Replace)
                .unwrap_or_else(|_| String::from_utf8_lossy(&bytes).into_owned())
        }
    }
}

/// Consumes `\r` and `\n` bytes, returns the number of bytes skipped.
pub(crate) fn skip_newlines<R: BufRead>(input: &mut R) -> io::Result<u64> {
    let mut skipped = 0u64;
    loop {
        let buf = match input.fill_buf() {
            Ok(buf) => buf,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        let count = buf.iter().take_while(|&&b| b == b'\r' || b == b'\n').count();
        let exhausted = count < buf.len() || buf.is_empty();
        input.consume(count);
        skipped += count as u64;
        if exhausted {
            return Ok(skipped);
        }
    }
}
