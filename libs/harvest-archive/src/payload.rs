//! Record payload with digest finalization
//!
//! A [Payload] wraps the byte range following a record header. Bytes are digested as the
//! caller reads them; when the stream is exhausted or explicitly closed, the digests are
//! finalized and a [PayloadSummary] is produced. The owning record applies that summary
//! to itself in its own `close()`.

use std::io::{self, Read};

use tracing::debug;

use crate::diagnostics::Diagnostics;
use crate::digest::{Digest, DigestAlgorithm, DigestState};
use crate::stream::MaxLengthReader;

const DRAIN_BUFFER_SIZE: usize = 4096;

/// Prefix of an HTTP status line.
const HTTP_PREFIX: &[u8; 5] = b"HTTP/";

/// Final state of a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadSummary {
    /// Declared length
    pub length: u64,
    /// Bytes actually delivered (read or drained)
    pub consumed: u64,
    /// Declared bytes the source could not deliver, non-zero means truncated
    pub unavailable: u64,
    /// Digest of the whole block
    pub block_digest: Option<Digest>,
    /// Digest of the HTTP entity, if an HTTP header block was found
    pub payload_digest: Option<Digest>,
    /// Offset of the HTTP entity inside the payload
    pub entity_offset: Option<u64>,
}

impl PayloadSummary {
    pub fn is_truncated(&self) -> bool {
        self.unavailable > 0
    }

    /// Records the summary problems against `record_field`, the pseudo-field of the
    /// owning record.
    pub fn apply_to(&self, diagnostics: &mut Diagnostics, record_field: &str) {
        if self.is_truncated() {
            diagnostics.invalid(record_field, "Payload length mismatch");
        }
    }
}

#[derive(Debug)]
enum PayloadState {
    Open,
    Closed(PayloadSummary),
}

/// Where the HTTP scanner currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanPhase {
    /// Matching the `HTTP/` prefix, with the number of bytes matched so far
    Prefix(usize),
    /// Inside the header block
    Header { line_empty: bool },
    /// Past the empty line ending the header block
    Entity,
    /// Not an HTTP message
    NotHttp,
}

/// Incremental locator of the end of an HTTP header block.
#[derive(Debug)]
struct EntityScanner {
    phase: ScanPhase,
    position: u64,
    entity_offset: Option<u64>,
    digest: DigestState,
}

impl EntityScanner {
    fn new(algorithm: DigestAlgorithm) -> Self {
        EntityScanner {
            phase: ScanPhase::Prefix(0),
            position: 0,
            entity_offset: None,
            digest: algorithm.hasher(),
        }
    }

    fn feed(&mut self, chunk: &[u8]) {
        for (idx, &byte) in chunk.iter().enumerate() {
            match self.phase {
                ScanPhase::Entity => {
                    self.digest.update(&chunk[idx..]);
                    break;
                }
                ScanPhase::NotHttp => break,
                ScanPhase::Prefix(matched) => {
                    self.phase = if byte != HTTP_PREFIX[matched] {
                        ScanPhase::NotHttp
                    } else if matched + 1 == HTTP_PREFIX.len() {
                        ScanPhase::Header { line_empty: false }
                    } else {
                        ScanPhase::Prefix(matched + 1)
                    };
                }
                ScanPhase::Header { line_empty } => match byte {
                    b'\n' if line_empty => {
                        self.phase = ScanPhase::Entity;
                        self.entity_offset = Some(self.position + idx as u64 + 1);
                    }
                    b'\n' => self.phase = ScanPhase::Header { line_empty: true },
                    b'\r' => {}
                    _ => self.phase = ScanPhase::Header { line_empty: false },
                },
            }
        }
        self.position += chunk.len() as u64;
    }

    fn finish(self) -> Option<(u64, Digest)> {
        let offset = self.entity_offset?;
        Some((offset, self.digest.finalize()))
    }
}

/// Payload of a record, bounded to its declared length.
#[derive(Debug)]
pub struct Payload<R> {
    stream: MaxLengthReader<R>,
    length: u64,
    consumed: u64,
    block: Option<DigestState>,
    entity: Option<EntityScanner>,
    state: PayloadState,
}

impl<R: Read> Payload<R> {
    /// Creates a payload of `length` bytes read from `source`.
    ///
    /// ## Arguments
    /// * `source` - The stream positioned at the first payload byte.
    /// * `length` - The declared payload length.
    /// * `block_digest` - Algorithm of the block digest, if any.
    pub fn new(source: R, length: u64, block_digest: Option<DigestAlgorithm>) -> Self {
        Payload {
            stream: MaxLengthReader::new(source, length),
            length,
            consumed: 0,
            block: block_digest.map(|a| a.hasher()),
            entity: None,
            state: PayloadState::Open,
        }
    }

    /// Enables digesting of the entity following an embedded HTTP header block.
    pub fn with_entity_digest(mut self, algorithm: Option<DigestAlgorithm>) -> Self {
        self.entity = algorithm.map(EntityScanner::new);
        self
    }

    /// Declared length.
    pub fn length(&self) -> u64 {
        self.length
    }

    /// Bytes not yet delivered.
    pub fn remaining(&self) -> u64 {
        self.stream.remaining()
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, PayloadState::Closed(_))
    }

    /// Summary, available once the payload is closed.
    pub fn summary(&self) -> Option<&PayloadSummary> {
        match &self.state {
            PayloadState::Closed(summary) => Some(summary),
            PayloadState::Open => None,
        }
    }

    /// Drains the unread bytes through the digests and finalizes.
    ///
    /// Calling it again returns the stored summary without touching the stream.
    pub fn close(&mut self) -> io::Result<&PayloadSummary> {
        if let PayloadState::Open = self.state {
            let mut scratch = [0u8; DRAIN_BUFFER_SIZE];
            loop {
                let n = match self.stream.read(&mut scratch) {
                    Ok(n) => n,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e),
                };
                if n == 0 {
                    break;
                }
                self.digest(&scratch[..n]);
            }
            self.finalize();
        }
        match &self.state {
            PayloadState::Closed(summary) => Ok(summary),
            PayloadState::Open => Err(io::Error::other("payload could not be finalized")),
        }
    }

    fn digest(&mut self, chunk: &[u8]) {
        self.consumed += chunk.len() as u64;
        if let Some(block) = &mut self.block {
            block.update(chunk);
        }
        if let Some(entity) = &mut self.entity {
            entity.feed(chunk);
        }
    }

    fn finalize(&mut self) {
        if self.is_closed() {
            return;
        }
        let (entity_offset, payload_digest) = match self.entity.take().and_then(EntityScanner::finish) {
            Some((offset, digest)) => (Some(offset), Some(digest)),
            None => (None, None),
        };
        let summary = PayloadSummary {
            length: self.length,
            consumed: self.consumed,
            unavailable: self.stream.remaining(),
            block_digest: self.block.take().map(DigestState::finalize),
            payload_digest,
            entity_offset,
        };
        debug!(
            length = summary.length,
            consumed = summary.consumed,
            unavailable = summary.unavailable,
            "payload finalized"
        );
        self.state = PayloadState::Closed(summary);
    }
}

impl<R: Read> Read for Payload<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.is_closed() || buf.is_empty() {
            return Ok(0);
        }
        let n = self.stream.read(buf)?;
        if n == 0 {
            self.finalize();
        } else {
            self.digest(&buf[..n]);
        }
        Ok(n)
    }
}

/// Optional payload of a record, whose summary is applied to the record once.
#[derive(Debug)]
pub(crate) struct RecordPayload<R> {
    payload: Option<Payload<R>>,
    applied: bool,
}

impl<R: Read> RecordPayload<R> {
    pub(crate) fn new(payload: Option<Payload<R>>) -> Self {
        RecordPayload { payload, applied: false }
    }

    pub(crate) fn is_some(&self) -> bool {
        self.payload.is_some()
    }

    pub(crate) fn get_mut(&mut self) -> Option<&mut Payload<R>> {
        self.payload.as_mut()
    }

    /// Closes the payload and applies its summary to `diagnostics`, only the first time.
    pub(crate) fn close(&mut self, diagnostics: &mut Diagnostics, record_field: &str) -> io::Result<()> {
        if self.applied {
            return Ok(());
        }
        if let Some(payload) = &mut self.payload {
            payload.close()?.apply_to(diagnostics, record_field);
        }
        self.applied = true;
        Ok(())
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.applied
    }

    /// Summary, as soon as the payload is finalized
    pub(crate) fn summary(&self) -> Option<&PayloadSummary> {
        self.payload.as_ref()?.summary()
    }

    pub(crate) fn block_digest(&self) -> Option<&Digest> {
        self.summary()?.block_digest.as_ref()
    }

    pub(crate) fn payload_digest(&self) -> Option<&Digest> {
        self.summary()?.payload_digest.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HTTP_RESPONSE: &[u8] = b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\n\r\nhello";

    fn sha1(data: &[u8]) -> Digest {
        let mut state = DigestAlgorithm::Sha1.hasher();
        state.update(data);
        state.finalize()
    }

    #[test]
    fn test_payload_read_to_end_finalizes() {
        let mut payload = Payload::new(b"0123456789".as_slice(), 10, Some(DigestAlgorithm::Sha1));
        let mut out = Vec::new();
        payload.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"0123456789");

        let summary = payload.summary().unwrap();
        assert_eq!(summary.consumed, 10);
        assert!(!summary.is_truncated());
        assert_eq!(summary.block_digest, Some(sha1(b"0123456789")));
        assert_eq!(summary.payload_digest, None);
    }

    #[test]
    fn test_payload_close_drains_and_is_idempotent() {
        let mut source = b"0123456789NEXT".as_slice();
        let mut payload = Payload::new(&mut source, 10, Some(DigestAlgorithm::Sha1));
        let mut buf = [0u8; 3];
        payload.read_exact(&mut buf).unwrap();

        let first = payload.close().unwrap().clone();
        assert_eq!(first.consumed, 10);
        assert_eq!(first.block_digest, Some(sha1(b"0123456789")));
        let second = payload.close().unwrap().clone();
        assert_eq!(first, second);
        assert_eq!(payload.read(&mut buf).unwrap(), 0);

        drop(payload);
        assert_eq!(source, b"NEXT");
    }

    #[test]
    fn test_payload_truncated() {
        let mut payload = Payload::new(b"01234".as_slice(), 10, None);
        let summary = payload.close().unwrap();
        assert_eq!(summary.consumed, 5);
        assert_eq!(summary.unavailable, 5);
        assert!(summary.is_truncated());
        assert_eq!(summary.block_digest, None);
    }

    #[test]
    fn test_payload_empty() {
        let mut payload = Payload::new(b"abc".as_slice(), 0, Some(DigestAlgorithm::Sha1));
        assert_eq!(payload.read(&mut [0u8; 4]).unwrap(), 0);
        let summary = payload.summary().unwrap();
        assert_eq!(summary.consumed, 0);
        assert_eq!(summary.block_digest, Some(sha1(b"")));
    }

    #[test]
    fn test_payload_http_entity_digest() {
        let mut payload = Payload::new(HTTP_RESPONSE, HTTP_RESPONSE.len() as u64, Some(DigestAlgorithm::Sha1))
            .with_entity_digest(Some(DigestAlgorithm::Sha1));
        let summary = payload.close().unwrap();
        assert_eq!(summary.block_digest, Some(sha1(HTTP_RESPONSE)));
        assert_eq!(summary.payload_digest, Some(sha1(b"hello")));
        assert_eq!(summary.entity_offset, Some((HTTP_RESPONSE.len() - 5) as u64));
    }

    #[test]
    fn test_payload_http_entity_byte_by_byte() {
        let response = b"HTTP/1.0 404 Not Found\nServer: x\n\nmissing";
        let mut payload = Payload::new(response.as_slice(), response.len() as u64, None)
            .with_entity_digest(Some(DigestAlgorithm::Sha256));
        let mut byte = [0u8; 1];
        while payload.read(&mut byte).unwrap() == 1 {}

        let summary = payload.summary().unwrap();
        let mut expected = DigestAlgorithm::Sha256.hasher();
        expected.update(b"missing");
        assert_eq!(summary.payload_digest, Some(expected.finalize()));
        assert_eq!(summary.entity_offset, Some(34));
    }

    #[test]
    fn test_payload_not_http() {
        let body = b"<html>\r\n\r\n</html>";
        let mut payload = Payload::new(body.as_slice(), body.len() as u64, None)
            .with_entity_digest(Some(DigestAlgorithm::Sha1));
        let summary = payload.close().unwrap();
        assert_eq!(summary.payload_digest, None);
        assert_eq!(summary.entity_offset, None);
    }

    #[test]
    fn test_payload_http_header_unterminated() {
        let body = b"HTTP/1.1 200 OK\r\nServer: x\r\n";
        let mut payload = Payload::new(body.as_slice(), body.len() as u64, None)
            .with_entity_digest(Some(DigestAlgorithm::Sha1));
        assert_eq!(payload.close().unwrap().payload_digest, None);
    }

    #[test]
    fn test_record_payload_applies_summary_once() {
        let payload = Payload::new(b"01234".as_slice(), 10, Some(DigestAlgorithm::Sha1));
        let mut record_payload = RecordPayload::new(Some(payload));
        let mut diagnostics = Diagnostics::new();

        // Read to its end: digests are known, the record is not closed yet
        let mut out = Vec::new();
        record_payload.get_mut().unwrap().read_to_end(&mut out).unwrap();
        assert_eq!(record_payload.block_digest(), Some(&sha1(b"01234")));
        assert!(!record_payload.is_closed());
        assert!(diagnostics.is_empty());

        record_payload.close(&mut diagnostics, "Test record").unwrap();
        record_payload.close(&mut diagnostics, "Test record").unwrap();
        assert!(record_payload.is_closed());
        assert_eq!(diagnostics.count(crate::diagnostics::DiagnosticKind::Invalid, "Test record"), 1);
    }
}
