use std::io::{self, Read};

use super::ARC_RECORD;
use super::fields::ArcHeader;
use crate::config::ReaderOptions;
use crate::diagnostics::{Diagnostics, Validate};
use crate::digest::Digest;
use crate::payload::{Payload, RecordPayload};
use crate::values::Uri;

/// ARC record (any record after the version block)
#[derive(Debug)]
pub struct ArcRecord<R> {
    header: ArcHeader,
    payload: RecordPayload<R>,
    diagnostics: Diagnostics,
}

impl<R: Read> ArcRecord<R> {
    /// Creates a record whose payload is read from `source`.
    ///
    /// Records without a known length have no payload. HTTP(S) records get their entity
    /// digested in addition to the block.
    pub fn new(header: ArcHeader, source: R, options: &ReaderOptions) -> Self {
        let payload = header.length().map(|length| {
            let payload = Payload::new(source, length, options.block_digest);
            if header.url().is_some_and(Uri::is_http) {
                payload.with_entity_digest(options.payload_digest)
            } else {
                payload
            }
        });
        let diagnostics = header.diagnostics().clone();
        ArcRecord {
            header,
            payload: RecordPayload::new(payload),
            diagnostics,
        }
    }

    pub fn header(&self) -> &ArcHeader {
        &self.header
    }

    pub fn has_payload(&self) -> bool {
        self.payload.is_some()
    }

    /// Payload stream, readable once
    pub fn payload(&mut self) -> Option<&mut Payload<R>> {
        self.payload.get_mut()
    }

    /// Drains the payload and records its problems (truncation) on the record. Idempotent.
    pub fn close(&mut self) -> io::Result<()> {
        self.payload.close(&mut self.diagnostics, ARC_RECORD)
    }

    pub fn is_closed(&self) -> bool {
        self.payload.is_closed()
    }

    /// Digest of the payload, known once the payload is read to its end or the record closed
    pub fn block_digest(&self) -> Option<&Digest> {
        self.payload.block_digest()
    }

    /// Digest of the HTTP entity, known once the payload is read to its end or the record closed
    pub fn payload_digest(&self) -> Option<&Digest> {
        self.payload.payload_digest()
    }
}

impl<R> Validate for ArcRecord<R> {
    fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    fn is_compliant(&self) -> bool {
        self.header.has_compliant_fields()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arc::ArcVersion;
    use crate::arc::fields::parse_record_line;
    use crate::diagnostics::DiagnosticKind;
    use crate::digest::DigestAlgorithm;

    const RESPONSE: &[u8] = b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\n\r\nhello";

    fn sha1(data: &[u8]) -> Digest {
        let mut state = DigestAlgorithm::Sha1.hasher();
        state.update(data);
        state.finalize()
    }

    #[test]
    fn test_record_http_digests() {
        let line = format!("http://x.org/ 1.2.3.4 20080430204825 text/html {}", RESPONSE.len());
        let header = parse_record_line(&line, ArcVersion::V1, None);
        let mut record = ArcRecord::new(header, RESPONSE, &ReaderOptions::default());
        assert!(record.has_payload());
        assert_eq!(record.block_digest(), None);

        record.close().unwrap();
        assert!(record.is_valid());
        assert_eq!(record.block_digest(), Some(&sha1(RESPONSE)));
        assert_eq!(record.payload_digest(), Some(&sha1(b"hello")));

        // Closing again changes nothing
        record.close().unwrap();
        assert!(record.is_valid());
        assert_eq!(record.block_digest(), Some(&sha1(RESPONSE)));
    }

    #[test]
    fn test_record_not_http_has_no_payload_digest() {
        let header = parse_record_line("dns:x.org 1.2.3.4 20080430204825 text/dns 5", ArcVersion::V1, None);
        let mut record = ArcRecord::new(header, b"HTTP/\n\nx".as_slice(), &ReaderOptions::default());
        record.close().unwrap();
        assert!(record.block_digest().is_some());
        assert_eq!(record.payload_digest(), None);
    }

    #[test]
    fn test_record_truncated_reported_once() {
        let header = parse_record_line("http://x.org/ 1.2.3.4 20080430204825 text/html 100", ArcVersion::V1, None);
        let mut record = ArcRecord::new(header, b"short".as_slice(), &ReaderOptions::default());
        let mut content = Vec::new();
        record.payload().unwrap().read_to_end(&mut content).unwrap();
        assert_eq!(content, b"short");

        record.close().unwrap();
        record.close().unwrap();
        assert_eq!(record.diagnostics().count(DiagnosticKind::Invalid, ARC_RECORD), 1);
        assert!(!record.is_valid());
    }

    #[test]
    fn test_record_unknown_length_has_no_payload() {
        let header = parse_record_line("http://x.org/ 1.2.3.4 20080430204825 text/html x", ArcVersion::V1, None);
        let mut record = ArcRecord::new(header, b"data".as_slice(), &ReaderOptions::default());
        assert!(!record.has_payload());
        record.close().unwrap();
        assert_eq!(record.block_digest(), None);
        assert_eq!(record.diagnostics().count(DiagnosticKind::Invalid, crate::arc::LENGTH_FIELD), 1);
    }
}
