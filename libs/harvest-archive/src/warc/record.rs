use std::io::{self, Read};

use super::WARC_RECORD;
use super::header::WarcHeader;
use crate::config::ReaderOptions;
use crate::diagnostics::{Diagnostics, Validate};
use crate::digest::Digest;
use crate::payload::{Payload, RecordPayload};

/// WARC record: a header block and its content
#[derive(Debug)]
pub struct WarcRecord<R> {
    header: WarcHeader,
    payload: RecordPayload<R>,
    diagnostics: Diagnostics,
}

impl<R: Read> WarcRecord<R> {
    /// Creates a record whose content is the next `Content-Length` bytes of `source`.
    ///
    /// Records without a usable `Content-Length` have no payload. `application/http`
    /// content gets its entity digested in addition to the block.
    pub fn new(header: WarcHeader, source: R, options: &ReaderOptions) -> Self {
        let payload = header.content_length().map(|length| {
            let payload = Payload::new(source, length, options.block_digest);
            if header.is_http() {
                payload.with_entity_digest(options.payload_digest)
            } else {
                payload
            }
        });
        let diagnostics = header.diagnostics().clone();
        WarcRecord {
            header,
            payload: RecordPayload::new(payload),
            diagnostics,
        }
    }

    pub fn header(&self) -> &WarcHeader {
        &self.header
    }

    pub fn has_payload(&self) -> bool {
        self.payload.is_some()
    }

    pub fn payload(&mut self) -> Option<&mut Payload<R>> {
        self.payload.get_mut()
    }

    /// Drains the payload and records its problems (truncation) on the record. Idempotent.
    pub fn close(&mut self) -> io::Result<()> {
        self.payload.close(&mut self.diagnostics, WARC_RECORD)
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

impl<R> Validate for WarcRecord<R> {
    fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    fn is_compliant(&self) -> bool {
        self.header.is_compliant()
    }
}
