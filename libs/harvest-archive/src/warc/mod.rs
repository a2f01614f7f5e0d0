//! WARC records
//!
//! A WARC record is a version line, a block of `name: value` header lines ended by an
//! empty line, then `Content-Length` bytes of content followed by two CRLF. Header
//! problems are reported as diagnostics, the reader moves on to the next record
//! whatever is wrong with the current one.

pub mod header;
pub mod read;
pub mod record;

pub use header::{HeaderLine, WarcDigest, WarcHeader, WarcVersion};
pub use read::{CompressedWarcReader, WarcReader};
pub use record::WarcRecord;

use crate::gzip::GzipError;

pub const VERSION_FIELD: &str = "WARC-Version";
pub const WARC_TYPE_FIELD: &str = "WARC-Type";
pub const RECORD_ID_FIELD: &str = "WARC-Record-ID";
pub const DATE_FIELD: &str = "WARC-Date";
pub const CONTENT_LENGTH_FIELD: &str = "Content-Length";
pub const CONTENT_TYPE_FIELD: &str = "Content-Type";
pub const TARGET_URI_FIELD: &str = "WARC-Target-URI";
pub const IP_ADDRESS_FIELD: &str = "WARC-IP-Address";
pub const BLOCK_DIGEST_FIELD: &str = "WARC-Block-Digest";
pub const PAYLOAD_DIGEST_FIELD: &str = "WARC-Payload-Digest";
pub const CONCURRENT_TO_FIELD: &str = "WARC-Concurrent-To";

/// Pseudo-field of header lines which are not `name: value` pairs
pub const HEADER_LINE_FIELD: &str = "Header-line";
/// Pseudo-field used for diagnostics about a record as a whole
pub const WARC_RECORD: &str = "WARC record";

/// Errors that can occur while reading a WARC container
#[derive(thiserror::Error, Debug)]
pub enum WarcReaderError {
    #[error("GZip error: {0}")]
    Gzip(#[from] GzipError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
