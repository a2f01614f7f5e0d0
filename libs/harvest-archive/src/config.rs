//! Reader configuration

use crate::digest::DigestAlgorithm;

/// Default maximum length of a single header line, in bytes.
pub const DEFAULT_MAX_HEADER_LINE: usize = 8192;

/// Default maximum number of lines kept from a WARC header block.
pub const DEFAULT_MAX_HEADER_LINES: usize = 1024;

/// Options shared by the ARC and WARC readers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderOptions {
    /// Digest computed over every payload block, `None` to disable
    pub block_digest: Option<DigestAlgorithm>,
    /// Digest computed over the HTTP entity inside a payload, `None` to disable
    pub payload_digest: Option<DigestAlgorithm>,
    /// Header lines longer than this are truncated and reported invalid
    pub max_header_line: usize,
    /// WARC header lines past this count are consumed but dropped, and reported invalid
    pub max_header_lines: usize,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        ReaderOptions {
            block_digest: Some(DigestAlgorithm::Sha1),
            payload_digest: Some(DigestAlgorithm::Sha1),
            max_header_line: DEFAULT_MAX_HEADER_LINE,
            max_header_lines: DEFAULT_MAX_HEADER_LINES,
        }
    }
}

impl ReaderOptions {
    pub fn with_block_digest(mut self, algorithm: Option<DigestAlgorithm>) -> Self {
        self.block_digest = algorithm;
        self
    }

    pub fn with_payload_digest(mut self, algorithm: Option<DigestAlgorithm>) -> Self {
        self.payload_digest = algorithm;
        self
    }

    pub fn with_max_header_line(mut self, length: usize) -> Self {
        self.max_header_line = length;
        self
    }

    pub fn with_max_header_lines(mut self, count: usize) -> Self {
        self.max_header_lines = count;
        self
    }
}
