//! WARC header block parsing
//!
//! The version line and every header line of a block are kept as read. Known fields are
//! coerced to their types with the same rules as ARC header fields: an empty or absent
//! mandatory field is `Missing`, a value that does not parse is `Invalid`. A second
//! occurrence of a non-repeatable field is `Invalid` and does not replace the first one.

use std::fmt;
use std::net::IpAddr;

use chrono::{DateTime, Utc};

use super::{
    BLOCK_DIGEST_FIELD, CONCURRENT_TO_FIELD, CONTENT_LENGTH_FIELD, CONTENT_TYPE_FIELD, DATE_FIELD,
    HEADER_LINE_FIELD, IP_ADDRESS_FIELD, PAYLOAD_DIGEST_FIELD, RECORD_ID_FIELD, TARGET_URI_FIELD,
    VERSION_FIELD, WARC_TYPE_FIELD,
};
use crate::diagnostics::{Diagnostics, Validate};
use crate::digest::DigestAlgorithm;
use crate::values::{self, ContentType, Uri};

const MANDATORY_FIELDS: [&str; 4] = [WARC_TYPE_FIELD, RECORD_ID_FIELD, DATE_FIELD, CONTENT_LENGTH_FIELD];

/// One line of a header block
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderLine {
    /// `name: value` line, both parts trimmed
    Field { name: String, value: String },
    /// Line without a colon, kept verbatim
    Raw(String),
}

impl HeaderLine {
    /// Splits a line at its first colon.
    pub fn parse(line: &str) -> Self {
        match line.split_once(':') {
            Some((name, value)) if !name.trim().is_empty() => HeaderLine::Field {
                name: name.trim().to_string(),
                value: value.trim().to_string(),
            },
            _ => HeaderLine::Raw(line.to_string()),
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            HeaderLine::Field { name, .. } => Some(name),
            HeaderLine::Raw(_) => None,
        }
    }

    pub fn value(&self) -> Option<&str> {
        match self {
            HeaderLine::Field { value, .. } => Some(value),
            HeaderLine::Raw(_) => None,
        }
    }
}

/// WARC format version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WarcVersion {
    V1_0,
    V1_1,
}

impl WarcVersion {
    pub fn from_line(line: &str) -> Option<Self> {
        match line.trim() {
            "WARC/1.0" => Some(WarcVersion::V1_0),
            "WARC/1.1" => Some(WarcVersion::V1_1),
            _ => None,
        }
    }
}

impl fmt::Display for WarcVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WarcVersion::V1_0 => write!(f, "WARC/1.0"),
            WarcVersion::V1_1 => write!(f, "WARC/1.1"),
        }
    }
}

/// Declared digest, as found in `WARC-Block-Digest` and `WARC-Payload-Digest`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarcDigest {
    /// Algorithm label, lowercased
    pub algorithm: String,
    /// Encoded digest value
    pub value: String,
}

impl WarcDigest {
    /// Parses `algorithm:value`; both parts must be non-empty.
    pub fn parse(value: &str) -> Option<Self> {
        let (algorithm, encoded) = value.split_once(':')?;
        let algorithm = algorithm.trim();
        let encoded = encoded.trim();
        if algorithm.is_empty() || encoded.is_empty() {
            return None;
        }
        if !encoded.bytes().all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'=')) {
            return None;
        }
        Some(WarcDigest {
            algorithm: algorithm.to_ascii_lowercase(),
            value: encoded.to_string(),
        })
    }

    /// Algorithm, when it is one this crate computes
    pub fn known_algorithm(&self) -> Option<DigestAlgorithm> {
        DigestAlgorithm::from_label(&self.algorithm)
    }
}

impl fmt::Display for WarcDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.value)
    }
}

/// Parsed WARC header block
#[derive(Debug, Clone, PartialEq)]
pub struct WarcHeader {
    version_line: String,
    version: Option<WarcVersion>,
    start_offset: Option<u64>,
    lines: Vec<HeaderLine>,
    warc_type: Option<String>,
    record_id: Option<Uri>,
    date: Option<DateTime<Utc>>,
    content_length: Option<u64>,
    content_type: Option<ContentType>,
    target_uri: Option<Uri>,
    ip_address: Option<IpAddr>,
    block_digest: Option<WarcDigest>,
    payload_digest: Option<WarcDigest>,
    concurrent_to: Vec<Uri>,
    diagnostics: Diagnostics,
}

impl WarcHeader {
    /// Parses a header block.
    ///
    /// ## Arguments
    /// * `version_line` - First line of the record.
    /// * `lines` - The header lines, without terminators and without the empty line
    ///   ending the block. Lines starting with whitespace continue the previous field.
    /// * `start_offset` - Offset of the version line in the container, if known.
    pub fn parse<'a>(
        version_line: &str,
        lines: impl IntoIterator<Item = &'a str>,
        start_offset: Option<u64>,
    ) -> Self {
        let mut diagnostics = Diagnostics::new();
        let version = WarcVersion::from_line(version_line);
        if version.is_none() {
            diagnostics.invalid(VERSION_FIELD, version_line);
        }

        let mut header_lines: Vec<HeaderLine> = Vec::new();
        for line in lines {
            if line.starts_with([' ', '\t']) {
                if let Some(HeaderLine::Field { value, .. }) = header_lines.last_mut() {
                    value.push(' ');
                    value.push_str(line.trim());
                    continue;
                }
            }
            header_lines.push(HeaderLine::parse(line));
        }

        let mut header = WarcHeader {
            version_line: version_line.to_string(),
            version,
            start_offset,
            lines: Vec::new(),
            warc_type: None,
            record_id: None,
            date: None,
            content_length: None,
            content_type: None,
            target_uri: None,
            ip_address: None,
            block_digest: None,
            payload_digest: None,
            concurrent_to: Vec::new(),
            diagnostics,
        };

        let mut seen: Vec<&'static str> = Vec::new();
        for line in &header_lines {
            match line {
                HeaderLine::Raw(raw) => header.diagnostics.invalid(HEADER_LINE_FIELD, raw),
                HeaderLine::Field { name, value } => header.apply(&mut seen, name, value),
            }
        }
        for field in MANDATORY_FIELDS {
            if !seen.contains(&field) {
                header.diagnostics.missing(field);
            }
        }
        header.lines = header_lines;
        header
    }

    fn apply(&mut self, seen: &mut Vec<&'static str>, name: &str, value: &str) {
        let d = &mut self.diagnostics;
        match name.to_ascii_lowercase().as_str() {
            "warc-type" => assign(d, seen, &mut self.warc_type, WARC_TYPE_FIELD, value, |v| Some(v.to_string())),
            "warc-record-id" => assign(d, seen, &mut self.record_id, RECORD_ID_FIELD, value, parse_bracketed_uri),
            "warc-date" => assign(d, seen, &mut self.date, DATE_FIELD, value, values::parse_warc_date),
            "content-length" => assign(d, seen, &mut self.content_length, CONTENT_LENGTH_FIELD, value, |v| {
                v.parse().ok()
            }),
            "content-type" => assign(d, seen, &mut self.content_type, CONTENT_TYPE_FIELD, value, ContentType::parse),
            "warc-target-uri" => assign(d, seen, &mut self.target_uri, TARGET_URI_FIELD, value, parse_target_uri),
            "warc-ip-address" => assign(d, seen, &mut self.ip_address, IP_ADDRESS_FIELD, value, values::parse_ip),
            "warc-block-digest" => assign(d, seen, &mut self.block_digest, BLOCK_DIGEST_FIELD, value, WarcDigest::parse),
            "warc-payload-digest" => {
                assign(d, seen, &mut self.payload_digest, PAYLOAD_DIGEST_FIELD, value, WarcDigest::parse)
            }
            "warc-concurrent-to" => match parse_bracketed_uri(value) {
                Some(uri) => self.concurrent_to.push(uri),
                None => d.invalid(CONCURRENT_TO_FIELD, value),
            },
            // Other fields are kept as lines only
            _ => {}
        }
    }

    /// Version line, as read
    pub fn version_line(&self) -> &str {
        &self.version_line
    }

    /// Version, `None` when the version line is not a known one
    pub fn version(&self) -> Option<WarcVersion> {
        self.version
    }

    pub fn start_offset(&self) -> Option<u64> {
        self.start_offset
    }

    /// Header lines in file order, continuation lines merged
    pub fn lines(&self) -> &[HeaderLine] {
        &self.lines
    }

    /// Value of the first field with this name, ASCII case-insensitive
    pub fn field(&self, name: &str) -> Option<&str> {
        self.lines.iter().find_map(|line| match line {
            HeaderLine::Field { name: n, value } if n.eq_ignore_ascii_case(name) => Some(value.as_str()),
            _ => None,
        })
    }

    pub fn warc_type(&self) -> Option<&str> {
        self.warc_type.as_deref()
    }

    pub fn record_id(&self) -> Option<&Uri> {
        self.record_id.as_ref()
    }

    pub fn date(&self) -> Option<DateTime<Utc>> {
        self.date
    }

    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    pub fn content_type(&self) -> Option<&ContentType> {
        self.content_type.as_ref()
    }

    pub fn target_uri(&self) -> Option<&Uri> {
        self.target_uri.as_ref()
    }

    pub fn ip_address(&self) -> Option<IpAddr> {
        self.ip_address
    }

    pub fn block_digest(&self) -> Option<&WarcDigest> {
        self.block_digest.as_ref()
    }

    pub fn payload_digest(&self) -> Option<&WarcDigest> {
        self.payload_digest.as_ref()
    }

    pub fn concurrent_to(&self) -> &[Uri] {
        &self.concurrent_to
    }

    /// Whether the block holds an HTTP message
    pub fn is_http(&self) -> bool {
        self.content_type.as_ref().is_some_and(|ct| ct.is("application", "http"))
    }

    pub(crate) fn diagnostics_mut(&mut self) -> &mut Diagnostics {
        &mut self.diagnostics
    }
}

impl Validate for WarcHeader {
    fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    fn is_compliant(&self) -> bool {
        self.version.is_some()
    }
}

fn assign<T>(
    diagnostics: &mut Diagnostics,
    seen: &mut Vec<&'static str>,
    slot: &mut Option<T>,
    field: &'static str,
    value: &str,
    parse: impl FnOnce(&str) -> Option<T>,
) {
    if seen.contains(&field) {
        diagnostics.invalid(field, value);
        return;
    }
    seen.push(field);
    if value.is_empty() {
        if MANDATORY_FIELDS.contains(&field) {
            diagnostics.missing(field);
        }
        return;
    }
    match parse(value) {
        Some(parsed) => *slot = Some(parsed),
        None => diagnostics.invalid(field, value),
    }
}

fn parse_bracketed_uri(value: &str) -> Option<Uri> {
    let inner = value.strip_prefix('<')?.strip_suffix('>')?;
    Uri::parse(inner)
}

/// WARC/1.0 writers commonly bracket the target URI, WARC/1.1 does not
fn parse_target_uri(value: &str) -> Option<Uri> {
    match value.strip_prefix('<').and_then(|v| v.strip_suffix('>')) {
        Some(inner) => Uri::parse(inner),
        None => Uri::parse(value),
    }
}
