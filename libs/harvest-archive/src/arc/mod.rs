//! ARC container records
//!
//! An ARC file is a sequence of records, each made of a single space-delimited header
//! line followed by a payload of the declared length. The first record, the version
//! block, declares the format version and the layout of the header lines that follow.
//!
//! Two header layouts exist:
//! - Version 1: `URL IP-address Archive-date Content-type Archive-length`
//! - Version 2: `URL IP-address Archive-date Content-type Result-code Checksum Location Offset Filename Archive-length`

pub mod fields;
pub mod read;
pub mod record;
pub mod version_block;

pub use fields::{ArcHeader, parse_record_line};
pub use read::{ArcReader, CompressedArcReader};
pub use record::ArcRecord;
pub use version_block::ArcVersionBlock;

use crate::gzip::GzipError;

pub const URL_FIELD: &str = "URL";
pub const IP_ADDRESS_FIELD: &str = "IP-address";
pub const DATE_FIELD: &str = "Archive-date";
pub const CONTENT_TYPE_FIELD: &str = "Content-type";
pub const RESULT_CODE_FIELD: &str = "Result-code";
pub const CHECKSUM_FIELD: &str = "Checksum";
pub const LOCATION_FIELD: &str = "Location";
pub const OFFSET_FIELD: &str = "Offset";
pub const FILENAME_FIELD: &str = "Filename";
pub const LENGTH_FIELD: &str = "Archive-length";

/// Pseudo-field used for diagnostics about a record as a whole
pub const ARC_RECORD: &str = "ARC record";
/// Pseudo-field of the version block version line
pub const VERSION_FIELD: &str = "Version";
/// Pseudo-field of the version block field description line
pub const FIELD_DESCRIPTION_FIELD: &str = "Field-description";

/// Scheme of the version block URL
pub const FILEDESC_SCHEME: &str = "filedesc";

const V1_LAYOUT: [&str; 5] = [URL_FIELD, IP_ADDRESS_FIELD, DATE_FIELD, CONTENT_TYPE_FIELD, LENGTH_FIELD];

const V2_LAYOUT: [&str; 10] = [
    URL_FIELD,
    IP_ADDRESS_FIELD,
    DATE_FIELD,
    CONTENT_TYPE_FIELD,
    RESULT_CODE_FIELD,
    CHECKSUM_FIELD,
    LOCATION_FIELD,
    OFFSET_FIELD,
    FILENAME_FIELD,
    LENGTH_FIELD,
];

/// ARC format version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArcVersion {
    /// Version 1 (1.0 and 1.1), 5 header fields
    V1,
    /// Version 2, 10 header fields
    V2,
}

impl ArcVersion {
    /// Resolves the version declared by a version block (`<major> <minor>`).
    pub fn from_numbers(major: &str, minor: &str) -> Option<Self> {
        match (major, minor) {
            ("1", "0") | ("1", "1") => Some(ArcVersion::V1),
            ("2", "0") => Some(ArcVersion::V2),
            _ => None,
        }
    }

    /// Ordered field names of a header line.
    pub fn layout(&self) -> &'static [&'static str] {
        match self {
            ArcVersion::V1 => &V1_LAYOUT,
            ArcVersion::V2 => &V2_LAYOUT,
        }
    }

    /// Position of a field in the layout, `None` if this version doesn't declare it.
    pub fn index_of(&self, field: &str) -> Option<usize> {
        self.layout().iter().position(|f| *f == field)
    }

    /// Field description line, as written in the version block.
    pub fn field_description(&self) -> String {
        self.layout().join(" ")
    }
}

/// Errors that can occur while reading an ARC container
///
/// Format problems are reported as diagnostics on the records, only I/O failures and
/// unreadable GZip framing end a scan.
#[derive(thiserror::Error, Debug)]
pub enum ArcReaderError {
    #[error("GZip error: {0}")]
    Gzip(#[from] GzipError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
