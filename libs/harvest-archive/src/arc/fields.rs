//! ARC header line parsing
//!
//! A header line is split into its fields and each field is coerced to its type. Every
//! field is attempted, whatever happened to the previous ones, so that one bad value
//! never hides another. Problems are recorded in the header [Diagnostics]:
//! - a mandatory field which is empty or absent is `Missing`,
//! - a non-empty field which cannot be parsed is `Invalid`,
//! - an empty optional field is fine.

use std::net::IpAddr;

use chrono::{DateTime, Utc};

use super::{
    ARC_RECORD, ArcVersion, CHECKSUM_FIELD, CONTENT_TYPE_FIELD, DATE_FIELD, FILENAME_FIELD,
    IP_ADDRESS_FIELD, LENGTH_FIELD, LOCATION_FIELD, OFFSET_FIELD, RESULT_CODE_FIELD, URL_FIELD,
};
use crate::diagnostics::{Diagnostics, Validate};
use crate::values::{self, ContentType, Uri};

const URL_INDEX: usize = 0;
const IP_ADDRESS_INDEX: usize = 1;
const DATE_INDEX: usize = 2;
const CONTENT_TYPE_INDEX: usize = 3;

/// Parsed ARC header line
#[derive(Debug, Clone, PartialEq)]
pub struct ArcHeader {
    version: ArcVersion,
    start_offset: Option<u64>,
    raw: Vec<String>,
    url: Option<Uri>,
    ip_address: Option<IpAddr>,
    date: Option<DateTime<Utc>>,
    content_type: Option<ContentType>,
    result_code: Option<i32>,
    checksum: Option<String>,
    location: Option<String>,
    offset: Option<u64>,
    filename: Option<String>,
    length: Option<u64>,
    compliant: bool,
    diagnostics: Diagnostics,
}

/// Parses an ARC header line.
///
/// ## Arguments
/// * `line` - The header line, without its line terminator.
/// * `version` - The version whose layout the line must follow.
/// * `start_offset` - Offset of the line in an uncompressed container, `None` when unknown
///   (GZip-compressed containers). When known, it is checked against the `Offset` field.
pub fn parse_record_line(line: &str, version: ArcVersion, start_offset: Option<u64>) -> ArcHeader {
    let fields: Vec<&str> = line.split(' ').collect();
    let layout = version.layout();
    let mut diagnostics = Diagnostics::new();

    let compliant = fields.len() == layout.len();
    if !compliant {
        diagnostics.invalid(
            ARC_RECORD,
            &format!("expected {} fields, found {}", layout.len(), fields.len()),
        );
    }

    let at = |idx: usize| fields.get(idx).copied();
    let declared = |field: &str| version.index_of(field).map(|idx| at(idx));

    let url = parse_field(&mut diagnostics, URL_FIELD, at(URL_INDEX), false, Uri::parse);
    let ip_address = parse_field(&mut diagnostics, IP_ADDRESS_FIELD, at(IP_ADDRESS_INDEX), false, values::parse_ip);
    let date = parse_field(&mut diagnostics, DATE_FIELD, at(DATE_INDEX), false, values::parse_arc_date);
    let content_type = parse_field(
        &mut diagnostics,
        CONTENT_TYPE_FIELD,
        at(CONTENT_TYPE_INDEX),
        false,
        ContentType::parse,
    );

    let result_code = declared(RESULT_CODE_FIELD).and_then(|raw| {
        parse_field(&mut diagnostics, RESULT_CODE_FIELD, raw, false, |v| v.parse::<i32>().ok())
    });
    let checksum = declared(CHECKSUM_FIELD)
        .and_then(|raw| parse_field(&mut diagnostics, CHECKSUM_FIELD, raw, false, parse_string));
    let location = declared(LOCATION_FIELD)
        .and_then(|raw| parse_field(&mut diagnostics, LOCATION_FIELD, raw, true, parse_string));
    let offset = declared(OFFSET_FIELD)
        .and_then(|raw| parse_field(&mut diagnostics, OFFSET_FIELD, raw, false, parse_long));
    let filename = declared(FILENAME_FIELD)
        .and_then(|raw| parse_field(&mut diagnostics, FILENAME_FIELD, raw, false, parse_string));

    // The length always is the last field, whatever the number of fields
    let length = parse_field(&mut diagnostics, LENGTH_FIELD, fields.last().copied(), false, parse_long);

    if let (Some(declared), Some(actual)) = (offset, start_offset) {
        if declared != actual {
            diagnostics.invalid(OFFSET_FIELD, &declared.to_string());
        }
    }

    ArcHeader {
        version,
        start_offset,
        raw: fields.iter().map(|f| f.to_string()).collect(),
        url,
        ip_address,
        date,
        content_type,
        result_code,
        checksum,
        location,
        offset,
        filename,
        length,
        compliant,
        diagnostics,
    }
}

/// Coerces one field, recording a diagnostic when needed.
fn parse_field<T>(
    diagnostics: &mut Diagnostics,
    field: &str,
    raw: Option<&str>,
    optional: bool,
    parse: impl FnOnce(&str) -> Option<T>,
) -> Option<T> {
    match raw.map(str::trim).filter(|v| !v.is_empty()) {
        None => {
            if !optional {
                diagnostics.missing(field);
            }
            None
        }
        Some(value) => {
            let parsed = parse(value);
            if parsed.is_none() {
                diagnostics.invalid(field, value);
            }
            parsed
        }
    }
}

fn parse_string(value: &str) -> Option<String> {
    Some(value.to_string())
}

fn parse_long(value: &str) -> Option<u64> {
    value.parse().ok()
}

impl ArcHeader {
    pub fn version(&self) -> ArcVersion {
        self.version
    }

    /// Offset of the header line in an uncompressed container
    pub fn start_offset(&self) -> Option<u64> {
        self.start_offset
    }

    /// Fields as found in the line
    pub fn raw_fields(&self) -> &[String] {
        &self.raw
    }

    /// Raw value of a field, by name, at its position in the layout.
    pub fn raw_field(&self, field: &str) -> Option<&str> {
        let idx = if field == LENGTH_FIELD {
            self.raw.len().checked_sub(1)?
        } else {
            self.version.index_of(field)?
        };
        self.raw.get(idx).map(String::as_str)
    }

    pub fn url(&self) -> Option<&Uri> {
        self.url.as_ref()
    }

    pub fn ip_address(&self) -> Option<IpAddr> {
        self.ip_address
    }

    pub fn date(&self) -> Option<DateTime<Utc>> {
        self.date
    }

    pub fn content_type(&self) -> Option<&ContentType> {
        self.content_type.as_ref()
    }

    /// HTTP result code (version 2 only)
    pub fn result_code(&self) -> Option<i32> {
        self.result_code
    }

    /// Checksum (version 2 only)
    pub fn checksum(&self) -> Option<&str> {
        self.checksum.as_deref()
    }

    /// Redirect location (version 2 only)
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    /// Declared offset (version 2 only)
    pub fn offset(&self) -> Option<u64> {
        self.offset
    }

    /// ARC file name (version 2 only)
    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    /// Payload length
    pub fn length(&self) -> Option<u64> {
        self.length
    }

    /// Whether the line has the number of fields of its layout
    pub fn has_compliant_fields(&self) -> bool {
        self.compliant
    }

    pub(crate) fn diagnostics_mut(&mut self) -> &mut Diagnostics {
        &mut self.diagnostics
    }
}

impl Validate for ArcHeader {
    fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    fn is_compliant(&self) -> bool {
        self.compliant
    }
}
