use std::io::{self, Read};

use tracing::debug;

use super::fields::ArcHeader;
use super::{ARC_RECORD, ArcVersion, FIELD_DESCRIPTION_FIELD, FILEDESC_SCHEME, URL_FIELD, VERSION_FIELD};
use crate::diagnostics::{Diagnostics, Validate};
use crate::digest::Digest;
use crate::payload::Payload;
use crate::values::Uri;

/// First record of an ARC file
///
/// Its header line always follows the version 1 layout, with a `filedesc://` URL. Its
/// payload starts with the version line (`<major> <minor> <origin>`) followed by the field
/// description of the header lines of the file.
#[derive(Debug, Clone, PartialEq)]
pub struct ArcVersionBlock {
    header: ArcHeader,
    version: ArcVersion,
    version_numbers: Option<(String, String)>,
    origin: Option<String>,
    field_description: Option<String>,
    block_digest: Option<Digest>,
    diagnostics: Diagnostics,
}

impl ArcVersionBlock {
    /// Reads and checks a version block.
    ///
    /// The payload is consumed entirely. An unknown version is reported and version 1
    /// is assumed for the rest of the file.
    pub fn read<R: Read>(header: ArcHeader, mut payload: Payload<R>) -> io::Result<Self> {
        let mut content = Vec::new();
        payload.read_to_end(&mut content)?;
        let summary = payload.close()?;

        let mut diagnostics = header.diagnostics().clone();
        if let Some(url) = header.url() {
            if !url.scheme().is_some_and(|s| s.eq_ignore_ascii_case(FILEDESC_SCHEME)) {
                diagnostics.invalid(URL_FIELD, url.as_str());
            }
        }
        if summary.is_truncated() {
            diagnostics.invalid(ARC_RECORD, "Payload length mismatch");
        }
        let block_digest = summary.block_digest.clone();

        let text = String::from_utf8_lossy(&content);
        let mut lines = text.lines();

        let mut version = ArcVersion::V1;
        let mut version_numbers = None;
        let mut origin = None;
        match lines.next().map(str::trim).filter(|l| !l.is_empty()) {
            None => diagnostics.missing(VERSION_FIELD),
            Some(line) => {
                let mut parts = line.splitn(3, ' ');
                let major = parts.next().unwrap_or_default();
                let minor = parts.next().unwrap_or_default();
                origin = parts.next().map(str::to_string);
                match ArcVersion::from_numbers(major, minor) {
                    Some(v) => version = v,
                    None => diagnostics.invalid(VERSION_FIELD, line),
                }
                version_numbers = Some((major.to_string(), minor.to_string()));
            }
        }

        let field_description = lines.next().map(|l| l.trim().to_string());
        match field_description.as_deref() {
            None | Some("") => diagnostics.missing(FIELD_DESCRIPTION_FIELD),
            Some(description) => {
                let expected = version.layout();
                if !description.split(' ').eq(expected.iter().copied()) {
                    diagnostics.invalid(FIELD_DESCRIPTION_FIELD, description);
                }
            }
        }

        debug!(?version, valid = diagnostics.is_empty(), "arc version block");
        Ok(ArcVersionBlock {
            header,
            version,
            version_numbers,
            origin,
            field_description,
            block_digest,
            diagnostics,
        })
    }

    pub fn header(&self) -> &ArcHeader {
        &self.header
    }

    pub fn url(&self) -> Option<&Uri> {
        self.header.url()
    }

    /// Version of the file, version 1 when unknown
    pub fn version(&self) -> ArcVersion {
        self.version
    }

    /// Raw `(major, minor)` numbers of the version line
    pub fn version_numbers(&self) -> Option<(&str, &str)> {
        self.version_numbers.as_ref().map(|(a, b)| (a.as_str(), b.as_str()))
    }

    /// Origin code of the version line
    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    pub fn field_description(&self) -> Option<&str> {
        self.field_description.as_deref()
    }

    pub fn block_digest(&self) -> Option<&Digest> {
        self.block_digest.as_ref()
    }
}

impl Validate for ArcVersionBlock {
    fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    fn is_compliant(&self) -> bool {
        self.header.has_compliant_fields()
    }
}
