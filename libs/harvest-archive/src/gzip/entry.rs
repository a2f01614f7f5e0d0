use chrono::{DateTime, Utc};

use super::header::{GzipHeader, ParsedHeader, decode_latin1};
use super::{MemberErrors, is_valid_extra_flags, is_valid_os};

/// A GZip member, as read from or written to a container.
///
/// Trailer values and sizes are `None` until the member data has been fully consumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GzipEntry {
    pub(crate) index: usize,
    pub(crate) offset: u64,
    pub(crate) header: GzipHeader,
    pub(crate) header_length: u64,
    pub(crate) read_crc16: Option<u16>,
    pub(crate) computed_crc16: Option<u16>,
    pub(crate) read_crc32: Option<u32>,
    pub(crate) computed_crc32: Option<u32>,
    pub(crate) read_isize: Option<u32>,
    pub(crate) computed_isize: Option<u32>,
    pub(crate) size: Option<u64>,
    pub(crate) compressed_size: Option<u64>,
    pub(crate) errors: MemberErrors,
}

impl GzipEntry {
    /// Creates an entry from a parsed header, checking its fields.
    pub(crate) fn from_header(index: usize, offset: u64, parsed: ParsedHeader) -> Self {
        let mut errors = MemberErrors::default();
        if parsed.reserved != 0 {
            errors |= MemberErrors::INVALID_RESERVED_FLAGS;
        }
        if !is_valid_extra_flags(parsed.header.xfl) {
            errors |= MemberErrors::INVALID_EXTRA_FLAGS;
        }
        if !is_valid_os(parsed.header.os) {
            errors |= MemberErrors::INVALID_OS;
        }
        if parsed.read_crc16 != parsed.computed_crc16 {
            errors |= MemberErrors::INVALID_CRC16;
        }
        GzipEntry {
            index,
            offset,
            header: parsed.header,
            header_length: parsed.length,
            read_crc16: parsed.read_crc16,
            computed_crc16: parsed.computed_crc16,
            read_crc32: None,
            computed_crc32: None,
            read_isize: None,
            computed_isize: None,
            size: None,
            compressed_size: None,
            errors,
        }
    }

    /// Records the trailer values, setting the error bits on mismatch.
    pub(crate) fn set_trailer(&mut self, read_crc32: u32, computed_crc32: u32, read_isize: u32, size: u64) {
        // ISIZE is the size modulo 2^32
        let computed_isize = size as u32;
        self.read_crc32 = Some(read_crc32);
        self.computed_crc32 = Some(computed_crc32);
        self.read_isize = Some(read_isize);
        self.computed_isize = Some(computed_isize);
        self.size = Some(size);
        if read_crc32 != computed_crc32 {
            self.errors |= MemberErrors::INVALID_CRC32;
        }
        if read_isize != computed_isize {
            self.errors |= MemberErrors::INVALID_ISIZE;
        }
    }

    pub(crate) fn set_compressed_size(&mut self, compressed_size: u64) {
        self.compressed_size = Some(compressed_size);
    }

    /// Sequence number of the member in its container, starting at 0
    pub fn index(&self) -> usize {
        self.index
    }

    /// Offset of the member header in the container
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Length of the member header, optional sections included
    pub fn header_length(&self) -> u64 {
        self.header_length
    }

    pub fn header(&self) -> &GzipHeader {
        &self.header
    }

    pub fn method(&self) -> u8 {
        self.header.method
    }

    /// FTEXT flag
    pub fn is_ascii(&self) -> bool {
        self.header.text
    }

    pub fn mtime(&self) -> u32 {
        self.header.mtime
    }

    /// Modification time, `None` when not set (0)
    pub fn date(&self) -> Option<DateTime<Utc>> {
        match self.header.mtime {
            0 => None,
            mtime => DateTime::from_timestamp(i64::from(mtime), 0),
        }
    }

    pub fn extra_flags(&self) -> u8 {
        self.header.xfl
    }

    pub fn os(&self) -> u8 {
        self.header.os
    }

    pub fn extra(&self) -> Option<&[u8]> {
        self.header.extra.as_deref()
    }

    /// File name, decoded from Latin-1
    pub fn name(&self) -> Option<String> {
        self.header.filename.as_deref().map(decode_latin1)
    }

    /// Comment, decoded from Latin-1
    pub fn comment(&self) -> Option<String> {
        self.header.comment.as_deref().map(decode_latin1)
    }

    pub fn read_crc16(&self) -> Option<u16> {
        self.read_crc16
    }

    pub fn computed_crc16(&self) -> Option<u16> {
        self.computed_crc16
    }

    pub fn read_crc32(&self) -> Option<u32> {
        self.read_crc32
    }

    pub fn computed_crc32(&self) -> Option<u32> {
        self.computed_crc32
    }

    pub fn read_isize(&self) -> Option<u32> {
        self.read_isize
    }

    pub fn computed_isize(&self) -> Option<u32> {
        self.computed_isize
    }

    /// Uncompressed size, known once the member is consumed
    pub fn size(&self) -> Option<u64> {
        self.size
    }

    /// Size of the deflate data, known once the member is consumed
    pub fn compressed_size(&self) -> Option<u64> {
        self.compressed_size
    }

    /// Total length of the member in the container (header, data and trailer)
    pub fn total_length(&self) -> Option<u64> {
        self.compressed_size
            .map(|c| self.header_length + c + super::TRAILER_SIZE as u64)
    }

    pub fn errors(&self) -> MemberErrors {
        self.errors
    }

    /// Whether the trailer has been read (or written)
    pub fn is_complete(&self) -> bool {
        self.read_crc32.is_some()
    }

    /// No error bit is set
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// No reserved flag is set
    pub fn is_compliant(&self) -> bool {
        !self.errors.invalid_reserved_flags()
    }
}
