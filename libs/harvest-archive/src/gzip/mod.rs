//! GZip multi-member container (RFC 1952)
//!
//! Compressed ARC and WARC files are a concatenation of GZip members, one per record.
//! This module reads such files member by member, and reports every header or trailer
//! inconsistency as error bits on the member's [GzipEntry] instead of failing, so that a
//! damaged member never prevents the rest of the file from being checked.
//!
//! Member layout (little endian):
//! - Bytes 0-1: magic `1f 8b`
//! - Byte 2: compression method (8 = deflate)
//! - Byte 3: flags ([GzipFlags])
//! - Bytes 4-7: modification time (u32, seconds since epoch, 0 if unknown)
//! - Byte 8: extra flags (0, 2 or 4)
//! - Byte 9: operating system
//! - if FEXTRA: XLEN (u16) followed by XLEN bytes
//! - if FNAME: zero-terminated Latin-1 file name
//! - if FCOMMENT: zero-terminated Latin-1 comment
//! - if FHCRC: low 16 bits of the CRC32 of all the previous header bytes
//! - raw deflate data
//! - CRC32 of the uncompressed data (u32), ISIZE = uncompressed size mod 2^32 (u32)

pub mod entry;
pub mod header;
pub mod read;
pub mod write;

pub use entry::GzipEntry;
pub use header::GzipHeader;
pub use read::{GzipMember, GzipReader, MemberStream};
pub use write::GzipWriter;

/// GZip magic number
pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Deflate compression method, the only one defined
pub const CM_DEFLATE: u8 = 8;

/// Size of the fixed part of the header
pub const FIXED_HEADER_SIZE: usize = 10;

/// Size of the trailer (CRC32 + ISIZE)
pub const TRAILER_SIZE: usize = 8;

/// Extra flags: none
pub const XFL_NONE: u8 = 0;
/// Extra flags: maximum compression
pub const XFL_MAXIMUM_COMPRESSION: u8 = 2;
/// Extra flags: fastest compression
pub const XFL_FASTEST_COMPRESSION: u8 = 4;

/// Highest operating system identifier defined by RFC 1952
pub const OS_MAX_KNOWN: u8 = 13;
/// Unknown operating system
pub const OS_UNKNOWN: u8 = 255;

bitfield::bitfield! {
    /// FLG byte of a GZip member header
    pub struct GzipFlags(u8);
    /// The uncompressed data is probably ASCII text
    pub ftext, set_ftext: 0;
    /// A CRC16 of the header is present
    pub fhcrc, set_fhcrc: 1;
    /// An extra field is present
    pub fextra, set_fextra: 2;
    /// A file name is present
    pub fname, set_fname: 3;
    /// A comment is present
    pub fcomment, set_fcomment: 4;
    /// Reserved bits, must be zero
    pub u8, reserved, set_reserved: 7, 5;
}

impl core::fmt::Debug for GzipFlags {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "GzipFlags({:#04x})", self.0)
    }
}

impl Clone for GzipFlags {
    fn clone(&self) -> Self {
        GzipFlags(self.0)
    }
}
impl Copy for GzipFlags {}
impl PartialEq for GzipFlags {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}
impl Eq for GzipFlags {}

bitfield::bitfield! {
    /// Validation errors found on a GZip member
    ///
    /// Bits accumulate, a member may be invalid for several reasons at once.
    pub struct MemberErrors(u8);
    /// XFL is not one of 0, 2 or 4
    pub invalid_extra_flags, set_invalid_extra_flags: 0;
    /// OS is neither a known identifier nor 255
    pub invalid_os, set_invalid_os: 1;
    /// Reserved FLG bits are set
    pub invalid_reserved_flags, set_invalid_reserved_flags: 2;
    /// ISIZE does not match the inflated size
    pub invalid_isize, set_invalid_isize: 3;
    /// Header CRC16 does not match
    pub invalid_crc16, set_invalid_crc16: 4;
    /// Data CRC32 does not match
    pub invalid_crc32, set_invalid_crc32: 5;
}

impl MemberErrors {
    pub const INVALID_EXTRA_FLAGS: u8 = 1;
    pub const INVALID_OS: u8 = 2;
    pub const INVALID_RESERVED_FLAGS: u8 = 4;
    pub const INVALID_ISIZE: u8 = 8;
    pub const INVALID_CRC16: u8 = 16;
    pub const INVALID_CRC32: u8 = 32;

    /// No error at all
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl core::ops::BitOrAssign<u8> for MemberErrors {
    fn bitor_assign(&mut self, bits: u8) {
        self.0 |= bits;
    }
}

impl core::fmt::Debug for MemberErrors {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "MemberErrors({:#04x})", self.0)
    }
}

impl Clone for MemberErrors {
    fn clone(&self) -> Self {
        MemberErrors(self.0)
    }
}
impl Copy for MemberErrors {}
impl PartialEq for MemberErrors {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}
impl Eq for MemberErrors {}

impl Default for MemberErrors {
    fn default() -> Self {
        MemberErrors(0)
    }
}

/// Errors that can occur while reading or writing GZip members
#[derive(thiserror::Error, Debug)]
pub enum GzipError {
    #[error("Invalid GZip magic number {found:02x?} at offset {offset}")]
    InvalidMagic { offset: u64, found: [u8; 2] },
    #[error("Unsupported compression method {method} at offset {offset}")]
    UnsupportedMethod { offset: u64, method: u8 },
    #[error("{length} trailing bytes at offset {offset} are not a GZip member")]
    TrailingGarbage { offset: u64, length: usize },
    #[error("Buffer size must be greater than zero")]
    InvalidBufferSize,
    #[error("Header field {0} cannot be encoded")]
    InvalidHeaderField(&'static str),
    #[error("Compression error: {0}")]
    Compress(#[from] flate2::CompressError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Whether an XFL value is one defined by RFC 1952.
pub fn is_valid_extra_flags(xfl: u8) -> bool {
    matches!(xfl, XFL_NONE | XFL_MAXIMUM_COMPRESSION | XFL_FASTEST_COMPRESSION)
}

/// Whether an OS value is one defined by RFC 1952.
pub fn is_valid_os(os: u8) -> bool {
    os <= OS_MAX_KNOWN || os == OS_UNKNOWN
}

/// Low 16 bits of the CRC32 of `bytes`.
pub(crate) fn crc16(bytes: &[u8]) -> u16 {
    (crc32fast::hash(bytes) & 0xffff) as u16
}
