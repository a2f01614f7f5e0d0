use std::io::{self, BufRead, Read};

use encoding::all::ISO_8859_1;
use encoding::{DecoderTrap, EncoderTrap, Encoding};

use super::{CM_DEFLATE, FIXED_HEADER_SIZE, GZIP_MAGIC, GzipError, GzipFlags, OS_UNKNOWN, crc16};

/// GZip member header
///
/// Optional sections are present iff their value is `Some`, the corresponding
/// [GzipFlags] bits are derived from them when encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GzipHeader {
    /// Compression method, 8 (deflate) for every valid member
    pub method: u8,
    /// FTEXT flag
    pub text: bool,
    /// Whether a header CRC16 is (or must be) present
    pub header_crc: bool,
    /// Modification time, seconds since epoch, 0 if unknown
    pub mtime: u32,
    /// Extra flags
    pub xfl: u8,
    /// Operating system
    pub os: u8,
    /// Raw extra field
    pub extra: Option<Vec<u8>>,
    /// Raw (Latin-1) file name, without the terminating zero
    pub filename: Option<Vec<u8>>,
    /// Raw (Latin-1) comment, without the terminating zero
    pub comment: Option<Vec<u8>>,
}

impl Default for GzipHeader {
    fn default() -> Self {
        GzipHeader {
            method: CM_DEFLATE,
            text: false,
            header_crc: false,
            mtime: 0,
            xfl: 0,
            os: OS_UNKNOWN,
            extra: None,
            filename: None,
            comment: None,
        }
    }
}

impl GzipHeader {
    /// Sets the file name, encoded as Latin-1.
    pub fn with_filename(mut self, name: &str) -> Result<Self, GzipError> {
        self.filename = Some(encode_latin1(name, "FNAME")?);
        Ok(self)
    }

    /// Sets the comment, encoded as Latin-1.
    pub fn with_comment(mut self, comment: &str) -> Result<Self, GzipError> {
        self.comment = Some(encode_latin1(comment, "FCOMMENT")?);
        Ok(self)
    }

    /// FLG byte matching the header options.
    pub fn flags(&self) -> GzipFlags {
        let mut flags = GzipFlags(0);
        flags.set_ftext(self.text);
        flags.set_fhcrc(self.header_crc);
        flags.set_fextra(self.extra.is_some());
        flags.set_fname(self.filename.is_some());
        flags.set_fcomment(self.comment.is_some());
        flags
    }

    /// File name decoded from Latin-1.
    pub fn filename_str(&self) -> Option<String> {
        self.filename.as_deref().map(decode_latin1)
    }

    /// Comment decoded from Latin-1.
    pub fn comment_str(&self) -> Option<String> {
        self.comment.as_deref().map(decode_latin1)
    }

    /// Serializes the header, CRC16 included when requested.
    pub fn to_bytes(&self) -> Result<Vec<u8>, GzipError> {
        self.encode().map(|(bytes, _)| bytes)
    }

    /// Serializes the header and returns the CRC16 written, if any.
    pub(crate) fn encode(&self) -> Result<(Vec<u8>, Option<u16>), GzipError> {
        let mut bytes = Vec::with_capacity(FIXED_HEADER_SIZE);
        bytes.extend_from_slice(&GZIP_MAGIC);
        bytes.push(self.method);
        bytes.push(self.flags().0);
        bytes.extend_from_slice(&self.mtime.to_le_bytes());
        bytes.push(self.xfl);
        bytes.push(self.os);
        if let Some(extra) = &self.extra {
            let xlen = u16::try_from(extra.len()).map_err(|_| GzipError::InvalidHeaderField("FEXTRA"))?;
            bytes.extend_from_slice(&xlen.to_le_bytes());
            bytes.extend_from_slice(extra);
        }
        if let Some(name) = &self.filename {
            push_zero_terminated(&mut bytes, name, "FNAME")?;
        }
        if let Some(comment) = &self.comment {
            push_zero_terminated(&mut bytes, comment, "FCOMMENT")?;
        }
        let crc = if self.header_crc {
            let crc = crc16(&bytes);
            bytes.extend_from_slice(&crc.to_le_bytes());
            Some(crc)
        } else {
            None
        };
        Ok((bytes, crc))
    }
}

fn push_zero_terminated(bytes: &mut Vec<u8>, value: &[u8], field: &'static str) -> Result<(), GzipError> {
    if value.contains(&0) {
        return Err(GzipError::InvalidHeaderField(field));
    }
    bytes.extend_from_slice(value);
    bytes.push(0);
    Ok(())
}

/// FNAME and FCOMMENT are ISO-8859-1, every byte maps to the code point of the same value
pub(crate) fn decode_latin1(bytes: &[u8]) -> String {
    ISO_8859_1
        .decode(bytes, DecoderTrap::Replace)
        .unwrap_or_else(|_| String::from_utf8_lossy(bytes).into_owned())
}

fn encode_latin1(value: &str, field: &'static str) -> Result<Vec<u8>, GzipError> {
    ISO_8859_1
        .encode(value, EncoderTrap::Strict)
        .map_err(|_| GzipError::InvalidHeaderField(field))
}

/// A header as found in a GZip stream.
#[derive(Debug, Clone)]
pub(crate) struct ParsedHeader {
    pub header: GzipHeader,
    /// Reserved FLG bits
    pub reserved: u8,
    /// CRC16 read from the stream
    pub read_crc16: Option<u16>,
    /// CRC16 computed over the header bytes
    pub computed_crc16: Option<u16>,
    /// Header length in bytes
    pub length: u64,
}

/// Reads a member header.
///
/// ## Arguments
/// * `input` - The stream, positioned at the start of a member.
/// * `offset` - Position of the stream in the container, used in errors.
///
/// # Returns
/// `Ok(None)` at a clean end of input.
pub(crate) fn read_header<R: BufRead>(input: &mut R, offset: u64) -> Result<Option<ParsedHeader>, GzipError> {
    let mut fixed = [0u8; FIXED_HEADER_SIZE];
    let got = read_up_to(input, &mut fixed)?;
    if got == 0 {
        return Ok(None);
    }
    if got < FIXED_HEADER_SIZE {
        return Err(GzipError::TrailingGarbage { offset, length: got });
    }
    if fixed[0..2] != GZIP_MAGIC {
        return Err(GzipError::InvalidMagic {
            offset,
            found: [fixed[0], fixed[1]],
        });
    }
    let method = fixed[2];
    if method != CM_DEFLATE {
        return Err(GzipError::UnsupportedMethod { offset, method });
    }

    let mut raw = fixed.to_vec();
    let flags = GzipFlags(fixed[3]);
    let mtime = u32::from_le_bytes([fixed[4], fixed[5], fixed[6], fixed[7]]);

    let extra = if flags.fextra() {
        let mut xlen = [0u8; 2];
        input.read_exact(&mut xlen)?;
        raw.extend_from_slice(&xlen);
        let mut extra = vec![0u8; u16::from_le_bytes(xlen) as usize];
        input.read_exact(&mut extra)?;
        raw.extend_from_slice(&extra);
        Some(extra)
    } else {
        None
    };
    let filename = if flags.fname() {
        Some(read_zero_terminated(input, &mut raw)?)
    } else {
        None
    };
    let comment = if flags.fcomment() {
        Some(read_zero_terminated(input, &mut raw)?)
    } else {
        None
    };
    let (read_crc16, computed_crc16) = if flags.fhcrc() {
        let computed = crc16(&raw);
        let mut crc = [0u8; 2];
        input.read_exact(&mut crc)?;
        raw.extend_from_slice(&crc);
        (Some(u16::from_le_bytes(crc)), Some(computed))
    } else {
        (None, None)
    };

    Ok(Some(ParsedHeader {
        header: GzipHeader {
            method,
            text: flags.ftext(),
            header_crc: flags.fhcrc(),
            mtime,
            xfl: fixed[8],
            os: fixed[9],
            extra,
            filename,
            comment,
        },
        reserved: flags.reserved(),
        read_crc16,
        computed_crc16,
        length: raw.len() as u64,
    }))
}

/// Reads a zero-terminated string, appending the raw bytes (terminator included) to `raw`.
fn read_zero_terminated<R: BufRead>(input: &mut R, raw: &mut Vec<u8>) -> io::Result<Vec<u8>> {
    let mut value = Vec::new();
    input.read_until(0, &mut value)?;
    if value.last() != Some(&0) {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "unterminated GZip header string",
        ));
    }
    raw.extend_from_slice(&value);
    value.pop();
    Ok(value)
}

/// Fills `buf` as much as possible, stopping early only at end of input.
fn read_up_to<R: Read>(input: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match input.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
