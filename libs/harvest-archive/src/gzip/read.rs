//! Multi-member GZip reader
//!
//! [GzipReader] walks the members of a GZip container in order. Each call to
//! [GzipReader::next_member] returns a [GzipMember], readable as the inflated data of
//! that member only. Checksums are verified as the data flows, and the resulting
//! [GzipEntry] is available from [GzipMember::finish] or [GzipReader::last_entry].

use std::io::{self, BufRead, BufReader, Chain, Cursor, Read};

use crc32fast::Hasher;
use flate2::{Decompress, FlushDecompress, Status};
use tracing::{debug, warn};

use super::entry::GzipEntry;
use super::header::read_header;
use super::{GzipError, TRAILER_SIZE};
use crate::stream::ByteCountingReader;

const DRAIN_BUFFER_SIZE: usize = 4096;

/// Reader over the members of a GZip container
#[derive(Debug)]
pub struct GzipReader<R> {
    input: ByteCountingReader<R>,
    /// Index of the next member
    index: usize,
    current: Option<MemberState>,
    last_entry: Option<GzipEntry>,
}

/// Inflation state of the member being read
struct MemberState {
    entry: GzipEntry,
    inflater: Decompress,
    crc: Hasher,
    size: u64,
    finished: bool,
}

impl std::fmt::Debug for MemberState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemberState")
            .field("entry", &self.entry)
            .field("size", &self.size)
            .field("finished", &self.finished)
            .finish()
    }
}

impl<R: BufRead> GzipReader<R> {
    /// Creates a reader over a container starting at offset 0.
    pub fn new(input: R) -> Self {
        GzipReader {
            input: ByteCountingReader::new(input),
            index: 0,
            current: None,
            last_entry: None,
        }
    }

    /// Offset in the container.
    pub fn position(&self) -> u64 {
        self.input.position()
    }

    /// Number of members started so far.
    pub fn member_count(&self) -> usize {
        self.index
    }

    /// Last completed member.
    pub fn last_entry(&self) -> Option<&GzipEntry> {
        self.last_entry.as_ref()
    }

    /// Moves to the next member.
    ///
    /// If the previous member was not fully read, its remaining data is inflated (and
    /// verified) first, so that the next header is located exactly after its trailer.
    ///
    /// # Returns
    /// * `Ok(Some(member))` - The next member, with its header already parsed.
    /// * `Ok(None)` - The end of the container was reached cleanly.
    /// * `Err(GzipError::TrailingGarbage)` - Fewer bytes than a header remain.
    /// * `Err(GzipError::InvalidMagic | GzipError::UnsupportedMethod)` - Not a deflate GZip member.
    pub fn next_member(&mut self) -> Result<Option<GzipMember<'_, R>>, GzipError> {
        if self.current.is_some() {
            GzipMember { reader: self }.finish()?;
        }

        let offset = self.input.position();
        let Some(parsed) = read_header(&mut self.input, offset)? else {
            debug!(offset, members = self.index, "end of gzip container");
            return Ok(None);
        };
        let entry = GzipEntry::from_header(self.index, offset, parsed);
        if entry.errors().invalid_crc16() {
            warn!(
                index = entry.index(),
                offset,
                read = ?entry.read_crc16(),
                computed = ?entry.computed_crc16(),
                "gzip header CRC16 mismatch"
            );
        }
        debug!(index = entry.index(), offset, "gzip member");
        self.index += 1;
        self.current = Some(MemberState {
            entry,
            inflater: Decompress::new(false),
            crc: Hasher::new(),
            size: 0,
            finished: false,
        });
        Ok(Some(GzipMember { reader: self }))
    }

    /// Member in progress, if any.
    pub fn current_member(&mut self) -> Option<GzipMember<'_, R>> {
        if self.current.is_some() {
            Some(GzipMember { reader: self })
        } else {
            None
        }
    }

    /// Releases the underlying reader.
    pub fn into_inner(self) -> R {
        self.input.into_inner()
    }
}

/// Inflated data of a member, behind the bytes already buffered while its first lines
/// were looked at
pub type MemberStream<'a, R> = BufReader<Chain<Cursor<Vec<u8>>, GzipMember<'a, R>>>;

/// Inflated data of one GZip member
#[derive(Debug)]
pub struct GzipMember<'a, R> {
    reader: &'a mut GzipReader<R>,
}

impl<R: BufRead> GzipMember<'_, R> {
    /// The member entry, trailer values unknown until the data is consumed
    pub fn entry(&self) -> Option<&GzipEntry> {
        self.reader.current.as_ref().map(|s| &s.entry)
    }

    /// Reads the remaining data, verifies the trailer and returns the completed entry.
    pub fn finish(self) -> io::Result<GzipEntry> {
        let mut scratch = [0u8; DRAIN_BUFFER_SIZE];
        let mut member = self;
        loop {
            match member.read(&mut scratch) {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        let state = member
            .reader
            .current
            .take()
            .ok_or_else(|| io::Error::other("no gzip member in progress"))?;
        member.reader.last_entry = Some(state.entry.clone());
        Ok(state.entry)
    }
}

impl<R: BufRead> Read for GzipMember<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let reader = &mut *self.reader;
        let Some(state) = reader.current.as_mut() else {
            return Ok(0);
        };
        if state.finished || buf.is_empty() {
            return Ok(0);
        }
        loop {
            let input = reader.input.fill_buf()?;
            let eof = input.is_empty();
            let flush = if eof {
                FlushDecompress::Finish
            } else {
                FlushDecompress::None
            };
            let before_in = state.inflater.total_in();
            let before_out = state.inflater.total_out();
            let status = state
                .inflater
                .decompress(input, buf, flush)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            let consumed = (state.inflater.total_in() - before_in) as usize;
            let produced = (state.inflater.total_out() - before_out) as usize;
            reader.input.consume(consumed);
            state.crc.update(&buf[..produced]);
            state.size += produced as u64;

            if status == Status::StreamEnd {
                read_trailer(&mut reader.input, state)?;
                return Ok(produced);
            }
            if produced > 0 {
                return Ok(produced);
            }
            if eof {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "gzip member data is truncated",
                ));
            }
            if consumed == 0 {
                return Err(io::Error::other("deflate stream made no progress"));
            }
        }
    }
}

/// Reads the 8-byte trailer and records it on the entry.
fn read_trailer<R: BufRead>(input: &mut ByteCountingReader<R>, state: &mut MemberState) -> io::Result<()> {
    let mut trailer = [0u8; TRAILER_SIZE];
    input.read_exact(&mut trailer)?;
    let read_crc32 = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
    let read_isize = u32::from_le_bytes([trailer[4], trailer[5], trailer[6], trailer[7]]);
    let computed_crc32 = state.crc.clone().finalize();

    let entry = &mut state.entry;
    entry.set_compressed_size(state.inflater.total_in());
    entry.set_trailer(read_crc32, computed_crc32, read_isize, state.size);
    if entry.errors().invalid_crc32() {
        warn!(
            index = entry.index(),
            offset = entry.offset(),
            read = read_crc32,
            computed = computed_crc32,
            "gzip data CRC32 mismatch"
        );
    }
    if entry.errors().invalid_isize() {
        warn!(
            index = entry.index(),
            offset = entry.offset(),
            read = read_isize,
            computed = ?entry.computed_isize(),
            "gzip ISIZE mismatch"
        );
    }
    state.finished = true;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `printf 'hello\n' | gzip -n`
    const HELLO_GZ: [u8; 26] = [
        0x1f, 0x8b, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x03, 0xcb, 0x48, 0xcd, 0xc9,
        0xc9, 0xe7, 0x02, 0x00, 0x20, 0x30, 0x3a, 0x36, 0x06, 0x00, 0x00, 0x00,
    ];

    /// Same data, with FNAME `hello.txt` and FHCRC
    const HELLO_NAMED_GZ: [u8; 38] = [
        0x1f, 0x8b, 0x08, 0x0a, 0xc0, 0xa3, 0x18, 0x48, 0x00, 0x03, 0x68, 0x65, 0x6c, 0x6c,
        0x6f, 0x2e, 0x74, 0x78, 0x74, 0x00, 0x5e, 0x46, 0xcb, 0x48, 0xcd, 0xc9, 0xc9, 0xe7,
        0x02, 0x00, 0x20, 0x30, 0x3a, 0x36, 0x06, 0x00, 0x00, 0x00,
    ];

    #[test]
    fn test_read_single_member() {
        let mut reader = GzipReader::new(HELLO_GZ.as_slice());
        let mut member = reader.next_member().unwrap().unwrap();
        let mut data = Vec::new();
        member.read_to_end(&mut data).unwrap();
        assert_eq!(data, b"hello\n");

        let entry = member.finish().unwrap();
        assert!(entry.is_valid());
        assert_eq!(entry.index(), 0);
        assert_eq!(entry.offset(), 0);
        assert_eq!(entry.os(), 3);
        assert_eq!(entry.read_crc32(), Some(0x363a3020));
        assert_eq!(entry.computed_crc32(), Some(0x363a3020));
        assert_eq!(entry.size(), Some(6));
        assert_eq!(entry.compressed_size(), Some(8));
        assert_eq!(entry.total_length(), Some(26));

        assert!(reader.next_member().unwrap().is_none());
        assert_eq!(reader.position(), 26);
        assert_eq!(reader.last_entry(), Some(&entry));
    }

    #[test]
    fn test_read_members_unread_are_drained() {
        let mut container = HELLO_GZ.to_vec();
        container.extend_from_slice(&HELLO_NAMED_GZ);
        container.extend_from_slice(&HELLO_GZ);

        let mut reader = GzipReader::new(container.as_slice());
        let mut offsets = Vec::new();
        while let Some(member) = reader.next_member().unwrap() {
            offsets.push(member.entry().unwrap().offset());
        }
        assert_eq!(offsets, vec![0, 26, 64]);
        assert_eq!(reader.member_count(), 3);
        assert!(reader.last_entry().unwrap().is_valid());
    }

    #[test]
    fn test_read_named_member() {
        let mut reader = GzipReader::new(HELLO_NAMED_GZ.as_slice());
        let member = reader.next_member().unwrap().unwrap();
        let entry = member.finish().unwrap();
        assert!(entry.is_valid());
        assert_eq!(entry.name().as_deref(), Some("hello.txt"));
        assert_eq!(entry.read_crc16(), Some(0x465e));
        assert_eq!(entry.header_length(), 22);
    }

    #[test]
    fn test_read_corrupted_header_crc() {
        let mut container = HELLO_NAMED_GZ;
        container[4] ^= 0xff;
        let mut reader = GzipReader::new(container.as_slice());
        let mut member = reader.next_member().unwrap().unwrap();
        let mut data = Vec::new();
        member.read_to_end(&mut data).unwrap();
        assert_eq!(data, b"hello\n");
        let entry = member.finish().unwrap();
        assert!(!entry.is_valid());
        assert!(entry.errors().invalid_crc16());
        assert!(!entry.errors().invalid_crc32());
        assert!(!entry.errors().invalid_isize());
    }

    #[test]
    fn test_read_corrupted_trailer() {
        let mut container = HELLO_GZ;
        container[18] ^= 0x01; // CRC32
        container[22] = 0x07; // ISIZE
        let mut reader = GzipReader::new(container.as_slice());
        let entry = reader.next_member().unwrap().unwrap().finish().unwrap();
        assert!(entry.errors().invalid_crc32());
        assert!(entry.errors().invalid_isize());
        assert!(!entry.errors().invalid_crc16());
        assert_eq!(entry.read_isize(), Some(7));
        assert_eq!(entry.computed_isize(), Some(6));
        // Still traversable
        assert!(reader.next_member().unwrap().is_none());
    }

    #[test]
    fn test_read_trailing_garbage() {
        let mut container = HELLO_GZ.to_vec();
        container.extend_from_slice(&[0x0d, 0x0a, 0x0d]);
        let mut reader = GzipReader::new(container.as_slice());
        assert!(reader.next_member().unwrap().is_some());
        assert!(matches!(
            reader.next_member(),
            Err(GzipError::TrailingGarbage { offset: 26, length: 3 })
        ));
    }

    #[test]
    fn test_read_truncated_trailer() {
        let mut reader = GzipReader::new(&HELLO_GZ[..22]);
        let member = reader.next_member().unwrap().unwrap();
        let err = member.finish().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_read_truncated_data() {
        let mut reader = GzipReader::new(&HELLO_GZ[..13]);
        let mut member = reader.next_member().unwrap().unwrap();
        let mut data = Vec::new();
        let err = member.read_to_end(&mut data).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
