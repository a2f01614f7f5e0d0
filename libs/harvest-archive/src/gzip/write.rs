use std::io::{self, Read, Write};

use crc32fast::Hasher;
use flate2::{Compress, Compression, FlushCompress, Status};
use tracing::debug;

use super::entry::GzipEntry;
use super::header::{GzipHeader, ParsedHeader};
use super::{GzipError, TRAILER_SIZE};

/// Default size of the input and output buffers
pub const DEFAULT_BUFFER_SIZE: usize = 1024;

/// Writer of GZip members
///
/// Every call to [GzipWriter::write_member] appends one complete member (header,
/// deflate data, trailer) to the output.
#[derive(Debug)]
pub struct GzipWriter<W> {
    out: W,
    buffer_size: usize,
    level: Compression,
    index: usize,
    position: u64,
}

impl<W: Write> GzipWriter<W> {
    /// Creates a writer with the default buffer size.
    pub fn new(out: W) -> Self {
        GzipWriter {
            out,
            buffer_size: DEFAULT_BUFFER_SIZE,
            level: Compression::default(),
            index: 0,
            position: 0,
        }
    }

    /// Creates a writer with a custom buffer size.
    ///
    /// ## Arguments
    /// * `out` - The output.
    /// * `buffer_size` - Size of the input and output buffers, must not be zero.
    pub fn with_buffer_size(out: W, buffer_size: usize) -> Result<Self, GzipError> {
        if buffer_size == 0 {
            return Err(GzipError::InvalidBufferSize);
        }
        Ok(GzipWriter {
            buffer_size,
            ..Self::new(out)
        })
    }

    /// Sets the compression level of the next members.
    pub fn with_level(mut self, level: Compression) -> Self {
        self.level = level;
        self
    }

    /// Bytes written so far.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Writes one member, compressing everything `source` yields.
    ///
    /// # Returns
    /// The entry of the written member, whose computed trailer values are the written ones.
    pub fn write_member<S: Read>(&mut self, header: &GzipHeader, mut source: S) -> Result<GzipEntry, GzipError> {
        let offset = self.position;
        let (header_bytes, crc16) = header.encode()?;
        self.out.write_all(&header_bytes)?;

        let mut deflater = Compress::new(self.level, false);
        let mut crc = Hasher::new();
        let mut input = vec![0u8; self.buffer_size];
        let mut output = vec![0u8; self.buffer_size];
        let mut size = 0u64;

        loop {
            let n = read_chunk(&mut source, &mut input)?;
            let chunk = &input[..n];
            crc.update(chunk);
            size += n as u64;
            let flush = if n == 0 {
                FlushCompress::Finish
            } else {
                FlushCompress::None
            };

            // Drain the compressor until it has taken the whole chunk (or ended the stream)
            let mut fed = 0;
            loop {
                let before_in = deflater.total_in();
                let before_out = deflater.total_out();
                let status = deflater.compress(&chunk[fed..], &mut output, flush)?;
                fed += (deflater.total_in() - before_in) as usize;
                let produced = (deflater.total_out() - before_out) as usize;
                self.out.write_all(&output[..produced])?;

                let done = if n == 0 {
                    status == Status::StreamEnd
                } else {
                    fed == chunk.len()
                };
                if done {
                    break;
                }
            }
            if n == 0 {
                break;
            }
        }

        let computed_crc32 = crc.finalize();
        let isize = size as u32;
        let mut trailer = [0u8; TRAILER_SIZE];
        trailer[0..4].copy_from_slice(&computed_crc32.to_le_bytes());
        trailer[4..8].copy_from_slice(&isize.to_le_bytes());
        self.out.write_all(&trailer)?;
        self.out.flush()?;

        let compressed_size = deflater.total_out();
        let header_length = header_bytes.len() as u64;
        self.position += header_length + compressed_size + TRAILER_SIZE as u64;

        let mut entry = GzipEntry::from_header(
            self.index,
            offset,
            ParsedHeader {
                header: header.clone(),
                reserved: 0,
                read_crc16: crc16,
                computed_crc16: crc16,
                length: header_length,
            },
        );
        entry.set_compressed_size(compressed_size);
        entry.set_trailer(computed_crc32, computed_crc32, isize, size);
        self.index += 1;
        debug!(index = entry.index(), offset, size, compressed_size, "gzip member written");
        Ok(entry)
    }

    /// Flushes and releases the output.
    pub fn into_inner(mut self) -> io::Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }
}

fn read_chunk<S: Read>(source: &mut S, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match source.read(buf) {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gzip::GzipReader;

    fn sample_data(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 % 251) as u8).collect()
    }

    #[test]
    fn test_writer_rejects_zero_buffer() {
        assert!(matches!(
            GzipWriter::with_buffer_size(Vec::new(), 0),
            Err(GzipError::InvalidBufferSize)
        ));
    }

    #[test]
    fn test_write_read_round_trip() {
        let header = GzipHeader {
            text: true,
            header_crc: true,
            mtime: 1_209_587_305,
            xfl: 2,
            os: 3,
            extra: Some(vec![b'L', b'X', 2, 0, 1, 2]),
            ..Default::default()
        }
        .with_filename("record.warc")
        .unwrap()
        .with_comment("first member")
        .unwrap();
        let data = sample_data(10_000);

        let mut writer = GzipWriter::with_buffer_size(Vec::new(), 64).unwrap();
        let written = writer.write_member(&header, data.as_slice()).unwrap();
        assert!(written.is_valid());
        assert_eq!(written.size(), Some(10_000));
        let out = writer.into_inner().unwrap();
        assert_eq!(written.total_length(), Some(out.len() as u64));

        let mut reader = GzipReader::new(out.as_slice());
        let mut member = reader.next_member().unwrap().unwrap();
        let mut inflated = Vec::new();
        member.read_to_end(&mut inflated).unwrap();
        assert_eq!(inflated, data);
        let entry = member.finish().unwrap();

        assert!(entry.is_valid());
        assert_eq!(entry.header(), &header);
        assert_eq!(entry.name().as_deref(), Some("record.warc"));
        assert_eq!(entry.comment().as_deref(), Some("first member"));
        assert_eq!(entry.read_crc16(), written.read_crc16());
        assert_eq!(entry.read_crc32(), written.computed_crc32());
        assert_eq!(entry.read_isize(), written.computed_isize());
        assert_eq!(entry.compressed_size(), written.compressed_size());
    }

    #[test]
    fn test_write_multiple_members() {
        let mut writer = GzipWriter::new(Vec::new());
        let first = writer.write_member(&GzipHeader::default(), b"first".as_slice()).unwrap();
        let empty = writer.write_member(&GzipHeader::default(), io::empty()).unwrap();
        let third = writer.write_member(&GzipHeader::default(), b"third".as_slice()).unwrap();
        assert_eq!(first.index(), 0);
        assert_eq!(empty.size(), Some(0));
        assert_eq!(third.index(), 2);
        let total = writer.position();
        let out = writer.into_inner().unwrap();
        assert_eq!(total, out.len() as u64);

        let mut reader = GzipReader::new(out.as_slice());
        let mut contents = Vec::new();
        while let Some(mut member) = reader.next_member().unwrap() {
            let mut data = Vec::new();
            member.read_to_end(&mut data).unwrap();
            let entry = member.finish().unwrap();
            assert!(entry.is_valid());
            contents.push((entry.offset(), data));
        }
        assert_eq!(
            contents,
            vec![
                (0, b"first".to_vec()),
                (empty.offset(), Vec::new()),
                (third.offset(), b"third".to_vec()),
            ]
        );
    }

    #[test]
    fn test_write_corrupted_mtime_detected() {
        let header = GzipHeader {
            header_crc: true,
            mtime: 0x01020304,
            ..Default::default()
        };
        let mut writer = GzipWriter::new(Vec::new());
        writer.write_member(&header, b"payload bytes".as_slice()).unwrap();
        let mut out = writer.into_inner().unwrap();
        out[4] ^= 0x55;

        let mut reader = GzipReader::new(out.as_slice());
        let mut member = reader.next_member().unwrap().unwrap();
        let mut data = Vec::new();
        member.read_to_end(&mut data).unwrap();
        assert_eq!(data, b"payload bytes");
        let entry = member.finish().unwrap();
        assert!(entry.errors().invalid_crc16());
        assert!(!entry.errors().invalid_crc32());
        assert!(!entry.errors().invalid_isize());
        assert_ne!(entry.read_crc16(), entry.computed_crc16());
    }
}
