//! ARC container readers
//!
//! [ArcReader] reads an uncompressed ARC file, where record offsets are known and
//! checked. [CompressedArcReader] reads a GZip-compressed ARC file, with one record per
//! GZip member; offsets are not checked there but every member is verified.
//!
//! Both return the version block first, then the records, as [ArchiveRecord] values
//! borrowing the reader: a record must be dropped before the next one is requested. A
//! record that was not fully read is skipped over by the next call.

use std::io::{BufRead, BufReader, Cursor, Read};

use tracing::debug;

use super::fields::{ArcHeader, parse_record_line};
use super::record::ArcRecord;
use super::version_block::ArcVersionBlock;
use super::{ARC_RECORD, ArcReaderError, ArcVersion};
use crate::config::ReaderOptions;
use crate::gzip::{GzipEntry, GzipReader, MemberStream};
use crate::payload::Payload;
use crate::record::ArchiveRecord;
use crate::stream::{ByteCountingReader, RawLine, read_line, skip_newlines};

/// Reader of uncompressed ARC files
#[derive(Debug)]
pub struct ArcReader<R> {
    input: ByteCountingReader<R>,
    options: ReaderOptions,
    /// `None` until the version block has been read
    version: Option<ArcVersion>,
    /// Where the previous record ends
    next_offset: u64,
    records: usize,
}

impl<R: BufRead> ArcReader<R> {
    pub fn new(input: R) -> Self {
        Self::with_options(input, ReaderOptions::default())
    }

    pub fn with_options(input: R, options: ReaderOptions) -> Self {
        ArcReader {
            input: ByteCountingReader::new(input),
            options,
            version: None,
            next_offset: 0,
            records: 0,
        }
    }

    /// Version declared by the version block, once read
    pub fn version(&self) -> Option<ArcVersion> {
        self.version
    }

    /// Number of records returned so far, version block included
    pub fn record_count(&self) -> usize {
        self.records
    }

    /// Current offset in the file
    pub fn position(&self) -> u64 {
        self.input.position()
    }

    /// Reads the next record.
    ///
    /// # Returns
    /// * `Ok(Some(ArchiveRecord::VersionBlock(_)))` - On the first call.
    /// * `Ok(Some(ArchiveRecord::Arc(_)))` - On the following calls.
    /// * `Ok(None)` - At the end of the file.
    pub fn next_record(&mut self) -> Result<Option<ArchiveRecord<&mut ByteCountingReader<R>>>, ArcReaderError> {
        self.input.skip_to(self.next_offset)?;
        skip_newlines(&mut self.input)?;

        let start = self.input.position();
        let Some(line) = read_line(&mut self.input, self.options.max_header_line)? else {
            debug!(records = self.records, offset = start, "end of arc file");
            return Ok(None);
        };
        let header_end = self.input.position();
        let header = parse_header(&line, self.version.unwrap_or(ArcVersion::V1), Some(start));
        self.next_offset = header_end + header.length().unwrap_or(0);
        self.records += 1;
        debug!(offset = start, length = ?header.length(), "arc record");

        match self.version {
            None => {
                let payload = Payload::new(&mut self.input, header.length().unwrap_or(0), self.options.block_digest);
                let block = ArcVersionBlock::read(header, payload)?;
                self.version = Some(block.version());
                Ok(Some(ArchiveRecord::VersionBlock(block)))
            }
            Some(_) => Ok(Some(ArchiveRecord::Arc(ArcRecord::new(
                header,
                &mut self.input,
                &self.options,
            )))),
        }
    }
}

/// Reader of GZip-compressed ARC files
#[derive(Debug)]
pub struct CompressedArcReader<R> {
    gzip: GzipReader<R>,
    options: ReaderOptions,
    version: Option<ArcVersion>,
    records: usize,
    /// Entries of the members finished since the last call to `take_completed_members`
    completed: Vec<GzipEntry>,
}

impl<R: BufRead> CompressedArcReader<R> {
    pub fn new(input: R) -> Self {
        Self::with_options(input, ReaderOptions::default())
    }

    pub fn with_options(input: R, options: ReaderOptions) -> Self {
        CompressedArcReader {
            gzip: GzipReader::new(input),
            options,
            version: None,
            records: 0,
            completed: Vec::new(),
        }
    }

    pub fn version(&self) -> Option<ArcVersion> {
        self.version
    }

    pub fn record_count(&self) -> usize {
        self.records
    }

    /// Underlying GZip reader
    pub fn gzip_reader(&self) -> &GzipReader<R> {
        &self.gzip
    }

    /// Entries of every member finished so far and not taken yet, skipped members included.
    ///
    /// The member of a record is finished by the next call to `next_record`.
    pub fn take_completed_members(&mut self) -> Vec<GzipEntry> {
        std::mem::take(&mut self.completed)
    }

    /// Reads the record of the next GZip member.
    ///
    /// Members inflating to nothing but blank lines are skipped.
    pub fn next_record(&mut self) -> Result<Option<ArchiveRecord<MemberStream<'_, R>>>, ArcReaderError> {
        if let Some(member) = self.gzip.current_member() {
            self.completed.push(member.finish()?);
        }
        let (line, leftover) = loop {
            let Some(mut member) = self.gzip.next_member()? else {
                debug!(records = self.records, "end of compressed arc file");
                return Ok(None);
            };
            let found = {
                let mut peek = BufReader::new(&mut member);
                skip_newlines(&mut peek)?;
                read_line(&mut peek, self.options.max_header_line)?.map(|line| (line, peek.buffer().to_vec()))
            };
            match found {
                Some(found) => break found,
                None => self.completed.push(member.finish()?),
            }
        };
        let Some(member) = self.gzip.current_member() else {
            return Ok(None);
        };
        // Bytes buffered while looking for the header line belong to the payload
        let mut stream = BufReader::new(Cursor::new(leftover).chain(member));

        let header = parse_header(&line, self.version.unwrap_or(ArcVersion::V1), None);
        self.records += 1;
        match self.version {
            None => {
                let payload = Payload::new(&mut stream, header.length().unwrap_or(0), self.options.block_digest);
                let block = ArcVersionBlock::read(header, payload)?;
                self.version = Some(block.version());
                Ok(Some(ArchiveRecord::VersionBlock(block)))
            }
            Some(_) => Ok(Some(ArchiveRecord::Arc(ArcRecord::new(header, stream, &self.options)))),
        }
    }
}

fn parse_header(line: &RawLine, version: ArcVersion, start_offset: Option<u64>) -> ArcHeader {
    let mut header = parse_record_line(&line.text, version, start_offset);
    if line.truncated {
        header.diagnostics_mut().invalid(ARC_RECORD, "Header line too long");
    }
    header
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arc::OFFSET_FIELD;
    use crate::diagnostics::{DiagnosticKind, Validate};
    use crate::gzip::{GzipHeader, GzipWriter};

    const VERSION_PAYLOAD: &str = "2 0 Alexa\nURL IP-address Archive-date Content-type Result-code Checksum Location Offset Filename Archive-length\n";

    /// Builds a version 2 ARC file, with record offsets computed or forced.
    fn arc_file(records: &[(&str, &str)], wrong_offset: Option<usize>) -> (Vec<u8>, Vec<u64>) {
        let mut out = format!(
            "filedesc://test.arc 0.0.0.0 20080430204825 text/plain {}\n{}",
            VERSION_PAYLOAD.len(),
            VERSION_PAYLOAD
        )
        .into_bytes();
        let mut offsets = Vec::new();
        for (idx, (url, body)) in records.iter().enumerate() {
            out.push(b'\n');
            let offset = out.len() as u64;
            offsets.push(offset);
            let declared = if wrong_offset == Some(idx) { offset + 1 } else { offset };
            let line = format!(
                "{url} 1.2.3.4 20080430204825 text/html 200 ABCDEF - {declared} test.arc {}\n",
                body.len()
            );
            out.extend_from_slice(line.as_bytes());
            out.extend_from_slice(body.as_bytes());
        }
        out.push(b'\n');
        (out, offsets)
    }

    const RECORDS: [(&str, &str); 3] = [
        ("http://x.org/", "HTTP/1.1 200 OK\r\n\r\n<html></html>"),
        ("dns:x.org", "20080430204825\nx.org. 1 IN A 1.2.3.4"),
        ("http://x.org/robots.txt", "HTTP/1.1 404 Not Found\r\n\r\n"),
    ];

    #[test]
    fn test_arc_reader_records() {
        let (file, offsets) = arc_file(&RECORDS, None);
        let mut reader = ArcReader::new(file.as_slice());

        match reader.next_record().unwrap().unwrap() {
            ArchiveRecord::VersionBlock(block) => {
                assert!(block.is_valid(), "{:?}", block.diagnostics());
                assert_eq!(block.version(), ArcVersion::V2);
            }
            other => panic!("expected a version block, got {:?}", other.kind()),
        }
        assert_eq!(reader.version(), Some(ArcVersion::V2));

        let mut seen = Vec::new();
        while let Some(record) = reader.next_record().unwrap() {
            let ArchiveRecord::Arc(mut record) = record else {
                panic!("expected an arc record");
            };
            // First record: read entirely, the others are left to the reader
            if seen.is_empty() {
                let mut body = Vec::new();
                record.payload().unwrap().read_to_end(&mut body).unwrap();
                assert_eq!(body, RECORDS[0].1.as_bytes());
            }
            record.close().unwrap();
            assert!(record.is_valid(), "{:?}", record.diagnostics());
            seen.push(record.header().offset().unwrap());
        }
        assert_eq!(seen, offsets);
        assert_eq!(reader.record_count(), 4);
    }

    #[test]
    fn test_arc_reader_abandoned_records_are_skipped() {
        let (file, offsets) = arc_file(&RECORDS, None);
        let mut reader = ArcReader::new(file.as_slice());
        let mut starts = Vec::new();
        while let Some(record) = reader.next_record().unwrap() {
            starts.push(record.start_offset());
        }
        assert_eq!(starts[0], Some(0));
        assert_eq!(starts[1..].iter().map(|s| s.unwrap()).collect::<Vec<_>>(), offsets);
    }

    #[test]
    fn test_arc_reader_offset_mismatch() {
        let (file, _) = arc_file(&RECORDS, Some(1));
        let mut reader = ArcReader::new(file.as_slice());
        let mut diagnostics = Vec::new();
        while let Some(mut record) = reader.next_record().unwrap() {
            record.close().unwrap();
            diagnostics.push(record.diagnostics().count(DiagnosticKind::Invalid, OFFSET_FIELD));
        }
        assert_eq!(diagnostics, vec![0, 0, 1, 0]);
    }

    #[test]
    fn test_arc_reader_truncated_record() {
        let (mut file, _) = arc_file(&RECORDS, None);
        file.truncate(file.len() - 10);
        let mut reader = ArcReader::new(file.as_slice());
        let mut last = None;
        while let Some(mut record) = reader.next_record().unwrap() {
            record.close().unwrap();
            last = Some(record.diagnostics().count(DiagnosticKind::Invalid, ARC_RECORD));
        }
        assert_eq!(last, Some(1));
    }

    #[test]
    fn test_compressed_arc_reader() {
        let (file, offsets) = arc_file(&RECORDS, None);
        // One member per record, split at the record starts
        let mut bounds = vec![0u64];
        bounds.extend(offsets.iter().map(|o| o - 1));
        bounds.push(file.len() as u64);
        let mut writer = GzipWriter::new(Vec::new());
        for pair in bounds.windows(2) {
            let chunk = &file[pair[0] as usize..pair[1] as usize];
            writer.write_member(&GzipHeader::default(), chunk).unwrap();
        }
        let compressed = writer.into_inner().unwrap();

        let mut reader = CompressedArcReader::new(compressed.as_slice());
        let mut kinds = Vec::new();
        while let Some(mut record) = reader.next_record().unwrap() {
            record.close().unwrap();
            assert!(record.is_valid(), "{:?}", record.diagnostics());
            // Offsets are not known in compressed files
            assert_eq!(record.start_offset(), None);
            kinds.push(record.kind());
        }
        assert_eq!(kinds, vec!["version-block", "arc", "arc", "arc"]);
        assert_eq!(reader.gzip_reader().member_count(), 4);
        assert!(reader.gzip_reader().last_entry().unwrap().is_valid());
    }

    #[test]
    fn test_compressed_arc_reader_reports_blank_members() {
        let (file, offsets) = arc_file(&RECORDS[..2], None);
        let split = (offsets[0] - 1) as usize;
        let mut writer = GzipWriter::new(Vec::new());
        writer.write_member(&GzipHeader::default(), &file[..split]).unwrap();
        writer.write_member(&GzipHeader::default(), b"\n\n".as_slice()).unwrap();
        writer.write_member(&GzipHeader::default(), &file[split..]).unwrap();
        let compressed = writer.into_inner().unwrap();

        let mut reader = CompressedArcReader::new(compressed.as_slice());
        let mut members = Vec::new();
        let mut kinds = Vec::new();
        while let Some(record) = reader.next_record().unwrap() {
            kinds.push(record.kind());
            members.extend(reader.take_completed_members());
        }
        members.extend(reader.take_completed_members());

        assert_eq!(kinds, vec!["version-block", "arc"]);
        let indices: Vec<usize> = members.iter().map(|entry| entry.index()).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(reader.gzip_reader().member_count(), 3);
        assert!(members.iter().all(|entry| entry.is_valid()));
    }
}
