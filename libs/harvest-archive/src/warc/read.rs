//! WARC container readers
//!
//! [WarcReader] reads an uncompressed WARC file, or the inflated data of one GZip member
//! with offsets disabled. [CompressedWarcReader] reads a GZip-compressed WARC file with
//! one record per member. As for ARC files, records borrow the reader and whatever a
//! record did not consume is skipped by the next call.

use std::io::{BufRead, BufReader, Cursor, Read};

use tracing::debug;

use super::header::WarcHeader;
use super::record::WarcRecord;
use super::{WARC_RECORD, WarcReaderError};
use crate::config::ReaderOptions;
use crate::gzip::{GzipEntry, GzipReader, MemberStream};
use crate::record::ArchiveRecord;
use crate::stream::{ByteCountingReader, RawLine, read_line, skip_newlines};

/// Reader of uncompressed WARC data
#[derive(Debug)]
pub struct WarcReader<R> {
    input: ByteCountingReader<R>,
    options: ReaderOptions,
    /// Where the content of the previous record ends
    next_offset: u64,
    records: usize,
    offsets: bool,
}

impl<R: BufRead> WarcReader<R> {
    pub fn new(input: R) -> Self {
        Self::with_options(input, ReaderOptions::default())
    }

    pub fn with_options(input: R, options: ReaderOptions) -> Self {
        WarcReader {
            input: ByteCountingReader::new(input),
            options,
            next_offset: 0,
            records: 0,
            offsets: true,
        }
    }

    /// Stops reporting record offsets, for data which is not the whole container.
    pub fn without_offsets(mut self) -> Self {
        self.offsets = false;
        self
    }

    pub fn record_count(&self) -> usize {
        self.records
    }

    pub fn position(&self) -> u64 {
        self.input.position()
    }

    /// Reads the next record, `Ok(None)` at the end of the data.
    pub fn next_record(&mut self) -> Result<Option<ArchiveRecord<&mut ByteCountingReader<R>>>, WarcReaderError> {
        self.input.skip_to(self.next_offset)?;
        skip_newlines(&mut self.input)?;

        let start = self.input.position();
        let Some(block) = read_header_block(&mut self.input, &self.options)? else {
            debug!(records = self.records, offset = start, "end of warc data");
            return Ok(None);
        };
        let header = parse_header(&block, self.offsets.then_some(start));
        self.next_offset = self.input.position() + header.content_length().unwrap_or(0);
        self.records += 1;
        debug!(offset = start, warc_type = ?header.warc_type(), length = ?header.content_length(), "warc record");

        Ok(Some(ArchiveRecord::Warc(WarcRecord::new(
            header,
            &mut self.input,
            &self.options,
        ))))
    }
}

/// Reader of GZip-compressed WARC files
#[derive(Debug)]
pub struct CompressedWarcReader<R> {
    gzip: GzipReader<R>,
    options: ReaderOptions,
    records: usize,
    /// Entries of the members finished since the last call to `take_completed_members`
    completed: Vec<GzipEntry>,
}

impl<R: BufRead> CompressedWarcReader<R> {
    pub fn new(input: R) -> Self {
        Self::with_options(input, ReaderOptions::default())
    }

    pub fn with_options(input: R, options: ReaderOptions) -> Self {
        CompressedWarcReader {
            gzip: GzipReader::new(input),
            options,
            records: 0,
            completed: Vec::new(),
        }
    }

    pub fn record_count(&self) -> usize {
        self.records
    }

    pub fn gzip_reader(&self) -> &GzipReader<R> {
        &self.gzip
    }

    /// Entries of every member finished so far and not taken yet, skipped members included.
    ///
    /// The member of a record is finished by the next call to `next_record`.
    pub fn take_completed_members(&mut self) -> Vec<GzipEntry> {
        std::mem::take(&mut self.completed)
    }

    /// Reads the record of the next GZip member, skipping members holding only blank lines.
    pub fn next_record(&mut self) -> Result<Option<ArchiveRecord<MemberStream<'_, R>>>, WarcReaderError> {
        if let Some(member) = self.gzip.current_member() {
            self.completed.push(member.finish()?);
        }
        let (block, leftover) = loop {
            let Some(mut member) = self.gzip.next_member()? else {
                debug!(records = self.records, "end of compressed warc file");
                return Ok(None);
            };
            let found = {
                let mut peek = BufReader::new(&mut member);
                skip_newlines(&mut peek)?;
                read_header_block(&mut peek, &self.options)?.map(|block| (block, peek.buffer().to_vec()))
            };
            match found {
                Some(found) => break found,
                None => self.completed.push(member.finish()?),
            }
        };
        let Some(member) = self.gzip.current_member() else {
            return Ok(None);
        };
        let stream = BufReader::new(Cursor::new(leftover).chain(member));

        let header = parse_header(&block, None);
        self.records += 1;
        Ok(Some(ArchiveRecord::Warc(WarcRecord::new(header, stream, &self.options))))
    }
}

/// Version line and header lines of a record
struct HeaderBlock {
    version: RawLine,
    lines: Vec<RawLine>,
    /// Whether the empty line ending the block was found
    terminated: bool,
    /// Lines read past the maximum line count and dropped
    dropped: usize,
}

fn read_header_block<R: BufRead>(input: &mut R, options: &ReaderOptions) -> std::io::Result<Option<HeaderBlock>> {
    let max = options.max_header_line;
    let Some(version) = read_line(input, max)? else {
        return Ok(None);
    };
    let mut lines = Vec::new();
    let mut terminated = false;
    let mut dropped = 0;
    while let Some(line) = read_line(input, max)? {
        if line.text.is_empty() && !line.truncated {
            terminated = true;
            break;
        }
        // Lines past the limit are still consumed up to the empty line
        if lines.len() < options.max_header_lines {
            lines.push(line);
        } else {
            dropped += 1;
        }
    }
    Ok(Some(HeaderBlock {
        version,
        lines,
        terminated,
        dropped,
    }))
}

fn parse_header(block: &HeaderBlock, start_offset: Option<u64>) -> WarcHeader {
    let mut header = WarcHeader::parse(
        &block.version.text,
        block.lines.iter().map(|line| line.text.as_str()),
        start_offset,
    );
    if block.version.truncated || block.lines.iter().any(|line| line.truncated) {
        header.diagnostics_mut().invalid(WARC_RECORD, "Header line too long");
    }
    if block.dropped > 0 {
        header.diagnostics_mut().invalid(WARC_RECORD, "Too many header lines");
    }
    if !block.terminated {
        header.diagnostics_mut().invalid(WARC_RECORD, "Header block not terminated");
    }
    header
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{DiagnosticKind, Validate};
    use crate::gzip::{GzipHeader, GzipWriter};
    use crate::warc::{CONTENT_LENGTH_FIELD, HEADER_LINE_FIELD};

    fn warc_record(id: usize, warc_type: &str, content_type: &str, content: &str) -> String {
        format!(
            "WARC/1.0\r\nWARC-Type: {warc_type}\r\nWARC-Record-ID: <urn:uuid:{id}>\r\n\
             WARC-Date: 2018-04-30T20:48:25Z\r\nContent-Type: {content_type}\r\n\
             Content-Length: {}\r\n\r\n{content}\r\n\r\n",
            content.len()
        )
    }

    fn records() -> Vec<String> {
        vec![
            warc_record(1, "warcinfo", "application/warc-fields", "software: test\r\n"),
            warc_record(
                2,
                "response",
                "application/http; msgtype=response",
                "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\n\r\n<html></html>",
            ),
            warc_record(3, "metadata", "application/warc-fields", "via: http://x.org/\r\n"),
        ]
    }

    #[test]
    fn test_warc_reader_records() {
        let records = records();
        let file = records.concat();
        let mut reader = WarcReader::new(file.as_bytes());

        let mut offsets = Vec::new();
        let mut types = Vec::new();
        while let Some(record) = reader.next_record().unwrap() {
            let ArchiveRecord::Warc(mut record) = record else {
                panic!("expected a warc record");
            };
            record.close().unwrap();
            assert!(record.is_valid(), "{:?}", record.diagnostics());
            offsets.push(record.header().start_offset().unwrap());
            types.push(record.header().warc_type().unwrap().to_string());
            assert_eq!(record.payload_digest().is_some(), types.len() == 2);
        }
        assert_eq!(types, vec!["warcinfo", "response", "metadata"]);
        let expected: Vec<u64> = vec![0, records[0].len() as u64, (records[0].len() + records[1].len()) as u64];
        assert_eq!(offsets, expected);
        assert_eq!(reader.record_count(), 3);
    }

    #[test]
    fn test_warc_reader_skips_unread_content() {
        let file = records().concat();
        let mut reader = WarcReader::new(file.as_bytes());
        let mut first_bytes = Vec::new();
        while let Some(record) = reader.next_record().unwrap() {
            let ArchiveRecord::Warc(mut record) = record else {
                panic!("expected a warc record");
            };
            let mut byte = [0u8; 1];
            record.payload().unwrap().read_exact(&mut byte).unwrap();
            first_bytes.push(byte[0]);
        }
        assert_eq!(first_bytes, b"sHv");
    }

    #[test]
    fn test_warc_reader_without_offsets() {
        let file = records().concat();
        let mut reader = WarcReader::new(file.as_bytes()).without_offsets();
        while let Some(record) = reader.next_record().unwrap() {
            assert_eq!(record.start_offset(), None);
        }
        assert_eq!(reader.record_count(), 3);
    }

    #[test]
    fn test_warc_reader_keeps_going_on_bad_headers() {
        let mut file = records();
        file[0] = file[0].replace("Content-Length: 16", "Content-Length: sixteen");
        file[1] = file[1].replace("WARC-Type: response\r\n", "WARC-Type: response\r\nnot a header\r\n");
        let file = file.concat();

        let mut reader = WarcReader::new(file.as_bytes());
        let mut diagnostics = Vec::new();
        while let Some(mut record) = reader.next_record().unwrap() {
            record.close().unwrap();
            diagnostics.push(record.diagnostics().clone());
        }
        // The unknown length makes the content of the first record read as a header block
        assert!(diagnostics.len() >= 3);
        assert_eq!(diagnostics[0].count(DiagnosticKind::Invalid, CONTENT_LENGTH_FIELD), 1);
        assert!(
            diagnostics
                .iter()
                .any(|d| d.count(DiagnosticKind::Invalid, HEADER_LINE_FIELD) == 1)
        );
    }

    #[test]
    fn test_warc_reader_truncated_file() {
        let mut file = records().concat();
        file.truncate(file.len() - 12);
        let mut reader = WarcReader::new(file.as_bytes());
        let mut last = None;
        while let Some(mut record) = reader.next_record().unwrap() {
            record.close().unwrap();
            last = Some(record.diagnostics().count(DiagnosticKind::Invalid, WARC_RECORD));
        }
        assert_eq!(last, Some(1));
    }

    #[test]
    fn test_unterminated_header_block() {
        let file = "WARC/1.1\r\nWARC-Type: resource\r\n";
        let mut reader = WarcReader::new(file.as_bytes());
        let record = reader.next_record().unwrap().unwrap();
        assert_eq!(record.diagnostics().count(DiagnosticKind::Invalid, WARC_RECORD), 1);
        drop(record);
        assert!(reader.next_record().unwrap().is_none());
    }

    #[test]
    fn test_compressed_warc_reader() {
        let mut writer = GzipWriter::new(Vec::new());
        for record in records() {
            writer.write_member(&GzipHeader::default(), record.as_bytes()).unwrap();
        }
        let compressed = writer.into_inner().unwrap();

        let mut reader = CompressedWarcReader::new(compressed.as_slice());
        let mut count = 0;
        while let Some(mut record) = reader.next_record().unwrap() {
            record.close().unwrap();
            assert!(record.is_valid(), "{:?}", record.diagnostics());
            assert_eq!(record.start_offset(), None);
            assert!(record.block_digest().is_some());
            count += 1;
        }
        assert_eq!(count, 3);
        assert_eq!(reader.gzip_reader().member_count(), 3);
    }

    #[test]
    fn test_compressed_warc_reader_reports_blank_members() {
        let mut writer = GzipWriter::new(Vec::new());
        for (idx, record) in records().iter().enumerate() {
            if idx > 0 {
                writer.write_member(&GzipHeader::default(), b"\r\n\r\n".as_slice()).unwrap();
            }
            writer.write_member(&GzipHeader::default(), record.as_bytes()).unwrap();
        }
        let compressed = writer.into_inner().unwrap();

        let mut reader = CompressedWarcReader::new(compressed.as_slice());
        let mut members = Vec::new();
        let mut count = 0;
        while let Some(mut record) = reader.next_record().unwrap() {
            record.close().unwrap();
            count += 1;
            members.extend(reader.take_completed_members());
        }
        members.extend(reader.take_completed_members());

        assert_eq!(count, 3);
        let indices: Vec<usize> = members.iter().map(|entry| entry.index()).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4]);
        assert_eq!(reader.gzip_reader().member_count(), 5);
        assert!(reader.take_completed_members().is_empty());
    }

    #[test]
    fn test_too_many_header_lines() {
        let mut file = records();
        file[1] = file[1].replacen("\r\n\r\n", "\r\nX-Extra: 1\r\nX-Extra: 2\r\n\r\n", 1);
        let file = file.concat();
        let options = ReaderOptions::default().with_max_header_lines(5);
        let mut reader = WarcReader::with_options(file.as_bytes(), options);

        let mut dropped = Vec::new();
        let mut types = Vec::new();
        while let Some(record) = reader.next_record().unwrap() {
            let ArchiveRecord::Warc(mut record) = record else {
                panic!("expected a warc record");
            };
            record.close().unwrap();
            assert_eq!(record.header().lines().len(), 5);
            let too_many = record
                .diagnostics()
                .iter()
                .any(|d| d.to_string().contains("Too many header lines"));
            dropped.push(too_many);
            types.push(record.header().warc_type().unwrap().to_string());
        }
        assert_eq!(dropped, vec![false, true, false]);
        // The dropped lines are consumed, so the next record is found
        assert_eq!(types, vec!["warcinfo", "response", "metadata"]);
    }
}
