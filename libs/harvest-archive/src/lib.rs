//! harvest-archive is a Rust library for reading and validating web archive containers:
//! ARC files (versions 1 and 2), WARC files (1.0 and 1.1), and the multi-member GZip
//! files both are usually stored in.
//!
//! Readers are streaming and forward-only. They never stop on a malformed record: every
//! format violation is recorded as a [Missing](diagnostics::DiagnosticKind::Missing) or
//! [Invalid](diagnostics::DiagnosticKind::Invalid) diagnostic on the record, and GZip
//! checksum or flag problems are recorded as error bits on the member
//! [GzipEntry](gzip::GzipEntry). Only I/O failures and framing the reader cannot recover
//! from are returned as errors.
//!
//! Record payloads are digested while they are read (SHA-1 by default), and HTTP
//! responses additionally get their entity digested.
//!
//! ## Usages
//!
//! ### Check every record of a WARC file
//! ```rust
//! use harvest_archive::diagnostics::Validate;
//! use harvest_archive::warc::WarcReader;
//!
//! let warc = b"WARC/1.0\r\n\
//! WARC-Type: resource\r\n\
//! WARC-Record-ID: <urn:uuid:0d3a4c3e-4c4b-11e8-842f-0ed5f89f718b>\r\n\
//! WARC-Date: 2018-04-30T20:48:25Z\r\n\
//! Content-Type: text/plain\r\n\
//! Content-Length: 5\r\n\
//! \r\n\
//! hello\r\n\r\n";
//!
//! let mut reader = WarcReader::new(warc.as_slice());
//! while let Some(mut record) = reader.next_record().unwrap() {
//!     record.close().unwrap();
//!     assert!(record.is_valid());
//!     println!("{} at {:?}: {}", record.kind(), record.start_offset(), record.block_digest().unwrap());
//! }
//!
//! //>> Output:
//! // warc at Some(0): sha1:aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d
//! ```
//!
//! ### Write and verify a GZip member
//! ```rust
//! use std::io::Read;
//! use harvest_archive::gzip::{GzipHeader, GzipReader, GzipWriter};
//!
//! let mut writer = GzipWriter::new(Vec::new());
//! let header = GzipHeader::default().with_filename("hello.txt").unwrap();
//! writer.write_member(&header, b"hello".as_slice()).unwrap();
//! let bytes = writer.into_inner().unwrap();
//!
//! let mut reader = GzipReader::new(bytes.as_slice());
//! let mut member = reader.next_member().unwrap().unwrap();
//! let mut data = Vec::new();
//! member.read_to_end(&mut data).unwrap();
//! let entry = member.finish().unwrap();
//! assert_eq!(data, b"hello");
//! assert_eq!(entry.name().as_deref(), Some("hello.txt"));
//! assert!(entry.is_valid());
//! ```

pub mod arc;
pub mod config;
pub mod diagnostics;
pub mod digest;
pub mod gzip;
pub mod payload;
pub mod record;
pub mod stream;
pub mod values;
pub mod warc;

pub use config::ReaderOptions;
pub use diagnostics::{Diagnostics, Validate};
pub use record::ArchiveRecord;
