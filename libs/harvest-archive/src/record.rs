//! Archive record union

use std::io::{self, Read};

use crate::arc::{ArcRecord, ArcVersionBlock};
use crate::diagnostics::{Diagnostics, Validate};
use crate::digest::Digest;
use crate::warc::WarcRecord;

/// Any record produced by the ARC and WARC readers
#[derive(Debug)]
pub enum ArchiveRecord<R> {
    /// ARC version block (first record of an ARC file)
    VersionBlock(ArcVersionBlock),
    /// ARC record
    Arc(ArcRecord<R>),
    /// WARC record
    Warc(WarcRecord<R>),
}

impl<R: Read> ArchiveRecord<R> {
    /// Short name of the variant
    pub fn kind(&self) -> &'static str {
        match self {
            ArchiveRecord::VersionBlock(_) => "version-block",
            ArchiveRecord::Arc(_) => "arc",
            ArchiveRecord::Warc(_) => "warc",
        }
    }

    /// Offset of the record in an uncompressed container
    pub fn start_offset(&self) -> Option<u64> {
        match self {
            ArchiveRecord::VersionBlock(block) => block.header().start_offset(),
            ArchiveRecord::Arc(record) => record.header().start_offset(),
            ArchiveRecord::Warc(record) => record.header().start_offset(),
        }
    }

    /// Drains the payload and applies its summary. Version blocks are read entirely
    /// when created, closing them is a no-op.
    pub fn close(&mut self) -> io::Result<()> {
        match self {
            ArchiveRecord::VersionBlock(_) => Ok(()),
            ArchiveRecord::Arc(record) => record.close(),
            ArchiveRecord::Warc(record) => record.close(),
        }
    }

    /// Block digest, known once closed
    pub fn block_digest(&self) -> Option<&Digest> {
        match self {
            ArchiveRecord::VersionBlock(block) => block.block_digest(),
            ArchiveRecord::Arc(record) => record.block_digest(),
            ArchiveRecord::Warc(record) => record.block_digest(),
        }
    }

    /// Payload (HTTP entity) digest, known once closed
    pub fn payload_digest(&self) -> Option<&Digest> {
        match self {
            ArchiveRecord::VersionBlock(_) => None,
            ArchiveRecord::Arc(record) => record.payload_digest(),
            ArchiveRecord::Warc(record) => record.payload_digest(),
        }
    }
}

impl<R> Validate for ArchiveRecord<R> {
    fn diagnostics(&self) -> &Diagnostics {
        match self {
            ArchiveRecord::VersionBlock(block) => block.diagnostics(),
            ArchiveRecord::Arc(record) => record.diagnostics(),
            ArchiveRecord::Warc(record) => record.diagnostics(),
        }
    }

    fn is_compliant(&self) -> bool {
        match self {
            ArchiveRecord::VersionBlock(block) => block.is_compliant(),
            ArchiveRecord::Arc(record) => record.is_compliant(),
            ArchiveRecord::Warc(record) => record.is_compliant(),
        }
    }
}
