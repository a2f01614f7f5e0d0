use clap::{Parser, ValueEnum};
use harvest_archive::arc::{ArcReader, ArcReaderError, CompressedArcReader};
use harvest_archive::config::DEFAULT_MAX_HEADER_LINE;
use harvest_archive::digest::DigestAlgorithm;
use harvest_archive::gzip::{GzipEntry, GzipError, GzipReader};
use harvest_archive::warc::{CompressedWarcReader, WarcReader, WarcReaderError};
use harvest_archive::{ArchiveRecord, ReaderOptions, Validate};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};

/// `harvest-check` validates ARC, WARC and GZip web archive files
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the archive file
    path: PathBuf,

    /// Container format of the file
    #[arg(short, long, value_enum)]
    format: Format,

    /// Digest algorithm for record blocks and payloads
    /// Default: sha1
    #[arg(short, long, value_enum, default_value_t = DigestChoice::Sha1)]
    digest: DigestChoice,

    /// Maximum length of a header line, longer lines are cut and reported
    #[arg(long, default_value_t = DEFAULT_MAX_HEADER_LINE)]
    max_header_line: usize,

    /// Only log the summary, not every invalid record
    #[arg(short, long)]
    quiet: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Format {
    Arc,
    ArcGz,
    Warc,
    WarcGz,
    Gzip,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum DigestChoice {
    Sha1,
    Sha256,
    #[value(name = "none")]
    Disabled,
}

impl DigestChoice {
    fn algorithm(self) -> Option<DigestAlgorithm> {
        match self {
            DigestChoice::Sha1 => Some(DigestAlgorithm::Sha1),
            DigestChoice::Sha256 => Some(DigestAlgorithm::Sha256),
            DigestChoice::Disabled => None,
        }
    }
}

#[derive(thiserror::Error, Debug)]
enum CheckError {
    #[error("ARC error: {0}")]
    Arc(#[from] ArcReaderError),
    #[error("WARC error: {0}")]
    Warc(#[from] WarcReaderError),
    #[error("GZip error: {0}")]
    Gzip(#[from] GzipError),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("tracing setup failed: {0}")]
    Logging(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Counters of a scan
#[derive(Debug, Default)]
struct Report {
    records: usize,
    invalid_records: usize,
    members: usize,
    invalid_members: usize,
}

impl Report {
    fn is_clean(&self) -> bool {
        self.invalid_records == 0 && self.invalid_members == 0
    }

    fn record<R: Read>(&mut self, record: &mut ArchiveRecord<R>, quiet: bool) -> io::Result<()> {
        record.close()?;
        self.records += 1;
        if !record.is_valid() {
            self.invalid_records += 1;
            if !quiet {
                let problems: Vec<String> = record.diagnostics().iter().map(ToString::to_string).collect();
                warn!(
                    record = self.records,
                    kind = record.kind(),
                    offset = ?record.start_offset(),
                    compliant = record.is_compliant(),
                    "invalid record: {}",
                    problems.join(", ")
                );
            }
        }
        Ok(())
    }

    fn member(&mut self, entry: &GzipEntry, quiet: bool) {
        self.members += 1;
        if !entry.is_valid() {
            self.invalid_members += 1;
            if !quiet {
                warn!(member = entry.index(), offset = entry.offset(), errors = ?entry.errors(), "invalid gzip member");
            }
        }
    }

    fn members(&mut self, entries: Vec<GzipEntry>, quiet: bool) {
        for entry in &entries {
            self.member(entry, quiet);
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(err) = setup_logging() {
        eprintln!("{err}");
        return ExitCode::FAILURE;
    }

    info!("Checking {:?} as {:?}", args.path, args.format);
    match run(&args) {
        Ok(report) => {
            info!(
                records = report.records,
                invalid_records = report.invalid_records,
                members = report.members,
                invalid_members = report.invalid_members,
                "scan complete"
            );
            if report.is_clean() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(2)
            }
        }
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<Report, CheckError> {
    let input = BufReader::new(File::open(&args.path)?);
    let options = ReaderOptions::default()
        .with_block_digest(args.digest.algorithm())
        .with_payload_digest(args.digest.algorithm())
        .with_max_header_line(args.max_header_line);
    scan(input, args.format, options, args.quiet)
}

/// Reads every record or member of `input` and counts the invalid ones.
fn scan<R: BufRead>(input: R, format: Format, options: ReaderOptions, quiet: bool) -> Result<Report, CheckError> {
    let mut report = Report::default();
    match format {
        Format::Arc => {
            let mut reader = ArcReader::with_options(input, options);
            while let Some(mut record) = reader.next_record()? {
                report.record(&mut record, quiet)?;
            }
        }
        Format::ArcGz => {
            let mut reader = CompressedArcReader::with_options(input, options);
            while let Some(mut record) = reader.next_record()? {
                report.record(&mut record, quiet)?;
                report.members(reader.take_completed_members(), quiet);
            }
            report.members(reader.take_completed_members(), quiet);
        }
        Format::Warc => {
            let mut reader = WarcReader::with_options(input, options);
            while let Some(mut record) = reader.next_record()? {
                report.record(&mut record, quiet)?;
            }
        }
        Format::WarcGz => {
            let mut reader = CompressedWarcReader::with_options(input, options);
            while let Some(mut record) = reader.next_record()? {
                report.record(&mut record, quiet)?;
                report.members(reader.take_completed_members(), quiet);
            }
            report.members(reader.take_completed_members(), quiet);
        }
        Format::Gzip => {
            let mut reader = GzipReader::new(input);
            while let Some(member) = reader.next_member()? {
                let entry = member.finish()?;
                report.member(&entry, quiet);
            }
        }
    }
    Ok(report)
}

fn setup_logging() -> Result<(), CheckError> {
    use tracing_subscriber::FmtSubscriber;

    const DEFAULT_LOGGING: &str = "harvest_check=info,harvest_archive=info,warn";

    let rust_log = std::env::var("RUST_LOG")
        .ok()
        .and_then(|s| if s.is_empty() { None } else { Some(s) })
        .unwrap_or_else(|| DEFAULT_LOGGING.to_owned());

    tracing::subscriber::set_global_default(FmtSubscriber::builder().with_env_filter(rust_log).finish())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args() {
        let args = Args::try_parse_from(["harvest-check", "-f", "warc-gz", "--digest", "none", "-q", "a.warc.gz"]).unwrap();
        assert_eq!(args.format, Format::WarcGz);
        assert_eq!(args.digest.algorithm(), None);
        assert!(args.quiet);
        assert_eq!(args.max_header_line, DEFAULT_MAX_HEADER_LINE);

        // The format is never guessed
        assert!(Args::try_parse_from(["harvest-check", "a.warc"]).is_err());
    }

    #[test]
    fn test_scan_counts_every_member() {
        use harvest_archive::gzip::{GzipHeader, GzipWriter};

        let record = "WARC/1.0\r\nWARC-Type: resource\r\nWARC-Record-ID: <urn:uuid:1>\r\n\
                      WARC-Date: 2018-04-30T20:48:25Z\r\nContent-Type: text/plain\r\n\
                      Content-Length: 5\r\n\r\nhello\r\n\r\n";
        let mut writer = GzipWriter::new(Vec::new());
        writer.write_member(&GzipHeader::default(), record.as_bytes()).unwrap();
        let first_len = writer.position() as usize;
        writer.write_member(&GzipHeader::default(), b"\r\n".as_slice()).unwrap();
        writer.write_member(&GzipHeader::default(), record.as_bytes()).unwrap();
        let mut file = writer.into_inner().unwrap();
        // Corrupt the CRC32 of the first member
        file[first_len - 8] ^= 0xff;

        let report = scan(file.as_slice(), Format::WarcGz, ReaderOptions::default(), true).unwrap();
        assert_eq!(report.records, 2);
        assert_eq!(report.invalid_records, 0);
        assert_eq!(report.members, 3);
        assert_eq!(report.invalid_members, 1);
        assert!(!report.is_clean());

        let report = scan(file.as_slice(), Format::Gzip, ReaderOptions::default(), true).unwrap();
        assert_eq!(report.members, 3);
        assert_eq!(report.invalid_members, 1);
    }
}
