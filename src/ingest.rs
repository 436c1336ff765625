//! Reading NMEA log files into a trajectory table.
//!
//! Parsing is best-effort: a bad line is counted, logged and skipped, and
//! never stops the rest of the file from being read. A read that fails
//! partway (e.g. a gzip log cut off when the logger lost power) keeps the
//! fixes read so far. Only a missing directory or a file that cannot be
//! opened aborts a load.

use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::ops::AddAssign;
use std::path::{Path, PathBuf};

use crate::error::{Result, TripError};
use crate::filter::{self, Rejection};
use crate::nmea::{self, SentenceError};
use crate::trajectory::{Fix, MissingField, TrajectoryTable};

/// What happened to one line of input
#[derive(Debug, Clone, PartialEq)]
pub enum LineOutcome {
    Blank,
    Accepted(Fix),
    Malformed(SentenceError),
    Unsupported(String),
    Rejected(Rejection),
    Incomplete(MissingField),
}

/// Run one line through parser, filter and builder.
pub fn classify_line(line: &str) -> LineOutcome {
    if line.trim().is_empty() {
        return LineOutcome::Blank;
    }
    let candidate = match nmea::parse_sentence(line) {
        Ok(candidate) => candidate,
        Err(SentenceError::Unsupported(kind)) => return LineOutcome::Unsupported(kind),
        Err(e) => return LineOutcome::Malformed(e),
    };
    if let Err(rejection) = filter::screen(&candidate) {
        return LineOutcome::Rejected(rejection);
    }
    match Fix::from_candidate(&candidate) {
        Ok(fix) => LineOutcome::Accepted(fix),
        Err(missing) => LineOutcome::Incomplete(missing),
    }
}

/// Per-run line accounting, reported alongside the analysis
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseStats {
    pub files: usize,
    pub lines: usize,
    pub accepted: usize,
    pub malformed: usize,
    pub unsupported: usize,
    pub invalid_position: usize,
    pub no_fix: usize,
    pub missing_fields: usize,
    /// Files whose read stopped early on an I/O error
    pub read_errors: usize,
}

impl ParseStats {
    /// Non-blank lines that did not become a fix
    pub fn skipped(&self) -> usize {
        self.malformed + self.unsupported + self.invalid_position + self.no_fix + self.missing_fields
    }

    fn record(&mut self, outcome: &LineOutcome) {
        self.lines += 1;
        match outcome {
            LineOutcome::Blank => {}
            LineOutcome::Accepted(_) => self.accepted += 1,
            LineOutcome::Malformed(_) => self.malformed += 1,
            LineOutcome::Unsupported(_) => self.unsupported += 1,
            LineOutcome::Rejected(Rejection::InvalidPosition) => self.invalid_position += 1,
            LineOutcome::Rejected(Rejection::NoFix) => self.no_fix += 1,
            LineOutcome::Incomplete(_) => self.missing_fields += 1,
        }
    }
}

impl AddAssign for ParseStats {
    fn add_assign(&mut self, other: Self) {
        self.files += other.files;
        self.lines += other.lines;
        self.accepted += other.accepted;
        self.malformed += other.malformed;
        self.unsupported += other.unsupported;
        self.invalid_position += other.invalid_position;
        self.no_fix += other.no_fix;
        self.missing_fields += other.missing_fields;
        self.read_errors += other.read_errors;
    }
}

/// Fixes loaded from one or more files, in file then line order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadedLog {
    pub table: TrajectoryTable,
    pub stats: ParseStats,
}

/// Read newline-delimited sentences from `reader`.
///
/// `source` only labels diagnostics. Lines that are not valid UTF-8 count
/// as malformed. An I/O error stops the read and is counted in
/// [`ParseStats::read_errors`]; everything read before it is kept.
pub fn read_fixes<R: BufRead>(reader: R, source: &str) -> LoadedLog {
    let mut fixes = Vec::new();
    let mut stats = ParseStats::default();

    for (i, raw) in reader.split(b'\n').enumerate() {
        let line_no = i + 1;
        let raw = match raw {
            Ok(raw) => raw,
            Err(e) => {
                log::warn!(
                    "{}:{}: read failed, keeping {} fixes read before it: {}",
                    source,
                    line_no,
                    fixes.len(),
                    e
                );
                stats.read_errors += 1;
                break;
            }
        };
        let outcome = match std::str::from_utf8(&raw) {
            Ok(line) => classify_line(line),
            Err(e) => LineOutcome::Malformed(SentenceError::Malformed(format!("not UTF-8: {}", e))),
        };
        stats.record(&outcome);

        match outcome {
            LineOutcome::Accepted(fix) => fixes.push(fix),
            LineOutcome::Malformed(e) => log::warn!("{}:{}: skipped, {}", source, line_no, e),
            LineOutcome::Unsupported(kind) => {
                log::debug!("{}:{}: skipped unsupported {} sentence", source, line_no, kind)
            }
            LineOutcome::Rejected(reason) => log::debug!("{}:{}: rejected, {}", source, line_no, reason),
            LineOutcome::Incomplete(missing) => log::warn!("{}:{}: skipped, {}", source, line_no, missing),
            LineOutcome::Blank => {}
        }
    }

    LoadedLog {
        table: TrajectoryTable::new(fixes),
        stats,
    }
}

fn is_gzip(path: &Path) -> bool {
    path.extension().map(|e| e == "gz").unwrap_or(false)
}

/// Load one log file; `.gz` files are decompressed on the fly.
pub fn load_file(path: &Path) -> Result<LoadedLog> {
    let file = File::open(path).map_err(|e| TripError::io(path, e))?;
    let source = path.display().to_string();

    let mut log = if is_gzip(path) {
        read_fixes(BufReader::new(GzDecoder::new(file)), &source)
    } else {
        read_fixes(BufReader::new(file), &source)
    };
    log.stats.files = 1;

    log::info!(
        "{}: {} fixes from {} lines ({} skipped)",
        source,
        log.stats.accepted,
        log.stats.lines,
        log.stats.skipped()
    );
    Ok(log)
}

/// Load and concatenate several files. The result is not time-ordered.
pub fn load_files<P: AsRef<Path>>(paths: &[P]) -> Result<LoadedLog> {
    let mut combined = LoadedLog::default();
    for path in paths {
        let log = load_file(path.as_ref())?;
        combined.table.append(log.table);
        combined.stats += log.stats;
    }
    Ok(combined)
}

/// Regular files directly inside `dir`, sorted by path.
pub fn list_log_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| TripError::io(dir, e))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| TripError::io(dir, e))?;
        let path = entry.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// [`list_log_files`] followed by [`load_files`]
pub fn load_dir(dir: &Path) -> Result<LoadedLog> {
    let files = list_log_files(dir)?;
    if files.is_empty() {
        log::warn!("No log files found in {}", dir.display());
    }
    load_files(&files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const LOG: &str = "\
$GPRMC,120000,A,3500.000,N,09000.000,W,10.0,,131225,,,A
$GPGGA,120000,3500.000,N,09000.000,W,1,08,0.9,100.0,M,0.0,M,,

$GPRMC,120001,V,3500.000,N,09000.000,W,10.0,,131225,,,A
$GPRMC,120002,A,3500.000,N,09000.000,W,10.0,,131225,,,N
$GPRMC,120003,A,3500.000,N,09000.000,W,10.0,,131225,,,A*00
$GPRMC,120004,A,3500.000,N,09000.000,W,,,131225,,,A
this is not nmea
$GPRMC,120005,A,3500.100,N,09000.000,W,12.0,45.0,131225,2.0,E,D
";

    #[test]
    fn test_classify_line() {
        assert_eq!(classify_line("   "), LineOutcome::Blank);
        assert!(matches!(classify_line("$GPGSV,1,1,00"), LineOutcome::Unsupported(ref k) if k == "GPGSV"));
        assert!(matches!(classify_line("junk"), LineOutcome::Malformed(_)));
        assert!(matches!(
            classify_line("$GPRMC,,V,,,,,,,,,,N"),
            LineOutcome::Rejected(Rejection::InvalidPosition)
        ));
    }

    #[test]
    fn test_read_fixes_skips_and_counts() {
        let log = read_fixes(Cursor::new(LOG), "test");

        assert_eq!(log.table.len(), 2);
        assert_eq!(log.stats.lines, 9);
        assert_eq!(log.stats.accepted, 2);
        assert_eq!(log.stats.unsupported, 1);
        assert_eq!(log.stats.invalid_position, 1);
        assert_eq!(log.stats.no_fix, 1);
        assert_eq!(log.stats.malformed, 2);
        assert_eq!(log.stats.missing_fields, 1);
        assert_eq!(log.stats.skipped(), 6);
        assert_eq!(log.stats.read_errors, 0);

        let last = &log.table[1];
        assert_eq!(last.true_course, Some(45.0));
        assert_eq!(last.mode, Some(crate::nmea::ModeIndicator::Differential));
    }

    #[test]
    fn test_invalid_utf8_line_does_not_stop_reading() {
        let mut bytes = b"\xff\xfe garbage\n".to_vec();
        bytes.extend_from_slice(b"$GPRMC,120005,A,3500.100,N,09000.000,W,12.0,,131225,,\r\n");
        let log = read_fixes(Cursor::new(bytes), "bytes");

        assert_eq!(log.stats.malformed, 1);
        assert_eq!(log.table.len(), 1);
    }

    #[test]
    fn test_truncated_gzip_keeps_fixes_read_so_far() {
        use flate2::write::GzEncoder;
        use flate2::Compression;
        use std::io::Write;

        let mut text = String::new();
        for s in 0..200 {
            text += &format!(
                "$GPRMC,12{:02}{:02},A,3500.{:03},N,09000.000,W,10.0,,131225,,,A\n",
                s / 60,
                s % 60,
                s
            );
        }
        let mut gz = GzEncoder::new(Vec::new(), Compression::default());
        gz.write_all(text.as_bytes()).unwrap();
        let compressed = gz.finish().unwrap();

        let intact = read_fixes(BufReader::new(GzDecoder::new(&compressed[..])), "intact");
        assert_eq!(intact.stats.accepted, 200);
        assert_eq!(intact.stats.read_errors, 0);

        let cut = &compressed[..compressed.len() / 2];
        let log = read_fixes(BufReader::new(GzDecoder::new(cut)), "cut");
        assert_eq!(log.stats.read_errors, 1);
        assert!(log.stats.accepted < 200);
        assert_eq!(log.table.len(), log.stats.accepted);
    }

    #[test]
    fn test_stats_accumulate() {
        let mut total = ParseStats {
            files: 1,
            accepted: 3,
            ..Default::default()
        };
        total += ParseStats {
            files: 1,
            accepted: 2,
            malformed: 1,
            read_errors: 1,
            ..Default::default()
        };
        assert_eq!(total.files, 2);
        assert_eq!(total.accepted, 5);
        assert_eq!(total.skipped(), 1);
        assert_eq!(total.read_errors, 1);
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let err = list_log_files(Path::new("/definitely/not/a/real/dir")).unwrap_err();
        assert!(matches!(err, TripError::Io { .. }));
    }
}
