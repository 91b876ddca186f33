//! Append-only NDJSON survey log.
//!
//! This module provides the [`AppendLog`] which stores one serialized
//! [`StoredRecord`] per line and replays them lazily with [`LogScan`].
//!
//! # File Format
//!
//! ```text
//! {"name":"Ana","consent":true,...,"submission_id":"9c5d..."}\n
//! {"name":"Bo","consent":true,...,"submission_id":"41ab..."}\n
//! ```
//!
//! # Durability
//!
//! Each append opens the file in append mode, writes the whole line with a
//! single `write_all`, flushes, and (by default) calls `sync_data` before
//! returning. If any of those steps fails, the file is truncated back to its
//! length before the append, so a failed append leaves no bytes behind.
//!
//! A crash mid-write can still leave a final line with no terminator. Scans
//! never yield such a line, even when it holds complete JSON, and the next
//! append truncates it away before writing. Only newline-terminated lines
//! count as records.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use survey_core::StoredRecord;
use tracing::{debug, error, info, warn};

use crate::error::Result;

/// Configuration for the survey log.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Path to the NDJSON file.
    /// Default: `data/survey.ndjson`
    pub path: PathBuf,

    /// Call `sync_data` after every append.
    /// Default: true
    pub fsync: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/survey.ndjson"),
            fsync: true,
        }
    }
}

/// Durable append-only record log.
///
/// Holds no open handle between calls. Appends are not serialized here;
/// callers that need check-then-append atomicity must hold their own lock
/// (see [`IntakePipeline`](crate::IntakePipeline)).
#[derive(Debug)]
pub struct AppendLog {
    config: LogConfig,
}

impl AppendLog {
    /// Create a log handle. The file and its parent directories are created
    /// lazily on first append.
    pub fn new(config: LogConfig) -> Self {
        info!(
            path = %config.path.display(),
            fsync = config.fsync,
            "survey log configured"
        );
        Self { config }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// Append one record as a single newline-terminated line.
    ///
    /// The write is flushed (and synced when configured) before returning.
    pub fn append(&self, record: &StoredRecord) -> Result<()> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        if let Some(parent) = self.config.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&self.config.path)?;

        let mut len = file.metadata()?.len();
        let intact = intact_len(&mut file, len)?;
        if intact < len {
            warn!(
                path = %self.config.path.display(),
                dropped_bytes = len - intact,
                "log ends with an unterminated line, truncating it before append"
            );
            file.set_len(intact)?;
            len = intact;
        }

        let fsync = self.config.fsync;
        write_or_rollback(&mut file, len, |file| {
            file.write_all(&line)?;
            file.flush()?;
            if fsync {
                file.sync_data()?;
            }
            Ok(())
        })
        .inspect_err(|e| {
            warn!(
                path = %self.config.path.display(),
                error = %e,
                "append failed"
            );
        })?;

        debug!(submission_id = %record.submission_id, bytes = line.len(), "record appended");
        Ok(())
    }

    /// Lazily replay every parsable record.
    ///
    /// A missing file yields an empty scan. Call again to restart.
    pub fn scan(&self) -> Result<LogScan<StoredRecord>> {
        self.scan_as()
    }

    /// Replay lines deserialized as `T`, skipping lines that do not parse.
    pub fn scan_as<T: DeserializeOwned>(&self) -> Result<LogScan<T>> {
        let reader = match File::open(&self.config.path) {
            Ok(file) => Some(BufReader::new(file)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };

        Ok(LogScan {
            reader,
            buf: Vec::with_capacity(1024),
            stats: ScanStats::default(),
            _record: PhantomData,
        })
    }
}

/// Length of the prefix of `file` that ends with its last `\n` (0 if none).
fn intact_len(file: &mut File, len: u64) -> io::Result<u64> {
    const CHUNK: u64 = 4096;

    let mut buf = [0u8; CHUNK as usize];
    let mut end = len;
    while end > 0 {
        let start = end.saturating_sub(CHUNK);
        let chunk = &mut buf[..(end - start) as usize];
        file.seek(SeekFrom::Start(start))?;
        file.read_exact(chunk)?;
        if let Some(pos) = chunk.iter().rposition(|&b| b == b'\n') {
            return Ok(start + pos as u64 + 1);
        }
        end = start;
    }
    Ok(0)
}

/// Run `write`; if it fails, truncate `file` back to `len`.
///
/// The write error is returned either way. A failed truncate is logged, since
/// it leaves a stray line that only the next append will clean up.
fn write_or_rollback<F>(file: &mut File, len: u64, write: F) -> io::Result<()>
where
    F: FnOnce(&mut File) -> io::Result<()>,
{
    let Err(e) = write(file) else {
        return Ok(());
    };
    if let Err(rollback) = file.set_len(len) {
        error!(error = %rollback, "failed to roll back partial append");
    }
    Err(e)
}

/// Counters for one pass over the log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    /// Lines read, including blank and skipped ones.
    pub lines: usize,

    /// Lines that deserialized successfully.
    pub parsed: usize,

    /// Non-blank lines that failed to deserialize.
    pub skipped: usize,
}

/// Lazy iterator over log lines.
///
/// Yields `Err` only for read failures on the file itself; unparsable lines
/// and an unterminated final line are counted in [`ScanStats::skipped`] and
/// never surface.
pub struct LogScan<T> {
    reader: Option<BufReader<File>>,
    buf: Vec<u8>,
    stats: ScanStats,
    _record: PhantomData<fn() -> T>,
}

impl<T> LogScan<T> {
    /// Counters for the lines consumed so far.
    pub fn stats(&self) -> ScanStats {
        self.stats
    }
}

impl<T: DeserializeOwned> Iterator for LogScan<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buf.clear();
            let read = match self.reader.as_mut() {
                Some(reader) => reader.read_until(b'\n', &mut self.buf),
                None => return None,
            };

            match read {
                Ok(0) => {
                    self.reader = None;
                    return None;
                }
                Ok(_) => {}
                Err(e) => {
                    self.reader = None;
                    return Some(Err(e.into()));
                }
            }

            self.stats.lines += 1;

            let terminated = self.buf.last() == Some(&b'\n');
            let line = self.buf.trim_ascii();
            if line.is_empty() {
                continue;
            }

            if !terminated {
                self.stats.skipped += 1;
                metrics::counter!("log_lines_skipped_total").increment(1);
                warn!(line = self.stats.lines, "skipping unterminated final log line");
                self.reader = None;
                return None;
            }

            match serde_json::from_slice::<T>(line) {
                Ok(record) => {
                    self.stats.parsed += 1;
                    return Some(Ok(record));
                }
                Err(e) => {
                    self.stats.skipped += 1;
                    metrics::counter!("log_lines_skipped_total").increment(1);
                    warn!(line = self.stats.lines, error = %e, "skipping unparsable log line");
                }
            }
        }
    }
}
