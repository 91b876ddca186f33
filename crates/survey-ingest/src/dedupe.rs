//! Duplicate detection by submission id.
//!
//! Two checkers implement [`DuplicateChecker`]:
//!
//! - [`LogScanChecker`] - scans the whole log on every check. O(n) per
//!   check, no memory beyond one line.
//! - [`SeenKeyIndex`] - an in-memory set of ids, rebuilt by one pass over
//!   the log at startup and updated after each append. O(1) per check.
//!
//! Both see duplicates written by earlier processes, because both read the
//! log itself. Both treat a missing log as empty and skip corrupt lines.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use tracing::info;

use crate::error::{Error, Result};
use crate::log::AppendLog;

/// The only field duplicate detection needs from a log line.
#[derive(Deserialize)]
struct KeyLine {
    submission_id: String,
}

/// Answers "is this key already in the log?".
///
/// Implementations are not internally synchronized; the pipeline holds one
/// lock across `exists` and the following append.
pub trait DuplicateChecker: Send {
    /// Human-readable name (used in logs).
    fn name(&self) -> &'static str;

    /// Whether any record in `log` carries `key`.
    fn exists(&self, log: &AppendLog, key: &str) -> Result<bool>;

    /// Note that `key` was just appended to the log.
    fn observe(&mut self, key: &str);
}

/// Linear scan over the log for every check.
#[derive(Debug, Default)]
pub struct LogScanChecker;

impl DuplicateChecker for LogScanChecker {
    fn name(&self) -> &'static str {
        "scan"
    }

    fn exists(&self, log: &AppendLog, key: &str) -> Result<bool> {
        for line in log.scan_as::<KeyLine>()? {
            if line?.submission_id == key {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn observe(&mut self, _key: &str) {}
}

/// In-memory set of every submission id in the log.
#[derive(Debug, Default)]
pub struct SeenKeyIndex {
    keys: HashSet<String>,
}

impl SeenKeyIndex {
    /// Build the index with one pass over `log`.
    pub fn rebuild(log: &AppendLog) -> Result<Self> {
        let mut keys = HashSet::new();
        let mut scan = log.scan_as::<KeyLine>()?;
        for line in scan.by_ref() {
            keys.insert(line?.submission_id);
        }

        let stats = scan.stats();
        info!(
            path = %log.path().display(),
            keys = keys.len(),
            lines = stats.lines,
            skipped = stats.skipped,
            "seen-key index rebuilt"
        );
        metrics::gauge!("dedupe_keys_indexed").set(keys.len() as f64);

        Ok(Self { keys })
    }

    /// Number of distinct ids indexed.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }
}

impl DuplicateChecker for SeenKeyIndex {
    fn name(&self) -> &'static str {
        "index"
    }

    fn exists(&self, _log: &AppendLog, key: &str) -> Result<bool> {
        Ok(self.contains(key))
    }

    fn observe(&mut self, key: &str) {
        if self.keys.insert(key.to_string()) {
            metrics::gauge!("dedupe_keys_indexed").set(self.keys.len() as f64);
        }
    }
}

/// Which checker the pipeline uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DedupeMode {
    /// [`SeenKeyIndex`].
    #[default]
    Index,
    /// [`LogScanChecker`].
    Scan,
}

impl DedupeMode {
    /// Construct the checker for this mode against `log`.
    pub fn open(self, log: &AppendLog) -> Result<Box<dyn DuplicateChecker>> {
        Ok(match self {
            Self::Index => Box::new(SeenKeyIndex::rebuild(log)?),
            Self::Scan => Box::new(LogScanChecker),
        })
    }
}

impl FromStr for DedupeMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "index" => Ok(Self::Index),
            "scan" => Ok(Self::Scan),
            other => Err(Error::Config(format!(
                "unknown dedupe mode '{other}'. Valid options: index, scan"
            ))),
        }
    }
}

impl fmt::Display for DedupeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Index => "index",
            Self::Scan => "scan",
        })
    }
}
