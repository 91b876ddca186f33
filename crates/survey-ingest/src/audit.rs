//! Offline consistency check for a survey log.

use std::collections::{BTreeMap, HashMap};

use survey_core::Source;

use crate::error::Result;
use crate::log::{AppendLog, ScanStats};

/// What one pass over the log found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditReport {
    /// Line counters from the scan.
    pub stats: ScanStats,

    /// Submission ids that appear on more than one line, with their count.
    pub duplicate_ids: BTreeMap<String, usize>,

    /// Records per source.
    pub by_source: BTreeMap<Source, usize>,

    /// Records per rating (1..=5).
    pub by_rating: BTreeMap<u8, usize>,
}

impl AuditReport {
    /// No skipped lines and no repeated ids.
    pub fn is_clean(&self) -> bool {
        self.stats.skipped == 0 && self.duplicate_ids.is_empty()
    }
}

/// Scan `log` once and summarize it.
pub fn audit(log: &AppendLog) -> Result<AuditReport> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut report = AuditReport::default();

    let mut scan = log.scan()?;
    for record in scan.by_ref() {
        let record = record?;
        *report.by_source.entry(record.source).or_default() += 1;
        *report.by_rating.entry(record.rating).or_default() += 1;
        *seen.entry(record.submission_id).or_default() += 1;
    }

    report.stats = scan.stats();
    report.duplicate_ids = seen.into_iter().filter(|(_, n)| *n > 1).collect();
    Ok(report)
}
