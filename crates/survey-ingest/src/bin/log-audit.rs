//! Audit a survey log for corrupt lines and repeated submission ids.
//!
//! # Usage
//!
//! ```bash
//! # Print a summary
//! log-audit --path data/survey.ndjson
//!
//! # Exit non-zero if anything looks wrong (for cron / CI)
//! log-audit --path data/survey.ndjson --strict
//! ```

use anyhow::{Context, Result, bail};
use clap::Parser;
use std::path::PathBuf;
use survey_ingest::{AppendLog, LogConfig, audit};

#[derive(Parser, Debug)]
#[command(name = "log-audit")]
#[command(about = "Check a survey NDJSON log for corruption and duplicate ids")]
struct Args {
    /// Path to the survey log
    #[arg(long, env = "SURVEY_DATA_PATH", default_value = "data/survey.ndjson")]
    path: PathBuf,

    /// Fail if any line is unparsable or any id repeats
    #[arg(long)]
    strict: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("warn").init();

    let args = Args::parse();

    println!("Auditing survey log at: {}", args.path.display());
    if !args.path.exists() {
        println!("  (file does not exist, treating as empty)");
    }

    let log = AppendLog::new(LogConfig {
        path: args.path.clone(),
        fsync: false,
    });
    let report = audit(&log).context("Failed to scan survey log")?;

    println!("  Lines:    {}", report.stats.lines);
    println!("  Records:  {}", report.stats.parsed);
    println!("  Skipped:  {}", report.stats.skipped);

    if !report.by_source.is_empty() {
        println!("  By source:");
        for (source, count) in &report.by_source {
            println!("    {:<10} {}", source.as_str(), count);
        }
    }

    if !report.by_rating.is_empty() {
        println!("  By rating:");
        for (rating, count) in &report.by_rating {
            println!("    {:<10} {}", rating, count);
        }
    }

    if report.duplicate_ids.is_empty() {
        println!("✓ No duplicate submission ids");
    } else {
        println!(
            "⚠ {} submission ids appear more than once:",
            report.duplicate_ids.len()
        );
        for (id, count) in &report.duplicate_ids {
            println!("    {} x{}", id, count);
        }
    }

    if args.strict && !report.is_clean() {
        bail!(
            "log failed audit: {} skipped lines, {} duplicate ids",
            report.stats.skipped,
            report.duplicate_ids.len()
        );
    }

    Ok(())
}
