//! Survey intake pipeline and append-only log.
//!
//! This crate turns validated survey submissions into durable, de-duplicated
//! NDJSON records.
//!
//! # Modules
//!
//! - [`log`] - Append-only NDJSON log with lazy, corruption-tolerant scans
//! - [`dedupe`] - Duplicate detection (linear scan or seen-key index)
//! - [`pipeline`] - Validate, key, dedupe, and append in one serialized step
//! - [`audit`] - Offline duplicate and corruption report for a log
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  Request body   │  (JSON object from the HTTP layer)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ validate + key  │  survey-core: field rules, SHA-256 submission id
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │DuplicateChecker │  seen-key index or full log scan
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │    AppendLog    │  one line per record, flushed and synced
//! └─────────────────┘
//! ```
//!
//! The log is the source of truth: the seen-key index is rebuilt from it at
//! startup, so duplicates are detected across restarts.

pub mod audit;
pub mod dedupe;
pub mod error;
pub mod log;
pub mod pipeline;

// Re-export commonly used types at crate root
pub use error::{Error, Result};

pub use audit::{AuditReport, audit};
pub use dedupe::{DedupeMode, DuplicateChecker, LogScanChecker, SeenKeyIndex};
pub use log::{AppendLog, LogConfig, LogScan, ScanStats};
pub use pipeline::{ClientContext, IntakeError, IntakeOutcome, IntakePipeline, PipelineConfig};
