//! Core types, validation, and privacy hashing for survey intake.
//!
//! This crate provides:
//! - The inbound [`SurveySubmission`] model and its validator
//! - SHA-256 digests used for PII redaction and idempotency keys
//! - The at-rest [`StoredRecord`] and the pure transform that builds it
//! - Prometheus metrics helpers
//! - Shared error types
//!
//! Nothing in this crate performs I/O on the survey log; storage and
//! duplicate detection live in `survey-ingest`.

mod error;
mod hash;
pub mod metrics;
mod record;
mod submission;

// ═══════════════════════════════════════════════════════════════════════════
// Constants
// ═══════════════════════════════════════════════════════════════════════════

/// Maximum length of `name`, in characters.
pub const NAME_MAX_CHARS: usize = 100;

/// Maximum length of trimmed `comments`, in characters.
pub const COMMENTS_MAX_CHARS: usize = 1000;

/// Inclusive age range accepted by the validator.
pub const AGE_RANGE: std::ops::RangeInclusive<i64> = 13..=120;

/// Inclusive rating range accepted by the validator.
pub const RATING_RANGE: std::ops::RangeInclusive<i64> = 1..=5;

pub use error::{Error, Result};
pub use hash::{derive_submission_id, digest, hour_bucket, normalize_email, resolve_submission_id};
pub use record::{StoredRecord, build_record};
pub use submission::{
    FieldError, Source, SurveySubmission, ValidationErrors, parse_submission, submission_from_value,
    validate_submission,
};
