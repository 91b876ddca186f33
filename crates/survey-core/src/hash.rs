//! One-way digests and idempotency-key derivation.
//!
//! Digests are unsalted SHA-256 rendered as lowercase hex, so the same input
//! yields the same key in every process.
//!
//! Email addresses are normalized (trimmed, lower-cased) before every digest,
//! both for the idempotency key and for the stored `hashed_email`.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::submission::SurveySubmission;

/// Compute the SHA-256 hex digest of a string.
pub fn digest(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Trim and lower-case an email address.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// UTC hour bucket as `YYYYMMDDHH`.
pub fn hour_bucket(at: DateTime<Utc>) -> String {
    at.format("%Y%m%d%H").to_string()
}

/// Derive the idempotency key for `email` within the hour containing
/// `issued_at`.
pub fn derive_submission_id(email: &str, issued_at: DateTime<Utc>) -> String {
    let mut input = normalize_email(email);
    input.push_str(&hour_bucket(issued_at));
    digest(&input)
}

/// The key a submission is stored under: the client override when present,
/// otherwise the derived key.
pub fn resolve_submission_id(submission: &SurveySubmission, issued_at: DateTime<Utc>) -> String {
    match submission.submission_id() {
        Some(id) => id.to_string(),
        None => derive_submission_id(submission.email(), issued_at),
    }
}
