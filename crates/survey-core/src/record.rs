//! The at-rest survey record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::hash::{digest, normalize_email};
use crate::submission::{Source, SurveySubmission};

/// One line of the survey log.
///
/// Carries digests of the email and age, never the plaintext values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub name: String,
    pub consent: bool,
    pub rating: u8,
    pub comments: Option<String>,
    #[serde(default)]
    pub source: Source,
    pub user_agent: Option<String>,

    /// SHA-256 of the normalized email.
    pub hashed_email: String,
    /// SHA-256 of the age's decimal string.
    pub hashed_age: String,
    /// Resolved idempotency key.
    pub submission_id: String,

    /// Server receive time, UTC.
    pub received_at: DateTime<Utc>,
    /// Resolved client address.
    pub ip: String,
}

/// Build the storable record for a validated submission.
///
/// Pure: no clock reads and no I/O, so callers control `now` and the key.
pub fn build_record(
    submission: &SurveySubmission,
    submission_id: &str,
    client_ip: &str,
    now: DateTime<Utc>,
) -> StoredRecord {
    StoredRecord {
        name: submission.name().to_string(),
        consent: submission.consent(),
        rating: submission.rating(),
        comments: submission.comments().map(str::to_string),
        source: submission.source(),
        user_agent: submission.user_agent().map(str::to_string),
        hashed_email: digest(&normalize_email(submission.email())),
        hashed_age: digest(&submission.age().to_string()),
        submission_id: submission_id.to_string(),
        received_at: now,
        ip: client_ip.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::submission::validate_submission;
    use chrono::TimeZone;
    use serde_json::{Value, json};

    fn submission() -> SurveySubmission {
        let payload = json!({
            "name": "Ana",
            "email": "Ana@Example.com",
            "age": 29,
            "consent": true,
            "rating": 4,
            "comments": "  thanks ",
            "source": "email",
            "user_agent": "curl/8.0"
        });
        validate_submission(payload.as_object().unwrap()).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 10, 12, 30).unwrap()
    }

    #[test]
    fn test_build_copies_pass_through_fields() {
        let record = build_record(&submission(), "key-1", "203.0.113.7", now());
        assert_eq!(record.name, "Ana");
        assert!(record.consent);
        assert_eq!(record.rating, 4);
        assert_eq!(record.comments.as_deref(), Some("thanks"));
        assert_eq!(record.source, Source::Email);
        assert_eq!(record.user_agent.as_deref(), Some("curl/8.0"));
        assert_eq!(record.submission_id, "key-1");
        assert_eq!(record.received_at, now());
        assert_eq!(record.ip, "203.0.113.7");
    }

    #[test]
    fn test_build_hashes_normalized_pii() {
        let record = build_record(&submission(), "key-1", "203.0.113.7", now());
        assert_eq!(record.hashed_email, digest("ana@example.com"));
        assert_eq!(
            record.hashed_email,
            "8e43ca37701228e74983efdbd0cff5c16b3b1e5d4e29a7c05626d4d25a018e11"
        );
        assert_eq!(record.hashed_age, digest("29"));
    }

    #[test]
    fn test_serialized_record_has_no_plaintext_pii() {
        let record = build_record(&submission(), "key-1", "203.0.113.7", now());
        let line = serde_json::to_string(&record).unwrap();
        assert!(!line.contains("Ana@Example.com"));
        assert!(!line.contains("ana@example.com"));
        assert!(!line.contains('@'));

        let value: Value = serde_json::from_str(&line).unwrap();
        let object = value.as_object().unwrap();
        assert!(!object.contains_key("email"));
        assert!(!object.contains_key("age"));
        assert!(object.values().all(|v| v != &json!(29) && v != &json!("29")));
    }

    #[test]
    fn test_serialized_field_set() {
        let record = build_record(&submission(), "key-1", "203.0.113.7", now());
        let value = serde_json::to_value(&record).unwrap();
        let mut keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            vec![
                "comments",
                "consent",
                "hashed_age",
                "hashed_email",
                "ip",
                "name",
                "rating",
                "received_at",
                "source",
                "submission_id",
                "user_agent",
            ]
        );
        assert_eq!(value["received_at"], "2024-03-15T10:12:30Z");
        assert_eq!(value["source"], "email");
    }

    #[test]
    fn test_record_json_round_trip() {
        let record = build_record(&submission(), "key-1", "203.0.113.7", now());
        let line = serde_json::to_string(&record).unwrap();
        let parsed: StoredRecord = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed, record);
    }
}
