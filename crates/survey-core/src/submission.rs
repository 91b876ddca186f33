//! Inbound survey submissions and their validation.
//!
//! A [`SurveySubmission`] can only be obtained through [`validate_submission`]
//! (or the parsing helpers built on it), so every value of the type has
//! already passed the field constraints below:
//!
//! | Field           | Constraint                                              |
//! |-----------------|---------------------------------------------------------|
//! | `name`          | required string, not blank, at most 100 characters      |
//! | `email`         | required string, address syntax, surrounding space cut  |
//! | `age`           | required integer in 13..=120                            |
//! | `consent`       | required, literally `true`                              |
//! | `rating`        | required integer in 1..=5                               |
//! | `comments`      | optional string, trimmed, at most 1000 characters       |
//! | `source`        | optional tag from [`Source`], defaults to `other`       |
//! | `user_agent`    | optional string                                         |
//! | `submission_id` | optional string, blank treated as absent                |
//!
//! Unknown payload keys are ignored. Every invalid field is reported, not
//! just the first.

use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::{AGE_RANGE, COMMENTS_MAX_CHARS, NAME_MAX_CHARS, RATING_RANGE};

/// Address syntax: dot-atom local part, one `@`, and a dotted domain of
/// hostname labels.
static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[A-Za-z0-9!#$%&'*+/=?^_`{|}~.-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$",
    )
    .expect("email regex should compile")
});

const EMAIL_MAX_LEN: usize = 254;
const EMAIL_LOCAL_MAX_LEN: usize = 64;

// =============================================================================
// Source tag
// =============================================================================

/// Where the respondent found the survey.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Homepage,
    Email,
    Qr,
    /// Catch-all used when the payload carries no tag.
    #[default]
    Other,
}

impl Source {
    /// Every accepted tag, in display order.
    pub const ALL: [Source; 4] = [Self::Homepage, Self::Email, Self::Qr, Self::Other];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Homepage => "homepage",
            Self::Email => "email",
            Self::Qr => "qr",
            Self::Other => "other",
        }
    }
}

impl FromStr for Source {
    type Err = FieldError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|source| source.as_str() == s)
            .ok_or_else(|| {
                let allowed: Vec<&str> = Self::ALL.iter().map(|s| s.as_str()).collect();
                FieldError::new("source", format!("must be one of: {}", allowed.join(", ")))
            })
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Validation failures
// =============================================================================

/// A single invalid field and why it was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Payload key the failure applies to.
    pub field: String,
    /// Human-readable reason.
    pub reason: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

/// Every field error found in one payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Find the error reported for `field`, if any.
    pub fn field(&self, field: &str) -> Option<&FieldError> {
        self.0.iter().find(|e| e.field == field)
    }

    pub fn into_inner(self) -> Vec<FieldError> {
        self.0
    }
}

impl From<Vec<FieldError>> for ValidationErrors {
    fn from(errors: Vec<FieldError>) -> Self {
        Self(errors)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

// =============================================================================
// Submission
// =============================================================================

/// A survey submission that has passed validation.
#[derive(Clone, PartialEq, Eq)]
pub struct SurveySubmission {
    name: String,
    email: String,
    age: u8,
    consent: bool,
    rating: u8,
    comments: Option<String>,
    source: Source,
    user_agent: Option<String>,
    submission_id: Option<String>,
}

impl SurveySubmission {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Email as submitted, minus surrounding whitespace. Not case-folded.
    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn age(&self) -> u8 {
        self.age
    }

    pub fn consent(&self) -> bool {
        self.consent
    }

    pub fn rating(&self) -> u8 {
        self.rating
    }

    pub fn comments(&self) -> Option<&str> {
        self.comments.as_deref()
    }

    pub fn source(&self) -> Source {
        self.source
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }

    /// Client-supplied idempotency key override.
    pub fn submission_id(&self) -> Option<&str> {
        self.submission_id.as_deref()
    }

    /// Fill `user_agent` from request headers when the payload left it out.
    pub fn with_user_agent_fallback(mut self, user_agent: Option<&str>) -> Self {
        if self.user_agent.is_none() {
            self.user_agent = user_agent.map(str::to_string);
        }
        self
    }
}

// Plaintext PII stays out of logs even when a submission is debug-printed.
impl fmt::Debug for SurveySubmission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SurveySubmission")
            .field("name", &self.name)
            .field("email", &"<redacted>")
            .field("age", &"<redacted>")
            .field("consent", &self.consent)
            .field("rating", &self.rating)
            .field("comments", &self.comments)
            .field("source", &self.source)
            .field("user_agent", &self.user_agent)
            .field("submission_id", &self.submission_id)
            .finish()
    }
}

/// Parse a raw request body into a validated submission.
///
/// # Errors
///
/// - [`Error::Malformed`] if the body is not JSON or not a JSON object
/// - [`Error::Validation`] with every failing field otherwise
pub fn parse_submission(body: &[u8]) -> Result<SurveySubmission> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| Error::Malformed(format!("Invalid JSON: {e}")))?;
    submission_from_value(&value)
}

/// Validate an already-parsed JSON value.
pub fn submission_from_value(value: &Value) -> Result<SurveySubmission> {
    let Value::Object(payload) = value else {
        return Err(Error::Malformed(
            "request body must be a JSON object".to_string(),
        ));
    };
    Ok(validate_submission(payload)?)
}

/// Validate an untrusted key-value payload.
pub fn validate_submission(
    payload: &Map<String, Value>,
) -> std::result::Result<SurveySubmission, ValidationErrors> {
    let mut errors = Vec::new();

    let name = keep(validate_name(payload.get("name")), &mut errors);
    let email = keep(validate_email(payload.get("email")), &mut errors);
    let age = keep(validate_int("age", payload.get("age"), &AGE_RANGE), &mut errors);
    let consent = keep(validate_consent(payload.get("consent")), &mut errors);
    let rating = keep(
        validate_int("rating", payload.get("rating"), &RATING_RANGE),
        &mut errors,
    );
    let comments = keep(validate_comments(payload.get("comments")), &mut errors);
    let source = keep(validate_source(payload.get("source")), &mut errors);
    let user_agent = keep(
        optional_string("user_agent", payload.get("user_agent")),
        &mut errors,
    );
    let submission_id = keep(
        optional_string("submission_id", payload.get("submission_id")),
        &mut errors,
    );

    let (
        Some(name),
        Some(email),
        Some(age),
        Some(_),
        Some(rating),
        Some(comments),
        Some(source),
        Some(user_agent),
        Some(submission_id),
    ) = (
        name,
        email,
        age,
        consent,
        rating,
        comments,
        source,
        user_agent,
        submission_id,
    )
    else {
        return Err(ValidationErrors(errors));
    };

    Ok(SurveySubmission {
        name,
        email,
        age,
        consent: true,
        rating,
        comments,
        source,
        user_agent,
        submission_id: submission_id.filter(|id| !id.trim().is_empty()),
    })
}

fn keep<T>(result: std::result::Result<T, FieldError>, errors: &mut Vec<FieldError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(error) => {
            errors.push(error);
            None
        }
    }
}

fn required<'a>(
    field: &str,
    value: Option<&'a Value>,
) -> std::result::Result<&'a Value, FieldError> {
    match value {
        None | Some(Value::Null) => Err(FieldError::new(field, "field required")),
        Some(value) => Ok(value),
    }
}

fn string<'a>(field: &str, value: &'a Value) -> std::result::Result<&'a str, FieldError> {
    value
        .as_str()
        .ok_or_else(|| FieldError::new(field, "must be a string"))
}

fn validate_name(value: Option<&Value>) -> std::result::Result<String, FieldError> {
    let name = string("name", required("name", value)?)?;
    if name.trim().is_empty() {
        return Err(FieldError::new("name", "must not be blank"));
    }
    if name.chars().count() > NAME_MAX_CHARS {
        return Err(FieldError::new(
            "name",
            format!("must be at most {NAME_MAX_CHARS} characters"),
        ));
    }
    Ok(name.to_string())
}

fn validate_email(value: Option<&Value>) -> std::result::Result<String, FieldError> {
    let email = string("email", required("email", value)?)?.trim();
    if !is_valid_email(email) {
        return Err(FieldError::new("email", "value is not a valid email address"));
    }
    Ok(email.to_string())
}

fn is_valid_email(email: &str) -> bool {
    if email.len() > EMAIL_MAX_LEN {
        return false;
    }
    let Some((local, _)) = email.split_once('@') else {
        return false;
    };
    if local.len() > EMAIL_LOCAL_MAX_LEN
        || local.starts_with('.')
        || local.ends_with('.')
        || local.contains("..")
    {
        return false;
    }
    EMAIL_REGEX.is_match(email)
}

/// JSON integers only: strings, floats and booleans are rejected.
fn validate_int(
    field: &str,
    value: Option<&Value>,
    range: &RangeInclusive<i64>,
) -> std::result::Result<u8, FieldError> {
    let out_of_range = || {
        FieldError::new(
            field,
            format!("must be between {} and {}", range.start(), range.end()),
        )
    };

    let Value::Number(number) = required(field, value)? else {
        return Err(FieldError::new(field, "must be an integer"));
    };

    match number.as_i64() {
        Some(n) if range.contains(&n) => u8::try_from(n).map_err(|_| out_of_range()),
        Some(_) => Err(out_of_range()),
        None if number.is_u64() => Err(out_of_range()),
        None => Err(FieldError::new(field, "must be an integer")),
    }
}

fn validate_consent(value: Option<&Value>) -> std::result::Result<(), FieldError> {
    match value {
        Some(Value::Bool(true)) => Ok(()),
        Some(Value::Bool(false)) => Err(FieldError::new("consent", "consent must be true")),
        None | Some(Value::Null) => Err(FieldError::new(
            "consent",
            "consent is required and must be true",
        )),
        Some(_) => Err(FieldError::new(
            "consent",
            "consent must be the boolean true",
        )),
    }
}

fn validate_comments(value: Option<&Value>) -> std::result::Result<Option<String>, FieldError> {
    let Some(comments) = optional_string("comments", value)? else {
        return Ok(None);
    };
    let trimmed = comments.trim();
    if trimmed.chars().count() > COMMENTS_MAX_CHARS {
        return Err(FieldError::new(
            "comments",
            format!("must be at most {COMMENTS_MAX_CHARS} characters"),
        ));
    }
    Ok(Some(trimmed.to_string()))
}

fn validate_source(value: Option<&Value>) -> std::result::Result<Source, FieldError> {
    match optional_string("source", value)? {
        Some(tag) => tag.parse(),
        None => Ok(Source::default()),
    }
}

fn optional_string(
    field: &str,
    value: Option<&Value>,
) -> std::result::Result<Option<String>, FieldError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(value) => string(field, value).map(|s| Some(s.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_payload() -> Value {
        json!({
            "name": "Ana",
            "email": "Ana@Example.com",
            "age": 29,
            "consent": true,
            "rating": 4
        })
    }

    fn validate(value: Value) -> std::result::Result<SurveySubmission, ValidationErrors> {
        validate_submission(value.as_object().unwrap())
    }

    fn with(field: &str, value: Value) -> Value {
        let mut payload = valid_payload();
        payload[field] = value;
        payload
    }

    fn without(field: &str) -> Value {
        let mut payload = valid_payload();
        payload.as_object_mut().unwrap().remove(field);
        payload
    }

    fn single_error(value: Value) -> FieldError {
        let errors = validate(value).unwrap_err();
        assert_eq!(errors.len(), 1, "expected one error, got {errors}");
        errors.into_inner().remove(0)
    }

    // =========================================================================
    // Accepted payloads
    // =========================================================================

    #[test]
    fn test_minimal_payload_accepted() {
        let sub = validate(valid_payload()).unwrap();
        assert_eq!(sub.name(), "Ana");
        assert_eq!(sub.email(), "Ana@Example.com");
        assert_eq!(sub.age(), 29);
        assert!(sub.consent());
        assert_eq!(sub.rating(), 4);
        assert_eq!(sub.comments(), None);
        assert_eq!(sub.source(), Source::Other);
        assert_eq!(sub.user_agent(), None);
        assert_eq!(sub.submission_id(), None);
    }

    #[test]
    fn test_optional_fields_accepted() {
        let mut payload = valid_payload();
        payload["comments"] = json!("  great survey \n");
        payload["source"] = json!("qr");
        payload["user_agent"] = json!("curl/8.0");
        payload["submission_id"] = json!("client-key-1");

        let sub = validate(payload).unwrap();
        assert_eq!(sub.comments(), Some("great survey"));
        assert_eq!(sub.source(), Source::Qr);
        assert_eq!(sub.user_agent(), Some("curl/8.0"));
        assert_eq!(sub.submission_id(), Some("client-key-1"));
    }

    #[test]
    fn test_null_optionals_treated_as_absent() {
        let mut payload = valid_payload();
        payload["comments"] = Value::Null;
        payload["source"] = Value::Null;
        payload["user_agent"] = Value::Null;

        let sub = validate(payload).unwrap();
        assert_eq!(sub.comments(), None);
        assert_eq!(sub.source(), Source::Other);
        assert_eq!(sub.user_agent(), None);
    }

    #[test]
    fn test_unknown_keys_ignored() {
        assert!(validate(with("favourite_colour", json!("teal"))).is_ok());
    }

    #[test]
    fn test_age_and_rating_bounds_inclusive() {
        for age in [13, 120] {
            assert!(validate(with("age", json!(age))).is_ok(), "age {age}");
        }
        for rating in [1, 5] {
            assert!(validate(with("rating", json!(rating))).is_ok(), "rating {rating}");
        }
    }

    #[test]
    fn test_email_surrounding_whitespace_trimmed() {
        let sub = validate(with("email", json!("  ana@example.com "))).unwrap();
        assert_eq!(sub.email(), "ana@example.com");
    }

    #[test]
    fn test_blank_submission_id_treated_as_absent() {
        for blank in ["", "   "] {
            let sub = validate(with("submission_id", json!(blank))).unwrap();
            assert_eq!(sub.submission_id(), None);
        }
    }

    // =========================================================================
    // Consent
    // =========================================================================

    #[test]
    fn test_consent_false_rejected() {
        let error = single_error(with("consent", json!(false)));
        assert_eq!(error.field, "consent");
        assert!(error.reason.contains("consent"));
    }

    #[test]
    fn test_consent_missing_rejected() {
        let error = single_error(without("consent"));
        assert_eq!(error.field, "consent");
        assert!(error.reason.contains("consent"));
    }

    #[test]
    fn test_consent_non_boolean_rejected() {
        for value in [json!("true"), json!(1), Value::Null] {
            let error = single_error(with("consent", value));
            assert_eq!(error.field, "consent");
        }
    }

    // =========================================================================
    // Rejected fields
    // =========================================================================

    #[test]
    fn test_age_out_of_range_mentions_range() {
        for age in [12, 121, 150, -1] {
            let error = single_error(with("age", json!(age)));
            assert_eq!(error.field, "age");
            assert!(error.reason.contains("13") && error.reason.contains("120"));
        }
    }

    #[test]
    fn test_age_huge_number_out_of_range() {
        let error = single_error(with("age", json!(u64::MAX)));
        assert_eq!(error.reason, "must be between 13 and 120");
    }

    #[test]
    fn test_age_must_be_integer() {
        for value in [json!("29"), json!(29.5), json!(true), json!([29])] {
            let error = single_error(with("age", value));
            assert_eq!(error.field, "age");
            assert_eq!(error.reason, "must be an integer");
        }
    }

    #[test]
    fn test_rating_out_of_range() {
        for rating in [0, 6] {
            let error = single_error(with("rating", json!(rating)));
            assert_eq!(error.field, "rating");
            assert_eq!(error.reason, "must be between 1 and 5");
        }
    }

    #[test]
    fn test_invalid_emails_rejected() {
        for email in [
            "",
            "plainaddress",
            "@example.com",
            "ana@",
            "ana@example",
            "ana@@example.com",
            "ana.@example.com",
            ".ana@example.com",
            "an..a@example.com",
            "ana@-example.com",
            "ana example@example.com",
        ] {
            let error = single_error(with("email", json!(email)));
            assert_eq!(error.field, "email", "email {email:?}");
        }
    }

    #[test]
    fn test_valid_email_shapes_accepted() {
        for email in ["a@b.co", "first.last+tag@sub.example.org", "x_y-z@mail-host.io"] {
            assert!(validate(with("email", json!(email))).is_ok(), "email {email:?}");
        }
    }

    #[test]
    fn test_name_constraints() {
        assert_eq!(single_error(with("name", json!(""))).reason, "must not be blank");
        assert_eq!(single_error(with("name", json!("   "))).reason, "must not be blank");
        assert_eq!(
            single_error(with("name", json!("x".repeat(101)))).reason,
            "must be at most 100 characters"
        );
        assert!(validate(with("name", json!("é".repeat(100)))).is_ok());
        assert_eq!(single_error(with("name", json!(42))).reason, "must be a string");
    }

    #[test]
    fn test_comments_length_checked_after_trim() {
        let padded = format!("  {}  ", "c".repeat(1000));
        let sub = validate(with("comments", json!(padded))).unwrap();
        assert_eq!(sub.comments().map(str::len), Some(1000));

        let error = single_error(with("comments", json!("c".repeat(1001))));
        assert_eq!(error.field, "comments");
    }

    #[test]
    fn test_unknown_source_rejected() {
        let error = single_error(with("source", json!("billboard")));
        assert_eq!(error.field, "source");
        assert_eq!(error.reason, "must be one of: homepage, email, qr, other");

        // Tags are case-sensitive.
        assert_eq!(single_error(with("source", json!("QR"))).field, "source");
    }

    #[test]
    fn test_wrong_typed_optionals_rejected() {
        assert_eq!(single_error(with("comments", json!(5))).field, "comments");
        assert_eq!(single_error(with("user_agent", json!({}))).field, "user_agent");
        assert_eq!(single_error(with("submission_id", json!(7))).field, "submission_id");
    }

    #[test]
    fn test_every_invalid_field_reported() {
        let errors = validate(json!({ "age": 150, "consent": false, "rating": "5" })).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["name", "email", "age", "consent", "rating"]);
        assert_eq!(errors.field("name").unwrap().reason, "field required");
    }

    // =========================================================================
    // Parsing
    // =========================================================================

    #[test]
    fn test_parse_submission_rejects_invalid_json() {
        let err = parse_submission(b"{\"name\": ").unwrap_err();
        assert!(matches!(err, Error::Malformed(_)));
    }

    #[test]
    fn test_parse_submission_rejects_non_object() {
        for body in [&b"[1,2]"[..], b"\"text\"", b"42", b"null"] {
            assert!(matches!(parse_submission(body), Err(Error::Malformed(_))));
        }
    }

    #[test]
    fn test_parse_submission_surfaces_validation() {
        let err = parse_submission(br#"{"name":"Ana"}"#).unwrap_err();
        let Error::Validation(errors) = err else {
            panic!("expected validation error");
        };
        assert_eq!(errors.len(), 4);
    }

    #[test]
    fn test_user_agent_fallback_only_fills_missing() {
        let sub = validate(valid_payload())
            .unwrap()
            .with_user_agent_fallback(Some("Mozilla/5.0"));
        assert_eq!(sub.user_agent(), Some("Mozilla/5.0"));

        let sub = validate(with("user_agent", json!("app/1.2")))
            .unwrap()
            .with_user_agent_fallback(Some("Mozilla/5.0"));
        assert_eq!(sub.user_agent(), Some("app/1.2"));
    }

    #[test]
    fn test_debug_redacts_pii() {
        let sub = validate(valid_payload()).unwrap();
        let debug = format!("{:?}", sub);
        assert!(!debug.contains("Ana@Example.com"));
        assert!(!debug.contains("29"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_source_serde_uses_lowercase_tags() {
        assert_eq!(serde_json::to_string(&Source::Homepage).unwrap(), "\"homepage\"");
        let parsed: Source = serde_json::from_str("\"email\"").unwrap();
        assert_eq!(parsed, Source::Email);
    }
}
