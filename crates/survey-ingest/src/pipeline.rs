//! The intake pipeline.
//!
//! ```text
//! body ─▶ validate ─▶ resolve key ─┬─▶ [lock] exists? ── yes ─▶ Duplicate
//!                                  │            │
//!                                  │            no
//!                                  │            ▼
//!                                  │   build record ─▶ append ─▶ observe ─▶ Created
//!                                  └─────────────────────────────────────── [unlock]
//! ```
//!
//! The duplicate check and the append run under one mutex, so two concurrent
//! submissions with the same key cannot both observe "not found".

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use survey_core::{
    SurveySubmission, ValidationErrors, build_record, parse_submission, resolve_submission_id,
    submission_from_value,
};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::dedupe::{DedupeMode, DuplicateChecker};
use crate::error::{Error, Result};
use crate::log::{AppendLog, LogConfig};

/// Ambient request values supplied by the hosting layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientContext {
    /// Resolved client address (forwarded-for first, else socket peer).
    pub ip: String,

    /// `User-Agent` header, used only when the payload has none.
    pub user_agent: Option<String>,
}

/// Successful intake results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntakeOutcome {
    /// A new record was durably appended.
    Created { submission_id: String },

    /// The key was already logged; nothing was written.
    Duplicate { submission_id: String },
}

impl IntakeOutcome {
    pub fn submission_id(&self) -> &str {
        match self {
            Self::Created { submission_id } | Self::Duplicate { submission_id } => submission_id,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate { .. })
    }
}

/// Failed intake results. None of these leave a record behind.
#[derive(Error, Debug)]
pub enum IntakeError {
    /// The body was not a JSON object.
    #[error("malformed request: {0}")]
    Malformed(String),

    /// One or more fields are invalid.
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    /// The log could not be read or written.
    #[error("storage error: {0}")]
    Storage(#[from] Error),
}

impl From<survey_core::Error> for IntakeError {
    fn from(err: survey_core::Error) -> Self {
        match err {
            survey_core::Error::Malformed(msg) => Self::Malformed(msg),
            survey_core::Error::Validation(errors) => Self::Validation(errors),
        }
    }
}

/// Configuration for the intake pipeline.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    /// Survey log settings.
    pub log: LogConfig,

    /// Duplicate detection strategy.
    pub dedupe: DedupeMode,
}

/// Validates submissions and appends them to the log at most once per key.
///
/// Thread-safe: share via `Arc<IntakePipeline>`.
pub struct IntakePipeline {
    log: AppendLog,
    writer: Mutex<Box<dyn DuplicateChecker>>,
}

impl IntakePipeline {
    /// Open the log and prepare the duplicate checker.
    ///
    /// In [`DedupeMode::Index`] this reads the whole log once.
    pub fn open(config: PipelineConfig) -> Result<Self> {
        let log = AppendLog::new(config.log);
        let checker = config.dedupe.open(&log)?;

        info!(
            path = %log.path().display(),
            dedupe = checker.name(),
            "intake pipeline ready"
        );

        Ok(Self {
            log,
            writer: Mutex::new(checker),
        })
    }

    /// The underlying log.
    pub fn log(&self) -> &AppendLog {
        &self.log
    }

    /// Handle a raw request body.
    pub fn submit_json(
        &self,
        body: &[u8],
        client: &ClientContext,
        now: DateTime<Utc>,
    ) -> std::result::Result<IntakeOutcome, IntakeError> {
        let result = parse_submission(body)
            .map_err(IntakeError::from)
            .and_then(|submission| self.accept(submission, client, now));
        record_result(&result);
        result
    }

    /// Handle an already-parsed JSON payload.
    pub fn submit(
        &self,
        payload: &Value,
        client: &ClientContext,
        now: DateTime<Utc>,
    ) -> std::result::Result<IntakeOutcome, IntakeError> {
        let result = submission_from_value(payload)
            .map_err(IntakeError::from)
            .and_then(|submission| self.accept(submission, client, now));
        record_result(&result);
        result
    }

    fn accept(
        &self,
        submission: SurveySubmission,
        client: &ClientContext,
        now: DateTime<Utc>,
    ) -> std::result::Result<IntakeOutcome, IntakeError> {
        let submission = submission.with_user_agent_fallback(client.user_agent.as_deref());
        let submission_id = resolve_submission_id(&submission, now);

        let mut checker = self.writer.lock();

        if checker.exists(&self.log, &submission_id)? {
            return Ok(IntakeOutcome::Duplicate { submission_id });
        }

        let record = build_record(&submission, &submission_id, &client.ip, now);
        self.log.append(&record)?;
        checker.observe(&submission_id);

        Ok(IntakeOutcome::Created { submission_id })
    }
}

fn record_result(result: &std::result::Result<IntakeOutcome, IntakeError>) {
    metrics::counter!("intake_submissions_total").increment(1);

    match result {
        Ok(IntakeOutcome::Created { submission_id }) => {
            metrics::counter!("intake_created_total").increment(1);
            debug!(%submission_id, "submission created");
        }
        Ok(IntakeOutcome::Duplicate { submission_id }) => {
            metrics::counter!("intake_duplicate_total").increment(1);
            debug!(%submission_id, "duplicate submission skipped");
        }
        Err(IntakeError::Malformed(msg)) => {
            metrics::counter!("intake_malformed_total").increment(1);
            debug!(reason = %msg, "malformed submission");
        }
        Err(IntakeError::Validation(errors)) => {
            metrics::counter!("intake_validation_failed_total").increment(1);
            let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
            debug!(?fields, "submission failed validation");
        }
        Err(IntakeError::Storage(e)) => {
            metrics::counter!("intake_storage_errors_total").increment(1);
            error!(error = %e, "failed to persist submission");
        }
    }
}
