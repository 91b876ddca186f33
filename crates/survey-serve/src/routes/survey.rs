//! Survey intake endpoint.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::Json;
use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::{ConnectInfo, FromRequestParts, State};
use axum::http::header::{CONTENT_TYPE, USER_AGENT};
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode};
use chrono::Utc;
use serde::Serialize;
use survey_ingest::{ClientContext, IntakeOutcome};

use crate::error::ApiError;
use crate::state::AppState;

/// Ambient client values taken from the request, never from the payload.
#[derive(Debug, Clone)]
pub struct ClientInfo(pub ClientContext);

impl<S: Send + Sync> FromRequestParts<S> for ClientInfo {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());

        let ip = forwarded_for(&parts.headers)
            .or(peer)
            .unwrap_or_else(|| "unknown".to_string());

        let user_agent = parts
            .headers
            .get(USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        Ok(Self(ClientContext { ip, user_agent }))
    }
}

/// First entry of `X-Forwarded-For`, if present and non-empty.
fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    let value = headers.get("x-forwarded-for")?.to_str().ok()?;
    let first = value.split(',').next()?.trim();
    (!first.is_empty()).then(|| first.to_string())
}

/// `application/json` or any `application/*+json`, parameters ignored.
fn is_json_content_type(headers: &HeaderMap) -> bool {
    let Some(value) = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()) else {
        return false;
    };
    let mime = value
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    mime == "application/json" || (mime.starts_with("application/") && mime.ends_with("+json"))
}

/// Successful intake response.
#[derive(Debug, Clone, Serialize)]
pub struct SubmitResponse {
    status: &'static str,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    duplicated: bool,
    submission_id: String,
}

impl From<IntakeOutcome> for SubmitResponse {
    fn from(outcome: IntakeOutcome) -> Self {
        let duplicated = outcome.is_duplicate();
        Self {
            status: "ok",
            duplicated,
            submission_id: outcome.submission_id().to_string(),
        }
    }
}

/// `POST /v1/survey`
///
/// Both created and duplicate outcomes return 201; duplicates carry
/// `"duplicated": true`.
pub async fn submit_survey(
    State(state): State<AppState>,
    ClientInfo(client): ClientInfo,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<(StatusCode, Json<SubmitResponse>), ApiError> {
    if !is_json_content_type(&headers) {
        return Err(ApiError::BadRequest("Body must be JSON".to_string()));
    }

    let body = body.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge
        } else {
            ApiError::BadRequest(rejection.body_text())
        }
    })?;

    // File append (and optional fsync) blocks; keep it off the async workers.
    let pipeline = state.pipeline.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        pipeline.submit_json(&body, &client, Utc::now())
    })
    .await
    .map_err(|e| ApiError::Internal(e.into()))??;

    Ok((StatusCode::CREATED, Json(outcome.into())))
}
