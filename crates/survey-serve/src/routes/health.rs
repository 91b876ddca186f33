//! Liveness endpoints.

use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Public health check endpoint.
///
/// Use this for load balancer health probes. Does not touch the survey log.
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Ping response with the server clock.
#[derive(Debug, Clone, Serialize)]
pub struct PingResponse {
    message: &'static str,
    status: &'static str,
    utc_time: DateTime<Utc>,
}

pub async fn ping() -> Json<PingResponse> {
    Json(PingResponse {
        message: "API is alive",
        status: "ok",
        utc_time: Utc::now(),
    })
}
