//! API route definitions.

mod health;
mod survey;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};

use crate::state::AppState;

pub use self::survey::ClientInfo;

/// Build the complete API router.
///
/// # Route Structure
///
/// - `GET /health` - Health check
/// - `GET /ping` - Liveness with server time
/// - `POST /v1/survey` - Submit a survey response
pub fn router(state: AppState) -> Router {
    let body_limit = state.config.body_limit_bytes;

    let api_v1 = Router::new()
        .route("/survey", post(survey::submit_survey))
        .layer(DefaultBodyLimit::max(body_limit));

    Router::new()
        .route("/health", get(health::health_check))
        .route("/ping", get(health::ping))
        .nest("/v1", api_v1)
        .with_state(state)
}
