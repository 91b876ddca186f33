//! Survey Serve - HTTP intake for survey submissions
//!
//! This crate exposes the `survey-ingest` pipeline over HTTP. It owns only
//! transport concerns: content-type checks, body limits, client address and
//! user-agent extraction, and mapping intake outcomes to status codes.
//!
//! # Architecture
//!
//! - **Config**: Settings loaded from `SURVEY_*` environment variables
//! - **AppState**: Shared intake pipeline and configuration
//! - **Routes**: Liveness probes and `POST /v1/survey`

mod config;
mod error;
mod routes;
mod state;

pub use self::config::{Config, DEFAULT_BODY_LIMIT_BYTES};
pub use self::error::ApiError;
pub use self::routes::{ClientInfo, router};
pub use self::state::AppState;
