//! Prometheus metrics helpers for survey intake.
//!
//! # Usage
//!
//! ```rust,ignore
//! use survey_core::metrics::{init_metrics, start_metrics_server};
//!
//! let handle = init_metrics()?;
//! start_metrics_server(9091, handle).await?;
//!
//! metrics::counter!("intake_created_total").increment(1);
//! ```
//!
//! # Metric Naming Conventions
//!
//! - Prefix: component (`intake_`, `log_`, `dedupe_`)
//! - Suffix: unit or type (`_total` for counters)
//! - No labels carrying submission data; keys and digests stay out of metrics

use axum::{Router, routing::get};
use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;

/// Install the Prometheus recorder and register metric descriptions.
///
/// Fails if a recorder is already installed in this process.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    register_intake_metrics();
    Ok(handle)
}

/// Like [`init_metrics`] but returns `None` if the recorder is already
/// installed. Useful for tests.
pub fn try_init_metrics() -> Option<PrometheusHandle> {
    init_metrics().ok()
}

/// Serve `/metrics` on `port` from a background task.
///
/// The listener is bound before returning so a busy port fails startup.
pub async fn start_metrics_server(
    port: u16,
    handle: PrometheusHandle,
) -> Result<SocketAddr, std::io::Error> {
    let app = Router::new().route(
        "/metrics",
        get(move || {
            let handle = handle.clone();
            async move { handle.render() }
        }),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;
    tracing::info!("Metrics server listening on http://{}/metrics", local_addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "metrics server stopped");
        }
    });

    Ok(local_addr)
}

/// Register descriptions for every intake metric.
///
/// Called automatically by [`init_metrics`].
fn register_intake_metrics() {
    // =========================================================================
    // Intake Pipeline
    // =========================================================================

    describe_counter!(
        "intake_submissions_total",
        "Total submissions received by the intake pipeline"
    );
    describe_counter!(
        "intake_created_total",
        "Submissions durably appended to the survey log"
    );
    describe_counter!(
        "intake_duplicate_total",
        "Submissions short-circuited because their key was already logged"
    );
    describe_counter!(
        "intake_validation_failed_total",
        "Submissions rejected by field validation"
    );
    describe_counter!(
        "intake_malformed_total",
        "Requests whose body was not a JSON object"
    );
    describe_counter!(
        "intake_storage_errors_total",
        "Submissions that failed on log I/O"
    );

    // =========================================================================
    // Survey Log
    // =========================================================================

    describe_counter!(
        "log_lines_skipped_total",
        "Unparsable log lines skipped while scanning"
    );
    describe_gauge!(
        "dedupe_keys_indexed",
        "Submission ids held in the in-memory seen-key index"
    );
}
