//! Prometheus metrics endpoint handler.
//!
//! # Security
//!
//! This endpoint is unauthenticated to allow Prometheus to scrape metrics.
//! No PII, tokens or key material are exposed. Only operational data with
//! bounded cardinality labels.

use axum::{extract::State, response::IntoResponse};
use metrics_exporter_prometheus::PrometheusHandle;

/// Handler for GET /metrics
///
/// Returns Prometheus-formatted metrics for scraping.
///
/// # Response
///
/// ```text
/// # TYPE cognito_auth_requests_total counter
/// cognito_auth_requests_total{outcome="authenticated"} 42
/// ```
#[tracing::instrument(skip_all, name = "cognito.metrics.scrape")]
pub async fn metrics_handler(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    handle.render()
}
