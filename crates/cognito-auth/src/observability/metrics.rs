//! Metrics definitions for the authentication pipeline.
//!
//! All metrics follow Prometheus naming conventions:
//! - `cognito_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `outcome`: 3 values (authenticated, anonymous, rejected)
//! - `error_kind`: bounded by `AuthError` variants
//! - `status`: 2 values (success, error)

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize Prometheus metrics recorder and return the handle
/// for serving metrics via HTTP.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if Prometheus recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        // JWKS fetches are bounded by connect + read timeouts (seconds, not minutes)
        .set_buckets_for_metric(
            Matcher::Prefix("cognito_jwks_refresh".to_string()),
            &[0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.000, 5.000],
        )
        .map_err(|e| format!("Failed to set JWKS refresh buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// Request authentication
// ============================================================================

/// Record the outcome of authenticating one request.
///
/// Metric: `cognito_auth_requests_total`
/// Labels: `outcome`
pub fn record_auth_outcome(outcome: &'static str) {
    counter!("cognito_auth_requests_total", "outcome" => outcome).increment(1);
}

/// Record a rejected token by error kind.
///
/// Metric: `cognito_auth_failures_total`
/// Labels: `error_kind`
pub fn record_auth_failure(error_kind: &'static str) {
    counter!("cognito_auth_failures_total", "error_kind" => error_kind).increment(1);
}

// ============================================================================
// JWKS
// ============================================================================

/// Record one JWKS fetch attempt.
///
/// Metric: `cognito_jwks_refresh_total`, `cognito_jwks_refresh_duration_seconds`
/// Labels: `status`
pub fn record_jwks_refresh(success: bool, duration: Duration) {
    let status = if success { "success" } else { "error" };

    histogram!("cognito_jwks_refresh_duration_seconds", "status" => status)
        .record(duration.as_secs_f64());

    counter!("cognito_jwks_refresh_total", "status" => status).increment(1);
}
