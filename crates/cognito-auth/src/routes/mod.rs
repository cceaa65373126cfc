//! HTTP routes for the host service.
//!
//! Every route sits behind the authentication middleware, which installs a
//! `SecurityContext` and always forwards. Handlers decide what an anonymous
//! request may do.

use crate::handlers;
use crate::middleware::auth::{authenticate_request, Authenticator};
use axum::{middleware::from_fn_with_state, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/v1/health` - Liveness probe (anonymous)
/// - `/v1/me` - Current principal (401 when anonymous)
/// - `/metrics` - Prometheus scrape endpoint, when a handle is given
/// - Authentication middleware on all of the above
/// - TraceLayer for request logging
/// - 30 second request timeout
pub fn build_routes(
    authenticator: Arc<Authenticator>,
    metrics_handle: Option<PrometheusHandle>,
) -> Router {
    let mut routes = Router::new()
        .route("/v1/health", get(handlers::health_check))
        .route("/v1/me", get(handlers::get_me));

    if let Some(handle) = metrics_handle {
        let metrics_routes = Router::new()
            .route("/metrics", get(handlers::metrics_handler))
            .with_state(handle);
        routes = routes.merge(metrics_routes);
    }

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer - Timeout the request
    // 2. TraceLayer - Log request details
    // 3. authenticate_request - Install the security context (innermost)
    routes
        .layer(from_fn_with_state(authenticator, authenticate_request))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
}
