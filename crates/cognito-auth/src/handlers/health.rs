//! Health check handler.

use axum::Json;
use serde::Serialize;
use tracing::instrument;

/// Response for `/v1/health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always "healthy" while the process serves requests.
    pub status: String,
}

/// Liveness probe.
///
/// Does not touch the JWKS endpoint: an unreachable identity provider makes
/// requests anonymous, it does not make the service unhealthy.
#[instrument(skip_all, name = "cognito.health.check")]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_check_reports_healthy() {
        let Json(response) = health_check().await;
        assert_eq!(response.status, "healthy");

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json, serde_json::json!({"status": "healthy"}));
    }
}
