//! Current user handler.
//!
//! Returns information about the authenticated principal.

use crate::middleware::auth::Authenticated;
use axum::Json;
use serde::Serialize;
use tracing::instrument;

/// Response for `/v1/me` endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct MeResponse {
    /// Subject (`sub`).
    pub sub: String,

    /// Cognito user name, if the token carries one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Granted authorities, sorted.
    pub authorities: Vec<String>,

    /// Cognito token type (`id` or `access`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_use: Option<String>,

    /// Token expiration timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

/// Handler for GET /v1/me
///
/// Requires an authenticated principal; anonymous requests get 401.
///
/// ## Response
///
/// ```json
/// {
///   "sub": "8f2c1d7e-0000-4000-8000-000000000001",
///   "username": "alice",
///   "authorities": ["admin"],
///   "token_use": "access",
///   "exp": 1234567890
/// }
/// ```
#[instrument(skip_all, name = "cognito.handlers.me")]
pub async fn get_me(Authenticated(principal): Authenticated) -> Json<MeResponse> {
    tracing::debug!(target: "cognito.handlers.me", "Returning principal");

    Json(MeResponse {
        sub: principal.subject.clone(),
        username: principal.username.clone(),
        authorities: principal.authorities.iter().cloned().collect(),
        token_use: principal.claims.get_str("token_use").map(ToString::to_string),
        exp: principal.claims.get_numeric_date("exp"),
    })
}
