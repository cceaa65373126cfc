//! Error types for the authentication pipeline and the host routes.
//!
//! `AuthError` is the verification taxonomy. It never reaches an HTTP client:
//! the request interceptor turns every variant into an anonymous request.
//! `ApiError` is what host handlers return; it maps to HTTP status codes via
//! the `IntoResponse` impl with intentionally generic messages.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Why a bearer token did not produce an authenticated principal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Token is not a well-formed compact JWT, or a required claim is unreadable.
    #[error("Malformed token")]
    MalformedToken,

    /// Header algorithm (or the JWK's declared algorithm) differs from the configured one.
    #[error("Token algorithm does not match the expected algorithm")]
    AlgorithmMismatch,

    /// No published key matches the token's key ID, even after a refresh.
    #[error("Unknown signing key")]
    UnknownKey,

    /// Signature does not verify with the resolved key.
    #[error("Invalid token signature")]
    InvalidSignature,

    /// `exp` is in the past.
    #[error("Token expired")]
    TokenExpired,

    /// `nbf` or `iat` is in the future beyond the allowed clock skew.
    #[error("Token not yet valid")]
    TokenNotYetValid,

    /// Verified claims carry no usable `sub`.
    #[error("Token has no subject")]
    MissingSubject,

    /// `iss` differs from the configured issuer.
    #[error("Token issuer is not trusted")]
    InvalidIssuer,

    /// Neither `aud` nor `client_id` matches the configured audience.
    #[error("Token audience is not accepted")]
    InvalidAudience,

    /// `token_use` differs from the configured token use.
    #[error("Token use is not accepted")]
    InvalidTokenUse,

    /// The JWKS endpoint could not be reached or returned an unusable document.
    #[error("Signing keys are unavailable")]
    KeySourceUnavailable,

    /// Unexpected fault while verifying (e.g. a published key incompatible with the algorithm).
    #[error("Internal verification error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Stable, low-cardinality label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::MalformedToken => "malformed_token",
            AuthError::AlgorithmMismatch => "algorithm_mismatch",
            AuthError::UnknownKey => "unknown_key",
            AuthError::InvalidSignature => "invalid_signature",
            AuthError::TokenExpired => "token_expired",
            AuthError::TokenNotYetValid => "token_not_yet_valid",
            AuthError::MissingSubject => "missing_subject",
            AuthError::InvalidIssuer => "invalid_issuer",
            AuthError::InvalidAudience => "invalid_audience",
            AuthError::InvalidTokenUse => "invalid_token_use",
            AuthError::KeySourceUnavailable => "key_source_unavailable",
            AuthError::Internal(_) => "internal",
        }
    }

    /// True when the failure can deny authentication to every caller, not just this token.
    pub fn is_degraded_trust(&self) -> bool {
        matches!(self, AuthError::KeySourceUnavailable)
    }
}

/// Errors returned by host route handlers.
///
/// Maps to HTTP status codes:
/// - Unauthenticated: 401 Unauthorized (with `WWW-Authenticate`)
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Authentication required")]
    Unauthenticated,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHENTICATED",
                "A valid bearer token is required",
            ),
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message: message.to_string(),
            },
        };

        let mut response = (status, Json(error_response)).into_response();
        response.headers_mut().insert(
            header::WWW_AUTHENTICATE,
            HeaderValue::from_static("Bearer realm=\"cognito\""),
        );

        response
    }
}
