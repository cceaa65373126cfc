//! JWT primitives shared by the authentication pipeline.
//!
//! This module provides the pieces of JWT handling that do not depend on a
//! resolved signing key:
//! - Size limits for DoS prevention
//! - Clock skew constants for temporal claim validation
//! - Unverified header parsing (`alg`, `kid`) used to select a key
//! - `exp` / `nbf` / `iat` validation against an explicit `now`
//! - Token fingerprints, the only token-derived value that may be logged
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing
//! - The header is parsed only to locate the verification key; nothing in it is
//!   trusted until the signature has been verified
//! - Error messages are generic; details go to debug logs
//!
//! # Usage
//!
//! ```rust,ignore
//! use common::jwt::{parse_header, validate_expiry_at, DEFAULT_CLOCK_SKEW};
//!
//! let header = parse_header(token)?;
//! let key = key_source.get_key(&header.kid).await?;
//! // ... verify signature with `key` ...
//! validate_expiry_at(claims.exp, DEFAULT_CLOCK_SKEW, now)?;
//! ```

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use ring::digest::{digest, SHA256};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed JWT size in bytes (8KB).
///
/// Cognito ID tokens with a handful of groups and custom attributes are
/// typically 1-2KB. Anything above 8KB is rejected BEFORE base64 decoding or
/// any cryptographic work.
pub const MAX_JWT_SIZE_BYTES: usize = 8192; // 8KB

/// Default clock skew tolerance (1 minute).
///
/// Applied to `exp`, `nbf` and `iat` to absorb drift between the identity
/// provider and this host.
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(60);

/// Maximum allowed clock skew tolerance (10 minutes).
///
/// Larger values would let expired tokens live noticeably longer than the
/// provider intended.
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(600);

/// Number of hex characters kept from the token digest by [`token_fingerprint`].
const FINGERPRINT_HEX_LEN: usize = 12;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while inspecting a JWT before or after verification.
///
/// Note: Error messages are intentionally generic to prevent information leakage.
/// Detailed information is logged at debug level for troubleshooting.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtValidationError {
    /// Token size exceeds maximum allowed.
    #[error("The access token is invalid or expired")]
    TokenTooLarge,

    /// Token format is invalid (not a valid JWT structure).
    #[error("The access token is invalid or expired")]
    MalformedToken,

    /// Token header is missing the `kid` parameter.
    #[error("The access token is invalid or expired")]
    MissingKid,

    /// Token header is missing the `alg` parameter.
    #[error("The access token is invalid or expired")]
    MissingAlgorithm,

    /// Token `exp` claim is in the past.
    #[error("The access token is invalid or expired")]
    Expired,

    /// Token `nbf` or `iat` claim is too far in the future.
    #[error("The access token is invalid or expired")]
    NotYetValid,
}

// =============================================================================
// Header
// =============================================================================

/// Unverified JOSE header of a compact JWT.
///
/// Only the fields needed to select and check the verification key are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenHeader {
    /// Signature algorithm named by the token (e.g. `RS256`).
    pub alg: String,

    /// Key ID used to look up the verification key.
    pub kid: String,

    /// Optional media type (`JWT`).
    pub typ: Option<String>,
}

#[derive(Deserialize)]
struct RawHeader {
    #[serde(default)]
    alg: Option<serde_json::Value>,
    #[serde(default)]
    kid: Option<serde_json::Value>,
    #[serde(default)]
    typ: Option<serde_json::Value>,
}

// =============================================================================
// Functions
// =============================================================================

/// Parse the header of a compact JWT without verifying the signature.
///
/// # Security
///
/// - Token size is checked BEFORE any parsing
/// - This function does NOT validate the token signature
/// - The returned values may only be used to select a key and to compare the
///   algorithm against the configured one
///
/// # Errors
///
/// - `TokenTooLarge` - Token exceeds `MAX_JWT_SIZE_BYTES`
/// - `MalformedToken` - Not three non-empty segments, bad base64url, or invalid JSON
/// - `MissingAlgorithm` - Header has no string `alg`
/// - `MissingKid` - Header has no non-empty string `kid`
pub fn parse_header(token: &str) -> Result<TokenHeader, JwtValidationError> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtValidationError::TokenTooLarge);
    }

    // JWT format: header.payload.signature
    let mut parts = token.split('.');
    let (Some(header_part), Some(payload_part), Some(signature_part), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        tracing::debug!(
            target: "common.jwt",
            parts = token.split('.').count(),
            "Token rejected: invalid JWT format"
        );
        return Err(JwtValidationError::MalformedToken);
    };

    if header_part.is_empty() || payload_part.is_empty() || signature_part.is_empty() {
        tracing::debug!(target: "common.jwt", "Token rejected: empty JWT segment");
        return Err(JwtValidationError::MalformedToken);
    }

    let header_bytes = URL_SAFE_NO_PAD.decode(header_part).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to decode JWT header base64");
        JwtValidationError::MalformedToken
    })?;

    let raw: RawHeader = serde_json::from_slice(&header_bytes).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to parse JWT header JSON");
        JwtValidationError::MalformedToken
    })?;

    let alg = raw
        .alg
        .as_ref()
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .ok_or(JwtValidationError::MissingAlgorithm)?;

    // Empty kid values are rejected: they can never match a published key
    let kid = raw
        .kid
        .as_ref()
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .ok_or(JwtValidationError::MissingKid)?;

    let typ = raw.typ.as_ref().and_then(|v| v.as_str()).map(ToString::to_string);

    Ok(TokenHeader { alg, kid, typ })
}

/// Validate the `exp` claim against an explicit `now` (Unix epoch seconds).
///
/// The token is expired once `now` reaches `exp + clock_skew`.
///
/// # Errors
///
/// Returns `JwtValidationError::Expired` if the token has expired.
pub fn validate_expiry_at(
    exp: i64,
    clock_skew: Duration,
    now: i64,
) -> Result<(), JwtValidationError> {
    let deadline = exp.saturating_add(skew_secs(clock_skew));

    if deadline <= now {
        tracing::debug!(
            target: "common.jwt",
            exp = exp,
            now = now,
            clock_skew_secs = skew_secs(clock_skew),
            "Token rejected: expired"
        );
        return Err(JwtValidationError::Expired);
    }

    Ok(())
}

/// Validate a "not in the future" claim (`nbf` or `iat`) against an explicit `now`.
///
/// Values up to `now + clock_skew` are accepted.
///
/// # Errors
///
/// Returns `JwtValidationError::NotYetValid` if `value` is more than
/// `clock_skew` in the future.
pub fn validate_not_before_at(
    value: i64,
    clock_skew: Duration,
    now: i64,
) -> Result<(), JwtValidationError> {
    let max_allowed = now.saturating_add(skew_secs(clock_skew));

    if value > max_allowed {
        tracing::debug!(
            target: "common.jwt",
            value = value,
            now = now,
            max_allowed = max_allowed,
            "Token rejected: not valid yet"
        );
        return Err(JwtValidationError::NotYetValid);
    }

    Ok(())
}

/// Short, stable identifier for a token, safe to put in logs.
///
/// Returns the first 12 hex characters of the SHA-256 digest of the token.
/// The raw token must never be logged.
#[must_use]
pub fn token_fingerprint(token: &str) -> String {
    let hash = digest(&SHA256, token.as_bytes());
    let mut hex = hex::encode(hash.as_ref());
    hex.truncate(FINGERPRINT_HEX_LEN);
    hex
}

fn skew_secs(clock_skew: Duration) -> i64 {
    i64::try_from(clock_skew.as_secs()).unwrap_or(i64::MAX)
}

// =============================================================================
// Tests
// =============================================================================
