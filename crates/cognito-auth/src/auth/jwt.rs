//! JWT verification against the provider's published keys.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - The accepted algorithm is fixed by configuration; a token naming any
//!   other algorithm is rejected before a key is looked up
//! - No claim is interpreted before the signature has been verified
//! - Expiration, not-before and issued-at are validated with clock skew tolerance

use crate::auth::claims::VerifiedClaims;
use crate::auth::jwks::{KeySource, VerificationKey};
use crate::errors::AuthError;
use common::jwt::{
    parse_header, validate_expiry_at, validate_not_before_at, JwtValidationError,
    DEFAULT_CLOCK_SKEW,
};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, Validation};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// Cognito token type, carried in the `token_use` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenUse {
    /// ID token (`token_use: "id"`).
    Id,
    /// Access token (`token_use: "access"`).
    Access,
}

impl TokenUse {
    /// Claim value for this token type.
    pub fn as_str(self) -> &'static str {
        match self {
            TokenUse::Id => "id",
            TokenUse::Access => "access",
        }
    }
}

impl fmt::Display for TokenUse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenUse {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "id" => Ok(TokenUse::Id),
            "access" => Ok(TokenUse::Access),
            other => Err(format!("unknown token use '{other}'")),
        }
    }
}

/// Checks applied by [`TokenVerifier`].
#[derive(Debug, Clone)]
pub struct VerifierOptions {
    /// The only algorithm accepted in token headers.
    pub expected_algorithm: Algorithm,

    /// Clock skew tolerance for `exp`, `nbf` and `iat`.
    pub clock_skew: Duration,

    /// Required `iss`, if enforced.
    pub issuer: Option<String>,

    /// Required audience (`aud` entry or `client_id`), if enforced.
    pub audience: Option<String>,

    /// Required `token_use`, if enforced.
    pub token_use: Option<TokenUse>,
}

impl Default for VerifierOptions {
    fn default() -> Self {
        Self {
            expected_algorithm: Algorithm::RS256,
            clock_skew: DEFAULT_CLOCK_SKEW,
            issuer: None,
            audience: None,
            token_use: None,
        }
    }
}

/// JWT verifier backed by a [`KeySource`].
pub struct TokenVerifier {
    /// Source of verification keys.
    key_source: Arc<dyn KeySource>,

    options: VerifierOptions,
}

impl TokenVerifier {
    /// Create a new token verifier.
    ///
    /// # Arguments
    ///
    /// * `key_source` - Resolves keys by key ID (normally a `JwksClient`)
    /// * `options` - Expected algorithm, clock skew and optional claim checks
    pub fn new(key_source: Arc<dyn KeySource>, options: VerifierOptions) -> Self {
        Self {
            key_source,
            options,
        }
    }

    /// Verify a compact JWT against the current time.
    ///
    /// # Errors
    ///
    /// See [`TokenVerifier::verify_at`].
    pub async fn verify(&self, token: &str) -> Result<VerifiedClaims, AuthError> {
        self.verify_at(token, chrono::Utc::now().timestamp()).await
    }

    /// Verify a compact JWT as of `now` (Unix epoch seconds).
    ///
    /// # Security Checks
    ///
    /// 1. Size and structure check of the unverified header
    /// 2. Header algorithm must equal the configured algorithm
    /// 3. Key lookup by `kid` (one refresh on a miss)
    /// 4. Signature verification
    /// 5. `exp`, then `nbf` and `iat` with clock skew tolerance
    /// 6. `iss`, audience and `token_use` when configured
    ///
    /// # Errors
    ///
    /// Returns the `AuthError` of the first failing check.
    #[instrument(skip_all)]
    pub async fn verify_at(&self, token: &str, now: i64) -> Result<VerifiedClaims, AuthError> {
        // 1. Unverified header (includes size check via common::jwt)
        let header = parse_header(token).map_err(|e| {
            tracing::debug!(target: "cognito.auth.jwt", error = ?e, "Token header parsing failed");
            AuthError::MalformedToken
        })?;

        // 2. Algorithm is fixed by configuration, never taken from the token
        let expected = self.options.expected_algorithm;
        if Algorithm::from_str(&header.alg).ok() != Some(expected) {
            tracing::debug!(
                target: "cognito.auth.jwt",
                alg = %header.alg,
                expected = ?expected,
                "Token algorithm rejected"
            );
            return Err(AuthError::AlgorithmMismatch);
        }

        // 3. Resolve the verification key
        let key = self.key_source.get_key(&header.kid).await?;
        check_key_compatible(&key, expected)?;

        // 4. Verify signature; claims are not interpreted before this point
        let claims = verify_signature(token, &key, expected)?;

        // 5. Temporal claims
        self.check_temporal_claims(&claims, now)?;

        // 6. Provider-specific claims
        self.check_issuer(&claims)?;
        self.check_audience(&claims)?;
        self.check_token_use(&claims)?;

        tracing::debug!(target: "cognito.auth.jwt", kid = %header.kid, "Token verified successfully");
        Ok(claims)
    }

    fn check_temporal_claims(&self, claims: &VerifiedClaims, now: i64) -> Result<(), AuthError> {
        let skew = self.options.clock_skew;

        let exp = claims.get_numeric_date("exp").ok_or_else(|| {
            tracing::debug!(target: "cognito.auth.jwt", "Token has no numeric exp claim");
            AuthError::MalformedToken
        })?;
        validate_expiry_at(exp, skew, now).map_err(temporal_error)?;

        // Both optional, but must be numeric when present
        for name in ["nbf", "iat"] {
            if claims.get(name).is_none() {
                continue;
            }
            let value = claims.get_numeric_date(name).ok_or_else(|| {
                tracing::debug!(target: "cognito.auth.jwt", claim = name, "Non-numeric date claim");
                AuthError::MalformedToken
            })?;
            validate_not_before_at(value, skew, now).map_err(temporal_error)?;
        }

        Ok(())
    }

    fn check_issuer(&self, claims: &VerifiedClaims) -> Result<(), AuthError> {
        let Some(expected) = &self.options.issuer else {
            return Ok(());
        };

        if claims.get_str("iss") == Some(expected.as_str()) {
            Ok(())
        } else {
            tracing::debug!(target: "cognito.auth.jwt", iss = ?claims.get_str("iss"), "Token issuer mismatch");
            Err(AuthError::InvalidIssuer)
        }
    }

    fn check_audience(&self, claims: &VerifiedClaims) -> Result<(), AuthError> {
        let Some(expected) = &self.options.audience else {
            return Ok(());
        };

        // ID tokens carry `aud`; Cognito access tokens carry `client_id` instead
        let aud_matches = match claims.get("aud") {
            Some(Value::String(aud)) => aud == expected,
            Some(Value::Array(auds)) => auds.iter().any(|aud| aud.as_str() == Some(expected.as_str())),
            _ => false,
        };

        if aud_matches || claims.get_str("client_id") == Some(expected.as_str()) {
            Ok(())
        } else {
            tracing::debug!(target: "cognito.auth.jwt", "Token audience mismatch");
            Err(AuthError::InvalidAudience)
        }
    }

    fn check_token_use(&self, claims: &VerifiedClaims) -> Result<(), AuthError> {
        let Some(expected) = self.options.token_use else {
            return Ok(());
        };

        if claims.get_str("token_use") == Some(expected.as_str()) {
            Ok(())
        } else {
            tracing::debug!(
                target: "cognito.auth.jwt",
                token_use = ?claims.get_str("token_use"),
                expected = %expected,
                "Token use mismatch"
            );
            Err(AuthError::InvalidTokenUse)
        }
    }
}

/// Reject keys whose declared algorithm or key type cannot verify `expected`.
fn check_key_compatible(key: &VerificationKey, expected: Algorithm) -> Result<(), AuthError> {
    if let Some(alg) = key.algorithm {
        if alg != expected {
            tracing::warn!(
                target: "cognito.auth.jwt",
                kid = %key.kid,
                jwk_alg = ?alg,
                expected = ?expected,
                "JWK algorithm does not match the expected algorithm"
            );
            return Err(AuthError::AlgorithmMismatch);
        }
    }

    let family_key_type = match expected {
        Algorithm::RS256
        | Algorithm::RS384
        | Algorithm::RS512
        | Algorithm::PS256
        | Algorithm::PS384
        | Algorithm::PS512 => "RSA",
        Algorithm::ES256 | Algorithm::ES384 => "EC",
        Algorithm::EdDSA => "OKP",
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => "oct",
    };
    if key.key_type != family_key_type {
        return Err(AuthError::Internal(format!(
            "published key '{}' of type {} cannot verify {:?}",
            key.kid, key.key_type, expected
        )));
    }

    Ok(())
}

/// Verify the signature and return the payload as claims.
fn verify_signature(
    token: &str,
    key: &VerificationKey,
    expected: Algorithm,
) -> Result<VerifiedClaims, AuthError> {
    // Claim checks run afterwards against an explicit `now`
    let mut validation = Validation::new(expected);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();
    validation.leeway = 0;

    let token_data = decode::<Map<String, Value>>(token, key.decoding_key(), &validation)
        .map_err(|e| {
            tracing::debug!(target: "cognito.auth.jwt", error = %e, "Token verification failed");
            match e.kind() {
                ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                ErrorKind::InvalidToken
                | ErrorKind::Base64(_)
                | ErrorKind::Json(_)
                | ErrorKind::Utf8(_) => AuthError::MalformedToken,
                ErrorKind::InvalidAlgorithm => AuthError::AlgorithmMismatch,
                _ => AuthError::Internal(format!("signature verification failed: {e}")),
            }
        })?;

    Ok(VerifiedClaims::new(token_data.claims))
}

fn temporal_error(e: JwtValidationError) -> AuthError {
    match e {
        JwtValidationError::Expired => AuthError::TokenExpired,
        JwtValidationError::NotYetValid => AuthError::TokenNotYetValid,
        _ => AuthError::MalformedToken,
    }
}
