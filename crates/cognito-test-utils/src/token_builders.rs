//! Builder patterns for test data construction
//!
//! Provides a fluent API for Cognito-shaped JWT claims.

use chrono::{Duration, Utc};
use serde_json::{json, Map, Value};

/// Builder for Cognito token claims.
///
/// Defaults: `iat` now, `exp` one hour from now, no groups.
///
/// # Example
/// ```rust,ignore
/// let claims = CognitoClaimsBuilder::new("alice")
///     .groups(&["admin"])
///     .token_use("access")
///     .expires_in(300)
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct CognitoClaimsBuilder {
    claims: Map<String, Value>,
}

impl CognitoClaimsBuilder {
    /// Create a builder for subject `sub`.
    pub fn new(sub: &str) -> Self {
        let now = Utc::now();
        let mut claims = Map::new();
        claims.insert("sub".to_string(), json!(sub));
        claims.insert("iat".to_string(), json!(now.timestamp()));
        claims.insert(
            "exp".to_string(),
            json!((now + Duration::seconds(3600)).timestamp()),
        );
        Self { claims }
    }

    /// Set `cognito:groups`.
    pub fn groups(self, groups: &[&str]) -> Self {
        self.claim("cognito:groups", json!(groups))
    }

    /// Set `cognito:username` (ID token style).
    pub fn username(self, username: &str) -> Self {
        self.claim("cognito:username", json!(username))
    }

    /// Set `iss`.
    pub fn issuer(self, issuer: &str) -> Self {
        self.claim("iss", json!(issuer))
    }

    /// Set `aud` (ID token style).
    pub fn audience(self, audience: &str) -> Self {
        self.claim("aud", json!(audience))
    }

    /// Set `client_id` (access token style).
    pub fn client_id(self, client_id: &str) -> Self {
        self.claim("client_id", json!(client_id))
    }

    /// Set `token_use` (`id` or `access`).
    pub fn token_use(self, token_use: &str) -> Self {
        self.claim("token_use", json!(token_use))
    }

    /// Set the space-separated `scope`.
    pub fn scope(self, scope: &str) -> Self {
        self.claim("scope", json!(scope))
    }

    /// Set `exp` in seconds from now (negative for an expired token).
    pub fn expires_in(self, seconds: i64) -> Self {
        self.expires_at((Utc::now() + Duration::seconds(seconds)).timestamp())
    }

    /// Set `exp` as a Unix timestamp.
    pub fn expires_at(self, timestamp: i64) -> Self {
        self.claim("exp", json!(timestamp))
    }

    /// Set `iat` as a Unix timestamp.
    pub fn issued_at(self, timestamp: i64) -> Self {
        self.claim("iat", json!(timestamp))
    }

    /// Set `nbf` as a Unix timestamp.
    pub fn not_before(self, timestamp: i64) -> Self {
        self.claim("nbf", json!(timestamp))
    }

    /// Set an arbitrary claim.
    pub fn claim(mut self, name: &str, value: Value) -> Self {
        self.claims.insert(name.to_string(), value);
        self
    }

    /// Build the claims as a JSON object.
    pub fn build(self) -> Value {
        Value::Object(self.claims)
    }
}
