//! Verified JWT claims.
//!
//! `VerifiedClaims` can only be built by the token verifier, after the
//! signature and every configured claim check passed. The `sub` value is
//! redacted in Debug output to prevent exposure in logs.

use serde_json::{Map, Value};
use std::fmt;

/// Claim set of a token whose signature and claims have been checked.
#[derive(Clone, PartialEq)]
pub struct VerifiedClaims {
    claims: Map<String, Value>,
}

impl VerifiedClaims {
    pub(crate) fn new(claims: Map<String, Value>) -> Self {
        Self { claims }
    }

    /// Claim by exact name (e.g. `cognito:groups`).
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.claims.get(name)
    }

    /// Claim by exact name, falling back to a dot-separated path into nested objects.
    ///
    /// `realm_access.roles` resolves `{"realm_access": {"roles": [...]}}` unless
    /// a top-level claim is literally named `realm_access.roles`.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        if let Some(value) = self.claims.get(path) {
            return Some(value);
        }

        let mut segments = path.split('.');
        let first = segments.next()?;
        segments.try_fold(self.claims.get(first)?, |value, segment| {
            value.as_object()?.get(segment)
        })
    }

    /// `sub` claim, if it is a string.
    pub fn subject(&self) -> Option<&str> {
        self.claims.get("sub").and_then(Value::as_str)
    }

    /// String claim by exact name.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.claims.get(name).and_then(Value::as_str)
    }

    /// Numeric date claim (`exp`, `iat`, `nbf`) as Unix epoch seconds.
    ///
    /// Fractional values are truncated.
    #[allow(clippy::cast_possible_truncation)]
    pub fn get_numeric_date(&self, name: &str) -> Option<i64> {
        let value = self.claims.get(name)?;
        value
            .as_i64()
            .or_else(|| value.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
    }

    /// Claim names, in no particular order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.claims.keys().map(String::as_str)
    }
}

/// Custom Debug implementation that hides every claim value.
///
/// Claim values include user identifiers and e-mail addresses; only the
/// claim names are shown.
impl fmt::Debug for VerifiedClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("VerifiedClaims")
            .field("sub", &"[REDACTED]")
            .field("names", &names)
            .finish()
    }
}
