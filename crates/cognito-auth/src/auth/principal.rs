//! Mapping from verified claims to an authentication principal.
//!
//! Mapping is pure: no I/O and no shared state. Missing group membership is a
//! legitimate state and yields an empty authority set.

use crate::auth::claims::VerifiedClaims;
use crate::errors::AuthError;
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;

/// Default claim holding the user's authorities.
pub const DEFAULT_AUTHORITIES_CLAIM: &str = "cognito:groups";

/// Options for [`PrincipalMapper`].
#[derive(Debug, Clone)]
pub struct MapperOptions {
    /// Claim name or dot-separated path holding authorities.
    pub authorities_claim: String,

    /// Prefix added to every authority (e.g. `ROLE_`); empty for none.
    pub authority_prefix: String,
}

impl Default for MapperOptions {
    fn default() -> Self {
        Self {
            authorities_claim: DEFAULT_AUTHORITIES_CLAIM.to_string(),
            authority_prefix: String::new(),
        }
    }
}

/// The authenticated identity of a request.
///
/// `subject` and `username` are redacted in Debug output.
#[derive(Clone, PartialEq)]
pub struct AuthenticationPrincipal {
    /// Stable user identifier (`sub`).
    pub subject: String,

    /// Human-readable user name, when the token carries one.
    pub username: Option<String>,

    /// Granted authorities (group names or scopes, prefixed).
    pub authorities: BTreeSet<String>,

    /// The verified claims the principal was built from.
    pub claims: VerifiedClaims,
}

impl AuthenticationPrincipal {
    /// Whether the principal holds `authority` (exact match).
    pub fn has_authority(&self, authority: &str) -> bool {
        self.authorities.contains(authority)
    }
}

impl fmt::Debug for AuthenticationPrincipal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticationPrincipal")
            .field("subject", &"[REDACTED]")
            .field("username", &self.username.as_ref().map(|_| "[REDACTED]"))
            .field("authorities", &self.authorities)
            .finish_non_exhaustive()
    }
}

/// Converts verified claims into an [`AuthenticationPrincipal`].
#[derive(Debug, Clone, Default)]
pub struct PrincipalMapper {
    options: MapperOptions,
}

impl PrincipalMapper {
    /// Create a mapper reading authorities from `options.authorities_claim`.
    pub fn new(options: MapperOptions) -> Self {
        Self { options }
    }

    /// Build the principal for `claims`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::MissingSubject` if `sub` is absent, not a string, or empty.
    pub fn to_principal(&self, claims: &VerifiedClaims) -> Result<AuthenticationPrincipal, AuthError> {
        let subject = claims
            .subject()
            .filter(|sub| !sub.is_empty())
            .ok_or(AuthError::MissingSubject)?
            .to_string();

        // ID tokens use `cognito:username`, access tokens `username`
        let username = claims
            .get_str("cognito:username")
            .or_else(|| claims.get_str("username"))
            .map(ToString::to_string);

        let authorities = self.authorities(claims);

        Ok(AuthenticationPrincipal {
            subject,
            username,
            authorities,
            claims: claims.clone(),
        })
    }

    fn authorities(&self, claims: &VerifiedClaims) -> BTreeSet<String> {
        let path = self.options.authorities_claim.as_str();
        let prefix = self.options.authority_prefix.as_str();

        let names: Vec<&str> = match claims.get_path(path) {
            Some(Value::Array(values)) => values.iter().filter_map(Value::as_str).collect(),
            // OAuth `scope` is a single space-separated string
            Some(Value::String(value)) => value.split_whitespace().collect(),
            Some(other) => {
                tracing::debug!(
                    target: "cognito.auth.principal",
                    claim = %path,
                    shape = json_shape(other),
                    "Authorities claim has unsupported shape, granting none"
                );
                Vec::new()
            }
            None => Vec::new(),
        };

        names
            .into_iter()
            .filter(|name| !name.is_empty())
            .map(|name| format!("{prefix}{name}"))
            .collect()
    }
}

fn json_shape(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn claims(value: Value) -> VerifiedClaims {
        VerifiedClaims::new(serde_json::from_value(value).unwrap())
    }

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_groups_become_authorities() {
        let mapper = PrincipalMapper::default();
        let principal = mapper
            .to_principal(&claims(json!({"sub": "alice", "cognito:groups": ["admin", "dev"]})))
            .unwrap();

        assert_eq!(principal.subject, "alice");
        assert_eq!(principal.authorities, set(&["admin", "dev"]));
        assert!(principal.has_authority("admin"));
        assert!(!principal.has_authority("adm"));
    }

    #[test]
    fn test_missing_groups_is_empty_not_error() {
        let mapper = PrincipalMapper::default();
        let principal = mapper.to_principal(&claims(json!({"sub": "bob"}))).unwrap();

        assert!(principal.authorities.is_empty());
    }

    #[test]
    fn test_missing_or_empty_subject() {
        let mapper = PrincipalMapper::default();

        for value in [json!({}), json!({"sub": ""}), json!({"sub": 7}), json!({"sub": null})] {
            assert_eq!(
                mapper.to_principal(&claims(value)).unwrap_err(),
                AuthError::MissingSubject
            );
        }
    }

    #[test]
    fn test_scope_string_is_split() {
        let mapper = PrincipalMapper::new(MapperOptions {
            authorities_claim: "scope".to_string(),
            authority_prefix: "SCOPE_".to_string(),
        });
        let principal = mapper
            .to_principal(&claims(json!({"sub": "svc", "scope": "orders/read  orders/write"})))
            .unwrap();

        assert_eq!(principal.authorities, set(&["SCOPE_orders/read", "SCOPE_orders/write"]));
    }

    #[test]
    fn test_nested_claim_path() {
        let mapper = PrincipalMapper::new(MapperOptions {
            authorities_claim: "realm_access.roles".to_string(),
            authority_prefix: "ROLE_".to_string(),
        });
        let principal = mapper
            .to_principal(&claims(json!({"sub": "alice", "realm_access": {"roles": ["admin"]}})))
            .unwrap();

        assert_eq!(principal.authorities, set(&["ROLE_admin"]));
    }

    #[test]
    fn test_unsupported_shapes_and_entries_are_ignored() {
        let mapper = PrincipalMapper::default();

        let object = mapper
            .to_principal(&claims(json!({"sub": "a", "cognito:groups": {"admin": true}})))
            .unwrap();
        assert!(object.authorities.is_empty());

        let mixed = mapper
            .to_principal(&claims(json!({"sub": "a", "cognito:groups": ["ok", 1, null, ""]})))
            .unwrap();
        assert_eq!(mixed.authorities, set(&["ok"]));
    }

    #[test]
    fn test_duplicate_groups_collapse() {
        let mapper = PrincipalMapper::default();
        let principal = mapper
            .to_principal(&claims(json!({"sub": "a", "cognito:groups": ["x", "x", "y"]})))
            .unwrap();

        assert_eq!(principal.authorities, set(&["x", "y"]));
    }

    #[test]
    fn test_username_from_id_or_access_token() {
        let mapper = PrincipalMapper::default();

        let id = mapper
            .to_principal(&claims(json!({"sub": "a", "cognito:username": "alice"})))
            .unwrap();
        assert_eq!(id.username.as_deref(), Some("alice"));

        let access = mapper
            .to_principal(&claims(json!({"sub": "a", "username": "alice2"})))
            .unwrap();
        assert_eq!(access.username.as_deref(), Some("alice2"));

        let none = mapper.to_principal(&claims(json!({"sub": "a"}))).unwrap();
        assert!(none.username.is_none());
    }

    #[test]
    fn test_mapping_is_deterministic() {
        let mapper = PrincipalMapper::default();
        let input = claims(json!({"sub": "alice", "cognito:groups": ["b", "a"]}));

        let first = mapper.to_principal(&input).unwrap();
        let second = mapper.to_principal(&input).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_debug_redacts_identity() {
        let mapper = PrincipalMapper::default();
        let principal = mapper
            .to_principal(&claims(json!({
                "sub": "secret-user-id",
                "cognito:username": "secret-name",
                "cognito:groups": ["admin"]
            })))
            .unwrap();

        let debug_str = format!("{:?}", principal);

        assert!(!debug_str.contains("secret-user-id"));
        assert!(!debug_str.contains("secret-name"));
        assert!(debug_str.contains("admin"));
    }
}
