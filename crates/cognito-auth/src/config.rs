//! Authentication pipeline configuration.
//!
//! Configuration is loaded from environment variables. The pipeline itself
//! never reads the environment: the host builds a `Config` and hands it to
//! [`crate::auth::Authenticator::from_config`].

use crate::auth::jwks::{cognito_issuer, cognito_jwks_url};
use crate::auth::jwt::TokenUse;
use crate::auth::principal::DEFAULT_AUTHORITIES_CLAIM;
use common::jwt::{DEFAULT_CLOCK_SKEW, MAX_CLOCK_SKEW};
use jsonwebtoken::Algorithm;
use std::collections::HashMap;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Default JWKS connect timeout in milliseconds.
pub const DEFAULT_JWKS_CONNECT_TIMEOUT_MS: u64 = 2000;

/// Default JWKS read timeout in milliseconds.
pub const DEFAULT_JWKS_READ_TIMEOUT_MS: u64 = 2000;

/// Default server bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Authentication pipeline configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address for the host binary (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// URL of the identity provider's JWKS document.
    pub jwks_url: String,

    /// Connect timeout for JWKS retrieval.
    pub jwks_connect_timeout: Duration,

    /// Read timeout for JWKS retrieval.
    pub jwks_read_timeout: Duration,

    /// Optional maximum age of the cached key set. `None` means refresh only on
    /// an unknown key ID.
    pub jwks_cache_ttl: Option<Duration>,

    /// The only signature algorithm accepted (default: RS256).
    pub jwt_algorithm: Algorithm,

    /// Clock skew tolerance applied to `exp`, `nbf` and `iat`.
    pub jwt_clock_skew: Duration,

    /// Expected `iss` claim, if enforced.
    pub issuer: Option<String>,

    /// Expected audience (Cognito app client ID), if enforced.
    pub audience: Option<String>,

    /// Expected Cognito `token_use` claim, if enforced.
    pub token_use: Option<TokenUse>,

    /// Claim (name or dot-separated path) holding the granted authorities.
    pub authorities_claim: String,

    /// Prefix prepended to every authority (e.g. "ROLE_").
    pub authority_prefix: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid JWKS URL: {0}")]
    InvalidJwksUrl(String),

    #[error("Invalid timeout configuration: {0}")]
    InvalidTimeout(String),

    #[error("Invalid JWT algorithm: {0}")]
    InvalidAlgorithm(String),

    #[error("Invalid JWT clock skew configuration: {0}")]
    InvalidJwtClockSkew(String),

    #[error("Invalid token use: {0}")]
    InvalidTokenUse(String),

    #[error("Invalid authorities claim: {0}")]
    InvalidAuthoritiesClaim(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let region = non_empty(vars, "COGNITO_REGION");
        let user_pool_id = non_empty(vars, "COGNITO_USER_POOL_ID");
        let pool = region.zip(user_pool_id);

        // Explicit URL wins; otherwise derive Cognito's well-known location
        let jwks_url = match (non_empty(vars, "COGNITO_JWKS_URL"), pool) {
            (Some(url), _) => url.to_string(),
            (None, Some((region, pool_id))) => cognito_jwks_url(region, pool_id),
            (None, None) => {
                return Err(ConfigError::MissingEnvVar("COGNITO_JWKS_URL".to_string()));
            }
        };

        if !(jwks_url.starts_with("https://") || jwks_url.starts_with("http://")) {
            return Err(ConfigError::InvalidJwksUrl(format!(
                "COGNITO_JWKS_URL must be an http(s) URL, got '{}'",
                jwks_url
            )));
        }

        if !jwks_url.starts_with("https://") {
            tracing::warn!(
                target: "cognito.config",
                jwks_url = %jwks_url,
                "COGNITO_JWKS_URL does not use https, signing keys are fetched unencrypted"
            );
        }

        let jwks_connect_timeout = Duration::from_millis(parse_positive(
            vars,
            "JWKS_CONNECT_TIMEOUT_MS",
            DEFAULT_JWKS_CONNECT_TIMEOUT_MS,
        )?);

        let jwks_read_timeout = Duration::from_millis(parse_positive(
            vars,
            "JWKS_READ_TIMEOUT_MS",
            DEFAULT_JWKS_READ_TIMEOUT_MS,
        )?);

        let jwks_cache_ttl = match vars.get("JWKS_CACHE_TTL_SECONDS") {
            Some(_) => Some(Duration::from_secs(parse_positive(
                vars,
                "JWKS_CACHE_TTL_SECONDS",
                0,
            )?)),
            None => None,
        };

        let jwt_algorithm = match vars.get("JWT_ALGORITHM") {
            Some(value) => {
                let algorithm = Algorithm::from_str(value).map_err(|e| {
                    ConfigError::InvalidAlgorithm(format!(
                        "JWT_ALGORITHM must name a JWS algorithm, got '{}': {}",
                        value, e
                    ))
                })?;

                // Published keys are public keys; shared-secret algorithms make no sense here
                if matches!(
                    algorithm,
                    Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
                ) {
                    return Err(ConfigError::InvalidAlgorithm(format!(
                        "JWT_ALGORITHM must be an asymmetric algorithm, got '{}'",
                        value
                    )));
                }

                algorithm
            }
            None => Algorithm::RS256,
        };

        // Parse JWT clock skew tolerance with validation
        let jwt_clock_skew = if let Some(value_str) = vars.get("JWT_CLOCK_SKEW_SECONDS") {
            let value: i64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be a valid integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value < 0 {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must not be negative, got {}",
                    value
                )));
            }

            let value = value.unsigned_abs();
            if value > MAX_CLOCK_SKEW.as_secs() {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must not exceed {} seconds, got {}",
                    MAX_CLOCK_SKEW.as_secs(),
                    value
                )));
            }

            Duration::from_secs(value)
        } else {
            DEFAULT_CLOCK_SKEW
        };

        let issuer = match (non_empty(vars, "COGNITO_ISSUER"), pool) {
            (Some(issuer), _) => Some(issuer.to_string()),
            (None, Some((region, pool_id))) => Some(cognito_issuer(region, pool_id)),
            (None, None) => None,
        };

        let audience = non_empty(vars, "COGNITO_AUDIENCE").map(ToString::to_string);

        let token_use = match non_empty(vars, "COGNITO_TOKEN_USE") {
            Some(value) => Some(TokenUse::from_str(value).map_err(|_| {
                ConfigError::InvalidTokenUse(format!(
                    "COGNITO_TOKEN_USE must be 'id' or 'access', got '{}'",
                    value
                ))
            })?),
            None => None,
        };

        let authorities_claim = vars
            .get("AUTHORITIES_CLAIM")
            .cloned()
            .unwrap_or_else(|| DEFAULT_AUTHORITIES_CLAIM.to_string());

        if authorities_claim.trim().is_empty() {
            return Err(ConfigError::InvalidAuthoritiesClaim(
                "AUTHORITIES_CLAIM must not be empty".to_string(),
            ));
        }

        let authority_prefix = vars.get("AUTHORITY_PREFIX").cloned().unwrap_or_default();

        Ok(Config {
            bind_address,
            jwks_url,
            jwks_connect_timeout,
            jwks_read_timeout,
            jwks_cache_ttl,
            jwt_algorithm,
            jwt_clock_skew,
            issuer,
            audience,
            token_use,
            authorities_claim,
            authority_prefix,
        })
    }
}

fn non_empty<'a>(vars: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    vars.get(name)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

/// Parse a strictly positive integer variable, falling back to `default` when unset.
fn parse_positive(
    vars: &HashMap<String, String>,
    name: &str,
    default: u64,
) -> Result<u64, ConfigError> {
    let Some(value_str) = vars.get(name) else {
        return Ok(default);
    };

    let value: u64 = value_str.parse().map_err(|e| {
        ConfigError::InvalidTimeout(format!(
            "{} must be a valid positive integer, got '{}': {}",
            name, value_str, e
        ))
    })?;

    if value == 0 {
        return Err(ConfigError::InvalidTimeout(format!(
            "{} must be greater than 0",
            name
        )));
    }

    Ok(value)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    fn base_vars() -> HashMap<String, String> {
        HashMap::from([(
            "COGNITO_JWKS_URL".to_string(),
            "https://cognito-idp.eu-west-1.amazonaws.com/eu-west-1_Test/.well-known/jwks.json"
                .to_string(),
        )])
    }

    #[test]
    fn test_from_vars_success_with_defaults() {
        let config = Config::from_vars(&base_vars()).expect("Config should load successfully");

        assert_eq!(config.bind_address, DEFAULT_BIND_ADDRESS);
        assert_eq!(
            config.jwks_url,
            "https://cognito-idp.eu-west-1.amazonaws.com/eu-west-1_Test/.well-known/jwks.json"
        );
        assert_eq!(config.jwks_connect_timeout, Duration::from_millis(2000));
        assert_eq!(config.jwks_read_timeout, Duration::from_millis(2000));
        assert!(config.jwks_cache_ttl.is_none());
        assert_eq!(config.jwt_algorithm, Algorithm::RS256);
        assert_eq!(config.jwt_clock_skew, DEFAULT_CLOCK_SKEW);
        assert!(config.issuer.is_none());
        assert!(config.audience.is_none());
        assert!(config.token_use.is_none());
        assert_eq!(config.authorities_claim, "cognito:groups");
        assert_eq!(config.authority_prefix, "");
    }

    #[test]
    fn test_from_vars_success_with_custom_values() {
        let mut vars = base_vars();
        vars.insert("BIND_ADDRESS".to_string(), "127.0.0.1:9000".to_string());
        vars.insert("JWKS_CONNECT_TIMEOUT_MS".to_string(), "250".to_string());
        vars.insert("JWKS_READ_TIMEOUT_MS".to_string(), "750".to_string());
        vars.insert("JWKS_CACHE_TTL_SECONDS".to_string(), "3600".to_string());
        vars.insert("JWT_ALGORITHM".to_string(), "ES256".to_string());
        vars.insert("JWT_CLOCK_SKEW_SECONDS".to_string(), "120".to_string());
        vars.insert(
            "COGNITO_ISSUER".to_string(),
            "https://issuer.example.com".to_string(),
        );
        vars.insert("COGNITO_AUDIENCE".to_string(), "app-client-1".to_string());
        vars.insert("COGNITO_TOKEN_USE".to_string(), "access".to_string());
        vars.insert("AUTHORITIES_CLAIM".to_string(), "scope".to_string());
        vars.insert("AUTHORITY_PREFIX".to_string(), "SCOPE_".to_string());

        let config = Config::from_vars(&vars).expect("Config should load successfully");

        assert_eq!(config.bind_address, "127.0.0.1:9000");
        assert_eq!(config.jwks_connect_timeout, Duration::from_millis(250));
        assert_eq!(config.jwks_read_timeout, Duration::from_millis(750));
        assert_eq!(config.jwks_cache_ttl, Some(Duration::from_secs(3600)));
        assert_eq!(config.jwt_algorithm, Algorithm::ES256);
        assert_eq!(config.jwt_clock_skew, Duration::from_secs(120));
        assert_eq!(config.issuer.as_deref(), Some("https://issuer.example.com"));
        assert_eq!(config.audience.as_deref(), Some("app-client-1"));
        assert_eq!(config.token_use, Some(TokenUse::Access));
        assert_eq!(config.authorities_claim, "scope");
        assert_eq!(config.authority_prefix, "SCOPE_");
    }

    #[test]
    fn test_from_vars_derives_cognito_urls_from_pool() {
        let vars = HashMap::from([
            ("COGNITO_REGION".to_string(), "us-east-1".to_string()),
            (
                "COGNITO_USER_POOL_ID".to_string(),
                "us-east-1_AbCdEf".to_string(),
            ),
        ]);

        let config = Config::from_vars(&vars).expect("Config should load successfully");

        assert_eq!(
            config.jwks_url,
            "https://cognito-idp.us-east-1.amazonaws.com/us-east-1_AbCdEf/.well-known/jwks.json"
        );
        assert_eq!(
            config.issuer.as_deref(),
            Some("https://cognito-idp.us-east-1.amazonaws.com/us-east-1_AbCdEf")
        );
    }

    #[test]
    fn test_explicit_urls_override_pool_derivation() {
        let mut vars = base_vars();
        vars.insert("COGNITO_REGION".to_string(), "us-east-1".to_string());
        vars.insert(
            "COGNITO_USER_POOL_ID".to_string(),
            "us-east-1_AbCdEf".to_string(),
        );
        vars.insert(
            "COGNITO_ISSUER".to_string(),
            "https://issuer.example.com".to_string(),
        );

        let config = Config::from_vars(&vars).expect("Config should load successfully");

        assert!(config.jwks_url.contains("eu-west-1_Test"));
        assert_eq!(config.issuer.as_deref(), Some("https://issuer.example.com"));
    }

    #[test]
    fn test_from_vars_missing_jwks_url() {
        let result = Config::from_vars(&HashMap::new());
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(v)) if v == "COGNITO_JWKS_URL"));
    }

    #[test]
    fn test_region_without_pool_is_not_enough() {
        let vars = HashMap::from([("COGNITO_REGION".to_string(), "us-east-1".to_string())]);

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(_))));
    }

    #[test]
    fn test_jwks_url_rejects_non_http_scheme() {
        let mut vars = base_vars();
        vars.insert(
            "COGNITO_JWKS_URL".to_string(),
            "file:///etc/jwks.json".to_string(),
        );

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::InvalidJwksUrl(_))));
    }

    #[test]
    #[traced_test]
    fn test_plain_http_jwks_url_is_accepted_with_warning() {
        let mut vars = base_vars();
        vars.insert(
            "COGNITO_JWKS_URL".to_string(),
            "http://127.0.0.1:8080/.well-known/jwks.json".to_string(),
        );

        let config = Config::from_vars(&vars).unwrap();

        assert_eq!(config.jwks_url, "http://127.0.0.1:8080/.well-known/jwks.json");
        assert!(logs_contain("COGNITO_JWKS_URL does not use https"));
    }

    #[test]
    #[traced_test]
    fn test_https_jwks_url_logs_no_warning() {
        Config::from_vars(&base_vars()).unwrap();

        assert!(!logs_contain("COGNITO_JWKS_URL does not use https"));
    }

    #[test]
    fn test_timeouts_reject_zero_and_garbage() {
        for (name, value) in [
            ("JWKS_CONNECT_TIMEOUT_MS", "0"),
            ("JWKS_READ_TIMEOUT_MS", "-5"),
            ("JWKS_READ_TIMEOUT_MS", "soon"),
            ("JWKS_CACHE_TTL_SECONDS", "0"),
        ] {
            let mut vars = base_vars();
            vars.insert(name.to_string(), value.to_string());

            let result = Config::from_vars(&vars);
            assert!(
                matches!(result, Err(ConfigError::InvalidTimeout(ref msg)) if msg.contains(name)),
                "{name}={value} should be rejected, got {result:?}"
            );
        }
    }

    #[test]
    fn test_algorithm_rejects_hmac() {
        let mut vars = base_vars();
        vars.insert("JWT_ALGORITHM".to_string(), "HS256".to_string());

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidAlgorithm(msg)) if msg.contains("asymmetric"))
        );
    }

    #[test]
    fn test_algorithm_rejects_unknown() {
        let mut vars = base_vars();
        vars.insert("JWT_ALGORITHM".to_string(), "none".to_string());

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::InvalidAlgorithm(_))));
    }

    #[test]
    fn test_jwt_clock_skew_accepts_zero() {
        let mut vars = base_vars();
        vars.insert("JWT_CLOCK_SKEW_SECONDS".to_string(), "0".to_string());

        let config = Config::from_vars(&vars).expect("Config should load successfully");
        assert_eq!(config.jwt_clock_skew, Duration::ZERO);
    }

    #[test]
    fn test_jwt_clock_skew_rejects_negative() {
        let mut vars = base_vars();
        vars.insert("JWT_CLOCK_SKEW_SECONDS".to_string(), "-100".to_string());

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidJwtClockSkew(msg)) if msg.contains("must not be negative"))
        );
    }

    #[test]
    fn test_jwt_clock_skew_rejects_too_large() {
        let mut vars = base_vars();
        vars.insert("JWT_CLOCK_SKEW_SECONDS".to_string(), "601".to_string());

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidJwtClockSkew(msg)) if msg.contains("must not exceed 600"))
        );
    }

    #[test]
    fn test_jwt_clock_skew_rejects_non_numeric() {
        let mut vars = base_vars();
        vars.insert("JWT_CLOCK_SKEW_SECONDS".to_string(), "a-minute".to_string());

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidJwtClockSkew(msg)) if msg.contains("must be a valid integer"))
        );
    }

    #[test]
    fn test_token_use_rejects_unknown_value() {
        let mut vars = base_vars();
        vars.insert("COGNITO_TOKEN_USE".to_string(), "refresh".to_string());

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::InvalidTokenUse(_))));
    }

    #[test]
    fn test_authorities_claim_rejects_blank() {
        let mut vars = base_vars();
        vars.insert("AUTHORITIES_CLAIM".to_string(), "  ".to_string());

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::InvalidAuthoritiesClaim(_))));
    }

    #[test]
    fn test_blank_optional_values_are_ignored() {
        let mut vars = base_vars();
        vars.insert("COGNITO_AUDIENCE".to_string(), "".to_string());
        vars.insert("COGNITO_ISSUER".to_string(), "   ".to_string());

        let config = Config::from_vars(&vars).expect("Config should load successfully");
        assert!(config.audience.is_none());
        assert!(config.issuer.is_none());
    }
}
