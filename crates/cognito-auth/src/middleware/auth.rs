//! Authentication middleware.
//!
//! Extracts a Bearer token from the Authorization header, verifies it, maps
//! the claims to a principal and stores a [`SecurityContext`] in the request
//! extensions. The middleware never rejects a request: a missing or invalid
//! token leaves the request anonymous, and downstream handlers decide whether
//! that is acceptable.

use crate::auth::{
    AuthenticationPrincipal, JwksClient, JwksClientOptions, MapperOptions, PrincipalMapper,
    TokenVerifier, VerifierOptions,
};
use crate::config::Config;
use crate::errors::{ApiError, AuthError};
use crate::observability::metrics;
use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use common::jwt::token_fingerprint;
use common::secret::SecretString;
use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;
use tracing::instrument;

/// Request-scoped security context.
///
/// Created fresh for every request by [`authenticate_request`]; it is never
/// shared between requests.
#[derive(Clone, Default)]
pub struct SecurityContext {
    authentication: Option<Authentication>,
}

#[derive(Clone)]
struct Authentication {
    principal: Arc<AuthenticationPrincipal>,
    credentials: Arc<SecretString>,
}

impl SecurityContext {
    /// Context of a request without a valid bearer token.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Context of a request whose bearer token was verified.
    pub fn authenticated(principal: AuthenticationPrincipal, credentials: SecretString) -> Self {
        Self {
            authentication: Some(Authentication {
                principal: Arc::new(principal),
                credentials: Arc::new(credentials),
            }),
        }
    }

    /// The authenticated principal, if any.
    pub fn principal(&self) -> Option<&AuthenticationPrincipal> {
        self.authentication.as_ref().map(|a| a.principal.as_ref())
    }

    /// The raw bearer token the principal was authenticated with.
    pub fn credentials(&self) -> Option<&SecretString> {
        self.authentication.as_ref().map(|a| a.credentials.as_ref())
    }

    pub fn is_authenticated(&self) -> bool {
        self.authentication.is_some()
    }
}

impl fmt::Debug for SecurityContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityContext")
            .field("principal", &self.principal())
            .finish_non_exhaustive()
    }
}

/// Result of authenticating one request.
#[derive(Debug)]
pub enum AuthOutcome {
    /// No bearer token was presented.
    Anonymous,

    /// The token verified and mapped to a principal.
    Authenticated {
        principal: AuthenticationPrincipal,
        credentials: SecretString,
    },

    /// A token was presented but did not authenticate.
    Rejected(AuthError),
}

/// Verifier and mapper wired together for the middleware.
pub struct Authenticator {
    verifier: TokenVerifier,
    mapper: PrincipalMapper,
}

impl Authenticator {
    pub fn new(verifier: TokenVerifier, mapper: PrincipalMapper) -> Self {
        Self { verifier, mapper }
    }

    /// Build the full pipeline (JWKS client, verifier, mapper) from configuration.
    pub fn from_config(config: &Config) -> Self {
        let jwks_client = Arc::new(JwksClient::new(
            config.jwks_url.clone(),
            JwksClientOptions {
                connect_timeout: config.jwks_connect_timeout,
                read_timeout: config.jwks_read_timeout,
                cache_ttl: config.jwks_cache_ttl,
            },
        ));

        let verifier = TokenVerifier::new(
            jwks_client,
            VerifierOptions {
                expected_algorithm: config.jwt_algorithm,
                clock_skew: config.jwt_clock_skew,
                issuer: config.issuer.clone(),
                audience: config.audience.clone(),
                token_use: config.token_use,
            },
        );

        let mapper = PrincipalMapper::new(MapperOptions {
            authorities_claim: config.authorities_claim.clone(),
            authority_prefix: config.authority_prefix.clone(),
        });

        Self::new(verifier, mapper)
    }

    /// Verify `token` and map it to a principal.
    ///
    /// # Errors
    ///
    /// Returns the verifier's or mapper's `AuthError`.
    pub async fn authenticate_token(&self, token: &str) -> Result<AuthenticationPrincipal, AuthError> {
        let claims = self.verifier.verify(token).await?;
        self.mapper.to_principal(&claims)
    }

    /// Authenticate the request described by `headers`.
    ///
    /// Failures are logged and counted here; the caller only decides what
    /// context to install.
    pub async fn authenticate(&self, headers: &HeaderMap) -> AuthOutcome {
        let Some(token) = bearer_token(headers) else {
            tracing::debug!(target: "cognito.middleware.auth", "No bearer token, proceeding anonymously");
            metrics::record_auth_outcome("anonymous");
            return AuthOutcome::Anonymous;
        };

        match self.authenticate_token(token).await {
            Ok(principal) => {
                tracing::debug!(
                    target: "cognito.middleware.auth",
                    authorities = principal.authorities.len(),
                    "Request authenticated"
                );
                metrics::record_auth_outcome("authenticated");
                AuthOutcome::Authenticated {
                    principal,
                    credentials: SecretString::from(token),
                }
            }
            Err(error) => {
                log_rejection(&error, token);
                metrics::record_auth_outcome("rejected");
                metrics::record_auth_failure(error.kind());
                AuthOutcome::Rejected(error)
            }
        }
    }
}

fn log_rejection(error: &AuthError, token: &str) {
    let fingerprint = token_fingerprint(token);

    if error.is_degraded_trust() {
        tracing::error!(
            target: "cognito.auth.degraded",
            error_kind = error.kind(),
            token_fingerprint = %fingerprint,
            "Signing keys unavailable, all bearer tokens are treated as anonymous"
        );
        return;
    }

    if let AuthError::Internal(message) = error {
        tracing::error!(
            target: "cognito.middleware.auth",
            error_kind = error.kind(),
            token_fingerprint = %fingerprint,
            error = %message,
            "Unexpected fault while verifying bearer token"
        );
    } else {
        tracing::warn!(
            target: "cognito.middleware.auth",
            error_kind = error.kind(),
            token_fingerprint = %fingerprint,
            "Bearer token rejected, proceeding anonymously"
        );
    }
}

/// Extract the token from `Authorization: Bearer <token>`.
///
/// The scheme is matched case-insensitively. Returns `None` for a missing
/// header, another scheme, a non-ASCII value or an empty token.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;

    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return None;
    }

    Some(token)
}

/// Authentication middleware.
///
/// Replaces any `SecurityContext` already present on the request with a fresh
/// one, then always continues to the next handler.
///
/// # Authorization Header Format
///
/// ```text
/// Authorization: Bearer <token>
/// ```
#[instrument(skip_all, name = "cognito.middleware.auth")]
pub async fn authenticate_request(
    State(authenticator): State<Arc<Authenticator>>,
    mut req: Request,
    next: Next,
) -> Response {
    // Never trust a context installed before this middleware ran
    req.extensions_mut().remove::<SecurityContext>();

    let context = match authenticator.authenticate(req.headers()).await {
        AuthOutcome::Authenticated {
            principal,
            credentials,
        } => SecurityContext::authenticated(principal, credentials),
        AuthOutcome::Anonymous | AuthOutcome::Rejected(_) => SecurityContext::anonymous(),
    };

    req.extensions_mut().insert(context);
    next.run(req).await
}

#[async_trait]
impl<S> FromRequestParts<S> for SecurityContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<SecurityContext>()
            .cloned()
            .unwrap_or_default())
    }
}

/// Extractor for handlers that require an authenticated principal.
///
/// Rejects anonymous requests with 401 Unauthorized.
#[derive(Debug, Clone)]
pub struct Authenticated(pub Arc<AuthenticationPrincipal>);

#[async_trait]
impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SecurityContext>()
            .and_then(|context| context.authentication.as_ref())
            .map(|authentication| Authenticated(Arc::clone(&authentication.principal)))
            .ok_or(ApiError::Unauthenticated)
    }
}
