//! JWKS client for fetching and caching the identity provider's signing keys.
//!
//! The client fetches the provider's published JWKS document (for Cognito:
//! `https://cognito-idp.<region>.amazonaws.com/<pool>/.well-known/jwks.json`)
//! and keeps the parsed keys in memory.
//!
//! # Refresh policy
//!
//! - A cached key is served without network access
//! - An unknown key ID triggers exactly one refresh before `UnknownKey`
//! - Concurrent refreshes are coalesced: callers that miss while a fetch is in
//!   flight wait for it and reuse its result
//! - An optional TTL additionally forces a refresh of an old key set
//! - A failed fetch leaves the previous key set in place

use crate::errors::AuthError;
use crate::observability::metrics;
use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::instrument;

/// Well-known issuer of a Cognito user pool.
pub fn cognito_issuer(region: &str, user_pool_id: &str) -> String {
    format!("https://cognito-idp.{region}.amazonaws.com/{user_pool_id}")
}

/// Well-known JWKS location of a Cognito user pool.
pub fn cognito_jwks_url(region: &str, user_pool_id: &str) -> String {
    format!(
        "{}/.well-known/jwks.json",
        cognito_issuer(region, user_pool_id)
    )
}

/// Resolves verification keys by key ID.
#[async_trait]
pub trait KeySource: Send + Sync {
    /// Get the verification key for `kid`.
    ///
    /// # Errors
    ///
    /// - `AuthError::UnknownKey` if no published key matches, after one refresh
    /// - `AuthError::KeySourceUnavailable` if the key set cannot be retrieved
    async fn get_key(&self, kid: &str) -> Result<Arc<VerificationKey>, AuthError>;
}

/// JSON Web Key from the JWKS endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    /// Key type ("RSA" for Cognito; "EC" and "OKP" are also understood).
    pub kty: String,

    /// Key ID - used to select the correct key for verification.
    #[serde(default)]
    pub kid: Option<String>,

    /// Algorithm the key is meant for (e.g. "RS256").
    #[serde(default)]
    pub alg: Option<String>,

    /// Key use (should be "sig" for signing).
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,

    /// RSA modulus (base64url).
    #[serde(default)]
    pub n: Option<String>,

    /// RSA public exponent (base64url).
    #[serde(default)]
    pub e: Option<String>,

    /// Curve name for EC / OKP keys.
    #[serde(default)]
    pub crv: Option<String>,

    /// EC x coordinate or OKP public key (base64url).
    #[serde(default)]
    pub x: Option<String>,

    /// EC y coordinate (base64url).
    #[serde(default)]
    pub y: Option<String>,
}

/// JWKS document.
#[derive(Debug, Clone, Deserialize)]
pub struct JwksResponse {
    /// List of JSON Web Keys.
    pub keys: Vec<Jwk>,
}

/// A published key, ready for signature verification.
#[derive(Clone)]
pub struct VerificationKey {
    /// Key ID.
    pub kid: String,

    /// JWK key type.
    pub key_type: String,

    /// Algorithm declared by the JWK, if any.
    pub algorithm: Option<Algorithm>,

    decoding_key: DecodingKey,
}

impl fmt::Debug for VerificationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerificationKey")
            .field("kid", &self.kid)
            .field("key_type", &self.key_type)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

impl VerificationKey {
    /// Build a verification key from a JWK.
    ///
    /// # Errors
    ///
    /// Returns a short reason when the JWK is not a usable signing key.
    pub fn from_jwk(jwk: &Jwk) -> Result<Self, String> {
        let kid = jwk
            .kid
            .clone()
            .filter(|kid| !kid.is_empty())
            .ok_or_else(|| "missing kid".to_string())?;

        if let Some(key_use) = &jwk.key_use {
            if key_use != "sig" {
                return Err(format!("key use '{key_use}' is not 'sig'"));
            }
        }

        let algorithm = jwk
            .alg
            .as_deref()
            .map(Algorithm::from_str)
            .transpose()
            .map_err(|e| format!("unsupported alg: {e}"))?;

        let decoding_key = match jwk.kty.as_str() {
            "RSA" => {
                let (n, e) = jwk
                    .n
                    .as_deref()
                    .zip(jwk.e.as_deref())
                    .ok_or_else(|| "RSA key missing n or e".to_string())?;
                DecodingKey::from_rsa_components(n, e)
            }
            "EC" => {
                let (x, y) = jwk
                    .x
                    .as_deref()
                    .zip(jwk.y.as_deref())
                    .ok_or_else(|| "EC key missing x or y".to_string())?;
                DecodingKey::from_ec_components(x, y)
            }
            "OKP" => {
                let x = jwk
                    .x
                    .as_deref()
                    .ok_or_else(|| "OKP key missing x".to_string())?;
                DecodingKey::from_ed_components(x)
            }
            other => return Err(format!("unsupported key type '{other}'")),
        }
        .map_err(|e| format!("invalid key material: {e}"))?;

        Ok(Self {
            kid,
            key_type: jwk.kty.clone(),
            algorithm,
            decoding_key,
        })
    }

    /// Key material for `jsonwebtoken::decode`.
    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }
}

/// Network and caching parameters for [`JwksClient`].
#[derive(Debug, Clone)]
pub struct JwksClientOptions {
    /// TCP/TLS connect timeout.
    pub connect_timeout: Duration,

    /// Timeout for reading the response.
    pub read_timeout: Duration,

    /// Maximum age of the cached key set; `None` refreshes only on unknown key IDs.
    pub cache_ttl: Option<Duration>,
}

impl Default for JwksClientOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_millis(2000),
            read_timeout: Duration::from_millis(2000),
            cache_ttl: None,
        }
    }
}

/// Cached key set.
#[derive(Default)]
struct KeyCache {
    /// Map of key ID to verification key.
    keys: HashMap<String, Arc<VerificationKey>>,

    /// When the key set was last fetched successfully.
    fetched_at: Option<Instant>,

    /// Incremented on every fetch attempt; lets waiting callers detect that a
    /// refresh happened while they queued.
    generation: u64,

    /// Whether the most recent fetch attempt failed.
    last_refresh_failed: bool,
}

/// JWKS client for fetching and caching public keys.
///
/// Thread-safe; share it behind an `Arc`.
pub struct JwksClient {
    /// URL to the JWKS endpoint.
    jwks_url: String,

    /// HTTP client for fetching JWKS.
    http_client: reqwest::Client,

    /// Cached key set; replaced wholesale on refresh.
    cache: RwLock<KeyCache>,

    /// Serializes fetches so at most one is in flight.
    refresh_lock: Mutex<()>,

    /// Optional cache TTL.
    cache_ttl: Option<Duration>,
}

impl JwksClient {
    /// Create a new JWKS client.
    ///
    /// # Arguments
    ///
    /// * `jwks_url` - URL to the provider's JWKS document
    /// * `options` - Timeouts and cache TTL
    pub fn new(jwks_url: String, options: JwksClientOptions) -> Self {
        let http_client = reqwest::Client::builder()
            .connect_timeout(options.connect_timeout)
            .read_timeout(options.read_timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "cognito.auth.jwks", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self {
            jwks_url,
            http_client,
            cache: RwLock::new(KeyCache::default()),
            refresh_lock: Mutex::new(()),
            cache_ttl: options.cache_ttl,
        }
    }

    /// Force a refresh of the key set, regardless of cache state.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::KeySourceUnavailable` if the fetch fails.
    pub async fn force_refresh(&self) -> Result<(), AuthError> {
        let observed_generation = self.cache.read().await.generation;
        self.refresh_if_unchanged(observed_generation).await
    }

    /// Key IDs currently cached, sorted.
    pub async fn cached_key_ids(&self) -> Vec<String> {
        let cache = self.cache.read().await;
        let mut kids: Vec<String> = cache.keys.keys().cloned().collect();
        kids.sort();
        kids
    }

    fn is_fresh(&self, cache: &KeyCache) -> bool {
        match (cache.fetched_at, self.cache_ttl) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(fetched_at), Some(ttl)) => fetched_at.elapsed() < ttl,
        }
    }

    /// Refresh the key set unless another caller already did so since
    /// `observed_generation` was read.
    async fn refresh_if_unchanged(&self, observed_generation: u64) -> Result<(), AuthError> {
        let _guard = self.refresh_lock.lock().await;

        {
            let cache = self.cache.read().await;
            if cache.generation != observed_generation {
                tracing::debug!(target: "cognito.auth.jwks", "Reusing JWKS refresh from a concurrent request");
                return if cache.last_refresh_failed {
                    Err(AuthError::KeySourceUnavailable)
                } else {
                    Ok(())
                };
            }
        }

        let started = Instant::now();
        let result = self.fetch_keys().await;
        metrics::record_jwks_refresh(result.is_ok(), started.elapsed());

        let mut cache = self.cache.write().await;
        cache.generation = cache.generation.wrapping_add(1);

        match result {
            Ok(keys) => {
                tracing::info!(
                    target: "cognito.auth.jwks",
                    key_count = keys.len(),
                    "JWKS cache refreshed"
                );
                cache.keys = keys;
                cache.fetched_at = Some(Instant::now());
                cache.last_refresh_failed = false;
                Ok(())
            }
            Err(e) => {
                cache.last_refresh_failed = true;
                Err(e)
            }
        }
    }

    /// Fetch and parse the JWKS document.
    #[instrument(skip(self))]
    async fn fetch_keys(&self) -> Result<HashMap<String, Arc<VerificationKey>>, AuthError> {
        tracing::debug!(target: "cognito.auth.jwks", url = %self.jwks_url, "Fetching JWKS");

        let response = self
            .http_client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(target: "cognito.auth.jwks", error = %e, "Failed to fetch JWKS");
                AuthError::KeySourceUnavailable
            })?;

        if !response.status().is_success() {
            tracing::error!(
                target: "cognito.auth.jwks",
                status = %response.status(),
                "JWKS endpoint returned error"
            );
            return Err(AuthError::KeySourceUnavailable);
        }

        let jwks: JwksResponse = response.json().await.map_err(|e| {
            tracing::error!(target: "cognito.auth.jwks", error = %e, "Failed to parse JWKS response");
            AuthError::KeySourceUnavailable
        })?;

        let mut keys = HashMap::with_capacity(jwks.keys.len());
        for jwk in &jwks.keys {
            match VerificationKey::from_jwk(jwk) {
                Ok(key) => {
                    keys.insert(key.kid.clone(), Arc::new(key));
                }
                Err(reason) => {
                    tracing::warn!(
                        target: "cognito.auth.jwks",
                        kid = jwk.kid.as_deref().unwrap_or("<none>"),
                        kty = %jwk.kty,
                        reason = %reason,
                        "Skipping unusable JWK"
                    );
                }
            }
        }

        Ok(keys)
    }
}

#[async_trait]
impl KeySource for JwksClient {
    #[instrument(skip(self), fields(kid = %kid))]
    async fn get_key(&self, kid: &str) -> Result<Arc<VerificationKey>, AuthError> {
        // Check cache first
        let observed_generation = {
            let cache = self.cache.read().await;
            if self.is_fresh(&cache) {
                if let Some(key) = cache.keys.get(kid) {
                    tracing::debug!(target: "cognito.auth.jwks", kid = %kid, "JWKS cache hit");
                    return Ok(Arc::clone(key));
                }
                tracing::debug!(target: "cognito.auth.jwks", kid = %kid, "Key not found in JWKS cache");
            }
            cache.generation
        };

        // Unknown kid, empty cache or expired TTL: one (possibly shared) refresh
        let refreshed = self.refresh_if_unchanged(observed_generation).await;

        let cache = self.cache.read().await;
        if let Err(e) = refreshed {
            // Stale keys outlive a failed TTL refresh
            if let Some(key) = cache.keys.get(kid) {
                tracing::warn!(target: "cognito.auth.jwks", kid = %kid, "Serving stale JWKS key after failed refresh");
                return Ok(Arc::clone(key));
            }
            return Err(e);
        }

        if let Some(key) = cache.keys.get(kid) {
            return Ok(Arc::clone(key));
        }

        tracing::warn!(target: "cognito.auth.jwks", kid = %kid, "Key not found in JWKS after refresh");
        Err(AuthError::UnknownKey)
    }
}
