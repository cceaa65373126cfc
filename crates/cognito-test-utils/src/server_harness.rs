//! Test server harness for E2E testing
//!
//! Provides `MockJwks` (a wiremock-backed Cognito JWKS endpoint) and
//! `TestAuthServer` (the host routes with the authentication middleware,
//! bound to a random port).

use crate::crypto_fixtures::{jwks_json, TestSigningKey};
use cognito_auth::config::Config;
use cognito_auth::middleware::auth::Authenticator;
use cognito_auth::routes;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Path Cognito publishes the user pool keys under.
pub const JWKS_PATH: &str = "/.well-known/jwks.json";

/// Mock Cognito JWKS endpoint.
pub struct MockJwks {
    server: MockServer,
}

impl MockJwks {
    /// Serve a JWKS document containing `keys`.
    pub async fn start(keys: &[&TestSigningKey]) -> Self {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks_json(keys)))
            .mount(&server)
            .await;
        Self { server }
    }

    /// Answer every JWKS request with `status`.
    pub async fn start_failing(status: u16) -> Self {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(status))
            .mount(&server)
            .await;
        Self { server }
    }

    /// Full JWKS URL.
    pub fn jwks_url(&self) -> String {
        format!("{}{}", self.server.uri(), JWKS_PATH)
    }

    /// Number of JWKS requests received so far.
    pub async fn fetch_count(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map(|requests| requests.len())
            .unwrap_or(0)
    }
}

/// Test harness for spawning the host service in E2E tests
///
/// # Example
/// ```rust,ignore
/// let jwks = MockJwks::start(&[&TestSigningKey::primary()]).await;
/// let server = TestAuthServer::spawn(&jwks.jwks_url()).await?;
///
/// let response = reqwest::Client::new()
///     .get(format!("{}/v1/me", server.url()))
///     .bearer_auth(token)
///     .send()
///     .await?;
/// ```
pub struct TestAuthServer {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl TestAuthServer {
    /// Spawn with default settings against `jwks_url`.
    pub async fn spawn(jwks_url: &str) -> Result<Self, anyhow::Error> {
        Self::spawn_with_vars(jwks_url, &[]).await
    }

    /// Spawn with extra configuration variables (e.g. `COGNITO_TOKEN_USE`).
    ///
    /// The server will:
    /// - Bind to a random available port (127.0.0.1:0)
    /// - Resolve keys from `jwks_url`
    /// - Start the HTTP server in the background
    pub async fn spawn_with_vars(
        jwks_url: &str,
        extra_vars: &[(&str, &str)],
    ) -> Result<Self, anyhow::Error> {
        let mut vars: HashMap<String, String> = extra_vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        vars.insert("COGNITO_JWKS_URL".to_string(), jwks_url.to_string());
        vars.insert("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string());

        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Invalid test configuration: {}", e))?;

        let authenticator = Arc::new(Authenticator::from_config(&config));
        let app = routes::build_routes(authenticator, None);

        let listener = tokio::net::TcpListener::bind(config.bind_address.as_str())
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;
        let addr = listener.local_addr()?;

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            handle,
        })
    }

    /// Base URL (e.g. `http://127.0.0.1:54321`).
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

impl Drop for TestAuthServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
