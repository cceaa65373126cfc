//! Cognito bearer token authentication for axum services.
//!
//! Verifies identity tokens issued by an AWS Cognito user pool on inbound
//! HTTP requests and installs the resulting principal in a request-scoped
//! `SecurityContext`.
//!
//! # Architecture
//!
//! ```text
//! middleware/auth.rs -> auth/jwt.rs -> auth/jwks.rs
//!                    -> auth/principal.rs
//! ```
//!
//! # Modules
//!
//! - `auth` - Key Source, Token Verifier and Claims-to-Principal Mapper
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers of the host service
//! - `middleware` - Request interceptor and security context extractors
//! - `observability` - Prometheus metrics
//! - `routes` - Axum router setup
//!
//! # Wiring
//!
//! ```rust,ignore
//! let authenticator = Arc::new(Authenticator::from_config(&config));
//! let app = Router::new()
//!     .route("/orders", get(list_orders))
//!     .layer(from_fn_with_state(authenticator, authenticate_request));
//! ```

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod routes;
