//! # Cognito Test Utilities
//!
//! Shared test utilities for the `cognito-auth` crate.
//!
//! This crate provides:
//! - Deterministic crypto fixtures (fixed RSA keys for reproducible tests)
//! - Cognito claim builders (`CognitoClaimsBuilder`)
//! - Server test harness (`MockJwks`, `TestAuthServer` for E2E tests)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cognito_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let key = TestSigningKey::primary();
//!     let jwks = MockJwks::start(&[&key]).await;
//!     let server = TestAuthServer::spawn(&jwks.jwks_url()).await?;
//!
//!     let token = key.sign(&CognitoClaimsBuilder::new("alice").groups(&["admin"]).build());
//! }
//! ```

pub mod crypto_fixtures;
pub mod server_harness;
pub mod token_builders;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use server_harness::*;
pub use token_builders::*;
