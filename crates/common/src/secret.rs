//! Secret types for values that must never reach logs.
//!
//! Re-exports [`secrecy`]. The authentication pipeline keeps the raw bearer
//! token of an authenticated request in a [`SecretString`] so downstream
//! handlers can forward it, while any `Debug` output of the request context
//! stays redacted.
//!
//! # Example
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct Credentials {
//!     subject: String,
//!     bearer_token: SecretString, // Debug shows "[REDACTED]"
//! }
//!
//! let creds = Credentials {
//!     subject: "alice".to_string(),
//!     bearer_token: SecretString::from("eyJhbGciOiJSUzI1NiJ9.e30.sig"),
//! };
//!
//! assert!(!format!("{creds:?}").contains("eyJhbGci"));
//! assert_eq!(creds.bearer_token.expose_secret(), "eyJhbGciOiJSUzI1NiJ9.e30.sig");
//! ```

pub use secrecy::{ExposeSecret, SecretString};
