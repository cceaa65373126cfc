//! HTTP middleware.
//!
//! - `auth` - Bearer token authentication and the request security context

pub mod auth;

pub use auth::{authenticate_request, AuthOutcome, Authenticated, Authenticator, SecurityContext};
