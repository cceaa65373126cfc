//! Bearer token verification pipeline.
//!
//! - `jwks` - Key Source: fetches and caches the provider's signing keys
//! - `jwt` - Token Verifier: signature, algorithm and claim checks
//! - `claims` - Verified claim set handed to the mapper
//! - `principal` - Claims-to-principal mapping

pub mod claims;
pub mod jwks;
pub mod jwt;
pub mod principal;

pub use claims::VerifiedClaims;
pub use jwks::{JwksClient, JwksClientOptions, KeySource, VerificationKey};
pub use jwt::{TokenUse, TokenVerifier, VerifierOptions};
pub use principal::{AuthenticationPrincipal, MapperOptions, PrincipalMapper};
