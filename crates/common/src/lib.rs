//! Shared JWT primitives for the Cognito authentication pipeline.

#![warn(clippy::pedantic)]

/// Module for JWT header parsing, temporal checks and log-safe fingerprints
pub mod jwt;

/// Module for secret types that prevent accidental logging
pub mod secret;
