//! Observability for the authentication pipeline.
//!
//! Provides metrics definitions and the Prometheus recorder setup used by the
//! host binary.

pub mod metrics;
