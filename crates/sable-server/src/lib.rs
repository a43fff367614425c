//! # Sable Server
//!
//! HTTP entry point for the Sable backend: configuration from flags and
//! environment, logging, and an axum router whose API routes sit behind
//! [`sable_auth::require_bearer`].
//!
//! - [`cli`] - flags and environment variables
//! - [`routes`] - router, CORS and request tracing
//! - [`telemetry`] - tracing subscriber setup

pub mod cli;
pub mod routes;
pub mod telemetry;
