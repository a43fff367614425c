//! # Sable Auth
//!
//! Bearer-token verification for the Sable backend. Tokens are issued by
//! Supabase Auth and signed either with the project's shared secret (HS256)
//! or with an RSA key published in the project's JWKS (RS256).
//!
//! ## Architecture
//!
//! - [`jwt::KeyCache`] - JWKS fetching with TTL caching and single-flight refresh
//! - [`jwt::Validator`] - header dispatch, signature, expiry and subject checks
//! - [`jwt::Claims`] - identity claims returned for an accepted token
//! - [`config::AuthSettings`] - JWKS location, shared secret, cache timings
//! - [`middleware`] - axum middleware and request extractor (feature `middleware`)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sable_auth::{AuthSettings, Validator};
//!
//! # tokio_test::block_on(async {
//! let settings = AuthSettings::from_project_url("https://project.supabase.co")?
//!     .with_jwt_secret("super-secret-jwt-token");
//! let validator = Validator::from_settings(&settings)?;
//!
//! let claims = validator.validate("eyJhbGciOi...").await?;
//! println!("user {} ({:?})", claims.subject, claims.username());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! ```
//!
//! ## Feature Flags
//!
//! - `middleware` (default) - axum bearer middleware and [`AuthenticatedUser`] extractor

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod config;
pub mod error;
pub mod jwt;

#[cfg(feature = "middleware")]
#[cfg_attr(docsrs, doc(cfg(feature = "middleware")))]
pub mod middleware;

pub use config::AuthSettings;
pub use error::{AuthError, AuthResult, ConfigError};
pub use jwt::{Claims, KeyCache, Validator};

#[cfg(feature = "middleware")]
pub use middleware::{AuthenticatedUser, Unauthorized, bearer_token, require_bearer};
