//! JWT verification
//!
//! ```text
//! ┌──────────────────────────────┐
//! │          Validator           │
//! │  - header parse / dispatch   │
//! │  - signature, exp, sub       │
//! └──────┬───────────────┬───────┘
//!        │ HS256         │ RS256
//!        ▼               ▼
//!  shared secret     KeyCache ──► JWKS endpoint
//! ```
//!
//! - `validator` - token validation entry point
//! - `jwks` - JWKS fetching and caching
//! - `claims` - identity claims handed back to callers

pub mod claims;
pub mod jwks;
pub mod validator;

pub use claims::{Claims, Metadata, MetadataValue};
pub use jwks::{DEFAULT_CACHE_TTL, DEFAULT_FETCH_TIMEOUT, Jwk, JwkSet, KeyCache, KeySet, PublicKey};
pub use validator::{SigningScheme, TokenHeader, Validator};
