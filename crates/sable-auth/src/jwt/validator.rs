//! JWT validation for HS256 and JWKS-backed RS256 tokens
//!
//! This module implements the single entry point the HTTP layer calls for
//! every authenticated request:
//! - Structural check (three segments, decodable header)
//! - Algorithm dispatch on exactly two schemes; everything else is refused
//! - Signature verification pinned to the dispatched algorithm
//! - Explicit expiry and subject checks
//!
//! # Algorithm confusion
//!
//! The unverified header only selects a verification path. Each path builds a
//! [`Validation`] that accepts exactly one algorithm, so an HS256 header can
//! never be verified with an RSA public key (or the reverse), and `none` or
//! any other algorithm never reaches a key at all.

use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use secrecy::ExposeSecret;
use serde::Deserialize;
use tracing::{debug, warn};

use super::claims::{Claims, TokenClaims};
use super::jwks::KeyCache;
use crate::config::AuthSettings;
use crate::error::{AuthError, AuthResult, ConfigError};

/// The two accepted signing schemes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningScheme {
    /// HS256 with the deployment's shared secret
    Hmac,
    /// RS256 with a key from the identity provider's JWKS
    Rsa,
}

impl SigningScheme {
    /// Map a header `alg` to a scheme; `None` for anything not accepted
    pub fn from_alg(alg: &str) -> Option<Self> {
        match alg {
            "HS256" => Some(Self::Hmac),
            "RS256" => Some(Self::Rsa),
            _ => None,
        }
    }

    /// The only algorithm verification accepts for this scheme
    pub fn algorithm(self) -> Algorithm {
        match self {
            Self::Hmac => Algorithm::HS256,
            Self::Rsa => Algorithm::RS256,
        }
    }

    fn validation(self) -> Validation {
        let mut validation = Validation::new(self.algorithm());
        validation.leeway = 0;
        // Audience is not part of this deployment's checks and `exp` is optional
        validation.validate_aud = false;
        validation.required_spec_claims.clear();
        validation
    }
}

/// Unverified token header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenHeader {
    /// Declared algorithm
    pub alg: String,
    /// Declared key id
    pub kid: Option<String>,
}

#[derive(Deserialize)]
struct RawHeader {
    #[serde(default)]
    alg: Option<String>,
    #[serde(default)]
    kid: Option<String>,
}

impl TokenHeader {
    /// Decode the first segment of `token` without verifying anything
    ///
    /// # Errors
    ///
    /// - [`AuthError::MalformedToken`] unless the token has three segments and
    ///   the first is base64url-encoded JSON
    /// - [`AuthError::AlgorithmMissing`] when `alg` is absent or empty
    /// - [`AuthError::KeyIdMissing`] when `alg` is not HS256 and `kid` is
    ///   absent or empty
    pub fn parse(token: &str) -> AuthResult<Self> {
        let segments: Vec<&str> = token.split('.').collect();
        if segments.len() != 3 {
            return Err(AuthError::MalformedToken);
        }

        let bytes = URL_SAFE_NO_PAD
            .decode(segments[0])
            .map_err(|_| AuthError::MalformedToken)?;
        let raw: RawHeader =
            serde_json::from_slice(&bytes).map_err(|_| AuthError::MalformedToken)?;

        let alg = raw
            .alg
            .filter(|alg| !alg.is_empty())
            .ok_or(AuthError::AlgorithmMissing)?;
        let kid = raw.kid.filter(|kid| !kid.is_empty());

        if alg != "HS256" && kid.is_none() {
            return Err(AuthError::KeyIdMissing);
        }

        Ok(Self { alg, kid })
    }
}

/// Bearer token validator
///
/// Stateless apart from the shared [`KeyCache`] and the immutable HMAC
/// secret; safe to call from any number of tasks at once.
///
/// # Example
///
/// ```rust,no_run
/// # use std::sync::Arc;
/// # use sable_auth::jwt::{KeyCache, Validator};
/// # tokio_test::block_on(async {
/// let keys = Arc::new(KeyCache::new("https://project.supabase.co/auth/v1/.well-known/jwks.json")?);
/// let validator = Validator::new(keys, b"shared-secret");
///
/// match validator.validate("eyJhbGciOi...").await {
///     Ok(claims) => println!("authenticated {}", claims.subject),
///     Err(e) => println!("rejected: {e}"),
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// # });
/// ```
pub struct Validator {
    key_cache: Arc<KeyCache>,
    /// `None` when no shared secret is configured
    hmac_key: Option<DecodingKey>,
}

// Manual Debug impl so the shared secret never ends up in logs
impl std::fmt::Debug for Validator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Validator")
            .field("key_cache", &self.key_cache)
            .field("hmac_configured", &self.hmac_key.is_some())
            .finish()
    }
}

impl Validator {
    /// Create a validator over a shared key cache
    ///
    /// An empty `hmac_secret` disables the HS256 scheme: such tokens are
    /// rejected with [`AuthError::SecretNotConfigured`].
    pub fn new(key_cache: Arc<KeyCache>, hmac_secret: &[u8]) -> Self {
        let hmac_key = (!hmac_secret.is_empty()).then(|| DecodingKey::from_secret(hmac_secret));
        Self {
            key_cache,
            hmac_key,
        }
    }

    /// Build the key cache and validator described by `settings`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::HttpClient`] if the JWKS HTTP client cannot be built.
    pub fn from_settings(settings: &AuthSettings) -> Result<Self, ConfigError> {
        let key_cache = KeyCache::with_options(
            settings.jwks_url.as_str(),
            settings.jwks_cache_ttl,
            settings.jwks_fetch_timeout,
        )?;
        Ok(Self::new(
            Arc::new(key_cache),
            settings.jwt_secret.expose_secret().as_bytes(),
        ))
    }

    /// The key cache backing RS256 verification
    pub fn key_cache(&self) -> &Arc<KeyCache> {
        &self.key_cache
    }

    /// Whether HS256 tokens can be verified
    pub fn hmac_configured(&self) -> bool {
        self.hmac_key.is_some()
    }

    /// Validate a bearer token and return its identity claims
    ///
    /// # Errors
    ///
    /// Any [`AuthError`] kind except [`AuthError::MissingKeyId`]; see the
    /// variant docs. Every error means "treat the request as unauthenticated".
    pub async fn validate(&self, token: &str) -> AuthResult<Claims> {
        let header = TokenHeader::parse(token)?;

        let Some(scheme) = SigningScheme::from_alg(&header.alg) else {
            warn!(alg = %header.alg, "Rejecting token with unsupported algorithm");
            return Err(AuthError::InvalidSignature);
        };

        let raw = match scheme {
            SigningScheme::Hmac => {
                let key = self.hmac_key.as_ref().ok_or(AuthError::SecretNotConfigured)?;
                verify(token, scheme, key)?
            }
            SigningScheme::Rsa => {
                let kid = header.kid.as_deref().ok_or(AuthError::KeyIdMissing)?;
                let key = self.key_cache.get_public_key(kid).await?;
                verify(token, scheme, key.decoding_key())?
            }
        };

        // Enforced independently of the verifier's own exp check
        if let Some(exp) = raw.exp
            && exp < chrono::Utc::now().timestamp()
        {
            return Err(AuthError::TokenExpired);
        }

        let subject = raw
            .sub
            .filter(|sub| !sub.is_empty())
            .ok_or(AuthError::SubjectMissing)?;

        debug!(subject = %subject, scheme = ?scheme, kid = ?header.kid, "Token validated");

        Ok(Claims {
            subject,
            email: raw.email,
            role: raw.role,
            issued_at: raw.iat,
            expires_at: raw.exp,
            metadata: raw.user_metadata,
        })
    }
}

fn verify(token: &str, scheme: SigningScheme, key: &DecodingKey) -> AuthResult<TokenClaims> {
    decode::<TokenClaims>(token, key, &scheme.validation())
        .map(|data| data.claims)
        .map_err(|err| match err.kind() {
            ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => {
                debug!(error = %err, scheme = ?scheme, "Token verification failed");
                AuthError::InvalidSignature
            }
        })
}
