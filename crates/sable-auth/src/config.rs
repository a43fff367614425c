//! Verification settings
//!
//! [`AuthSettings`] captures everything needed to build a [`Validator`]:
//! where the JWKS lives, the optional HS256 shared secret, and the cache
//! timings. Settings are resolved once at startup and never change afterwards.
//!
//! [`Validator`]: crate::jwt::Validator

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use url::Url;

use crate::error::ConfigError;
use crate::jwt::{DEFAULT_CACHE_TTL, DEFAULT_FETCH_TIMEOUT};

/// Path of the JWKS document below a Supabase project URL
pub const JWKS_WELL_KNOWN_PATH: &str = "/auth/v1/.well-known/jwks.json";

/// Environment variable holding the JWKS URL
pub const ENV_JWKS_URL: &str = "SUPABASE_JWKS_URL";
/// Fallback JWKS URL variable shared with the web frontend
pub const ENV_PUBLIC_JWKS_URL: &str = "NEXT_PUBLIC_SUPABASE_JWKS_URL";
/// Project base URL the JWKS URL is derived from when not set directly
pub const ENV_PROJECT_URL: &str = "SUPABASE_URL";
/// HS256 shared secret
pub const ENV_JWT_SECRET: &str = "SUPABASE_JWT_SECRET";

/// Token verification settings
#[derive(Debug, Clone)]
pub struct AuthSettings {
    /// JWKS endpoint (absolute http/https URL)
    pub jwks_url: Url,
    /// HS256 shared secret; empty disables HS256
    pub jwt_secret: SecretString,
    /// Lifetime of a fetched key set
    pub jwks_cache_ttl: Duration,
    /// Timeout for one JWKS request
    pub jwks_fetch_timeout: Duration,
}

impl AuthSettings {
    /// Settings for an explicit JWKS URL, with no shared secret and default timings
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidJwksUrl`] unless `jwks_url` is an absolute http(s) URL.
    pub fn new(jwks_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            jwks_url: parse_jwks_url(jwks_url)?,
            jwt_secret: SecretString::new(String::new()),
            jwks_cache_ttl: DEFAULT_CACHE_TTL,
            jwks_fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        })
    }

    /// Settings for a Supabase project, deriving the JWKS URL from its base URL
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidJwksUrl`] when the derived URL is not valid.
    pub fn from_project_url(project_url: &str) -> Result<Self, ConfigError> {
        let base = project_url.trim_end_matches('/');
        Self::new(&format!("{base}{JWKS_WELL_KNOWN_PATH}"))
    }

    /// Pick the JWKS URL by precedence: explicit URL, then the public fallback,
    /// then derivation from the project URL. Empty values count as unset.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::MissingJwksUrl`] when all three are unset
    /// - [`ConfigError::InvalidJwksUrl`] when the chosen URL is not valid
    pub fn resolve(
        jwks_url: Option<&str>,
        public_jwks_url: Option<&str>,
        project_url: Option<&str>,
    ) -> Result<Self, ConfigError> {
        fn set(value: Option<&str>) -> Option<&str> {
            value.map(str::trim).filter(|v| !v.is_empty())
        }

        if let Some(url) = set(jwks_url).or_else(|| set(public_jwks_url)) {
            return Self::new(url);
        }
        match set(project_url) {
            Some(base) => Self::from_project_url(base),
            None => Err(ConfigError::MissingJwksUrl),
        }
    }

    /// Resolve settings from the process environment
    ///
    /// Reads [`ENV_JWKS_URL`], [`ENV_PUBLIC_JWKS_URL`], [`ENV_PROJECT_URL`] and
    /// [`ENV_JWT_SECRET`].
    ///
    /// # Errors
    ///
    /// As [`AuthSettings::resolve`].
    pub fn from_env() -> Result<Self, ConfigError> {
        let var = |name: &str| std::env::var(name).ok();
        let settings = Self::resolve(
            var(ENV_JWKS_URL).as_deref(),
            var(ENV_PUBLIC_JWKS_URL).as_deref(),
            var(ENV_PROJECT_URL).as_deref(),
        )?;
        Ok(match var(ENV_JWT_SECRET) {
            Some(secret) => settings.with_jwt_secret(secret),
            None => settings,
        })
    }

    /// Set the HS256 shared secret
    #[must_use]
    pub fn with_jwt_secret(mut self, secret: impl Into<String>) -> Self {
        self.jwt_secret = SecretString::new(secret.into());
        self
    }

    /// Set the key set lifetime
    #[must_use]
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.jwks_cache_ttl = ttl;
        self
    }

    /// Set the JWKS request timeout
    #[must_use]
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.jwks_fetch_timeout = timeout;
        self
    }

    /// Whether HS256 tokens can be verified with these settings
    pub fn hmac_enabled(&self) -> bool {
        !self.jwt_secret.expose_secret().is_empty()
    }
}

fn parse_jwks_url(raw: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidJwksUrl {
        url: raw.to_string(),
        reason,
    };

    let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(invalid(format!("unsupported scheme '{other}'"))),
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(invalid("missing host".to_string()));
    }
    Ok(url)
}
