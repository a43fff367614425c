//! JWKS (JSON Web Key Set) fetching and caching
//!
//! [`KeyCache`] keeps the identity provider's RSA signing keys in memory and
//! refreshes them on demand:
//!
//! - **TTL-based caching**: default 10 minutes, fixed at construction
//! - **Whole-set swaps**: a refresh either replaces the entire [`KeySet`] or
//!   leaves the previous one untouched
//! - **Single flight**: concurrent callers racing on an expired cache trigger
//!   one fetch and share its outcome
//! - **Bounded fetches**: every request carries a timeout (default 10 seconds)
//!
//! Readers of a fresh cache only take a shared lock for the duration of a map
//! lookup; they never wait on the network.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::DecodingKey;
use parking_lot::RwLock;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::error::{AuthError, AuthResult, ConfigError};

/// Default lifetime of a fetched key set
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(600);

/// Default timeout for a single JWKS request
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// A single entry of a JWKS document
///
/// Only the members needed for RSA verification are modelled. Everything is
/// optional so that one odd entry cannot fail the whole document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Jwk {
    /// Key type (`RSA`, `EC`, `oct`, ...)
    #[serde(default)]
    pub kty: Option<String>,
    /// Key id
    #[serde(default)]
    pub kid: Option<String>,
    /// Public key use (`sig`, `enc`)
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,
    /// Intended algorithm
    #[serde(default)]
    pub alg: Option<String>,
    /// RSA modulus, base64url without padding
    #[serde(default)]
    pub n: Option<String>,
    /// RSA public exponent, base64url without padding
    #[serde(default)]
    pub e: Option<String>,
}

/// A JWKS document: `{ "keys": [ ... ] }`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JwkSet {
    /// The published keys
    #[serde(default)]
    pub keys: Vec<Jwk>,
}

/// Why a JWKS entry was left out of the key set
#[derive(Debug, thiserror::Error)]
pub(crate) enum JwkRejection {
    #[error("unsupported key type '{0}'")]
    UnsupportedKeyType(String),

    #[error("missing '{0}' parameter")]
    MissingParameter(&'static str),

    #[error("'{param}' is not valid base64url: {source}")]
    Encoding {
        param: &'static str,
        #[source]
        source: base64::DecodeError,
    },

    #[error("exponent does not fit in 64 bits")]
    ExponentOverflow,

    #[error("key rejected: {0}")]
    InvalidKey(String),
}

/// An RSA public key taken from the JWKS
#[derive(Clone)]
pub struct PublicKey {
    kid: String,
    modulus: Vec<u8>,
    exponent: u64,
    decoding_key: DecodingKey,
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublicKey")
            .field("kid", &self.kid)
            .field("modulus_bits", &(self.modulus.len() * 8))
            .field("exponent", &self.exponent)
            .finish_non_exhaustive()
    }
}

impl PublicKey {
    /// Build a public key from a JWKS entry
    pub(crate) fn from_jwk(jwk: &Jwk) -> Result<Self, JwkRejection> {
        let kty = jwk.kty.as_deref().unwrap_or_default();
        if kty != "RSA" {
            return Err(JwkRejection::UnsupportedKeyType(kty.to_string()));
        }

        let kid = required(&jwk.kid, "kid")?;
        let n = required(&jwk.n, "n")?;
        let e = required(&jwk.e, "e")?;

        let modulus = URL_SAFE_NO_PAD
            .decode(n)
            .map_err(|source| JwkRejection::Encoding { param: "n", source })?;
        let exponent_bytes = URL_SAFE_NO_PAD
            .decode(e)
            .map_err(|source| JwkRejection::Encoding { param: "e", source })?;
        let exponent = exponent_from_be_bytes(&exponent_bytes).ok_or(JwkRejection::ExponentOverflow)?;

        // Zero-valued parameters are as good as absent
        let Some(first_significant) = modulus.iter().position(|&b| b != 0) else {
            return Err(JwkRejection::MissingParameter("n"));
        };
        if exponent == 0 {
            return Err(JwkRejection::MissingParameter("e"));
        }

        let decoding_key = DecodingKey::from_rsa_components(n, e)
            .map_err(|err| JwkRejection::InvalidKey(err.to_string()))?;

        Ok(Self {
            kid: kid.to_string(),
            modulus: modulus[first_significant..].to_vec(),
            exponent,
            decoding_key,
        })
    }

    /// Key id this key is published under
    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// Big-endian modulus without leading zero bytes
    pub fn modulus(&self) -> &[u8] {
        &self.modulus
    }

    /// Public exponent
    pub fn exponent(&self) -> u64 {
        self.exponent
    }

    /// Key material in the form the verifier consumes
    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }
}

fn required<'a>(value: &'a Option<String>, param: &'static str) -> Result<&'a str, JwkRejection> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or(JwkRejection::MissingParameter(param))
}

fn exponent_from_be_bytes(bytes: &[u8]) -> Option<u64> {
    bytes
        .iter()
        .try_fold(0u64, |acc, &b| acc.checked_mul(256)?.checked_add(u64::from(b)))
}

/// Immutable mapping from key id to RSA public key
///
/// Built once per successful fetch and shared behind an `Arc`; it is never
/// mutated after construction.
#[derive(Debug, Clone, Default)]
pub struct KeySet {
    keys: HashMap<String, Arc<PublicKey>>,
}

impl KeySet {
    /// Parse every usable RSA key out of a JWKS document
    ///
    /// Entries that are not RSA, lack a `kid`/`n`/`e`, fail base64url decoding
    /// or carry an oversized exponent are skipped with a warning.
    pub fn from_jwks(document: &JwkSet) -> Self {
        let mut keys = HashMap::with_capacity(document.keys.len());

        for jwk in &document.keys {
            match PublicKey::from_jwk(jwk) {
                Ok(key) => {
                    debug!(kid = %key.kid, alg = ?jwk.alg, "Parsed JWK");
                    keys.insert(key.kid.clone(), Arc::new(key));
                }
                Err(reason) => {
                    warn!(kid = ?jwk.kid, kty = ?jwk.kty, %reason, "Skipping JWK");
                }
            }
        }

        Self { keys }
    }

    /// Look up a key by id
    pub fn get(&self, kid: &str) -> Option<Arc<PublicKey>> {
        self.keys.get(kid).cloned()
    }

    /// Whether a key id is present
    pub fn contains(&self, kid: &str) -> bool {
        self.keys.contains_key(kid)
    }

    /// Number of keys
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the set holds no keys
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Ids of all keys, in no particular order
    pub fn key_ids(&self) -> impl Iterator<Item = &str> {
        self.keys.keys().map(String::as_str)
    }
}

#[derive(Debug, Default)]
struct CacheState {
    keys: Arc<KeySet>,
    expires_at: Option<Instant>,
    /// Completed fetch attempts, successful or not
    attempts: u64,
    /// Outcome of the latest attempt when it failed
    last_failure: Option<AuthError>,
}

impl CacheState {
    fn is_fresh(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() < at)
    }
}

/// Cache of the identity provider's RSA signing keys
///
/// Construct one per process and share it behind an `Arc`.
///
/// # Example
///
/// ```rust,no_run
/// # use sable_auth::jwt::KeyCache;
/// # tokio_test::block_on(async {
/// let cache = KeyCache::new("https://project.supabase.co/auth/v1/.well-known/jwks.json")?;
///
/// // First call fetches the JWKS, later calls are served from memory for 10 minutes
/// let key = cache.get_public_key("key-id-123").await?;
/// println!("modulus is {} bits", key.modulus().len() * 8);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// # });
/// ```
pub struct KeyCache {
    jwks_url: String,
    http_client: reqwest::Client,
    ttl: Duration,
    state: RwLock<CacheState>,
    /// Serializes fetches; never held by readers of a fresh cache
    refresh_lock: Mutex<()>,
}

impl std::fmt::Debug for KeyCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("KeyCache")
            .field("jwks_url", &self.jwks_url)
            .field("ttl", &self.ttl)
            .field("cached_keys", &state.keys.len())
            .field("fresh", &state.is_fresh())
            .finish()
    }
}

impl KeyCache {
    /// Create a key cache with the default TTL and fetch timeout
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::HttpClient`] if the HTTP client cannot be built.
    pub fn new(jwks_url: impl Into<String>) -> Result<Self, ConfigError> {
        Self::with_options(jwks_url, DEFAULT_CACHE_TTL, DEFAULT_FETCH_TIMEOUT)
    }

    /// Create a key cache with a custom TTL
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::HttpClient`] if the HTTP client cannot be built.
    pub fn with_ttl(jwks_url: impl Into<String>, ttl: Duration) -> Result<Self, ConfigError> {
        Self::with_options(jwks_url, ttl, DEFAULT_FETCH_TIMEOUT)
    }

    /// Create a key cache with a custom TTL and per-request fetch timeout
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::HttpClient`] if the HTTP client cannot be built.
    pub fn with_options(
        jwks_url: impl Into<String>,
        ttl: Duration,
        fetch_timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let http_client = reqwest::Client::builder()
            .timeout(fetch_timeout)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            jwks_url: jwks_url.into(),
            http_client,
            ttl,
            state: RwLock::new(CacheState::default()),
            refresh_lock: Mutex::new(()),
        })
    }

    /// JWKS endpoint this cache reads from
    pub fn jwks_url(&self) -> &str {
        &self.jwks_url
    }

    /// Lifetime of a fetched key set
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Whether the cached key set is within its TTL
    pub fn is_fresh(&self) -> bool {
        self.state.read().is_fresh()
    }

    /// Snapshot of the current key set, fresh or not
    pub fn key_set(&self) -> Arc<KeySet> {
        Arc::clone(&self.state.read().keys)
    }

    /// Return the public key published under `kid`
    ///
    /// Served from memory while the cache is fresh. An expired cache, or a
    /// key id missing from a fresh one, goes through a refresh first; the
    /// refresh is a no-op when the cache is still within its TTL, so unknown
    /// key ids cannot be used to force fetches.
    ///
    /// Dropping the returned future abandons an in-flight fetch and leaves the
    /// cache as it was.
    ///
    /// # Errors
    ///
    /// - [`AuthError::MissingKeyId`] for an empty `kid` (no network access)
    /// - [`AuthError::KeyFetchFailed`] when a required refresh fails
    /// - [`AuthError::KeyNotFound`] when the key set does not contain `kid`
    pub async fn get_public_key(&self, kid: &str) -> AuthResult<Arc<PublicKey>> {
        if kid.is_empty() {
            return Err(AuthError::MissingKeyId);
        }

        let observed_attempts = {
            let state = self.state.read();
            if state.is_fresh() {
                if let Some(key) = state.keys.get(kid) {
                    debug!(kid, "JWKS cache hit");
                    return Ok(key);
                }
                debug!(kid, "Key id not in cached JWKS");
            } else {
                debug!(kid, "JWKS cache expired");
            }
            state.attempts
        };

        self.refresh(observed_attempts).await?;

        let state = self.state.read();
        state.keys.get(kid).ok_or_else(|| {
            warn!(kid, jwks_url = %self.jwks_url, "Key id not found in JWKS");
            AuthError::KeyNotFound {
                kid: kid.to_string(),
            }
        })
    }

    async fn refresh(&self, observed_attempts: u64) -> AuthResult<()> {
        let _guard = self.refresh_lock.lock().await;

        {
            let state = self.state.read();
            if state.is_fresh() {
                debug!(jwks_url = %self.jwks_url, "JWKS still fresh, skipping fetch");
                return Ok(());
            }
            // Someone fetched while we waited for the lock: reuse their outcome
            if state.attempts != observed_attempts {
                return match &state.last_failure {
                    Some(err) => Err(err.clone()),
                    None => Ok(()),
                };
            }
        }

        let outcome = self.fetch_key_set().await;

        let mut state = self.state.write();
        state.attempts += 1;
        match outcome {
            Ok(keys) => {
                info!(
                    jwks_url = %self.jwks_url,
                    key_count = keys.len(),
                    ttl_secs = self.ttl.as_secs(),
                    "JWKS cache updated"
                );
                state.keys = Arc::new(keys);
                state.expires_at = Some(Instant::now() + self.ttl);
                state.last_failure = None;
                Ok(())
            }
            Err(err) => {
                error!(
                    jwks_url = %self.jwks_url,
                    error = %err,
                    cached_keys = state.keys.len(),
                    "JWKS refresh failed, keeping previous key set"
                );
                state.last_failure = Some(err.clone());
                Err(err)
            }
        }
    }

    async fn fetch_key_set(&self) -> AuthResult<KeySet> {
        info!(jwks_url = %self.jwks_url, "Fetching JWKS");

        let response = self
            .http_client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| AuthError::fetch_failed(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::fetch_failed(format!(
                "HTTP {status} from JWKS endpoint"
            )));
        }

        let document: JwkSet = response
            .json()
            .await
            .map_err(|e| AuthError::fetch_failed(format!("invalid JWKS document: {e}")))?;

        let keys = KeySet::from_jwks(&document);
        if keys.is_empty() {
            return Err(AuthError::fetch_failed(format!(
                "JWKS contains no usable RSA keys ({} entries)",
                document.keys.len()
            )));
        }

        Ok(keys)
    }
}
