//! Error types for token verification and configuration
//!
//! Every [`AuthError`] variant is recoverable from the caller's point of view:
//! the request is treated as unauthenticated. The variants exist so operators
//! can tell *why* in logs; the HTTP boundary never exposes them on the wire.

use thiserror::Error;

/// Reasons a bearer token was not accepted
///
/// `Clone` so that one JWKS refresh outcome can be handed to every caller that
/// was waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Token does not have exactly three dot-separated segments, or its
    /// header segment is not base64url-encoded JSON
    #[error("malformed token")]
    MalformedToken,

    /// Token header carries no `alg`
    #[error("token header is missing the algorithm")]
    AlgorithmMissing,

    /// Token header declares an asymmetric algorithm but carries no `kid`
    #[error("token header is missing the key id")]
    KeyIdMissing,

    /// An HS256 token was presented but no shared secret is configured
    #[error("HMAC secret is not configured")]
    SecretNotConfigured,

    /// Signature did not verify, the algorithm is not accepted, or the token
    /// body could not be decoded
    #[error("invalid token signature")]
    InvalidSignature,

    /// The `exp` claim is in the past
    #[error("token expired")]
    TokenExpired,

    /// The `sub` claim is absent or empty
    #[error("token subject is missing")]
    SubjectMissing,

    /// A key lookup was attempted with an empty key id
    #[error("key id not provided")]
    MissingKeyId,

    /// The JWKS does not contain the requested key id
    #[error("key '{kid}' not found in JWKS")]
    KeyNotFound {
        /// The key id that was looked up
        kid: String,
    },

    /// The JWKS endpoint could not be reached, answered with an error status,
    /// or returned no usable RSA keys
    #[error("JWKS fetch failed: {reason}")]
    KeyFetchFailed {
        /// Operator-facing description of the failure
        reason: String,
    },
}

impl AuthError {
    pub(crate) fn fetch_failed(reason: impl Into<String>) -> Self {
        Self::KeyFetchFailed {
            reason: reason.into(),
        }
    }

    /// Whether the failure comes from the identity provider being unavailable
    /// rather than from the presented token.
    pub fn is_operational(&self) -> bool {
        matches!(self, Self::KeyFetchFailed { .. })
    }
}

/// Result type for token verification
pub type AuthResult<T> = Result<T, AuthError>;

/// Errors raised while building the verification stack from configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Neither a JWKS URL nor an issuer base URL was supplied
    #[error("no JWKS URL configured (set SUPABASE_JWKS_URL or SUPABASE_URL)")]
    MissingJwksUrl,

    /// The JWKS URL is not an absolute http(s) URL
    #[error("invalid JWKS URL '{url}': {reason}")]
    InvalidJwksUrl {
        /// The rejected URL
        url: String,
        /// Why it was rejected
        reason: String,
    },

    /// The HTTP client used for JWKS fetches could not be built
    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_fetch_failures_are_operational() {
        assert!(AuthError::fetch_failed("connection refused").is_operational());
        assert!(!AuthError::InvalidSignature.is_operational());
        assert!(
            !AuthError::KeyNotFound {
                kid: "k1".to_string()
            }
            .is_operational()
        );
    }

    #[test]
    fn test_error_display() {
        let err = AuthError::KeyNotFound {
            kid: "rotated".to_string(),
        };
        assert_eq!(err.to_string(), "key 'rotated' not found in JWKS");

        let err = AuthError::fetch_failed("HTTP 503 from JWKS endpoint");
        assert_eq!(
            err.to_string(),
            "JWKS fetch failed: HTTP 503 from JWKS endpoint"
        );
    }
}
