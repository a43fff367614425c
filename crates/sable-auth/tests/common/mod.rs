//! Common test utilities for integration tests
//!
//! Provides a mock JWKS endpoint, RSA signing keys published as JWKs, and
//! helpers to mint HS256/RS256 tokens.

#![allow(dead_code)]

use std::sync::LazyLock;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

/// Shared HS256 secret used across tests
pub const HMAC_SECRET: &[u8] = b"integration-test-hmac-secret";

/// An RSA signing key together with its JWK representation
#[derive(Clone)]
pub struct TestKey {
    pub kid: String,
    pub encoding_key: EncodingKey,
    pub n: String,
    pub e: String,
}

impl TestKey {
    /// Generate a fresh 2048-bit RSA key pair
    pub fn generate(kid: &str) -> Self {
        use rsa::pkcs8::{EncodePrivateKey, LineEnding};
        use rsa::traits::PublicKeyParts;
        use rsa::RsaPrivateKey;

        let mut rng = rand::thread_rng();
        let private_key = RsaPrivateKey::new(&mut rng, 2048).expect("Failed to generate RSA key");
        let private_pem = private_key
            .to_pkcs8_pem(LineEnding::LF)
            .expect("Failed to encode private key");

        Self {
            kid: kid.to_string(),
            encoding_key: EncodingKey::from_rsa_pem(private_pem.as_bytes())
                .expect("Invalid RSA key"),
            n: URL_SAFE_NO_PAD.encode(private_key.n().to_bytes_be()),
            e: URL_SAFE_NO_PAD.encode(private_key.e().to_bytes_be()),
        }
    }

    /// The shared key pair published under another key id
    pub fn shared(kid: &str) -> Self {
        static SHARED: LazyLock<TestKey> = LazyLock::new(|| TestKey::generate("shared"));
        Self {
            kid: kid.to_string(),
            ..SHARED.clone()
        }
    }

    /// JWK for the public half
    pub fn jwk(&self) -> serde_json::Value {
        json!({
            "kty": "RSA",
            "kid": self.kid,
            "use": "sig",
            "alg": "RS256",
            "n": self.n,
            "e": self.e,
        })
    }

    /// Sign `claims` with RS256, declaring this key's id
    pub fn sign(&self, claims: &serde_json::Value) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(self.kid.clone());
        encode(&header, claims, &self.encoding_key).expect("Failed to encode test JWT")
    }

    /// Sign `claims` with RS256 and no `kid` header
    pub fn sign_without_kid(&self, claims: &serde_json::Value) -> String {
        encode(&Header::new(Algorithm::RS256), claims, &self.encoding_key)
            .expect("Failed to encode test JWT")
    }
}

/// JWKS document containing the given keys
pub fn jwks(keys: &[&TestKey]) -> serde_json::Value {
    json!({ "keys": keys.iter().map(|k| k.jwk()).collect::<Vec<_>>() })
}

/// An EC key entry, which the cache must skip
pub fn ec_jwk(kid: &str) -> serde_json::Value {
    json!({
        "kty": "EC",
        "kid": kid,
        "use": "sig",
        "alg": "ES256",
        "crv": "P-256",
        "x": "WKn-ZIGevcwGIyyrzFoZNBdaq9_TsqzGl96oc0CWuis",
        "y": "y77t-RvAHRKTsSGdIYUfweuOvwrvDD-Q3Hv5J0fSKbE",
    })
}

/// Mock identity provider serving a JWKS
pub struct MockJwksServer {
    pub server: MockServer,
    pub jwks_url: String,
}

impl MockJwksServer {
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let jwks_url = format!("{}/auth/v1/.well-known/jwks.json", server.uri());
        Self { server, jwks_url }
    }

    /// Serve `document`, expecting exactly `calls` fetches
    pub async fn serve(&self, document: serde_json::Value, calls: u64) {
        self.serve_with(ResponseTemplate::new(200).set_body_json(document), calls, None)
            .await;
    }

    /// Serve `document` slowly so concurrent callers pile up on one fetch
    pub async fn serve_slowly(&self, document: serde_json::Value, calls: u64) {
        self.serve_with(
            ResponseTemplate::new(200)
                .set_body_json(document)
                .set_delay(Duration::from_millis(300)),
            calls,
            None,
        )
        .await;
    }

    /// Serve `document` for the next `times` fetches only, then fall through
    pub async fn serve_limited(&self, document: serde_json::Value, times: u64) {
        self.serve_with(
            ResponseTemplate::new(200).set_body_json(document),
            times,
            Some(times),
        )
        .await;
    }

    /// Answer with `status`, expecting exactly `calls` fetches
    pub async fn fail_with(&self, status: u16, calls: u64) {
        self.serve_with(ResponseTemplate::new(status), calls, None)
            .await;
    }

    pub async fn serve_with(&self, response: ResponseTemplate, calls: u64, limit: Option<u64>) {
        let mut mock = Mock::given(method("GET"))
            .and(path("/auth/v1/.well-known/jwks.json"))
            .respond_with(response);
        if let Some(limit) = limit {
            mock = mock.up_to_n_times(limit);
        }
        mock.expect(calls).mount(&self.server).await;
    }
}

/// Sign `claims` with HS256 and [`HMAC_SECRET`]
pub fn sign_hs256(claims: &serde_json::Value) -> String {
    sign_hmac(Algorithm::HS256, HMAC_SECRET, claims)
}

/// Sign `claims` with any HMAC algorithm and secret
pub fn sign_hmac(algorithm: Algorithm, secret: &[u8], claims: &serde_json::Value) -> String {
    encode(
        &Header::new(algorithm),
        claims,
        &EncodingKey::from_secret(secret),
    )
    .expect("Failed to encode test JWT")
}

/// Get current Unix timestamp
pub fn current_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards")
        .as_secs() as i64
}

/// Typical Supabase access token claims
pub fn user_claims(sub: &str, exp_offset_secs: i64) -> serde_json::Value {
    let now = current_timestamp();
    json!({
        "sub": sub,
        "email": format!("{sub}@example.com"),
        "role": "authenticated",
        "aud": "authenticated",
        "iat": now,
        "exp": now + exp_offset_secs,
        "user_metadata": { "username": sub },
    })
}

/// Replace the first character of the signature segment
pub fn tamper_signature(token: &str) -> String {
    let (signed, signature) = token.rsplit_once('.').expect("three-part token");
    let mut chars: Vec<char> = signature.chars().collect();
    chars[0] = if chars[0] == 'A' { 'B' } else { 'A' };
    format!("{signed}.{}", chars.into_iter().collect::<String>())
}
