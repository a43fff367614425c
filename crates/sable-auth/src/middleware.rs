//! Bearer-token middleware for axum
//!
//! [`require_bearer`] guards a router: requests without a well-formed
//! `Authorization: Bearer <token>` header, or whose token fails validation,
//! are answered with 401 and never reach a handler. Accepted requests carry
//! an [`AuthenticatedUser`] in their extensions, which handlers take as an
//! extractor.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use axum::{Json, Router, middleware, routing::get};
//! use sable_auth::{AuthSettings, AuthenticatedUser, Validator, require_bearer};
//!
//! async fn whoami(user: AuthenticatedUser) -> Json<serde_json::Value> {
//!     Json(serde_json::json!({ "id": user.user_id }))
//! }
//!
//! # fn build() -> Result<Router, Box<dyn std::error::Error>> {
//! let validator = Arc::new(Validator::from_settings(&AuthSettings::from_env()?)?);
//! let app = Router::new()
//!     .route("/whoami", get(whoami))
//!     .layer(middleware::from_fn_with_state(validator, require_bearer));
//! # Ok(app)
//! # }
//! ```

use std::sync::Arc;

use axum::{
    Json,
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, HeaderValue, StatusCode, header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::{error, warn};

use crate::jwt::Validator;

/// Identity of the caller, attached to every request that passed
/// [`require_bearer`]
#[derive(Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    /// Token subject
    pub user_id: String,
    /// `email` claim
    pub email: Option<String>,
    /// `user_metadata.username`, when it is a string
    pub username: Option<String>,
    /// The raw bearer token, for forwarding to downstream services
    pub token: String,
}

impl std::fmt::Debug for AuthenticatedUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticatedUser")
            .field("user_id", &self.user_id)
            .field("email", &self.email)
            .field("username", &self.username)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = Unauthorized;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or(Unauthorized)
    }
}

/// The single 401 answer given for every authentication failure
///
/// The body is the same whatever went wrong; the reason only goes to logs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Unauthorized;

impl IntoResponse for Unauthorized {
    fn into_response(self) -> Response {
        let body = json!({
            "error": "unauthorized",
            "error_description": "Invalid or expired token",
        });
        let mut resp = (StatusCode::UNAUTHORIZED, Json(body)).into_response();
        resp.headers_mut()
            .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        resp
    }
}

/// Extract the token from `Authorization: Bearer <token>`
///
/// The header value must be exactly two space-separated parts with the first
/// being `Bearer` (case-sensitive).
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let mut parts = value.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) if !token.is_empty() => Some(token),
        _ => None,
    }
}

/// axum middleware validating the bearer token of every request
///
/// Use with [`axum::middleware::from_fn_with_state`] and an `Arc<Validator>`.
pub async fn require_bearer(
    State(validator): State<Arc<Validator>>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(token) = bearer_token(request.headers()).map(str::to_owned) else {
        warn!(
            path = %request.uri().path(),
            has_header = request.headers().contains_key(header::AUTHORIZATION),
            "Missing or malformed Authorization header"
        );
        return Unauthorized.into_response();
    };

    let claims = match validator.validate(&token).await {
        Ok(claims) => claims,
        Err(err) if err.is_operational() => {
            error!(error = %err, path = %request.uri().path(), "Token could not be verified");
            return Unauthorized.into_response();
        }
        Err(err) => {
            warn!(error = %err, path = %request.uri().path(), "Token rejected");
            return Unauthorized.into_response();
        }
    };

    let user = AuthenticatedUser {
        username: claims.username().map(str::to_owned),
        user_id: claims.subject,
        email: claims.email,
        token,
    };
    request.extensions_mut().insert(user);

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwt::KeyCache;
    use axum::{Router, body::Body, middleware, routing::get};
    use jsonwebtoken::{EncodingKey, Header, encode};
    use tower::ServiceExt;

    const SECRET: &[u8] = b"middleware-test-secret";

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    fn hs256_token(claims: serde_json::Value) -> String {
        encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET)).unwrap()
    }

    async fn whoami(user: AuthenticatedUser) -> Json<serde_json::Value> {
        Json(json!({
            "id": user.user_id,
            "email": user.email,
            "username": user.username,
        }))
    }

    fn app() -> Router {
        let keys = Arc::new(KeyCache::new("http://127.0.0.1:9/jwks").unwrap());
        let validator = Arc::new(Validator::new(keys, SECRET));
        Router::new()
            .route("/whoami", get(whoami))
            .layer(middleware::from_fn_with_state(validator, require_bearer))
    }

    async fn call(authorization: Option<&str>) -> Response {
        let mut builder = axum::http::Request::builder().uri("/whoami");
        if let Some(value) = authorization {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        app().oneshot(builder.body(Body::empty()).unwrap()).await.unwrap()
    }

    async fn json_body(resp: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&headers("Bearer abc.def.ghi")), Some("abc.def.ghi"));
        assert_eq!(bearer_token(&headers("bearer abc")), None);
        assert_eq!(bearer_token(&headers("Basic dXNlcjpwYXNz")), None);
        assert_eq!(bearer_token(&headers("Bearer")), None);
        assert_eq!(bearer_token(&headers("Bearer ")), None);
        assert_eq!(bearer_token(&headers("Bearer  abc")), None);
        assert_eq!(bearer_token(&headers("Bearer a b")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn test_debug_redacts_token() {
        let user = AuthenticatedUser {
            user_id: "u1".to_string(),
            email: None,
            username: None,
            token: "eyJ.secret.sig".to_string(),
        };
        assert!(!format!("{user:?}").contains("eyJ.secret.sig"));
    }

    #[tokio::test]
    async fn test_valid_token_reaches_handler() {
        let exp = chrono::Utc::now().timestamp() + 3600;
        let token = hs256_token(json!({
            "sub": "user-42",
            "email": "ada@example.com",
            "exp": exp,
            "user_metadata": { "username": "ada" },
        }));

        let resp = call(Some(&format!("Bearer {token}"))).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            json_body(resp).await,
            json!({ "id": "user-42", "email": "ada@example.com", "username": "ada" })
        );
    }

    #[tokio::test]
    async fn test_rejections_share_one_response() {
        let wrong_secret = encode(
            &Header::default(),
            &json!({ "sub": "user-42" }),
            &EncodingKey::from_secret(b"other-secret"),
        )
        .unwrap();
        let expired = hs256_token(json!({
            "sub": "user-42",
            "exp": chrono::Utc::now().timestamp() - 60,
        }));

        let cases = [
            None,
            Some("Basic dXNlcjpwYXNz".to_string()),
            Some("Bearer not-a-jwt".to_string()),
            Some(format!("Bearer {wrong_secret}")),
            Some(format!("Bearer {expired}")),
        ];

        for authorization in cases {
            let resp = call(authorization.as_deref()).await;
            assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{authorization:?}");
            assert_eq!(resp.headers()[header::WWW_AUTHENTICATE], "Bearer");
            assert_eq!(
                json_body(resp).await,
                json!({
                    "error": "unauthorized",
                    "error_description": "Invalid or expired token",
                })
            );
        }
    }

    #[tokio::test]
    async fn test_extractor_without_middleware_is_unauthorized() {
        let app = Router::new().route("/whoami", get(whoami));
        let resp = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/whoami")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}
