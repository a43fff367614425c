//! HTTP routes

use std::sync::Arc;

use axum::{
    Json, Router,
    http::{Method, header},
    middleware,
    routing::get,
};
use sable_auth::{AuthenticatedUser, Validator, require_bearer};
use serde::Serialize;
use serde_json::{Value, json};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Build the application router
///
/// `/health` is public; everything under `/api` requires a bearer token.
pub fn router(validator: Arc<Validator>) -> Router {
    let protected = Router::new()
        .route("/api/auth/profile", get(profile))
        .route_layer(middleware::from_fn_with_state(validator, require_bearer));

    Router::new()
        .route("/health", get(health))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::ORIGIN,
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::AUTHORIZATION,
        ])
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "message": "Service is healthy",
    }))
}

#[derive(Debug, Serialize)]
struct Profile {
    id: String,
    email: Option<String>,
    username: Option<String>,
}

async fn profile(user: AuthenticatedUser) -> Json<Profile> {
    Json(Profile {
        id: user.user_id,
        email: user.email,
        username: user.username,
    })
}
