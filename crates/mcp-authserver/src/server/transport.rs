//! HTTP front door.
//!
//! Routes the OAuth endpoints, answers CORS preflights, and makes sure every
//! failure (wrong method, unknown path) still carries a JSON error envelope.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::Request,
    http::{HeaderValue, Method, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use super::oauth::handlers;
use super::oauth::jwt::TokenIssuer;
use super::oauth::store::OAuthStore;
use crate::config::Config;
use crate::config::oauth::paths;
use crate::error::OAuthError;

/// Shared state for HTTP handlers.
pub struct AppState {
    pub config: Config,
    pub tokens: Arc<TokenIssuer>,
    pub store: Arc<dyn OAuthStore>,
}

impl AppState {
    #[must_use]
    pub fn new(config: Config, tokens: Arc<TokenIssuer>, store: Arc<dyn OAuthStore>) -> Self {
        Self { config, tokens, store }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("tokens", &self.tokens)
            .finish_non_exhaustive()
    }
}

/// Create the HTTP router for the authorization server.
pub fn create_router(state: AppState) -> Router {
    let state = Arc::new(state);

    Router::new()
        .route(paths::HEALTH, get(health_check).fallback(method_not_allowed))
        .route(paths::REGISTER, post(handlers::handle_register).fallback(method_not_allowed))
        .route(
            paths::METADATA,
            get(handlers::handle_auth_server_metadata).fallback(method_not_allowed),
        )
        .route(paths::JWKS, get(handlers::handle_jwks).fallback(method_not_allowed))
        .route(paths::AUTHORIZE, get(handlers::handle_authorize).fallback(method_not_allowed))
        .route(paths::TOKEN, post(handlers::handle_token).fallback(method_not_allowed))
        .fallback(not_found)
        .layer(middleware::from_fn(cors))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Permissive CORS on every response; `OPTIONS` is answered before routing.
async fn cors(request: Request, next: Next) -> Response {
    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(request).await
    };

    let headers = response.headers_mut();
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Authorization, Content-Type"),
    );
    headers.insert(header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static("600"));
    response
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "mcp-authserver",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn method_not_allowed() -> OAuthError {
    OAuthError::MethodNotAllowed
}

async fn not_found() -> OAuthError {
    OAuthError::NotFound
}
