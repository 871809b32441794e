//! OAuth 2.0 endpoint handlers.
//!
//! Implements:
//! - RFC 8414: OAuth Authorization Server Metadata
//! - RFC 7517: JSON Web Key Set publication
//! - RFC 7591: Dynamic Client Registration
//! - RFC 7636: PKCE (S256)
//! - RFC 6749: OAuth 2.0 Authorization Code Grant

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::{RawQuery, State, rejection::BytesRejection},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::Deserialize;

use super::pkce;
use super::store::generate_token;
use super::types::{AuthorizationCode, JwkSet, TokenResponse};
use crate::config::oauth::{AUTH_CODE_BYTES, AUTH_CODE_TTL, PKCE_METHOD_S256};
use crate::error::{OAuthError, OAuthResult};
use crate::server::transport::AppState;

// ─── RFC 8414: Authorization Server Metadata ─────────────────────────────────

/// `GET /.well-known/oauth-authorization-server`
pub async fn handle_auth_server_metadata(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let config = &state.config;
    Json(serde_json::json!({
        "issuer": config.issuer,
        "authorization_endpoint": config.authorization_endpoint(),
        "token_endpoint": config.token_endpoint(),
        "jwks_uri": config.jwks_uri(),
        "registration_endpoint": config.registration_endpoint(),
        "grant_types_supported": ["authorization_code"],
        "response_types_supported": ["code"],
        // PKCE replaces the client secret
        "token_endpoint_auth_methods_supported": ["none"],
        "code_challenge_methods_supported": [PKCE_METHOD_S256]
    }))
}

/// `GET /.well-known/jwks.json`
///
/// The trust anchor resource servers pull to verify issued tokens.
pub async fn handle_jwks(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(JwkSet { keys: vec![state.tokens.public_jwk()] })
}

// ─── RFC 7591: Dynamic Client Registration ───────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct RegisterRequest {
    /// `null` and a missing key are both treated as an empty list.
    pub redirect_uris: Option<Vec<String>>,
    pub token_endpoint_auth_method: Option<String>,
}

/// `POST /register`
///
/// Register a new OAuth client dynamically. The body is parsed as JSON
/// whatever the declared content type.
pub async fn handle_register(
    State(state): State<Arc<AppState>>,
    body: Result<Bytes, BytesRejection>,
) -> OAuthResult<Response> {
    let req = body
        .map_err(|rejection| rejection.to_string())
        .and_then(|bytes| {
            serde_json::from_slice::<RegisterRequest>(&bytes).map_err(|e| e.to_string())
        })
        .map_err(|error| {
            tracing::debug!(%error, "Rejected registration body");
            OAuthError::InvalidRequest(None)
        })?;

    let client = state
        .store
        .register_client(
            req.redirect_uris.unwrap_or_default(),
            req.token_endpoint_auth_method.as_deref(),
        )
        .await?;

    let registration_uri = state.config.registration_client_uri(&client.client_id);

    tracing::info!(
        client_id = %client.client_id,
        auth_method = %client.token_endpoint_auth_method,
        "Registered OAuth client"
    );

    let mut body = serde_json::json!({
        "client_id": client.client_id,
        "redirect_uris": client.redirect_uris,
        "client_id_issued_at": client.client_id_issued_at,
        "token_endpoint_auth_method": client.token_endpoint_auth_method,
        "registration_client_uri": registration_uri,
    });
    if !client.client_secret.is_empty() {
        body["client_secret"] = serde_json::Value::from(client.client_secret);
    }

    let location = HeaderValue::try_from(registration_uri)
        .map_err(|_| OAuthError::server_error("invalid registration URI"))?;

    Ok((StatusCode::CREATED, [(header::LOCATION, location)], Json(body)).into_response())
}

// ─── Authorization Endpoint ──────────────────────────────────────────────────

/// Form-encoded parameters; the first occurrence of a repeated key wins.
#[derive(Debug, Default)]
struct Params(HashMap<String, String>);

impl Params {
    fn parse(input: &[u8]) -> Self {
        let mut params = HashMap::new();
        for (key, value) in url::form_urlencoded::parse(input) {
            params.entry(key.into_owned()).or_insert_with(|| value.into_owned());
        }
        Self(params)
    }

    /// Remove a parameter, empty when absent.
    fn take(&mut self, key: &str) -> String {
        self.0.remove(key).unwrap_or_default()
    }
}

#[derive(Debug, Default)]
pub struct AuthorizeQuery {
    pub client_id: String,
    pub redirect_uri: String,
    pub response_type: String,
    pub code_challenge: String,
    pub code_challenge_method: String,
    pub resource: String,
    pub state: String,
    pub scope: String,
}

impl AuthorizeQuery {
    fn from_params(mut params: Params) -> Self {
        Self {
            client_id: params.take("client_id"),
            redirect_uri: params.take("redirect_uri"),
            response_type: params.take("response_type"),
            code_challenge: params.take("code_challenge"),
            code_challenge_method: params.take("code_challenge_method"),
            resource: params.take("resource"),
            state: params.take("state"),
            scope: params.take("scope"),
        }
    }
}

/// `GET /oauth/authorize`
///
/// Auto-approves the request: there is no resource-owner login or consent
/// step. Any known client presenting a registered redirect URI, an S256
/// challenge and a resource gets a code.
pub async fn handle_authorize(
    State(state): State<Arc<AppState>>,
    RawQuery(raw): RawQuery,
) -> OAuthResult<Response> {
    let query = AuthorizeQuery::from_params(Params::parse(raw.unwrap_or_default().as_bytes()));

    let Some(client) = state.store.get_client(&query.client_id).await else {
        tracing::debug!(client_id = %query.client_id, "Unknown client");
        return Err(OAuthError::InvalidClient(None));
    };
    if !client.allows_redirect(&query.redirect_uri) {
        return Err(OAuthError::InvalidRedirectUri(None));
    }
    if query.response_type != "code" {
        return Err(OAuthError::UnsupportedResponseType);
    }
    if query.code_challenge.is_empty() || query.code_challenge_method != PKCE_METHOD_S256 {
        return Err(OAuthError::invalid_request("code_challenge required and must be S256"));
    }
    if query.resource.is_empty() {
        return Err(OAuthError::invalid_request("resource parameter required"));
    }

    let code = generate_token(AUTH_CODE_BYTES)?;
    let expires_at = Utc::now()
        + chrono::Duration::from_std(AUTH_CODE_TTL).unwrap_or(chrono::Duration::minutes(10));

    let location = HeaderValue::try_from(redirect_location(
        &query.redirect_uri,
        &code,
        &query.state,
    ))
    .map_err(|_| OAuthError::InvalidRedirectUri(None))?;

    state
        .store
        .put_code(
            code,
            AuthorizationCode {
                client_id: query.client_id,
                redirect_uri: query.redirect_uri,
                code_challenge: query.code_challenge,
                code_challenge_method: query.code_challenge_method,
                resource: query.resource,
                scope: query.scope,
                expires_at,
            },
        )
        .await;

    tracing::info!(client_id = %client.client_id, "Auto-approved authorization");

    Ok((StatusCode::FOUND, [(header::LOCATION, location)]).into_response())
}

/// Build `<redirect_uri>?code=<code>[&state=<state>]`.
fn redirect_location(redirect_uri: &str, code: &str, state: &str) -> String {
    let mut location = redirect_uri.to_owned();
    location.push(if redirect_uri.contains('?') { '&' } else { '?' });
    location.push_str("code=");
    location.push_str(code);
    if !state.is_empty() {
        location.push_str("&state=");
        location.extend(url::form_urlencoded::byte_serialize(state.as_bytes()));
    }
    location
}

// ─── Token Endpoint ──────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct TokenRequest {
    pub grant_type: String,
    pub code: String,
    pub client_id: String,
    pub code_verifier: String,
    pub resource: String,
    pub redirect_uri: String,
}

impl TokenRequest {
    fn from_params(mut params: Params) -> Self {
        Self {
            grant_type: params.take("grant_type"),
            code: params.take("code"),
            client_id: params.take("client_id"),
            code_verifier: params.take("code_verifier"),
            resource: params.take("resource"),
            redirect_uri: params.take("redirect_uri"),
        }
    }
}

/// `POST /oauth/token`
///
/// Exchange an authorization code and PKCE verifier for a signed access token.
/// Only a form-urlencoded body is read; any other body yields no parameters.
pub async fn handle_token(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> OAuthResult<Response> {
    let body = body.map_err(|rejection| {
        tracing::debug!(error = %rejection, "Rejected token request body");
        OAuthError::InvalidRequest(None)
    })?;

    let form = if is_form_urlencoded(&headers) {
        TokenRequest::from_params(Params::parse(&body))
    } else {
        TokenRequest::default()
    };

    if form.grant_type != "authorization_code" {
        return Err(OAuthError::UnsupportedGrantType);
    }

    let check = |code: &AuthorizationCode| -> OAuthResult<()> {
        if form.client_id != code.client_id {
            return Err(OAuthError::InvalidClient(None));
        }
        if !form.redirect_uri.is_empty() && form.redirect_uri != code.redirect_uri {
            return Err(OAuthError::invalid_grant("redirect_uri mismatch"));
        }
        if form.resource.is_empty() {
            return Err(OAuthError::invalid_request("resource parameter required"));
        }
        if form.resource != code.resource {
            return Err(OAuthError::invalid_grant("resource mismatch"));
        }
        if !pkce::verify_s256(&form.code_verifier, &code.code_challenge) {
            return Err(OAuthError::invalid_grant("PKCE verification failed"));
        }
        Ok(())
    };

    let auth_code = state.store.redeem_code(&form.code, &check).await.inspect_err(|e| {
        tracing::debug!(client_id = %form.client_id, error = %e, "Token request rejected");
    })?;

    // The code is gone from here on; a signing failure loses it.
    let access_token = state.tokens.issue(&auth_code.resource, &auth_code.scope)?;

    tracing::info!(
        client_id = %auth_code.client_id,
        resource = %auth_code.resource,
        "Issued access token"
    );

    Ok(token_success(TokenResponse {
        access_token,
        token_type: "Bearer",
        expires_in: state.tokens.token_ttl().as_secs(),
        scope: auth_code.scope,
    }))
}

fn is_form_urlencoded(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("application/x-www-form-urlencoded"))
}

/// Build a token response with required OAuth 2.0 cache headers (RFC 6749 §5.1).
fn token_success(body: TokenResponse) -> Response {
    let mut response = Json(body).into_response();

    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    response
}
