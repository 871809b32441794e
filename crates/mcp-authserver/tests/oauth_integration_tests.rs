//! Full Authorization Code + PKCE flow tests.
//!
//! Walks authorize -> token through the router and checks the issued JWT
//! against the published JWKS.

use std::sync::{Arc, OnceLock};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use serde_json::json;
use tower::ServiceExt;

use mcp_authserver::config::Config;
use mcp_authserver::server::oauth::jwt::Claims;
use mcp_authserver::server::oauth::pkce::challenge_s256;
use mcp_authserver::server::oauth::types::AuthorizationCode;
use mcp_authserver::server::oauth::{MemoryStore, OAuthStore, TokenIssuer};
use mcp_authserver::server::transport::{AppState, create_router};

const BASE_URL: &str = "http://localhost:9000";
const SAMPLE_REDIRECT: &str = "http://localhost:8081/callback";
const RESOURCE: &str = "http://localhost:8888/mcp";
const VERIFIER: &str = "dBjftJeZ4CVP-mJ92K9mVk6SgVE5uT3O4pWZQb8wRiw";

fn issuer() -> Arc<TokenIssuer> {
    static ISSUER: OnceLock<Arc<TokenIssuer>> = OnceLock::new();
    Arc::clone(ISSUER.get_or_init(|| Arc::new(TokenIssuer::generate(BASE_URL).unwrap())))
}

fn build_test_router_with_store(store: Arc<MemoryStore>) -> axum::Router {
    create_router(AppState::new(Config::for_testing(BASE_URL), issuer(), store))
}

fn build_test_router() -> axum::Router {
    build_test_router_with_store(Arc::new(MemoryStore::new()))
}

async fn body_json(response: axum::http::Response<Body>) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

/// Run the authorization step and return the code from the redirect.
async fn authorize(app: &axum::Router, client_id: &str, redirect_uri: &str, state: &str) -> String {
    let challenge = challenge_s256(VERIFIER);
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("client_id", client_id)
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("response_type", "code")
        .append_pair("code_challenge", &challenge)
        .append_pair("code_challenge_method", "S256")
        .append_pair("resource", RESOURCE)
        .append_pair("state", state)
        .finish();

    let response = app
        .clone()
        .oneshot(Request::get(format!("/oauth/authorize?{query}")).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);

    let location = response.headers()["location"].to_str().unwrap();
    let redirect = url::Url::parse(location).unwrap();
    assert!(location.starts_with(redirect_uri));

    let params: Vec<(String, String)> = redirect.query_pairs().into_owned().collect();
    assert!(params.contains(&("state".to_owned(), state.to_owned())));
    params.into_iter().find(|(k, _)| k == "code").map(|(_, v)| v).unwrap()
}

fn token_request(code: &str, client_id: &str, verifier: &str, resource: &str) -> Request<Body> {
    let form = serde_urlencoded::to_string([
        ("grant_type", "authorization_code"),
        ("code", code),
        ("client_id", client_id),
        ("code_verifier", verifier),
        ("resource", resource),
    ])
    .unwrap();

    Request::post("/oauth/token")
        .header("Content-Type", "application/x-www-form-urlencoded")
        .body(Body::from(form))
        .unwrap()
}

fn decode_segment(segment: &str) -> serde_json::Value {
    serde_json::from_slice(&URL_SAFE_NO_PAD.decode(segment).unwrap()).unwrap()
}

// ─── Happy path ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_sample_client_full_flow() {
    let app = build_test_router();

    let code = authorize(&app, "sample-client", SAMPLE_REDIRECT, "abc").await;
    assert_eq!(code.len(), 64);

    let response = app
        .oneshot(token_request(&code, "sample-client", VERIFIER, RESOURCE))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["cache-control"], "no-store");
    assert_eq!(response.headers()["pragma"], "no-cache");
    let json = body_json(response).await;

    assert_eq!(json["token_type"], "Bearer");
    assert_eq!(json["expires_in"], 3600);

    let token = json["access_token"].as_str().unwrap();
    let parts: Vec<&str> = token.split('.').collect();
    assert_eq!(parts.len(), 3);

    let header = decode_segment(parts[0]);
    assert_eq!(header, json!({ "alg": "RS256", "typ": "JWT", "kid": "demo-key-1" }));

    let claims = decode_segment(parts[1]);
    assert_eq!(claims["iss"], BASE_URL);
    assert_eq!(claims["aud"], RESOURCE);
    assert_eq!(claims["scope"], "");
    let iat = claims["iat"].as_i64().unwrap();
    assert_eq!(claims["exp"].as_i64().unwrap() - iat, 3600);
    assert!((iat - Utc::now().timestamp()).abs() <= 5);
}

#[tokio::test]
async fn test_token_verifies_against_published_jwks() {
    let app = build_test_router();

    let code = authorize(&app, "sample-client", SAMPLE_REDIRECT, "xyz").await;
    let response = app
        .clone()
        .oneshot(token_request(&code, "sample-client", VERIFIER, RESOURCE))
        .await
        .unwrap();
    let token = body_json(response).await["access_token"].as_str().unwrap().to_owned();

    let response = app
        .oneshot(Request::get("/.well-known/jwks.json").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let jwks = body_json(response).await;
    let key = &jwks["keys"][0];

    let decoding_key = DecodingKey::from_rsa_components(
        key["n"].as_str().unwrap(),
        key["e"].as_str().unwrap(),
    )
    .unwrap();

    // What a gateway checks: signature, issuer, audience and expiry.
    let mut validation = Validation::new(Algorithm::RS256);
    validation.set_issuer(&[BASE_URL]);
    validation.set_audience(&[RESOURCE]);

    let claims = decode::<Claims>(&token, &decoding_key, &validation).unwrap().claims;
    assert_eq!(claims.aud, RESOURCE);
    assert_eq!(claims.exp - claims.iat, 3600);

    let header = decode_header(&token).unwrap();
    assert_eq!(header.kid.as_deref(), key["kid"].as_str());
}

#[tokio::test]
async fn test_scope_is_carried_into_token() {
    let app = build_test_router();
    let challenge = challenge_s256(VERIFIER);

    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("client_id", "sample-client")
        .append_pair("redirect_uri", SAMPLE_REDIRECT)
        .append_pair("response_type", "code")
        .append_pair("code_challenge", &challenge)
        .append_pair("code_challenge_method", "S256")
        .append_pair("resource", RESOURCE)
        .append_pair("scope", "mcp:tools")
        .finish();

    let response = app
        .clone()
        .oneshot(Request::get(format!("/oauth/authorize?{query}")).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let location = url::Url::parse(response.headers()["location"].to_str().unwrap()).unwrap();
    let code = location.query_pairs().find(|(k, _)| k == "code").unwrap().1.into_owned();

    let response = app
        .oneshot(token_request(&code, "sample-client", VERIFIER, RESOURCE))
        .await
        .unwrap();
    let json = body_json(response).await;

    assert_eq!(json["scope"], "mcp:tools");
    let token = json["access_token"].as_str().unwrap();
    assert_eq!(decode_segment(token.split('.').nth(1).unwrap())["scope"], "mcp:tools");
}

#[tokio::test]
async fn test_registered_client_full_flow() {
    let app = build_test_router();
    let redirect_uri = "https://app.example.com/oauth/callback";

    let response = app
        .clone()
        .oneshot(
            Request::post("/register")
                .header("Content-Type", "application/json")
                .body(Body::from(json!({ "redirect_uris": [redirect_uri] }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let client_id = body_json(response).await["client_id"].as_str().unwrap().to_owned();

    let code = authorize(&app, &client_id, redirect_uri, "s1").await;

    let response = app.oneshot(token_request(&code, &client_id, VERIFIER, RESOURCE)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_json(response).await["access_token"].is_string());
}

// ─── Single use ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_code_replay_is_rejected() {
    let app = build_test_router();
    let code = authorize(&app, "sample-client", SAMPLE_REDIRECT, "abc").await;

    let first = app
        .clone()
        .oneshot(token_request(&code, "sample-client", VERIFIER, RESOURCE))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = app
        .oneshot(token_request(&code, "sample-client", VERIFIER, RESOURCE))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(second).await["error"], "invalid_grant");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_redemption_has_one_winner() {
    let app = build_test_router();
    let code = authorize(&app, "sample-client", SAMPLE_REDIRECT, "abc").await;

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let app = app.clone();
            let code = code.clone();
            tokio::spawn(async move {
                app.oneshot(token_request(&code, "sample-client", VERIFIER, RESOURCE))
                    .await
                    .unwrap()
                    .status()
            })
        })
        .collect();

    let statuses = futures::future::join_all(handles).await;
    let ok = statuses.iter().filter(|s| *s.as_ref().unwrap() == StatusCode::OK).count();
    let rejected =
        statuses.iter().filter(|s| *s.as_ref().unwrap() == StatusCode::BAD_REQUEST).count();

    assert_eq!(ok, 1);
    assert_eq!(rejected, 7);
}

// ─── Rejections ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_wrong_verifier_keeps_code_redeemable() {
    let store = Arc::new(MemoryStore::new());
    let app = build_test_router_with_store(Arc::clone(&store));
    let code = authorize(&app, "sample-client", SAMPLE_REDIRECT, "abc").await;

    let response = app
        .clone()
        .oneshot(token_request(&code, "sample-client", "wrong-verifier", RESOURCE))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "invalid_grant");
    assert_eq!(store.code_count().await, 1);

    let response = app
        .oneshot(token_request(&code, "sample-client", VERIFIER, RESOURCE))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(store.code_count().await, 0);
}

#[tokio::test]
async fn test_token_mismatch_errors() {
    let store = Arc::new(MemoryStore::new());
    let app = build_test_router_with_store(Arc::clone(&store));
    let code = authorize(&app, "sample-client", SAMPLE_REDIRECT, "abc").await;

    let cases = [
        (token_request(&code, "other-client", VERIFIER, RESOURCE), "invalid_client"),
        (token_request(&code, "sample-client", VERIFIER, ""), "invalid_request"),
        (
            token_request(&code, "sample-client", VERIFIER, "http://localhost:9999/other"),
            "invalid_grant",
        ),
    ];

    for (request, expected) in cases {
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], expected);
    }

    // None of the rejected attempts consumed the code.
    assert_eq!(store.code_count().await, 1);
}

#[tokio::test]
async fn test_redirect_uri_mismatch_on_token() {
    let app = build_test_router();
    let code = authorize(&app, "sample-client", SAMPLE_REDIRECT, "abc").await;

    let form = serde_urlencoded::to_string([
        ("grant_type", "authorization_code"),
        ("code", code.as_str()),
        ("client_id", "sample-client"),
        ("code_verifier", VERIFIER),
        ("resource", RESOURCE),
        ("redirect_uri", "http://localhost:8081/other"),
    ])
    .unwrap();

    let response = app
        .oneshot(
            Request::post("/oauth/token")
                .header("Content-Type", "application/x-www-form-urlencoded")
                .body(Body::from(form))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "invalid_grant");
}

#[tokio::test]
async fn test_expired_code_is_rejected_and_removed() {
    let store = Arc::new(MemoryStore::new());
    let app = build_test_router_with_store(Arc::clone(&store));

    store
        .put_code(
            "expired-code".to_owned(),
            AuthorizationCode {
                client_id: "sample-client".to_owned(),
                redirect_uri: SAMPLE_REDIRECT.to_owned(),
                code_challenge: challenge_s256(VERIFIER),
                code_challenge_method: "S256".to_owned(),
                resource: RESOURCE.to_owned(),
                scope: String::new(),
                expires_at: Utc::now() - Duration::seconds(1),
            },
        )
        .await;

    let response = app
        .clone()
        .oneshot(token_request("expired-code", "sample-client", VERIFIER, RESOURCE))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "invalid_grant");
    assert_eq!(json["error_description"], "authorization code expired");
    assert_eq!(store.code_count().await, 0);

    let response = app
        .oneshot(token_request("expired-code", "sample-client", VERIFIER, RESOURCE))
        .await
        .unwrap();
    let json = body_json(response).await;
    assert_eq!(json["error"], "invalid_grant");
    assert!(json.get("error_description").is_none());
}
