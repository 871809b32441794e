//! Client and authorization-code storage.
//!
//! Handlers depend on the [`OAuthStore`] trait; [`MemoryStore`] is the
//! in-process implementation. Redemption is built on [`OAuthStore::take_code`]:
//! whoever removes a code owns it, so at most one redemption can succeed.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rand::RngCore;
use rand::rngs::OsRng;
use tokio::sync::RwLock;

use super::types::{AuthorizationCode, RegisteredClient};
use crate::config::oauth::{
    AUTH_METHOD_NONE, CLIENT_ID_BYTES, CLIENT_SECRET_BYTES, sample_client,
};
use crate::error::{OAuthError, OAuthResult};

/// Validation run against a code after it has been taken from the store.
pub type RedeemCheck<'a> = dyn Fn(&AuthorizationCode) -> OAuthResult<()> + Send + Sync + 'a;

/// Generate a random token from the OS CSPRNG, hex-encoded (`2 * bytes` chars).
pub fn generate_token(bytes: usize) -> OAuthResult<String> {
    let mut buf = vec![0u8; bytes];
    OsRng.try_fill_bytes(&mut buf).map_err(|e| {
        tracing::error!(error = %e, "Random generation failed");
        OAuthError::server_error("failed to generate random value")
    })?;
    Ok(hex::encode(buf))
}

/// Storage for registered clients and outstanding authorization codes.
#[async_trait]
pub trait OAuthStore: Send + Sync {
    /// Insert or replace a client.
    async fn insert_client(&self, client: RegisteredClient);

    /// Look up a client by ID.
    async fn get_client(&self, client_id: &str) -> Option<RegisteredClient>;

    /// Store an authorization code.
    async fn put_code(&self, code: String, info: AuthorizationCode);

    /// Atomically remove and return a code, regardless of its validity.
    async fn take_code(&self, code: &str) -> Option<AuthorizationCode>;

    /// Redeem an authorization code (one-time use).
    ///
    /// - unknown code: `invalid_grant`
    /// - expired code: dropped, then `invalid_grant` "authorization code expired"
    /// - `check` fails: the code is put back and the error is returned
    /// - otherwise the code is returned and stays removed
    async fn redeem_code(
        &self,
        code: &str,
        check: &RedeemCheck<'_>,
    ) -> OAuthResult<AuthorizationCode> {
        let Some(info) = self.take_code(code).await else {
            return Err(OAuthError::InvalidGrant(None));
        };

        if info.is_expired() {
            return Err(OAuthError::invalid_grant("authorization code expired"));
        }

        if let Err(e) = check(&info) {
            self.put_code(code.to_owned(), info).await;
            return Err(e);
        }
        Ok(info)
    }

    /// Register a new client (Dynamic Client Registration).
    ///
    /// A missing or empty auth method defaults to `none`; any other method
    /// gets a generated secret.
    async fn register_client(
        &self,
        redirect_uris: Vec<String>,
        token_endpoint_auth_method: Option<&str>,
    ) -> OAuthResult<RegisteredClient> {
        if redirect_uris.is_empty() {
            return Err(OAuthError::InvalidRedirectUris(Some("redirect_uris must be provided")));
        }
        if !redirect_uris.iter().all(|u| u.starts_with("http://") || u.starts_with("https://")) {
            return Err(OAuthError::InvalidRedirectUri(Some(
                "redirect_uris must be absolute http(s) URLs",
            )));
        }

        let method = token_endpoint_auth_method
            .filter(|m| !m.is_empty())
            .unwrap_or(AUTH_METHOD_NONE)
            .to_owned();

        let client_secret = if method == AUTH_METHOD_NONE {
            String::new()
        } else {
            generate_token(CLIENT_SECRET_BYTES)?
        };

        let client = RegisteredClient {
            client_id: generate_token(CLIENT_ID_BYTES)?,
            client_secret,
            redirect_uris,
            token_endpoint_auth_method: method,
            client_id_issued_at: Utc::now().timestamp(),
        };

        self.insert_client(client.clone()).await;
        Ok(client)
    }
}

/// In-memory store. Each map sits behind its own lock.
#[derive(Clone)]
pub struct MemoryStore {
    clients: Arc<RwLock<HashMap<String, RegisteredClient>>>,
    codes: Arc<RwLock<HashMap<String, AuthorizationCode>>>,
}

impl MemoryStore {
    /// Create a store seeded with the demo `sample-client`.
    #[must_use]
    pub fn new() -> Self {
        let sample = RegisteredClient {
            client_id: sample_client::ID.to_owned(),
            client_secret: sample_client::SECRET.to_owned(),
            redirect_uris: vec![sample_client::REDIRECT_URI.to_owned()],
            token_endpoint_auth_method: AUTH_METHOD_NONE.to_owned(),
            client_id_issued_at: Utc::now().timestamp(),
        };

        Self {
            clients: Arc::new(RwLock::new(HashMap::from([(sample.client_id.clone(), sample)]))),
            codes: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of outstanding (unredeemed, possibly expired) codes.
    pub async fn code_count(&self) -> usize {
        self.codes.read().await.len()
    }
}

#[async_trait]
impl OAuthStore for MemoryStore {
    async fn insert_client(&self, client: RegisteredClient) {
        self.clients.write().await.insert(client.client_id.clone(), client);
    }

    async fn get_client(&self, client_id: &str) -> Option<RegisteredClient> {
        self.clients.read().await.get(client_id).cloned()
    }

    async fn put_code(&self, code: String, info: AuthorizationCode) {
        self.codes.write().await.insert(code, info);
    }

    async fn take_code(&self, code: &str) -> Option<AuthorizationCode> {
        self.codes.write().await.remove(code)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore").finish()
    }
}
