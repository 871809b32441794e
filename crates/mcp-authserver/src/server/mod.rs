//! Authorization server lifecycle.
//!
//! The signing key is generated once in [`AuthServer::new`]; if that fails the
//! server never starts. The store and token issuer are injected into the
//! router through [`transport::AppState`].

pub mod oauth;
pub mod transport;

use std::sync::Arc;

use tokio::net::TcpListener;

use crate::config::Config;
use crate::error::IssuerError;
use oauth::{MemoryStore, OAuthStore, TokenIssuer};
use transport::AppState;

/// OAuth authorization server.
pub struct AuthServer {
    config: Config,
    tokens: Arc<TokenIssuer>,
    store: Arc<dyn OAuthStore>,
}

impl AuthServer {
    /// Create a server with a fresh signing key and a seeded in-memory store.
    ///
    /// # Errors
    ///
    /// Returns error if RSA key generation fails.
    pub fn new(config: Config) -> Result<Self, IssuerError> {
        let tokens = Arc::new(TokenIssuer::generate(config.issuer.clone())?);
        tracing::info!(kid = tokens.key_id(), issuer = %config.issuer, "Generated RSA signing key");
        Ok(Self::with_parts(config, tokens, Arc::new(MemoryStore::new())))
    }

    /// Create a server from an existing issuer and store.
    #[must_use]
    pub fn with_parts(
        config: Config,
        tokens: Arc<TokenIssuer>,
        store: Arc<dyn OAuthStore>,
    ) -> Self {
        Self { config, tokens, store }
    }

    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Build the HTTP router.
    #[must_use]
    pub fn router(&self) -> axum::Router {
        transport::create_router(AppState::new(
            self.config.clone(),
            Arc::clone(&self.tokens),
            Arc::clone(&self.store),
        ))
    }

    /// Bind the configured address and serve until Ctrl-C.
    ///
    /// # Errors
    ///
    /// Returns error on bind or server failure.
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener, shutdown_signal()).await
    }

    /// Serve on an already-bound listener until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Returns error on server failure.
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let router = self.router();

        tracing::info!(
            addr = %listener.local_addr()?,
            issuer = %self.config.issuer,
            "OAuth authorization server listening"
        );

        axum::serve(listener, router).with_graceful_shutdown(shutdown).await?;

        tracing::info!("OAuth authorization server shut down");
        Ok(())
    }
}

impl std::fmt::Debug for AuthServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthServer").field("config", &self.config).finish_non_exhaustive()
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install CTRL+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Received shutdown signal");
}
