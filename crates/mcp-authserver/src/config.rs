//! Configuration for the MCP authorization server.

use std::net::{Ipv4Addr, SocketAddr};

/// Server defaults.
pub mod defaults {
    /// Default listen port.
    pub const PORT: u16 = 9000;

    /// Default issuer base URL, matching the default port.
    pub const ISSUER: &str = "http://localhost:9000";
}

/// OAuth protocol constants.
pub mod oauth {
    use std::time::Duration;

    /// Key identifier advertised in the JWT header and the JWKS.
    pub const KEY_ID: &str = "demo-key-1";

    /// RSA modulus size for the signing key.
    pub const RSA_KEY_BITS: usize = 2048;

    /// Access token lifetime (1 hour).
    pub const ACCESS_TOKEN_TTL: Duration = Duration::from_secs(3600);

    /// Authorization code lifetime (10 minutes).
    pub const AUTH_CODE_TTL: Duration = Duration::from_secs(600);

    /// Random bytes behind a client ID (32 hex chars).
    pub const CLIENT_ID_BYTES: usize = 16;

    /// Random bytes behind a client secret (64 hex chars).
    pub const CLIENT_SECRET_BYTES: usize = 32;

    /// Random bytes behind an authorization code (64 hex chars).
    pub const AUTH_CODE_BYTES: usize = 32;

    /// Token endpoint auth method for public clients.
    pub const AUTH_METHOD_NONE: &str = "none";

    /// The only supported PKCE method.
    pub const PKCE_METHOD_S256: &str = "S256";

    /// Pre-seeded demo client, always present for local testing.
    pub mod sample_client {
        /// Client ID.
        pub const ID: &str = "sample-client";
        /// Client secret (unused by the public-client flow).
        pub const SECRET: &str = "secret";
        /// The single registered redirect URI.
        pub const REDIRECT_URI: &str = "http://localhost:8081/callback";
    }

    /// Endpoint paths, relative to the issuer.
    pub mod paths {
        /// RFC 7591 registration endpoint.
        pub const REGISTER: &str = "/register";
        /// RFC 8414 metadata document.
        pub const METADATA: &str = "/.well-known/oauth-authorization-server";
        /// JSON Web Key Set.
        pub const JWKS: &str = "/.well-known/jwks.json";
        /// Authorization endpoint.
        pub const AUTHORIZE: &str = "/oauth/authorize";
        /// Token endpoint.
        pub const TOKEN: &str = "/oauth/token";
        /// Liveness probe.
        pub const HEALTH: &str = "/health";
    }
}

/// Runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Socket address to bind the HTTP listener to.
    pub bind_addr: SocketAddr,

    /// Issuer base URL. Used for the `iss` claim and every advertised endpoint.
    pub issuer: String,
}

impl Config {
    /// Create configuration for a listen address.
    ///
    /// Without an explicit issuer, `http://localhost:<port>` is used.
    #[must_use]
    pub fn new(bind_addr: SocketAddr, issuer: Option<String>) -> Self {
        let issuer = issuer
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| format!("http://localhost:{}", bind_addr.port()));

        Self { bind_addr, issuer: issuer.trim_end_matches('/').to_owned() }
    }

    /// Create a configuration for tests: ephemeral port, fixed issuer.
    #[must_use]
    pub fn for_testing(issuer: &str) -> Self {
        Self::new(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)), Some(issuer.to_owned()))
    }

    /// Create configuration from environment variables.
    ///
    /// Reads `HOST`, `PORT` and `OAUTH_ISSUER`.
    ///
    /// # Errors
    ///
    /// Returns error if `HOST` or `PORT` cannot be parsed.
    pub fn from_env() -> anyhow::Result<Self> {
        let host = match std::env::var("HOST") {
            Ok(h) => h.parse()?,
            Err(_) => Ipv4Addr::UNSPECIFIED.into(),
        };
        let port = match std::env::var("PORT") {
            Ok(p) => p.parse()?,
            Err(_) => defaults::PORT,
        };
        let issuer = std::env::var("OAUTH_ISSUER").ok();
        Ok(Self::new(SocketAddr::new(host, port), issuer))
    }

    /// Absolute URL for an endpoint path.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.issuer, path)
    }

    #[must_use]
    pub fn authorization_endpoint(&self) -> String {
        self.endpoint(oauth::paths::AUTHORIZE)
    }

    #[must_use]
    pub fn token_endpoint(&self) -> String {
        self.endpoint(oauth::paths::TOKEN)
    }

    #[must_use]
    pub fn jwks_uri(&self) -> String {
        self.endpoint(oauth::paths::JWKS)
    }

    #[must_use]
    pub fn registration_endpoint(&self) -> String {
        self.endpoint(oauth::paths::REGISTER)
    }

    /// Registration client URI for a registered client.
    #[must_use]
    pub fn registration_client_uri(&self, client_id: &str) -> String {
        format!("{}/{}", self.registration_endpoint(), client_id)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(
            SocketAddr::from((Ipv4Addr::UNSPECIFIED, defaults::PORT)),
            Some(defaults::ISSUER.to_owned()),
        )
    }
}
