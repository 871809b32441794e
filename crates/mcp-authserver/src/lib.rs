//! MCP OAuth Authorization Server
//!
//! A small OAuth 2.0 authorization server used to secure an MCP endpoint that
//! sits behind an API gateway. The gateway validates bearer tokens on its own
//! by fetching this server's JWKS.
//!
//! # Features
//!
//! - **Authorization Code + PKCE**: S256 only, single-use codes with a 10-minute lifetime
//! - **Dynamic Client Registration**: RFC 7591 minimal metadata
//! - **RS256 JWTs**: signed with an RSA-2048 key generated at startup, published as JWKS
//! - **Discovery**: RFC 8414 authorization server metadata
//!
//! # Example
//!
//! ```no_run
//! use mcp_authserver::{config::Config, server::AuthServer};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     AuthServer::new(config)?.run().await
//! }
//! ```

pub mod config;
pub mod error;
pub mod server;

pub use config::Config;
pub use error::{IssuerError, OAuthError};
pub use server::AuthServer;
