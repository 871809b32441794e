//! OAuth 2.0 authorization server for MCP authentication.
//!
//! A self-contained authorization server whose RS256 tokens are verified by an
//! external gateway against the published JWKS.
//!
//! ## Supported Standards
//! - RFC 8414: OAuth Authorization Server Metadata
//! - RFC 7591: Dynamic Client Registration
//! - RFC 7636: PKCE (S256)
//! - RFC 6749: Authorization Code Grant
//! - RFC 7517/7518: JWKS and RS256 signatures

pub mod handlers;
pub mod jwt;
pub mod pkce;
pub mod store;
pub mod types;

pub use jwt::TokenIssuer;
pub use store::{MemoryStore, OAuthStore};
