//! RS256 token issuer.
//!
//! Owns the RSA signing key for the lifetime of the process. Tokens are
//! compact JWS strings signed with RSASSA-PKCS1-v1_5 over SHA-256 via
//! `jsonwebtoken`. The matching public key is published as a JWK so resource
//! servers can verify tokens independently.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use rand::rngs::OsRng;
use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};

use super::types::Jwk;
use crate::config::oauth::{ACCESS_TOKEN_TTL, KEY_ID, RSA_KEY_BITS};
use crate::error::IssuerError;

/// Claims carried by issued access tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub iss: String,
    pub aud: String,
    pub scope: String,
    pub iat: i64,
    pub exp: i64,
}

/// Signs access tokens and exposes the public signing key.
pub struct TokenIssuer {
    issuer: String,
    key_id: String,
    ttl: Duration,
    public_key: RsaPublicKey,
    encoding_key: EncodingKey,
}

impl TokenIssuer {
    /// Generate a fresh RSA-2048 key for `issuer`.
    ///
    /// This runs once at startup; failure means the server cannot start.
    pub fn generate(issuer: impl Into<String>) -> Result<Self, IssuerError> {
        let private_key =
            RsaPrivateKey::new(&mut OsRng, RSA_KEY_BITS).map_err(IssuerError::KeyGeneration)?;
        Self::from_key(issuer, &private_key)
    }

    /// Build an issuer around an existing key.
    pub fn from_key(
        issuer: impl Into<String>,
        private_key: &RsaPrivateKey,
    ) -> Result<Self, IssuerError> {
        let der = private_key.to_pkcs1_der()?;

        Ok(Self {
            issuer: issuer.into(),
            key_id: KEY_ID.to_owned(),
            ttl: ACCESS_TOKEN_TTL,
            public_key: private_key.to_public_key(),
            encoding_key: EncodingKey::from_rsa_der(der.as_bytes()),
        })
    }

    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    #[must_use]
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    #[must_use]
    pub const fn token_ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token for `audience` with `scope`, valid from now.
    pub fn issue(&self, audience: &str, scope: &str) -> Result<String, IssuerError> {
        self.issue_at(audience, scope, Utc::now())
    }

    /// Issue a token as of `now`.
    pub fn issue_at(
        &self,
        audience: &str,
        scope: &str,
        now: DateTime<Utc>,
    ) -> Result<String, IssuerError> {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(self.key_id.clone());

        let iat = now.timestamp();
        let ttl = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        let claims = Claims {
            iss: self.issuer.clone(),
            aud: audience.to_owned(),
            scope: scope.to_owned(),
            iat,
            exp: iat.saturating_add(ttl),
        };

        Ok(encode(&header, &claims, &self.encoding_key)?)
    }

    /// The public signing key as a JWK.
    #[must_use]
    pub fn public_jwk(&self) -> Jwk {
        Jwk {
            kty: "RSA".to_owned(),
            kid: self.key_id.clone(),
            key_use: "sig".to_owned(),
            alg: "RS256".to_owned(),
            n: URL_SAFE_NO_PAD.encode(self.public_key.n().to_bytes_be()),
            e: URL_SAFE_NO_PAD.encode(self.public_key.e().to_bytes_be()),
        }
    }
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("issuer", &self.issuer)
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}
