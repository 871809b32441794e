//! Error types for the authorization server.
//!
//! Uses `thiserror` for structured error handling. Every [`OAuthError`] maps to
//! one wire error code from the OAuth 2.0 vocabulary and renders as a JSON
//! envelope `{"error": ..., "error_description": ...}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Protocol errors returned to OAuth clients.
///
/// Descriptions are static so internal error text can never leak into a
/// response body.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum OAuthError {
    /// Malformed or missing request parameters.
    #[error("invalid_request")]
    InvalidRequest(Option<&'static str>),

    /// Unknown client, or client does not match the authorization code.
    #[error("invalid_client")]
    InvalidClient(Option<&'static str>),

    /// Unknown, expired or mismatched authorization grant.
    #[error("invalid_grant")]
    InvalidGrant(Option<&'static str>),

    /// Grant type other than `authorization_code`.
    #[error("unsupported_grant_type")]
    UnsupportedGrantType,

    /// Response type other than `code`.
    #[error("unsupported_response_type")]
    UnsupportedResponseType,

    /// A single redirect URI is not acceptable.
    #[error("invalid_redirect_uri")]
    InvalidRedirectUri(Option<&'static str>),

    /// The redirect URI list is missing or empty.
    #[error("invalid_redirect_uris")]
    InvalidRedirectUris(Option<&'static str>),

    /// Wrong HTTP method for the endpoint.
    #[error("method_not_allowed")]
    MethodNotAllowed,

    /// No such endpoint.
    #[error("not_found")]
    NotFound,

    /// Internal failure (random generation, signing).
    #[error("server_error")]
    ServerError(Option<&'static str>),
}

impl OAuthError {
    #[must_use]
    pub const fn invalid_request(description: &'static str) -> Self {
        Self::InvalidRequest(Some(description))
    }

    #[must_use]
    pub const fn invalid_grant(description: &'static str) -> Self {
        Self::InvalidGrant(Some(description))
    }

    #[must_use]
    pub const fn server_error(description: &'static str) -> Self {
        Self::ServerError(Some(description))
    }

    /// Machine-readable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::InvalidClient(_) => "invalid_client",
            Self::InvalidGrant(_) => "invalid_grant",
            Self::UnsupportedGrantType => "unsupported_grant_type",
            Self::UnsupportedResponseType => "unsupported_response_type",
            Self::InvalidRedirectUri(_) => "invalid_redirect_uri",
            Self::InvalidRedirectUris(_) => "invalid_redirect_uris",
            Self::MethodNotAllowed => "method_not_allowed",
            Self::NotFound => "not_found",
            Self::ServerError(_) => "server_error",
        }
    }

    /// Optional human-readable description.
    #[must_use]
    pub const fn description(&self) -> Option<&'static str> {
        match self {
            Self::InvalidRequest(d)
            | Self::InvalidClient(d)
            | Self::InvalidGrant(d)
            | Self::InvalidRedirectUri(d)
            | Self::InvalidRedirectUris(d)
            | Self::ServerError(d) => *d,
            Self::UnsupportedGrantType
            | Self::UnsupportedResponseType
            | Self::MethodNotAllowed
            | Self::NotFound => None,
        }
    }

    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::ServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    /// JSON body for this error.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let mut body = serde_json::json!({ "error": self.code() });
        if let Some(description) = self.description() {
            body["error_description"] = serde_json::Value::from(description);
        }
        body
    }
}

impl IntoResponse for OAuthError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.to_json())).into_response()
    }
}

/// Errors from the token issuer.
#[derive(thiserror::Error, Debug)]
pub enum IssuerError {
    /// RSA key generation failed at startup.
    #[error("failed to generate RSA key: {0}")]
    KeyGeneration(#[source] rsa::Error),

    /// The private key could not be encoded for the signer.
    #[error("failed to encode RSA key: {0}")]
    KeyEncoding(#[from] rsa::pkcs1::Error),

    /// Claims serialization or RS256 signing failed.
    #[error("failed to sign token: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

impl From<IssuerError> for OAuthError {
    fn from(err: IssuerError) -> Self {
        tracing::error!(error = %err, "Token issuance failed");
        Self::server_error("failed to issue token")
    }
}

/// Result type alias for protocol operations.
pub type OAuthResult<T> = Result<T, OAuthError>;
