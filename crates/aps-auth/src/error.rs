//! Error types for OAuth authentication operations

/// Errors from OAuth authentication operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("invalid auth configuration: {0}")]
    Config(String),

    /// Non-success status from the token endpoint. Carries the raw body.
    #[error("authorization server error: {0}")]
    AuthServer(String),

    #[error("invalid token response: {0}")]
    InvalidTokenResponse(String),

    /// The authorization server redirected back with `error=...`.
    #[error("authorization denied: {error}: {description}")]
    AuthorizationDenied { error: String, description: String },

    /// An authorization code came back but no PKCE verifier is pending.
    #[error("no pending PKCE verifier for the returned authorization code")]
    MissingVerifier,

    #[error("no session: {0}")]
    MissingSession(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("credential parse error: {0}")]
    CredentialParse(String),
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;
