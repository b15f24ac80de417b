//! APS OAuth constants
//!
//! Default endpoints and the storage keys shared by every credential store
//! backend. Client identity (client id, redirect URI) is deployment-specific
//! and lives in [`crate::AuthConfig`].

/// Base URL of the APS authentication service (v2)
pub const DEFAULT_AUTH_SERVER: &str = "https://developer.api.autodesk.com/authentication/v2";

/// Scope needed to browse hubs/projects/folders and stream derivatives
pub const DEFAULT_SCOPES: &[&str] = &["data:read"];

/// Length of the generated PKCE code verifier (RFC 7636 allows 43-128)
pub const VERIFIER_LENGTH: usize = 100;

/// Storage key of the current access token
pub const ACCESS_TOKEN_KEY: &str = "access_token";

/// Storage key of the current refresh token
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

/// Storage key of the access token expiry (decimal epoch milliseconds)
pub const EXPIRES_AT_KEY: &str = "expires_at";

/// Storage key of the pending PKCE verifier. Only present between `login()`
/// and the next `initialize()`.
pub const CODE_VERIFIER_KEY: &str = "code_verifier";
