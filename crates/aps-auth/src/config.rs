//! Authorization server client configuration
//!
//! Passed explicitly to the token exchanger and session manager so nothing in
//! the auth flow depends on a hardcoded endpoint or client identity.

use crate::constants::{DEFAULT_AUTH_SERVER, DEFAULT_SCOPES};

/// Public OAuth client settings.
///
/// None of these values are secrets: APS PKCE clients are public clients
/// and never hold a client secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthConfig {
    /// Base URL of the authorization server; `/authorize` and `/token` are
    /// appended to it.
    pub auth_server: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
}

impl AuthConfig {
    /// Config against the default APS authorization server with the
    /// default scopes.
    pub fn new(client_id: impl Into<String>, redirect_uri: impl Into<String>) -> Self {
        Self {
            auth_server: DEFAULT_AUTH_SERVER.to_string(),
            client_id: client_id.into(),
            redirect_uri: redirect_uri.into(),
            scopes: DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Override the authorization server base URL.
    pub fn with_auth_server(mut self, auth_server: impl Into<String>) -> Self {
        self.auth_server = auth_server.into();
        self
    }

    /// Override the requested scopes.
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    pub fn authorize_endpoint(&self) -> String {
        format!("{}/authorize", self.auth_server.trim_end_matches('/'))
    }

    pub fn token_endpoint(&self) -> String {
        format!("{}/token", self.auth_server.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_aps_server_and_data_read() {
        let config = AuthConfig::new("client-123", "http://localhost:8080/");
        assert_eq!(config.auth_server, DEFAULT_AUTH_SERVER);
        assert_eq!(config.scopes, vec!["data:read".to_string()]);
    }

    #[test]
    fn endpoints_tolerate_trailing_slash() {
        let config =
            AuthConfig::new("c", "http://localhost/").with_auth_server("http://127.0.0.1:9000/");
        assert_eq!(config.authorize_endpoint(), "http://127.0.0.1:9000/authorize");
        assert_eq!(config.token_endpoint(), "http://127.0.0.1:9000/token");
    }

    #[test]
    fn with_scopes_replaces_defaults() {
        let config = AuthConfig::new("c", "http://localhost/").with_scopes(["data:read", "viewables:read"]);
        assert_eq!(config.scopes, vec!["data:read", "viewables:read"]);
    }
}
