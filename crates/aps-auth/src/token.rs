//! OAuth token exchange and refresh
//!
//! Handles the two token endpoint interactions:
//! 1. Authorization code exchange (completion of the PKCE redirect)
//! 2. Token refresh (when a consumer finds the access token expired)
//!
//! Both POST a form-encoded grant to `{auth_server}/token`. Neither retries:
//! authorization codes are single-use, so a blind retry of the exchange can
//! only fail. Refresh is safe for callers to retry.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::AuthConfig;
use crate::credentials::{Credentials, now_millis};
use crate::error::{Error, Result};

/// Response from the token endpoint for both exchange and refresh.
///
/// `expires_in` is a delta in seconds from the response time. Other fields
/// the server sends (`token_type`, `id_token`, ...) are ignored.
#[derive(Debug, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Seconds until the access token expires (delta, not absolute)
    pub expires_in: u64,
}

impl TokenResponse {
    /// Convert to stored credentials, anchoring the expiry at `issued_at`.
    pub fn into_credentials(self, issued_at: u64) -> Credentials {
        let expires_at = issued_at.saturating_add(self.expires_in.saturating_mul(1000));
        Credentials::new(self.access_token, self.refresh_token, expires_at)
    }
}

/// Client for the authorization server's token endpoint.
#[derive(Clone)]
pub struct TokenExchanger {
    client: reqwest::Client,
    config: Arc<AuthConfig>,
}

impl TokenExchanger {
    pub fn new(client: reqwest::Client, config: Arc<AuthConfig>) -> Self {
        Self { client, config }
    }

    /// Exchange an authorization code for credentials.
    ///
    /// Sends the PKCE verifier to prove this client initiated the flow.
    pub async fn exchange_authorization_code(
        &self,
        verifier: &str,
        code: &str,
    ) -> Result<Credentials> {
        self.request_token(
            "authorization_code",
            &[
                ("grant_type", "authorization_code"),
                ("client_id", self.config.client_id.as_str()),
                ("code_verifier", verifier),
                ("code", code),
                ("redirect_uri", self.config.redirect_uri.as_str()),
            ],
        )
        .await
    }

    /// Obtain fresh credentials using a refresh token.
    pub async fn refresh(&self, refresh_token: &str) -> Result<Credentials> {
        self.request_token(
            "refresh_token",
            &[
                ("grant_type", "refresh_token"),
                ("client_id", self.config.client_id.as_str()),
                ("refresh_token", refresh_token),
            ],
        )
        .await
    }

    async fn request_token(&self, grant_type: &'static str, form: &[(&str, &str)]) -> Result<Credentials> {
        let endpoint = self.config.token_endpoint();
        debug!(grant_type, endpoint = %endpoint, "requesting token");

        let result = self.post_form(&endpoint, form).await;
        let outcome = match &result {
            Ok(_) => "success",
            Err(Error::AuthServer(_)) => "rejected",
            Err(_) => "error",
        };
        metrics::counter!("aps_auth_token_requests_total", "grant_type" => grant_type, "outcome" => outcome)
            .increment(1);

        if let Err(e) = &result {
            warn!(grant_type, error = %e, "token request failed");
        }
        result
    }

    async fn post_form(&self, endpoint: &str, form: &[(&str, &str)]) -> Result<Credentials> {
        let response = self
            .client
            .post(endpoint)
            .form(form)
            .send()
            .await
            .map_err(|e| Error::Http(format!("token request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<no body>"));
            return Err(Error::AuthServer(format!(
                "token endpoint returned {status}: {body}"
            )));
        }

        let issued_at = now_millis();
        let token = response
            .json::<TokenResponse>()
            .await
            .map_err(|e| Error::InvalidTokenResponse(e.to_string()))?;
        Ok(token.into_credentials(issued_at))
    }
}
