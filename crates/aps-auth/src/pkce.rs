//! PKCE (Proof Key for Code Exchange) implementation per RFC 7636
//!
//! Generates the code verifier and S256 challenge used during the OAuth
//! authorization flow. The verifier is kept in the credential store across
//! the authorization redirect and sent during token exchange; the challenge
//! is included in the authorization URL so the authorization server can
//! verify the exchange request came from the same party that initiated the
//! flow.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngExt;
use sha2::{Digest, Sha256};
use url::Url;

use crate::config::AuthConfig;
use crate::error::{Error, Result};

/// Verifier alphabet: `[A-Za-z0-9]`, a subset of the RFC 7636 unreserved set.
const VERIFIER_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Generate a PKCE code verifier of `length` alphanumeric characters.
///
/// Each character is drawn uniformly from [`VERIFIER_CHARSET`].
pub fn generate_verifier(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| VERIFIER_CHARSET[rng.random_range(0..VERIFIER_CHARSET.len())] as char)
        .collect()
}

/// Compute the S256 code challenge from a verifier.
///
/// `challenge = BASE64URL(SHA256(verifier))`, without padding.
pub fn compute_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Random nonce for the authorization request.
pub fn generate_nonce() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Build the authorization URL for the login redirect.
///
/// `prompt=login` forces the user to re-authenticate even when the provider
/// already has a session for them.
pub fn build_authorization_url(config: &AuthConfig, nonce: &str, challenge: &str) -> Result<Url> {
    let mut url = Url::parse(&config.authorize_endpoint()).map_err(|e| {
        Error::Config(format!(
            "invalid authorize endpoint {}: {e}",
            config.authorize_endpoint()
        ))
    })?;
    url.query_pairs_mut()
        .append_pair("response_type", "code")
        .append_pair("client_id", &config.client_id)
        .append_pair("redirect_uri", &config.redirect_uri)
        .append_pair("scope", &config.scopes.join(" "))
        .append_pair("nonce", nonce)
        .append_pair("prompt", "login")
        .append_pair("code_challenge", challenge)
        .append_pair("code_challenge_method", "S256");
    Ok(url)
}
