//! APS OAuth authentication library
//!
//! Provides the OAuth2 Authorization Code + PKCE flow for Autodesk Platform
//! Services: verifier/challenge generation, token exchange and refresh,
//! credential persistence over an injected key/value store, and the session
//! state machine that ties them together. No dependency on the CLI binary, so
//! it can be tested and used on its own.
//!
//! Credential flow:
//! 1. `SessionManager::login()` stores a verifier and navigates to
//!    `pkce::build_authorization_url()`
//! 2. The authorization server redirects back with `?code=...`
//! 3. `SessionManager::initialize()` takes the verifier and calls
//!    `TokenExchanger::exchange_authorization_code()`
//! 4. Credentials are saved via `CredentialStore::save()`
//! 5. Consumers call `CredentialProvider::credentials()`, which refreshes
//!    through `TokenExchanger::refresh()` once the access token expires

pub mod config;
pub mod constants;
pub mod credentials;
pub mod error;
pub mod pkce;
pub mod provider;
pub mod session;
pub mod store;
pub mod token;

#[cfg(test)]
mod test_support;

pub use config::AuthConfig;
pub use constants::*;
pub use credentials::{CredentialStore, Credentials, now_millis};
pub use error::{Error, Result};
pub use pkce::{build_authorization_url, compute_challenge, generate_nonce, generate_verifier};
pub use provider::{CredentialProvider, StoreCredentialProvider};
pub use session::{
    AuthOutcome, Location, SessionAction, SessionEvent, SessionManager, SessionState, handle_event,
};
pub use store::{FileStore, KeyValueStore, MemoryStore};
pub use token::{TokenExchanger, TokenResponse};
