//! Credential storage for OAuth tokens
//!
//! Persists the current access token, refresh token and absolute expiry as
//! three string keys of a [`KeyValueStore`], plus the transient PKCE verifier
//! that has to survive the authorization redirect.
//!
//! The store is the single source of truth for token data. Every consumer
//! reads credentials from it at request time.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use common::Secret;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::constants::{ACCESS_TOKEN_KEY, CODE_VERIFIER_KEY, EXPIRES_AT_KEY, REFRESH_TOKEN_KEY};
use crate::error::Result;
use crate::store::KeyValueStore;

/// A set of OAuth credentials.
///
/// `expires_at` is a unix timestamp in milliseconds (absolute, not a delta),
/// computed when the token response is received from `expires_in` plus the
/// current time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_token: Secret<String>,
    pub refresh_token: Secret<String>,
    pub expires_at: u64,
}

impl Credentials {
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_at: u64,
    ) -> Self {
        Self {
            access_token: Secret::new(access_token.into()),
            refresh_token: Secret::new(refresh_token.into()),
            expires_at,
        }
    }

    /// Whether the access token expired strictly before `now_millis`.
    pub fn is_expired_at(&self, now_millis: u64) -> bool {
        self.expires_at < now_millis
    }

    /// Bearer header value for authenticated API calls.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token.expose())
    }
}

/// Current time as unix milliseconds.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Credential persistence on top of an injected key/value store.
///
/// Cheap to clone; clones share the underlying store and the refresh lock,
/// so every provider built over the same store refreshes through one guard.
#[derive(Clone)]
pub struct CredentialStore {
    kv: Arc<dyn KeyValueStore>,
    refresh_guard: Arc<Mutex<()>>,
}

impl CredentialStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            kv,
            refresh_guard: Arc::new(Mutex::new(())),
        }
    }

    /// Serialize token refreshes for this store.
    pub(crate) async fn lock_refresh(&self) -> MutexGuard<'_, ()> {
        self.refresh_guard.lock().await
    }

    /// Read the stored credentials.
    ///
    /// Returns `None` if any of the three fields is absent. An `expires_at`
    /// that isn't a valid integer loads as `0` so the credentials read as
    /// expired and get refreshed.
    pub async fn load(&self) -> Result<Option<Credentials>> {
        let access = self.kv.get(ACCESS_TOKEN_KEY).await?;
        let refresh = self.kv.get(REFRESH_TOKEN_KEY).await?;
        let expires = self.kv.get(EXPIRES_AT_KEY).await?;

        let (Some(access), Some(refresh), Some(expires)) = (access, refresh, expires) else {
            return Ok(None);
        };

        let expires_at = expires.trim().parse::<u64>().unwrap_or_else(|_| {
            warn!(value = %expires, "unparseable expires_at, treating credentials as expired");
            0
        });

        Ok(Some(Credentials::new(access, refresh, expires_at)))
    }

    /// Persist all three credential fields.
    pub async fn save(&self, credentials: &Credentials) -> Result<()> {
        self.kv
            .set(ACCESS_TOKEN_KEY, credentials.access_token.expose().clone())
            .await?;
        self.kv
            .set(REFRESH_TOKEN_KEY, credentials.refresh_token.expose().clone())
            .await?;
        self.kv
            .set(EXPIRES_AT_KEY, credentials.expires_at.to_string())
            .await?;
        debug!(expires_at = credentials.expires_at, "saved credentials");
        Ok(())
    }

    /// Remove all three credential fields.
    pub async fn clear(&self) -> Result<()> {
        self.kv.delete(ACCESS_TOKEN_KEY).await?;
        self.kv.delete(REFRESH_TOKEN_KEY).await?;
        self.kv.delete(EXPIRES_AT_KEY).await?;
        debug!("cleared credentials");
        Ok(())
    }

    pub async fn has_access_token(&self) -> Result<bool> {
        Ok(self.kv.get(ACCESS_TOKEN_KEY).await?.is_some())
    }

    /// The stored refresh token on its own, even if other fields are missing.
    pub async fn refresh_token(&self) -> Result<Option<String>> {
        self.kv.get(REFRESH_TOKEN_KEY).await
    }

    /// Persist the PKCE verifier for the in-flight login.
    ///
    /// Replaces any verifier from an earlier, abandoned login.
    pub async fn store_verifier(&self, verifier: &str) -> Result<()> {
        self.kv.set(CODE_VERIFIER_KEY, verifier.to_string()).await
    }

    /// Read and delete the pending PKCE verifier.
    ///
    /// A verifier can be taken at most once.
    pub async fn take_verifier(&self) -> Result<Option<String>> {
        let verifier = self.kv.get(CODE_VERIFIER_KEY).await?;
        if verifier.is_some() {
            self.kv.delete(CODE_VERIFIER_KEY).await?;
        }
        Ok(verifier)
    }
}
