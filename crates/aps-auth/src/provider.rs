//! Credential provider: the consumer-facing side of the auth core
//!
//! Every component that calls an authenticated API (data management, viewer,
//! chatbot) asks a [`CredentialProvider`] for credentials right before the
//! call. The store-backed provider refreshes transparently when the stored
//! access token has expired.

use std::future::Future;
use std::pin::Pin;

use tracing::{debug, info};

use crate::credentials::{CredentialStore, Credentials, now_millis};
use crate::error::{Error, Result};
use crate::token::TokenExchanger;

/// Source of currently valid credentials.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility
/// (`Arc<dyn CredentialProvider>`).
pub trait CredentialProvider: Send + Sync {
    fn credentials(&self) -> Pin<Box<dyn Future<Output = Result<Credentials>> + Send + '_>>;
}

/// Provider reading from the credential store, refreshing on expiry.
///
/// Refreshes are single-flight: callers serialize on the store's refresh
/// lock and re-read the store once they hold it, so callers that raced on the
/// same expired token share the one refresh result instead of each spending
/// the refresh token. The lock lives in the [`CredentialStore`], so separate
/// providers over clones of one store share it too.
#[derive(Clone)]
pub struct StoreCredentialProvider {
    store: CredentialStore,
    exchanger: TokenExchanger,
}

impl StoreCredentialProvider {
    pub fn new(store: CredentialStore, exchanger: TokenExchanger) -> Self {
        Self { store, exchanger }
    }

    async fn current(&self) -> Result<Credentials> {
        if let Some(credentials) = self.store.load().await?
            && !credentials.is_expired_at(now_millis())
        {
            return Ok(credentials);
        }

        let _guard = self.store.lock_refresh().await;

        // Another caller may have refreshed while we waited for the guard.
        let stored = self.store.load().await?;
        if let Some(credentials) = &stored
            && !credentials.is_expired_at(now_millis())
        {
            debug!("credentials refreshed by a concurrent caller");
            return Ok(credentials.clone());
        }

        let refresh_token = match stored {
            Some(credentials) => credentials.refresh_token.expose().clone(),
            None => self.store.refresh_token().await?.ok_or_else(|| {
                Error::MissingSession("no refresh token in credential store".into())
            })?,
        };

        debug!("access token expired, refreshing");
        let refreshed = self.exchanger.refresh(&refresh_token).await?;
        self.store.save(&refreshed).await?;
        info!(expires_at = refreshed.expires_at, "access token refreshed");
        Ok(refreshed)
    }
}

impl CredentialProvider for StoreCredentialProvider {
    fn credentials(&self) -> Pin<Box<dyn Future<Output = Result<Credentials>> + Send + '_>> {
        Box::pin(self.current())
    }
}
