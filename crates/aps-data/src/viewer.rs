//! Token handed to the model viewer.

use aps_auth::{CredentialProvider, Credentials, now_millis};
use serde::Serialize;

use crate::Result;

/// Access token plus its remaining lifetime in whole seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewerToken {
    pub access_token: String,
    pub expires_in: u64,
}

impl ViewerToken {
    /// Remaining lifetime is rounded to the nearest second and floored at zero.
    pub fn from_credentials(credentials: &Credentials, now_millis: u64) -> Self {
        let remaining = credentials.expires_at.saturating_sub(now_millis);
        Self {
            access_token: credentials.access_token.expose().clone(),
            expires_in: remaining.saturating_add(500) / 1000,
        }
    }

    /// Fetch current credentials, refreshing if needed.
    pub async fn fetch(provider: &dyn CredentialProvider) -> Result<Self> {
        let credentials = provider.credentials().await?;
        Ok(Self::from_credentials(&credentials, now_millis()))
    }
}
