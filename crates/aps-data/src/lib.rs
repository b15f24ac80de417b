//! Authenticated APS consumers
//!
//! Everything that needs a bearer token obtains it from an
//! [`aps_auth::CredentialProvider`] right before each call, so an expired
//! token is refreshed transparently by the auth core:
//!
//! - [`DataManagementClient`]: hubs → projects → folders → items, plus the
//!   lazy tree expansion of the model browser
//! - [`tree`]: tree node ids and URN decoding for item selection
//! - [`ViewerToken`]: the token/expiry pair handed to the model viewer
//! - [`ChatbotClient`]: natural-language questions about a loaded model

pub mod chatbot;
pub mod data_management;
pub mod tree;
pub mod viewer;

#[cfg(test)]
mod test_support;

pub use chatbot::{ChatbotClient, DEFAULT_CHATBOT_URL};
pub use data_management::{
    DEFAULT_API_HOST, DataManagementClient, DesignItem, Entry, FolderContents,
};
pub use tree::{Selection, TreeNode, TreeNodeId, decode_version_id};
pub use viewer::ViewerToken;

use reqwest::header::HeaderValue;

/// Errors from authenticated API calls.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("authentication failed: {0}")]
    Auth(#[from] aps_auth::Error),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("failed to fetch {endpoint}: {status}")]
    Api { endpoint: String, status: String },

    #[error("unexpected response body: {0}")]
    Decode(String),

    #[error("chatbot request failed: {0}")]
    Chatbot(String),

    #[error("invalid tree node id: {0}")]
    InvalidNodeId(String),

    #[error("invalid URN: {0}")]
    InvalidUrn(String),
}

/// Result alias for API operations.
pub type Result<T> = std::result::Result<T, Error>;

/// `Authorization: Bearer ...` header value for the given credentials.
pub(crate) fn bearer_header(credentials: &aps_auth::Credentials) -> Result<HeaderValue> {
    let mut value = HeaderValue::from_str(&credentials.bearer())
        .map_err(|e| Error::Http(format!("invalid token value: {e}")))?;
    value.set_sensitive(true);
    Ok(value)
}
