//! Service-specific error types

use thiserror::Error;

/// Errors from the local redirect listener used during `login`.
///
/// Session and API failures keep their library error types and are reported
/// through `anyhow` by the command handlers.
#[derive(Error, Debug)]
pub enum Error {
    #[error("redirect_uri has no host: {0}")]
    RedirectHost(String),

    #[error("failed to listen on {addr}: {reason}")]
    Bind { addr: String, reason: String },

    #[error("no authorization redirect received within {0} seconds")]
    Timeout(u64),

    #[error("redirect listener stopped before a redirect was received")]
    ListenerClosed,
}

/// Result alias using service Error
pub type Result<T> = std::result::Result<T, Error>;
