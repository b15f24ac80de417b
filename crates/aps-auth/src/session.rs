//! Authentication session state machine
//!
//! Pure state machine: [`handle_event`] receives events and returns
//! `(new_state, action)`. [`SessionManager`] executes the I/O implied by each
//! action against the credential store, the token endpoint and the page
//! [`Location`].
//!
//! A login spans two page loads. `login()` persists a PKCE verifier and
//! navigates to the authorization server; the server redirects back with
//! `?code=...` (or `?error=...`) and the next `initialize()` consumes the
//! verifier exactly once to redeem the code.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};
use url::Url;

use crate::config::AuthConfig;
use crate::constants::VERIFIER_LENGTH;
use crate::credentials::{CredentialStore, Credentials};
use crate::error::{Error, Result};
use crate::pkce;
use crate::provider::{CredentialProvider, StoreCredentialProvider};
use crate::token::TokenExchanger;

/// The page the session lives on.
///
/// In a browser this is `window.location`; the CLI provides its own
/// implementation backed by the local redirect listener.
pub trait Location: Send + Sync {
    /// Full URL of the current page, including the query string.
    fn href(&self) -> Url;

    /// Drop the query string so a reload doesn't replay the redirect.
    fn clear_query(&self);

    /// Navigate away to `url`. Terminal for the current page load.
    fn assign(&self, url: &Url);

    fn reload(&self);
}

/// Session states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// No credentials and no login in flight
    Unauthenticated,
    /// Verifier stored, browser sent to the authorization server
    PendingRedirect,
    /// Authorization code received, exchange in flight
    Redeemed,
    /// Credentials held (possibly expired but refreshable)
    Active,
    /// Authorization failed
    Error { reason: String },
}

impl SessionState {
    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Unauthenticated => "unauthenticated",
            SessionState::PendingRedirect => "pending_redirect",
            SessionState::Redeemed => "redeemed",
            SessionState::Active => "active",
            SessionState::Error { .. } => "error",
        }
    }
}

/// Events that drive session transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Page loaded with `?code=...`
    CodeReturned { code: String },
    /// Page loaded with `?error=...`
    ErrorReturned { error: String, description: String },
    /// Page loaded without redirect params, access token in the store
    StoredSessionFound,
    /// Page loaded without redirect params, nothing in the store
    NoStoredSession,
    /// Code exchange succeeded and credentials were persisted
    CodeRedeemed,
    /// Code exchange failed
    RedeemFailed(String),
    LoginRequested,
    LogoutRequested,
}

/// Actions the manager executes after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Exchange the code with the pending verifier
    RedeemCode { code: String },
    /// Surface the authorization server's error to the caller
    RejectAuthorization { error: String, description: String },
    /// Hand out a provider over the stored credentials
    ResumeSession,
    /// Nothing to resume; caller should offer a login
    PromptLogin,
    /// Generate PKCE material and navigate to the authorize endpoint
    RedirectToAuthorize,
    /// Wipe stored credentials and reload
    ClearAndReload,
    None,
}

/// Handle a session transition. Pure function: no I/O.
pub fn handle_event(state: SessionState, event: SessionEvent) -> (SessionState, SessionAction) {
    match (state, event) {
        // --- Page load ---
        (
            SessionState::Unauthenticated | SessionState::PendingRedirect,
            SessionEvent::CodeReturned { code },
        ) => (SessionState::Redeemed, SessionAction::RedeemCode { code }),

        (
            SessionState::Unauthenticated | SessionState::PendingRedirect,
            SessionEvent::ErrorReturned { error, description },
        ) => (
            SessionState::Error {
                reason: format!("{error}: {description}"),
            },
            SessionAction::RejectAuthorization { error, description },
        ),

        (
            SessionState::Unauthenticated | SessionState::PendingRedirect,
            SessionEvent::StoredSessionFound,
        ) => (SessionState::Active, SessionAction::ResumeSession),

        (
            SessionState::Unauthenticated | SessionState::PendingRedirect,
            SessionEvent::NoStoredSession,
        ) => (SessionState::Unauthenticated, SessionAction::PromptLogin),

        // --- Code exchange ---
        (SessionState::Redeemed, SessionEvent::CodeRedeemed) => {
            (SessionState::Active, SessionAction::None)
        }
        (SessionState::Redeemed, SessionEvent::RedeemFailed(reason)) => {
            (SessionState::Error { reason }, SessionAction::None)
        }

        // --- User actions ---
        (SessionState::Redeemed, SessionEvent::LoginRequested) => {
            (SessionState::Redeemed, SessionAction::None)
        }
        (_, SessionEvent::LoginRequested) => (
            SessionState::PendingRedirect,
            SessionAction::RedirectToAuthorize,
        ),
        (_, SessionEvent::LogoutRequested) => {
            (SessionState::Unauthenticated, SessionAction::ClearAndReload)
        }

        (state, event) => {
            warn!(state = state.label(), ?event, "ignoring event in current session state");
            (state, SessionAction::None)
        }
    }
}

/// Result of one `initialize()` call.
pub enum AuthOutcome {
    /// Stored credentials found; the provider refreshes them as needed.
    Active(Arc<dyn CredentialProvider>),
    /// An authorization code was just exchanged.
    Redeemed {
        credentials: Credentials,
        provider: Arc<dyn CredentialProvider>,
    },
    /// Logged out: offer a login.
    NoSession,
}

impl AuthOutcome {
    /// The credential provider, unless there is no session.
    pub fn provider(&self) -> Option<Arc<dyn CredentialProvider>> {
        match self {
            AuthOutcome::Active(provider) => Some(provider.clone()),
            AuthOutcome::Redeemed { provider, .. } => Some(provider.clone()),
            AuthOutcome::NoSession => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AuthOutcome::Active(_) => "active",
            AuthOutcome::Redeemed { .. } => "redeemed",
            AuthOutcome::NoSession => "no_session",
        }
    }
}

impl fmt::Debug for AuthOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthOutcome::Active(_) => write!(f, "Active(..)"),
            AuthOutcome::Redeemed { credentials, .. } => f
                .debug_struct("Redeemed")
                .field("credentials", credentials)
                .finish_non_exhaustive(),
            AuthOutcome::NoSession => write!(f, "NoSession"),
        }
    }
}

/// Orchestrates login, redirect handling and logout for one page.
pub struct SessionManager {
    config: Arc<AuthConfig>,
    store: CredentialStore,
    exchanger: TokenExchanger,
    location: Arc<dyn Location>,
    state: SessionState,
}

impl SessionManager {
    pub fn new(
        config: Arc<AuthConfig>,
        store: CredentialStore,
        http_client: reqwest::Client,
        location: Arc<dyn Location>,
    ) -> Self {
        let exchanger = TokenExchanger::new(http_client, config.clone());
        Self {
            config,
            store,
            exchanger,
            location,
            state: SessionState::Unauthenticated,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    fn transition(&mut self, event: SessionEvent) -> SessionAction {
        let state = std::mem::replace(&mut self.state, SessionState::Unauthenticated);
        let (state, action) = handle_event(state, event);
        debug!(state = state.label(), ?action, "session transition");
        self.state = state;
        action
    }

    fn provider(&self) -> Arc<dyn CredentialProvider> {
        Arc::new(StoreCredentialProvider::new(
            self.store.clone(),
            self.exchanger.clone(),
        ))
    }

    /// Decide the session for the current page load.
    ///
    /// The pending verifier is consumed here whatever the URL says, so a
    /// verifier is never usable by a later page load.
    pub async fn initialize(&mut self) -> Result<AuthOutcome> {
        let params: HashMap<String, String> =
            self.location.href().query_pairs().into_owned().collect();

        let verifier = self.store.take_verifier().await?;
        self.state = if verifier.is_some() {
            SessionState::PendingRedirect
        } else {
            SessionState::Unauthenticated
        };

        let event = if let Some(code) = params.get("code") {
            SessionEvent::CodeReturned { code: code.clone() }
        } else if let Some(error) = params.get("error") {
            SessionEvent::ErrorReturned {
                error: error.clone(),
                description: params.get("error_description").cloned().unwrap_or_default(),
            }
        } else if self.store.has_access_token().await? {
            SessionEvent::StoredSessionFound
        } else {
            SessionEvent::NoStoredSession
        };

        match self.transition(event) {
            SessionAction::RedeemCode { code } => self.redeem(verifier, &code).await,
            SessionAction::RejectAuthorization { error, description } => {
                warn!(error = %error, description = %description, "authorization server returned an error");
                Err(Error::AuthorizationDenied { error, description })
            }
            SessionAction::ResumeSession => {
                debug!("resuming stored session");
                Ok(AuthOutcome::Active(self.provider()))
            }
            _ => {
                debug!("no session");
                Ok(AuthOutcome::NoSession)
            }
        }
    }

    async fn redeem(&mut self, verifier: Option<String>, code: &str) -> Result<AuthOutcome> {
        let Some(verifier) = verifier else {
            self.transition(SessionEvent::RedeemFailed(
                "no pending verifier".to_string(),
            ));
            warn!("authorization code returned without a pending verifier");
            return Err(Error::MissingVerifier);
        };

        let credentials = match self.exchanger.exchange_authorization_code(&verifier, code).await {
            Ok(credentials) => credentials,
            Err(e) => {
                self.transition(SessionEvent::RedeemFailed(e.to_string()));
                return Err(e);
            }
        };

        if let Err(e) = self.store.save(&credentials).await {
            self.transition(SessionEvent::RedeemFailed(e.to_string()));
            return Err(e);
        }
        self.location.clear_query();
        self.transition(SessionEvent::CodeRedeemed);
        info!(expires_at = credentials.expires_at, "authorization code redeemed");

        Ok(AuthOutcome::Redeemed {
            credentials,
            provider: self.provider(),
        })
    }

    /// Start a login: persist a fresh verifier and navigate to the
    /// authorization server. Returns the authorization URL.
    pub async fn login(&mut self) -> Result<Url> {
        if self.transition(SessionEvent::LoginRequested) != SessionAction::RedirectToAuthorize {
            return Err(Error::Config(
                "login requested while an authorization code is being redeemed".into(),
            ));
        }

        let verifier = pkce::generate_verifier(VERIFIER_LENGTH);
        self.store.store_verifier(&verifier).await?;
        let challenge = pkce::compute_challenge(&verifier);
        let url = pkce::build_authorization_url(&self.config, &pkce::generate_nonce(), &challenge)?;

        info!(client_id = %self.config.client_id, "redirecting to authorization server");
        self.location.assign(&url);
        Ok(url)
    }

    /// Drop stored credentials and reload the page.
    pub async fn logout(&mut self) -> Result<()> {
        self.transition(SessionEvent::LogoutRequested);
        self.store.clear().await?;
        info!("logged out");
        self.location.reload();
        Ok(())
    }
}
