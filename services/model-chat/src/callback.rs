//! Local redirect listener
//!
//! Stands in for the page the authorization server redirects back to. It
//! binds the host and port of `redirect_uri`, accepts one GET on its path and
//! hands the full redirect URL (query included) to whoever is waiting.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::{RawQuery, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, oneshot};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{Error, Result};

const SIGNED_IN_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>model-chat</title></head>
<body style="font-family: system-ui; text-align: center; padding-top: 80px;">
<h2>Sign-in received</h2>
<p>You can close this tab and return to the terminal.</p>
</body>
</html>"#;

const DENIED_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>model-chat</title></head>
<body style="font-family: system-ui; text-align: center; padding-top: 80px;">
<h2>Sign-in was not completed</h2>
<p>Return to the terminal for details.</p>
</body>
</html>"#;

#[derive(Clone)]
struct CallbackState {
    redirect_uri: Url,
    tx: Arc<Mutex<Option<oneshot::Sender<Url>>>>,
}

/// Router answering redirects on the path of `redirect_uri`.
///
/// Only the first redirect is forwarded; later ones get `410 Gone`.
pub fn build_callback_router(redirect_uri: Url, tx: oneshot::Sender<Url>) -> Router {
    let path = redirect_uri.path().to_string();
    let state = CallbackState {
        redirect_uri,
        tx: Arc::new(Mutex::new(Some(tx))),
    };
    Router::new()
        .route(&path, get(callback_handler))
        .with_state(state)
}

async fn callback_handler(
    State(state): State<CallbackState>,
    RawQuery(query): RawQuery,
) -> Response {
    let mut url = state.redirect_uri.clone();
    url.set_query(query.as_deref());
    let denied = url.query_pairs().any(|(k, _)| k == "error");

    let Some(tx) = state.tx.lock().await.take() else {
        debug!("ignoring repeated redirect");
        return (StatusCode::GONE, "sign-in already completed").into_response();
    };
    if tx.send(url).is_err() {
        warn!("redirect received after the login command stopped waiting");
    }

    if denied {
        Html(DENIED_PAGE).into_response()
    } else {
        Html(SIGNED_IN_PAGE).into_response()
    }
}

/// A running redirect listener.
pub struct CallbackServer {
    local_addr: SocketAddr,
    rx: oneshot::Receiver<Url>,
    shutdown: oneshot::Sender<()>,
}

impl CallbackServer {
    /// Bind the host and port of `redirect_uri` and start serving.
    pub async fn start(redirect_uri: &Url) -> Result<Self> {
        let host = redirect_uri
            .host_str()
            .ok_or_else(|| Error::RedirectHost(redirect_uri.to_string()))?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        let port = redirect_uri.port_or_known_default().unwrap_or(80);

        let listener = TcpListener::bind((host, port))
            .await
            .map_err(|e| Error::Bind {
                addr: format!("{host}:{port}"),
                reason: e.to_string(),
            })?;
        let local_addr = listener.local_addr().map_err(|e| Error::Bind {
            addr: format!("{host}:{port}"),
            reason: e.to_string(),
        })?;

        let (tx, rx) = oneshot::channel();
        let (shutdown, shutdown_rx) = oneshot::channel::<()>();
        let app = build_callback_router(redirect_uri.clone(), tx);
        tokio::spawn(async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(e) = served {
                warn!(error = %e, "redirect listener failed");
            }
        });

        info!(addr = %local_addr, path = redirect_uri.path(), "waiting for authorization redirect");
        Ok(Self {
            local_addr,
            rx,
            shutdown,
        })
    }

    /// Wait for the redirect, then stop the listener.
    pub async fn wait(self, timeout: Duration) -> Result<Url> {
        let received = tokio::time::timeout(timeout, self.rx).await;
        let _ = self.shutdown.send(());
        debug!(addr = %self.local_addr, "redirect listener stopped");
        match received {
            Ok(Ok(url)) => Ok(url),
            Ok(Err(_)) => Err(Error::ListenerClosed),
            Err(_) => Err(Error::Timeout(timeout.as_secs())),
        }
    }
}
