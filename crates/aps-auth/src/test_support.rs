//! Shared fixtures for the auth tests: a local mock token endpoint.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use crate::config::AuthConfig;

/// How the mock token endpoint answers.
#[derive(Clone)]
enum Reply {
    /// Issue `at_{n}` / `rt_{n}` for the n-th request, valid for an hour.
    Issue,
    Fail { status: u16, body: String },
    Raw(String),
}

#[derive(Clone)]
struct MockState {
    reply: Reply,
    delay: Duration,
    hits: Arc<AtomicUsize>,
    forms: Arc<Mutex<Vec<HashMap<String, String>>>>,
}

/// Token endpoint served on `127.0.0.1:0` at `{url}/token`.
pub struct MockTokenServer {
    pub url: String,
    hits: Arc<AtomicUsize>,
    forms: Arc<Mutex<Vec<HashMap<String, String>>>>,
    _handle: tokio::task::JoinHandle<()>,
}

impl MockTokenServer {
    pub async fn start() -> Self {
        Self::spawn(Reply::Issue, Duration::ZERO).await
    }

    /// Like `start`, but each response is held back by `delay`.
    pub async fn start_slow(delay: Duration) -> Self {
        Self::spawn(Reply::Issue, delay).await
    }

    pub async fn start_failing(status: u16, body: &str) -> Self {
        Self::spawn(
            Reply::Fail {
                status,
                body: body.to_string(),
            },
            Duration::ZERO,
        )
        .await
    }

    pub async fn start_with_body(body: &str) -> Self {
        Self::spawn(Reply::Raw(body.to_string()), Duration::ZERO).await
    }

    async fn spawn(reply: Reply, delay: Duration) -> Self {
        let hits = Arc::new(AtomicUsize::new(0));
        let forms = Arc::new(Mutex::new(Vec::new()));
        let state = MockState {
            reply,
            delay,
            hits: hits.clone(),
            forms: forms.clone(),
        };

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new()
            .route("/token", post(token_handler))
            .with_state(state);
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{addr}"),
            hits,
            forms,
            _handle: handle,
        }
    }

    /// Number of requests the endpoint received.
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    /// Decoded form bodies, in arrival order.
    pub async fn requests(&self) -> Vec<HashMap<String, String>> {
        self.forms.lock().await.clone()
    }
}

async fn token_handler(
    State(state): State<MockState>,
    axum::Form(form): axum::Form<HashMap<String, String>>,
) -> (StatusCode, String) {
    let n = state.hits.fetch_add(1, Ordering::SeqCst) + 1;
    state.forms.lock().await.push(form);
    if !state.delay.is_zero() {
        tokio::time::sleep(state.delay).await;
    }

    match state.reply {
        Reply::Issue => (
            StatusCode::OK,
            serde_json::json!({
                "access_token": format!("at_{n}"),
                "refresh_token": format!("rt_{n}"),
                "expires_in": 3600,
                "token_type": "Bearer",
            })
            .to_string(),
        ),
        Reply::Fail { status, body } => (
            StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_REQUEST),
            body,
        ),
        Reply::Raw(body) => (StatusCode::OK, body),
    }
}

/// Auth config pointing at a mock authorization server.
pub fn test_config(auth_server: &str) -> Arc<AuthConfig> {
    Arc::new(AuthConfig::new("test-client", "http://localhost:8080/").with_auth_server(auth_server))
}
