//! Shared fixtures: a fixed credential provider and a local HTTP server.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use aps_auth::{CredentialProvider, Credentials};
use axum::Router;
use tokio::net::TcpListener;

/// Hands out the same credentials on every call and counts the calls.
pub struct StaticProvider {
    credentials: Option<Credentials>,
    calls: AtomicUsize,
}

impl StaticProvider {
    pub fn new(access_token: &str, expires_at: u64) -> Arc<Self> {
        Arc::new(Self {
            credentials: Some(Credentials::new(access_token, "rt", expires_at)),
            calls: AtomicUsize::new(0),
        })
    }

    /// A provider with no session; every call fails with `MissingSession`.
    pub fn signed_out() -> Arc<Self> {
        Arc::new(Self {
            credentials: None,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CredentialProvider for StaticProvider {
    fn credentials(
        &self,
    ) -> Pin<Box<dyn Future<Output = aps_auth::Result<Credentials>> + Send + '_>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let result = self
            .credentials
            .clone()
            .ok_or_else(|| aps_auth::Error::MissingSession("signed out".into()));
        Box::pin(async move { result })
    }
}

/// Serve `app` on `127.0.0.1:0`, returning its base URL.
pub async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}
