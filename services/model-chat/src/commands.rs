//! Command handlers
//!
//! Each handler returns the text to print so the CLI stays a thin shell over
//! them. Every run is one "page load": the session is initialized against the
//! configured redirect URI, consuming any pending verifier.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use aps_auth::{
    AuthOutcome, CredentialProvider, CredentialStore, FileStore, SessionManager, now_millis,
};
use aps_data::{ChatbotClient, DataManagementClient, TreeNode, TreeNodeId, ViewerToken};
use tracing::{debug, info};
use url::Url;

use crate::callback::CallbackServer;
use crate::config::Config;
use crate::location::CliLocation;

pub struct App {
    config: Config,
    store: CredentialStore,
    http: reqwest::Client,
}

impl App {
    pub async fn new(config: Config) -> Result<Self> {
        let path = config.storage.credentials_path.clone();
        let kv = FileStore::open(path.clone())
            .await
            .with_context(|| format!("failed to open credential store {}", path.display()))?;
        Ok(Self {
            config,
            store: CredentialStore::new(Arc::new(kv)),
            http: reqwest::Client::new(),
        })
    }

    fn session(&self, href: Url) -> SessionManager {
        SessionManager::new(
            Arc::new(self.config.auth_config()),
            self.store.clone(),
            self.http.clone(),
            Arc::new(CliLocation::new(href)),
        )
    }

    fn landing_session(&self) -> Result<SessionManager> {
        Ok(self.session(self.config.redirect_url()?))
    }

    /// Credentials source for API calls; fails when nobody is signed in.
    async fn provider(&self) -> Result<Arc<dyn CredentialProvider>> {
        let outcome = self.landing_session()?.initialize().await?;
        debug!(outcome = outcome.label(), "session loaded");
        match outcome.provider() {
            Some(provider) => Ok(provider),
            None => bail!("not signed in; run `model-chat login` first"),
        }
    }

    /// Interactive login: listen on the redirect URI, send the user to the
    /// authorization page and redeem the code that comes back.
    pub async fn login(&self, timeout: Duration) -> Result<String> {
        let redirect = self.config.redirect_url()?;
        let server = CallbackServer::start(&redirect)
            .await
            .context("failed to start the redirect listener")?;

        self.landing_session()?.login().await?;
        let returned = server.wait(timeout).await?;
        self.complete(returned).await
    }

    /// Start a login without a listener; finish it with `complete`.
    pub async fn login_manual(&self) -> Result<String> {
        self.landing_session()?.login().await?;
        Ok("After signing in, run `model-chat complete '<redirect URL>'`.".into())
    }

    /// Handle the URL the authorization server redirected to.
    pub async fn complete(&self, redirect: Url) -> Result<String> {
        let mut session = self.session(redirect);
        let outcome = session
            .initialize()
            .await
            .context("sign-in failed")?;
        match outcome {
            AuthOutcome::Redeemed { credentials, .. } => {
                let token = ViewerToken::from_credentials(&credentials, now_millis());
                info!("signed in");
                Ok(format!(
                    "Signed in. Access token valid for {}s.",
                    token.expires_in
                ))
            }
            AuthOutcome::Active(_) => Ok("Already signed in.".into()),
            AuthOutcome::NoSession => bail!("the redirect URL carries neither a code nor an error"),
        }
    }

    pub async fn logout(&self) -> Result<String> {
        self.landing_session()?.logout().await?;
        Ok("Signed out.".into())
    }

    pub async fn status(&self) -> Result<String> {
        let outcome = self.landing_session()?.initialize().await?;
        debug!(outcome = outcome.label(), "session loaded");
        if matches!(outcome, AuthOutcome::NoSession) {
            return Ok("Not signed in.".into());
        }
        match self.store.load().await? {
            Some(credentials) if !credentials.is_expired_at(now_millis()) => {
                let token = ViewerToken::from_credentials(&credentials, now_millis());
                Ok(format!(
                    "Signed in. Access token expires in {}s.",
                    token.expires_in
                ))
            }
            _ => Ok("Signed in. Access token expired; it is refreshed on next use.".into()),
        }
    }

    /// List the hubs, or the children of a tree node. An item node prints
    /// its selection instead.
    pub async fn browse(&self, node: Option<&str>) -> Result<String> {
        let node = node.map(str::parse::<TreeNodeId>).transpose()?;
        if let Some(selection) = node.as_ref().map(TreeNodeId::selection).transpose()?.flatten() {
            return Ok(serde_json::to_string_pretty(&selection)?);
        }

        let client =
            DataManagementClient::new(self.http.clone(), self.config.api_host()?, self.provider().await?);
        let nodes = match &node {
            None => client.roots().await?,
            Some(node) => client.children(node).await?,
        };
        Ok(render_nodes(&nodes))
    }

    /// The token the model viewer would be handed.
    pub async fn token(&self) -> Result<String> {
        let provider = self.provider().await?;
        let token = ViewerToken::fetch(provider.as_ref()).await?;
        Ok(serde_json::to_string_pretty(&token)?)
    }

    /// Ask the chatbot about a model, given by URN or by item node id.
    pub async fn ask(&self, model: &str, prompt: &str) -> Result<String> {
        let urn = match model.parse::<TreeNodeId>() {
            Ok(TreeNodeId::Item { urn, .. }) => urn,
            Ok(other) => bail!("{other} is not a design item"),
            Err(_) => model.to_string(),
        };
        let client = ChatbotClient::new(
            self.http.clone(),
            self.config.chatbot_url()?,
            self.provider().await?,
        );
        Ok(client.submit_prompt(&urn, prompt).await?)
    }
}

fn render_nodes(nodes: &[TreeNode]) -> String {
    if nodes.is_empty() {
        return "(empty)".into();
    }
    nodes
        .iter()
        .map(|node| {
            let marker = if node.id.has_children() { "+" } else { "-" };
            format!("{marker} {}\n    {}", node.label, node.id)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use aps_auth::{CODE_VERIFIER_KEY, Credentials, KeyValueStore};
    use axum::extract::State;
    use axum::routing::{get, post};
    use axum::{Form, Json, Router};
    use serde_json::{Value, json};
    use std::collections::HashMap;
    use tokio::net::TcpListener;
    use tokio::sync::Mutex;

    const URN: &str = "dXJuOmFkc2sud2lwcHJvZDpmcy5maWxlOnZmLmFiYz92ZXJzaW9uPTE";

    type Forms = Arc<Mutex<Vec<HashMap<String, String>>>>;

    /// Token, data-management and chatbot endpoints on one local server.
    async fn mock_aps() -> (String, Forms) {
        let forms: Forms = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .route(
                "/token",
                post(|State(forms): State<Forms>, Form(form): Form<HashMap<String, String>>| async move {
                    if form.get("code").map(String::as_str) == Some("bad") {
                        return (
                            axum::http::StatusCode::BAD_REQUEST,
                            Json(json!({ "error": "invalid_grant" })),
                        );
                    }
                    forms.lock().await.push(form);
                    (
                        axum::http::StatusCode::OK,
                        Json(json!({
                            "access_token": "at_new",
                            "refresh_token": "rt_new",
                            "expires_in": 3600
                        })),
                    )
                }),
            )
            .route(
                "/project/v1/hubs",
                get(|| async {
                    Json(json!({ "data": [
                        { "type": "hubs", "id": "b.hub", "attributes": { "name": "Studio" } }
                    ]}))
                }),
            )
            .route(
                "/chatbot/prompt",
                post(|Json(body): Json<Value>| async move {
                    Json(json!({ "responses": [format!("urn={}", body["urn"].as_str().unwrap_or_default())] }))
                }),
            )
            .with_state(forms.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), forms)
    }

    async fn app(base: &str, dir: &tempfile::TempDir) -> App {
        let toml = format!(
            r#"
[auth]
client_id = "test-client"
redirect_uri = "http://localhost:8080/"
auth_server = "{base}"

[storage]
credentials_path = "{}"

[api]
host = "{base}"
chatbot_url = "{base}"
"#,
            dir.path().join("credentials.json").display()
        );
        let config: Config = toml::from_str(&toml).unwrap();
        App::new(config).await.unwrap()
    }

    async fn signed_in(app: &App) {
        app.store
            .save(&Credentials::new("at_stored", "rt_stored", now_millis() + 600_000))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn status_without_session() {
        let (base, _) = mock_aps().await;
        let dir = tempfile::tempdir().unwrap();
        let app = app(&base, &dir).await;

        assert_eq!(app.status().await.unwrap(), "Not signed in.");
    }

    #[tokio::test]
    async fn complete_redeems_code_with_pending_verifier() {
        let (base, forms) = mock_aps().await;
        let dir = tempfile::tempdir().unwrap();
        let app = app(&base, &dir).await;

        let mut session = app.landing_session().unwrap();
        let authorize = session.login().await.unwrap();
        assert!(authorize.as_str().starts_with(&format!("{base}/authorize?")));

        let out = app
            .complete(Url::parse("http://localhost:8080/?code=abc").unwrap())
            .await
            .unwrap();

        assert!(out.starts_with("Signed in."), "got: {out}");
        let forms = forms.lock().await;
        assert_eq!(forms[0]["code"], "abc");
        assert_eq!(forms[0]["grant_type"], "authorization_code");
        assert_eq!(forms[0]["code_verifier"].len(), 100);
        let stored = app.store.load().await.unwrap().unwrap();
        assert_eq!(stored.access_token.expose(), "at_new");
        assert!(app.status().await.unwrap().starts_with("Signed in."));
    }

    #[tokio::test]
    async fn complete_with_error_redirect_fails() {
        let (base, _) = mock_aps().await;
        let dir = tempfile::tempdir().unwrap();
        let app = app(&base, &dir).await;

        let err = app
            .complete(
                Url::parse("http://localhost:8080/?error=access_denied&error_description=denied")
                    .unwrap(),
            )
            .await
            .unwrap_err();

        assert!(format!("{err:#}").contains("access_denied"), "got: {err:#}");
        assert!(app.store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn complete_with_rejected_code_persists_nothing() {
        let (base, _) = mock_aps().await;
        let dir = tempfile::tempdir().unwrap();
        let app = app(&base, &dir).await;
        app.landing_session().unwrap().login().await.unwrap();

        let err = app
            .complete(Url::parse("http://localhost:8080/?code=bad").unwrap())
            .await
            .unwrap_err();

        assert!(format!("{err:#}").contains("invalid_grant"), "got: {err:#}");
        assert!(app.store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn login_manual_leaves_pending_verifier() {
        let (base, _) = mock_aps().await;
        let dir = tempfile::tempdir().unwrap();
        let app = app(&base, &dir).await;

        app.login_manual().await.unwrap();

        let kv = FileStore::open(dir.path().join("credentials.json"))
            .await
            .unwrap();
        assert!(kv.get(CODE_VERIFIER_KEY).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn browse_requires_session() {
        let (base, _) = mock_aps().await;
        let dir = tempfile::tempdir().unwrap();
        let app = app(&base, &dir).await;

        let err = app.browse(None).await.unwrap_err();
        assert!(err.to_string().contains("not signed in"));
    }

    #[tokio::test]
    async fn browse_lists_hubs() {
        let (base, _) = mock_aps().await;
        let dir = tempfile::tempdir().unwrap();
        let app = app(&base, &dir).await;
        signed_in(&app).await;

        let out = app.browse(None).await.unwrap();
        assert_eq!(out, "+ Studio\n    hub|b.hub");
    }

    #[tokio::test]
    async fn browse_item_prints_selection_without_network() {
        let dir = tempfile::tempdir().unwrap();
        let app = app("http://127.0.0.1:1", &dir).await;

        let out = app
            .browse(Some(&format!("itm|b.hub|b.prj|lineage|{URN}")))
            .await
            .unwrap();

        let selection: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(
            selection["version_id"],
            "urn:adsk.wipprod:fs.file:vf.abc?version=1"
        );
        assert_eq!(selection["urn"], URN);
    }

    #[tokio::test]
    async fn browse_rejects_malformed_node_id() {
        let dir = tempfile::tempdir().unwrap();
        let app = app("http://127.0.0.1:1", &dir).await;
        assert!(app.browse(Some("prj|only-hub")).await.is_err());
    }

    #[tokio::test]
    async fn ask_accepts_item_node_id() {
        let (base, _) = mock_aps().await;
        let dir = tempfile::tempdir().unwrap();
        let app = app(&base, &dir).await;
        signed_in(&app).await;

        let answer = app
            .ask(&format!("itm|h|p|i|{URN}"), "How many doors?")
            .await
            .unwrap();
        assert_eq!(answer, format!("urn={URN}"));

        let answer = app.ask("plain-urn", "hi").await.unwrap();
        assert_eq!(answer, "urn=plain-urn");
    }

    #[tokio::test]
    async fn token_reports_remaining_lifetime() {
        let (base, _) = mock_aps().await;
        let dir = tempfile::tempdir().unwrap();
        let app = app(&base, &dir).await;
        signed_in(&app).await;

        let token: Value = serde_json::from_str(&app.token().await.unwrap()).unwrap();
        assert_eq!(token["access_token"], "at_stored");
        assert!(token["expires_in"].as_u64().unwrap() > 590);
    }

    #[tokio::test]
    async fn logout_clears_session() {
        let (base, _) = mock_aps().await;
        let dir = tempfile::tempdir().unwrap();
        let app = app(&base, &dir).await;
        signed_in(&app).await;

        app.logout().await.unwrap();

        assert!(app.store.load().await.unwrap().is_none());
        assert_eq!(app.status().await.unwrap(), "Not signed in.");
    }

    #[test]
    fn empty_listing_is_marked() {
        assert_eq!(render_nodes(&[]), "(empty)");
    }
}
