//! Configuration types and loading
//!
//! The file is found via `--config`, then `CONFIG_PATH`, then
//! `model-chat.toml`. Its values win over defaults, except the client id:
//! `APS_CLIENT_ID` overrides the file so the TOML can be shared between APS
//! applications.

use std::path::{Path, PathBuf};

use aps_auth::{AuthConfig, DEFAULT_AUTH_SERVER, DEFAULT_SCOPES};
use aps_data::{DEFAULT_API_HOST, DEFAULT_CHATBOT_URL};
use serde::Deserialize;
use url::Url;

/// Default config file name, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "model-chat.toml";

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub auth: AuthSection,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

/// OAuth client settings
#[derive(Debug, Deserialize)]
pub struct AuthSection {
    #[serde(default)]
    pub client_id: String,
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
    #[serde(default = "default_auth_server")]
    pub auth_server: String,
}

/// Where credentials are persisted between runs
#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_credentials_path")]
    pub credentials_path: PathBuf,
}

/// Data-management and chatbot endpoints
#[derive(Debug, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_host")]
    pub host: String,
    #[serde(default = "default_chatbot_url")]
    pub chatbot_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            credentials_path: default_credentials_path(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_api_host(),
            chatbot_url: default_chatbot_url(),
        }
    }
}

fn default_redirect_uri() -> String {
    "http://localhost:8080/".into()
}

fn default_scopes() -> Vec<String> {
    DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect()
}

fn default_auth_server() -> String {
    DEFAULT_AUTH_SERVER.into()
}

fn default_credentials_path() -> PathBuf {
    PathBuf::from("model-chat-credentials.json")
}

fn default_api_host() -> String {
    DEFAULT_API_HOST.into()
}

fn default_chatbot_url() -> String {
    DEFAULT_CHATBOT_URL.into()
}

fn http_url(field: &str, value: &str) -> common::Result<Url> {
    let url = Url::parse(value)
        .map_err(|e| common::Error::Config(format!("{field} is not a valid URL ({e}): {value}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        _ => Err(common::Error::Config(format!(
            "{field} must start with http:// or https://, got: {value}"
        ))),
    }
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        if let Ok(client_id) = std::env::var("APS_CLIENT_ID") {
            config.auth.client_id = client_id;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> common::Result<()> {
        if self.auth.client_id.trim().is_empty() {
            return Err(common::Error::Config(
                "auth.client_id must be set in the config file or APS_CLIENT_ID".into(),
            ));
        }
        if self.auth.scopes.is_empty() {
            return Err(common::Error::Config(
                "auth.scopes must list at least one scope".into(),
            ));
        }
        http_url("auth.auth_server", &self.auth.auth_server)?;
        http_url("auth.redirect_uri", &self.auth.redirect_uri)?;
        http_url("api.host", &self.api.host)?;
        http_url("api.chatbot_url", &self.api.chatbot_url)?;
        Ok(())
    }

    pub fn auth_config(&self) -> AuthConfig {
        AuthConfig::new(&self.auth.client_id, &self.auth.redirect_uri)
            .with_auth_server(&self.auth.auth_server)
            .with_scopes(self.auth.scopes.iter().cloned())
    }

    pub fn redirect_url(&self) -> common::Result<Url> {
        http_url("auth.redirect_uri", &self.auth.redirect_uri)
    }

    pub fn api_host(&self) -> common::Result<Url> {
        http_url("api.host", &self.api.host)
    }

    pub fn chatbot_url(&self) -> common::Result<Url> {
        http_url("api.chatbot_url", &self.api.chatbot_url)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&Path>) -> PathBuf {
        if let Some(p) = cli_path {
            return p.to_path_buf();
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from(DEFAULT_CONFIG_PATH)
    }
}
