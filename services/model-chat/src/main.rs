//! model-chat
//!
//! Command-line front end for browsing Autodesk Platform Services designs and
//! asking a chatbot about them:
//! 1. Signs the user in with OAuth2 Authorization Code + PKCE
//! 2. Browses hubs, projects, folders and design items
//! 3. Hands out the viewer token for the selected model
//! 4. Sends natural-language questions about a model to the chatbot server

mod callback;
mod commands;
mod config;
mod error;
mod location;
mod metrics;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

use crate::commands::App;
use crate::config::Config;

#[derive(Parser)]
#[command(name = "model-chat")]
#[command(about = "Browse APS designs and chat about them")]
#[command(version)]
struct Cli {
    /// Config file (defaults to CONFIG_PATH, then model-chat.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in through the browser
    Login {
        /// Print the authorization URL and exit; finish with `complete`
        #[arg(long)]
        manual: bool,

        /// Seconds to wait for the authorization redirect
        #[arg(long, default_value_t = 300)]
        timeout: u64,
    },

    /// Finish a sign-in from the URL the browser was redirected to
    Complete { redirect_url: Url },

    /// Forget the stored session
    Logout,

    /// Show whether a session is stored
    Status,

    /// List hubs, or the children of a node id printed by a previous listing
    Browse { node: Option<String> },

    /// Print the viewer access token and its remaining lifetime
    Token,

    /// Ask the chatbot about a model, given by URN or item node id
    Ask { model: String, prompt: String },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("LOG_LEVEL")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let metrics_handle = metrics::install_recorder()?;

    let config_path = Config::resolve_path(cli.config.as_deref());
    info!(path = %config_path.display(), "loading configuration");
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    let app = App::new(config).await?;
    let output = match cli.command {
        Command::Login { manual: true, .. } => app.login_manual().await?,
        Command::Login { timeout, .. } => app.login(Duration::from_secs(timeout)).await?,
        Command::Complete { redirect_url } => app.complete(redirect_url).await?,
        Command::Logout => app.logout().await?,
        Command::Status => app.status().await?,
        Command::Browse { node } => app.browse(node.as_deref()).await?,
        Command::Token => app.token().await?,
        Command::Ask { model, prompt } => app.ask(&model, &prompt).await?,
    };
    debug!(metrics = %metrics::summary(&metrics_handle), "run metrics");
    println!("{output}");
    Ok(())
}
