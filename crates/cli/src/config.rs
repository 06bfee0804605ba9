use clap::Parser;
use serde::Deserialize;

use crate::{commands::Command, error::Result};

const DEFAULT_CONFIG_PATH: &str = "config/budget.toml";

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    pub base_url: String,
    /// Durable storage (auth token). Survives logout of the shell.
    pub state_path: String,
    /// Session-scoped storage (user id). Removed again on logout.
    pub session_path: String,
    pub level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: budget_client::client::DEFAULT_BASE_URL.to_string(),
            state_path: "config/budget_state.json".to_string(),
            session_path: "config/budget_session.json".to_string(),
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "budget", version, about = "Budget tracker command-line client")]
pub struct Args {
    /// Optional config file path (TOML).
    #[arg(long, global = true)]
    config: Option<String>,
    /// Override base URL (e.g. http://localhost:5000).
    #[arg(long, global = true)]
    base_url: Option<String>,
    /// Override the durable state file.
    #[arg(long, global = true)]
    state_path: Option<String>,
    /// Override the session file.
    #[arg(long, global = true)]
    session_path: Option<String>,
    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    level: Option<String>,
    #[command(subcommand)]
    pub command: Command,
}

pub fn load(args: &Args) -> Result<AppConfig> {
    let config_path = args.config.as_deref().unwrap_or(DEFAULT_CONFIG_PATH);
    let mut builder = config::Config::builder();
    builder = builder.add_source(config::File::with_name(config_path).required(false));
    builder = builder.add_source(config::Environment::with_prefix("BUDGET"));
    let mut settings: AppConfig = builder.build()?.try_deserialize()?;

    if let Some(base_url) = &args.base_url {
        settings.base_url = base_url.clone();
    }
    if let Some(state_path) = &args.state_path {
        settings.state_path = state_path.clone();
    }
    if let Some(session_path) = &args.session_path {
        settings.session_path = session_path.clone();
    }
    if let Some(level) = &args.level {
        settings.level = level.clone();
    }

    Ok(settings)
}
