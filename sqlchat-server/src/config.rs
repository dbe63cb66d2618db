//! Server configuration from command-line flags and environment variables.

use std::path::PathBuf;

use clap::Parser;
use sqlchat_ai::client::{
    LlmSettings, DEFAULT_ANTHROPIC_API_BASE, DEFAULT_ANTHROPIC_MODEL, DEFAULT_OPENAI_API_BASE,
    DEFAULT_OPENAI_MODEL,
};

/// Settings read once at startup and handed to each component.
///
/// Credentials are optional on purpose: a missing database URL or LLM key only
/// fails the requests that need it.
#[derive(Clone, Parser)]
#[command(name = "sqlchat-server")]
#[command(about = "Ask questions about visitor data in plain language and run the SQL")]
#[command(version)]
pub struct ServerConfig {
    /// Address the HTTP server listens on
    #[arg(long, default_value = "0.0.0.0:5000", env = "SQLCHAT_BIND")]
    pub bind: String,

    /// PostgreSQL connection URI
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,

    /// Upper bound on pooled database connections
    #[arg(long, default_value = "5", env = "SQLCHAT_DB_MAX_CONNECTIONS")]
    pub db_max_connections: u32,

    /// Directory holding index.html and the front-end assets
    #[arg(long, default_value = "./static", env = "SQLCHAT_STATIC_DIR")]
    pub static_dir: PathBuf,

    /// OpenAI (or compatible) API key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    /// OpenAI model name
    #[arg(long, default_value = DEFAULT_OPENAI_MODEL, env = "OPENAI_MODEL")]
    pub openai_model: String,

    /// Base URL of the OpenAI-compatible API
    #[arg(long, default_value = DEFAULT_OPENAI_API_BASE, env = "OPENAI_API_BASE")]
    pub openai_api_base: String,

    /// Anthropic API key, used when no OpenAI key is set
    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    pub anthropic_api_key: Option<String>,

    /// Anthropic model name
    #[arg(long, default_value = DEFAULT_ANTHROPIC_MODEL, env = "ANTHROPIC_MODEL")]
    pub anthropic_model: String,

    /// Base URL of the Anthropic API
    #[arg(long, default_value = DEFAULT_ANTHROPIC_API_BASE, env = "ANTHROPIC_API_BASE")]
    pub anthropic_api_base: String,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl ServerConfig {
    pub fn llm_settings(&self) -> LlmSettings {
        LlmSettings {
            openai_api_key: self.openai_api_key.clone(),
            openai_model: self.openai_model.clone(),
            openai_api_base: self.openai_api_base.clone(),
            anthropic_api_key: self.anthropic_api_key.clone(),
            anthropic_model: self.anthropic_model.clone(),
            anthropic_api_base: self.anthropic_api_base.clone(),
        }
    }

    /// Default log filter when `RUST_LOG` is not set.
    pub fn log_filter(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else {
            "info"
        }
    }
}
