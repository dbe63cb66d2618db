//! sqlchat Server - REST API for natural language SQL generation and query execution

mod config;
mod error;
mod routes;

use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use sqlchat_ai::LlmClient;
use sqlchat_connectors::PostgresGateway;

use config::ServerConfig;
use routes::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine; the process environment is used as-is.
    dotenv::dotenv().ok();
    let config = ServerConfig::parse();

    // Set up logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_filter()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let generator = LlmClient::from_settings(&config.llm_settings());
    match generator.provider_name() {
        Some(provider) => info!("Using {} for SQL generation", provider),
        None => warn!("No LLM API key configured. /api/chat will fail until one is set."),
    }

    let gateway = PostgresGateway::connect_lazy(
        config.database_url.as_deref(),
        config.db_max_connections,
    );

    let state = Arc::new(AppState {
        generator: Arc::new(generator),
        executor: Arc::new(gateway),
    });

    let app = routes::app(state, &config.static_dir);

    info!("Starting sqlchat server on {}", config.bind);
    let listener = tokio::net::TcpListener::bind(&config.bind).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
