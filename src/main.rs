// src/main.rs
// Engram server binary: wires config, stores, providers and workers, then
// serves the chat API.

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use engram::api;
use engram::config::Config;
use engram::llm::{OpenAiClient, OpenAiEmbeddings};
use engram::memory::QdrantMemoryStore;
use engram::session::SessionStore;
use engram::AppState;

#[derive(Parser, Debug)]
#[command(name = "engram", about = "Persistent conversational memory engine")]
struct Cli {
    /// Bind host (overrides ENGRAM_HOST)
    #[arg(long)]
    host: Option<String>,

    /// Bind port (overrides ENGRAM_PORT)
    #[arg(long)]
    port: Option<u16>,

    /// SQLite database URL (overrides DATABASE_URL)
    #[arg(long)]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = Config::from_env();
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(database_url) = cli.database_url {
        config.database.url = database_url;
    }

    // Misconfiguration is fatal at boot.
    config.validate().context("invalid configuration")?;

    if config.sidecar.telemetry_token.is_some() {
        info!("telemetry token configured");
    }

    let sessions = Arc::new(
        SessionStore::connect(&config.database)
            .await
            .context("failed to open session store")?,
    );
    sessions
        .run_migrations()
        .await
        .context("failed to run session store migrations")?;

    let memories = Arc::new(
        QdrantMemoryStore::new(&config.qdrant, config.embedding.dimensions)
            .await
            .context("failed to initialize vector store")?,
    );

    let llm = Arc::new(OpenAiClient::new(&config.llm).context("failed to build LLM client")?);
    let embedder = Arc::new(
        OpenAiEmbeddings::new(config.llm.api_key.clone(), &config.embedding)
            .context("failed to build embedder")?,
    );

    let bind_address = config.server.bind_address();
    let state = AppState::build(config, llm, embedder, memories, sessions);
    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("failed to bind {}", bind_address))?;
    info!("engram listening on {}", bind_address);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
