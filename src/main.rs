use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use ledgerlink::clock::SystemClock;
use ledgerlink::config::{ProviderConfig, ProviderEnvironment};
use ledgerlink::link::ConnectionManager;
use ledgerlink::provider::ProviderClient;
use ledgerlink::server::{router, AppState};
use ledgerlink::store::MemoryCredentialStore;
use ledgerlink::sync::SyncEngine;

#[derive(Parser)]
#[command(name = "ledgerlink-server")]
#[command(about = "Bank linking and transaction summary API")]
struct Cli {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:3000")]
    listen: SocketAddr,

    /// Provider environment (sandbox, development, production);
    /// overrides PLAID_ENV
    #[arg(long)]
    environment: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = ProviderConfig::from_env()?;
    if let Some(raw) = cli.environment.as_deref() {
        config.environment = raw.parse::<ProviderEnvironment>()?;
    }
    tracing::info!(environment = %config.environment, "Starting server");

    let client = Arc::new(ProviderClient::new(config));
    let store = Arc::new(MemoryCredentialStore::new());
    let state = AppState {
        manager: Arc::new(ConnectionManager::new(client.clone(), store)),
        engine: Arc::new(SyncEngine::new(client.clone(), Arc::new(SystemClock))),
        client,
    };

    let listener = tokio::net::TcpListener::bind(cli.listen)
        .await
        .with_context(|| format!("Failed to bind {}", cli.listen))?;
    tracing::info!(addr = %cli.listen, "Listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signal");
    }
}
