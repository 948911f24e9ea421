// src/main.rs
use anyhow::Context;
use std::sync::Arc;
use tokio::net::TcpListener;

use ledger::adapters::{MemoryStore, PostgresStore};
use ledger::api::{self, AppState};
use ledger::config::{AppConfig, Backend};
use ledger::logging::init_logging;
use ledger::{Ledger, RecordStore, RetryPolicy};

/// `--env <name>` (or `-e <name>`) from the arguments.
fn env_from_args(args: &[String]) -> Option<String> {
    args.windows(2)
        .find(|pair| pair[0] == "--env" || pair[0] == "-e")
        .map(|pair| pair[1].clone())
}

/// The command line wins over `APP_ENV`; falls back to `dev`.
fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    env_from_args(&args)
        .or_else(|| std::env::var("APP_ENV").ok())
        .unwrap_or_else(|| "dev".to_string())
}

async fn build_store(config: &AppConfig) -> anyhow::Result<Arc<dyn RecordStore>> {
    match config.database.backend {
        Backend::Postgres => {
            let store = PostgresStore::connect(&config.database)
                .await
                .context("connecting to PostgreSQL")?;
            store.init_schema().await.context("initializing schema")?;
            Ok(Arc::new(store))
        }
        Backend::Memory => {
            tracing::warn!("Using in-memory store, nothing will be persisted");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let config = AppConfig::load(&env).with_context(|| format!("loading config for '{}'", env))?;
    let _guard = init_logging(&config);

    tracing::info!(env = %env, backend = ?config.database.backend, "Starting bankledger");

    let store = build_store(&config).await?;

    let mut ledger = Ledger::new(store);
    if let Some(deadline) = config.transfer.deadline() {
        ledger = ledger.with_deadline(deadline);
    }
    let state = Arc::new(AppState::new(
        ledger,
        RetryPolicy::from(&config.transfer.retry),
    ));

    let addr = config.server_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;

    api::serve(listener, state, shutdown_signal()).await?;
    tracing::info!("Server stopped");
    Ok(())
}
