// src/api/mod.rs
//! HTTP surface over the ledger.

pub mod error;
pub mod handlers;
pub mod types;

use axum::{Router, routing::get};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::{Ledger, RetryPolicy};

pub use error::ApiError;
pub use types::{ApiResponse, error_codes};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub ledger: Ledger,
    /// Applied around each transfer call; only conflicts are retried.
    pub retry: RetryPolicy,
}

impl AppState {
    pub fn new(ledger: Ledger, retry: RetryPolicy) -> Self {
        Self { ledger, retry }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route(
            "/accounts",
            get(handlers::list_accounts).post(handlers::create_account),
        )
        .route("/accounts/{id}", get(handlers::get_account))
        .route("/accounts/{id}/entries", get(handlers::list_account_entries))
        .route("/entries/{id}", get(handlers::get_entry))
        .route(
            "/transfers",
            get(handlers::list_transfers).post(handlers::create_transfer),
        )
        .route("/transfers/{id}", get(handlers::get_transfer))
        .with_state(state)
}

/// Serve until `shutdown` resolves; in-flight requests are drained.
pub async fn serve<S>(listener: TcpListener, state: Arc<AppState>, shutdown: S) -> std::io::Result<()>
where
    S: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "Ledger API listening");
    }

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}
