// src/api/handlers.rs
use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use std::sync::Arc;

use super::AppState;
use super::error::{ApiError, from_json_rejection, from_path_rejection, from_query_rejection};
use super::types::{
    ApiResponse, CreateAccountRequest, HealthResponse, ListTransfersQuery, PageQuery,
    TransferRequest, error_codes, validate_id,
};
use crate::retry::with_backoff;
use crate::{
    Account, CreateAccountParams, Currency, Entry, ListAccountsParams, ListEntriesParams,
    ListTransfersParams, Transfer, TransferTxResult, ValidationError,
};

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

fn path_id(field: &'static str, path: Result<Path<i64>, PathRejection>) -> Result<i64, ApiError> {
    let Path(id) = path.map_err(from_path_rejection)?;
    Ok(validate_id(field, id)?)
}

/// GET /health
pub async fn health_check(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<ApiResponse<HealthResponse>>) {
    let timestamp_ms = chrono::Utc::now().timestamp_millis();

    match state.ledger.store().health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse::success(HealthResponse {
                status: "ok",
                timestamp_ms,
            })),
        ),
        Err(err) => {
            tracing::error!(error = %err, "Store health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    code: error_codes::SERVICE_UNAVAILABLE,
                    msg: "store unavailable".to_string(),
                    data: Some(HealthResponse {
                        status: "unavailable",
                        timestamp_ms,
                    }),
                }),
            )
        }
    }
}

/// POST /accounts
pub async fn create_account(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CreateAccountRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<Account>>), ApiError> {
    let Json(req) = body.map_err(from_json_rejection)?;
    let (owner, currency) = req.validate()?;

    let account = state
        .ledger
        .store()
        .create_account(CreateAccountParams::new(owner, currency))
        .await?;

    tracing::info!(account_id = account.id, %currency, "Account created");
    Ok((StatusCode::CREATED, Json(ApiResponse::success(account))))
}

/// GET /accounts/{id}
pub async fn get_account(
    State(state): State<Arc<AppState>>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Account> {
    let id = path_id("id", path)?;
    let account = state.ledger.store().get_account(id).await?;
    Ok(Json(ApiResponse::success(account)))
}

/// GET /accounts?page_id&page_size
pub async fn list_accounts(
    State(state): State<Arc<AppState>>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> ApiResult<Vec<Account>> {
    let Query(page) = query.map_err(from_query_rejection)?;
    let (limit, offset) = page.validate()?;

    let accounts = state
        .ledger
        .store()
        .list_accounts(ListAccountsParams { limit, offset })
        .await?;
    Ok(Json(ApiResponse::success(accounts)))
}

/// GET /accounts/{id}/entries?page_id&page_size
pub async fn list_account_entries(
    State(state): State<Arc<AppState>>,
    path: Result<Path<i64>, PathRejection>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> ApiResult<Vec<Entry>> {
    let account_id = path_id("id", path)?;
    let Query(page) = query.map_err(from_query_rejection)?;
    let (limit, offset) = page.validate()?;

    let store = state.ledger.store();
    store.get_account(account_id).await?;
    let entries = store
        .list_entries(ListEntriesParams {
            account_id,
            limit,
            offset,
        })
        .await?;
    Ok(Json(ApiResponse::success(entries)))
}

/// GET /entries/{id}
pub async fn get_entry(
    State(state): State<Arc<AppState>>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Entry> {
    let id = path_id("id", path)?;
    let entry = state.ledger.store().get_entry(id).await?;
    Ok(Json(ApiResponse::success(entry)))
}

/// Account must exist and hold `currency`.
async fn valid_account(
    state: &AppState,
    account_id: i64,
    currency: Currency,
) -> Result<Account, ApiError> {
    let account = state.ledger.store().get_account(account_id).await?;
    if account.currency != currency {
        return Err(ValidationError::CurrencyMismatch {
            account_id,
            actual: account.currency.to_string(),
            expected: currency.to_string(),
        }
        .into());
    }
    Ok(account)
}

/// POST /transfers
pub async fn create_transfer(
    State(state): State<Arc<AppState>>,
    body: Result<Json<TransferRequest>, JsonRejection>,
) -> ApiResult<TransferTxResult> {
    let Json(req) = body.map_err(from_json_rejection)?;
    let (params, currency) = req.validate()?;

    valid_account(&state, params.from_account_id, currency).await?;
    valid_account(&state, params.to_account_id, currency).await?;

    let result = with_backoff(&state.retry, || state.ledger.transfer_money(params)).await?;
    Ok(Json(ApiResponse::success(result)))
}

/// GET /transfers/{id}
pub async fn get_transfer(
    State(state): State<Arc<AppState>>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Transfer> {
    let id = path_id("id", path)?;
    let transfer = state.ledger.store().get_transfer(id).await?;
    Ok(Json(ApiResponse::success(transfer)))
}

/// GET /transfers?from_account_id&to_account_id&page_id&page_size
pub async fn list_transfers(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ListTransfersQuery>, QueryRejection>,
) -> ApiResult<Vec<Transfer>> {
    let Query(q) = query.map_err(from_query_rejection)?;
    let from_account_id = validate_id("from_account_id", q.from_account_id)?;
    let to_account_id = validate_id("to_account_id", q.to_account_id)?;
    let (limit, offset) = PageQuery {
        page_id: q.page_id,
        page_size: q.page_size,
    }
    .validate()?;

    let transfers = state
        .ledger
        .store()
        .list_transfers(ListTransfersParams {
            from_account_id,
            to_account_id,
            limit,
            offset,
        })
        .await?;
    Ok(Json(ApiResponse::success(transfers)))
}
