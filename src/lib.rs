// src/lib.rs
//! Account ledger with atomic, deadlock-free money transfers.
//!
//! - [`account`], [`entry`], [`transfer`] - ledger records
//! - [`executor`] - all-or-nothing units of work over a [`RecordStore`]
//! - [`money`] - the transfer routine built on the executor
//! - [`retry`] - caller-side retry of conflicting units
//! - [`adapters`] - PostgreSQL and in-memory stores
//! - [`api`] - HTTP handlers

pub mod account;
pub mod adapters;
pub mod api;
pub mod config;
pub mod entry;
pub mod error;
pub mod executor;
pub mod logging;
pub mod money;
pub mod retry;
pub mod transfer;

pub use account::{
    Account, AddAccountBalanceParams, CreateAccountParams, Currency, ListAccountsParams,
};
pub use entry::{CreateEntryParams, Entry, ListEntriesParams};
pub use error::{ErrorKind, LedgerError, LedgerResult, ValidationError};
pub use executor::UnitFuture;
pub use retry::RetryPolicy;
pub use transfer::{
    CreateTransferParams, ListTransfersParams, Transfer, TransferTxParams, TransferTxResult,
};

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Writes that must happen inside an atomic unit.
///
/// A handle is obtained from [`RecordStore::begin`]. Nothing written through
/// it is visible to other callers until [`StoreTx::commit`] succeeds.
/// Dropping a handle without committing discards the unit and releases every
/// row lock it holds.
#[async_trait]
pub trait StoreTx: Send {
    async fn create_transfer(&mut self, params: CreateTransferParams) -> LedgerResult<Transfer>;

    async fn create_entry(&mut self, params: CreateEntryParams) -> LedgerResult<Entry>;

    /// Add `amount` to the account balance and return the updated row.
    /// Implementors MUST:
    /// 1. take the row's write lock, held until the unit ends
    /// 2. apply the delta in the store, never read-modify-write in the caller
    /// 3. reject a resulting negative balance with `Persistence`
    /// 4. return `NotFound` if the account does not exist
    async fn add_account_balance(
        &mut self,
        params: AddAccountBalanceParams,
    ) -> LedgerResult<Account>;

    async fn commit(self: Box<Self>) -> LedgerResult<()>;

    async fn rollback(self: Box<Self>) -> LedgerResult<()>;
}

/// Record store: plain CRUD plus the entry point into atomic units.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn begin(&self) -> LedgerResult<Box<dyn StoreTx>>;

    // ACCOUNTS
    async fn create_account(&self, params: CreateAccountParams) -> LedgerResult<Account>;
    async fn get_account(&self, id: i64) -> LedgerResult<Account>;
    async fn list_accounts(&self, params: ListAccountsParams) -> LedgerResult<Vec<Account>>;

    // ENTRIES
    async fn get_entry(&self, id: i64) -> LedgerResult<Entry>;
    async fn list_entries(&self, params: ListEntriesParams) -> LedgerResult<Vec<Entry>>;

    // TRANSFERS
    async fn get_transfer(&self, id: i64) -> LedgerResult<Transfer>;
    async fn list_transfers(&self, params: ListTransfersParams) -> LedgerResult<Vec<Transfer>>;

    async fn health_check(&self) -> LedgerResult<()>;
}

/// Entry point of the ledger. Cheap to clone; holds the injected store.
#[derive(Clone)]
pub struct Ledger {
    store: Arc<dyn RecordStore>,
    deadline: Option<Duration>,
}

impl Ledger {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            deadline: None,
        }
    }

    /// Discard any unit still running after `deadline`.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn store(&self) -> &dyn RecordStore {
        self.store.as_ref()
    }

    pub fn store_arc(&self) -> Arc<dyn RecordStore> {
        Arc::clone(&self.store)
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }
}
