// src/adapters/postgres.rs
use crate::config::{DatabaseConfig, IsolationLevel};
use crate::{
    Account, AddAccountBalanceParams, CreateAccountParams, CreateEntryParams,
    CreateTransferParams, Entry, LedgerError, LedgerResult, ListAccountsParams, ListEntriesParams,
    ListTransfersParams, RecordStore, StoreTx, Transfer,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

const ACCOUNT_COLUMNS: &str = "id, owner, currency, balance, created_at";
const ENTRY_COLUMNS: &str = "id, account_id, amount, created_at";
const TRANSFER_COLUMNS: &str = "id, from_account_id, to_account_id, amount, created_at";

#[derive(sqlx::FromRow)]
struct AccountRow {
    id: i64,
    owner: String,
    currency: String,
    balance: i64,
    created_at: DateTime<Utc>,
}

impl TryFrom<AccountRow> for Account {
    type Error = LedgerError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        let currency = row.currency.parse().map_err(|_| {
            LedgerError::Persistence(format!(
                "account {} has unknown currency '{}'",
                row.id, row.currency
            ))
        })?;

        Ok(Account {
            id: row.id,
            owner: row.owner,
            currency,
            balance: row.balance,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct EntryRow {
    id: i64,
    account_id: i64,
    amount: i64,
    created_at: DateTime<Utc>,
}

impl From<EntryRow> for Entry {
    fn from(row: EntryRow) -> Self {
        Entry {
            id: row.id,
            account_id: row.account_id,
            amount: row.amount,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct TransferRow {
    id: i64,
    from_account_id: i64,
    to_account_id: i64,
    amount: i64,
    created_at: DateTime<Utc>,
}

impl From<TransferRow> for Transfer {
    fn from(row: TransferRow) -> Self {
        Transfer {
            id: row.id,
            from_account_id: row.from_account_id,
            to_account_id: row.to_account_id,
            amount: row.amount,
            created_at: row.created_at,
        }
    }
}

/// PostgreSQL record store.
///
/// Balance updates run `UPDATE ... SET balance = balance + $1`, which takes
/// the row lock for the rest of the transaction.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
    isolation: IsolationLevel,
}

impl PostgresStore {
    /// Create a connection pool from config.
    pub async fn connect(config: &DatabaseConfig) -> LedgerResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect(&config.url)
            .await?;

        tracing::info!(
            max_connections = config.max_connections,
            isolation = ?config.isolation,
            "PostgreSQL connection pool established"
        );
        Ok(Self {
            pool,
            isolation: config.isolation,
        })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            pool,
            isolation: IsolationLevel::default(),
        }
    }

    pub fn with_isolation(mut self, isolation: IsolationLevel) -> Self {
        self.isolation = isolation;
        self
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the ledger tables if they do not exist.
    pub async fn init_schema(&self) -> LedgerResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS accounts (
                id BIGSERIAL PRIMARY KEY,
                owner VARCHAR NOT NULL,
                currency VARCHAR NOT NULL,
                balance BIGINT NOT NULL CHECK (balance >= 0),
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS entries (
                id BIGSERIAL PRIMARY KEY,
                account_id BIGINT NOT NULL REFERENCES accounts(id),
                amount BIGINT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS transfers (
                id BIGSERIAL PRIMARY KEY,
                from_account_id BIGINT NOT NULL REFERENCES accounts(id),
                to_account_id BIGINT NOT NULL REFERENCES accounts(id),
                amount BIGINT NOT NULL CHECK (amount > 0),
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&mut *tx)
        .await?;

        for ddl in [
            "CREATE INDEX IF NOT EXISTS idx_accounts_owner ON accounts(owner)",
            "CREATE INDEX IF NOT EXISTS idx_entries_account ON entries(account_id)",
            "CREATE INDEX IF NOT EXISTS idx_transfers_from ON transfers(from_account_id)",
            "CREATE INDEX IF NOT EXISTS idx_transfers_to ON transfers(to_account_id)",
            "CREATE INDEX IF NOT EXISTS idx_transfers_pair ON transfers(from_account_id, to_account_id)",
        ] {
            sqlx::query(ddl).execute(&mut *tx).await?;
        }

        tx.commit().await?;
        tracing::info!("Ledger schema ready");
        Ok(())
    }
}

#[async_trait]
impl RecordStore for PostgresStore {
    async fn begin(&self) -> LedgerResult<Box<dyn StoreTx>> {
        let mut tx = self.pool.begin().await?;
        if let Some(stmt) = self.isolation.set_statement() {
            sqlx::query(stmt).execute(&mut *tx).await?;
        }
        Ok(Box::new(PostgresTx { tx }))
    }

    async fn create_account(&self, params: CreateAccountParams) -> LedgerResult<Account> {
        let row: AccountRow = sqlx::query_as(&format!(
            "INSERT INTO accounts (owner, currency, balance) VALUES ($1, $2, $3) RETURNING {}",
            ACCOUNT_COLUMNS
        ))
        .bind(&params.owner)
        .bind(params.currency.code())
        .bind(params.balance)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn get_account(&self, id: i64) -> LedgerResult<Account> {
        let row: Option<AccountRow> = sqlx::query_as(&format!(
            "SELECT {} FROM accounts WHERE id = $1",
            ACCOUNT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| LedgerError::NotFound(format!("account {}", id)))?
            .try_into()
    }

    async fn list_accounts(&self, params: ListAccountsParams) -> LedgerResult<Vec<Account>> {
        let rows: Vec<AccountRow> = sqlx::query_as(&format!(
            "SELECT {} FROM accounts ORDER BY id LIMIT $1 OFFSET $2",
            ACCOUNT_COLUMNS
        ))
        .bind(params.limit)
        .bind(params.offset)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Account::try_from).collect()
    }

    async fn get_entry(&self, id: i64) -> LedgerResult<Entry> {
        let row: Option<EntryRow> = sqlx::query_as(&format!(
            "SELECT {} FROM entries WHERE id = $1",
            ENTRY_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Entry::from)
            .ok_or_else(|| LedgerError::NotFound(format!("entry {}", id)))
    }

    async fn list_entries(&self, params: ListEntriesParams) -> LedgerResult<Vec<Entry>> {
        let rows: Vec<EntryRow> = sqlx::query_as(&format!(
            "SELECT {} FROM entries WHERE account_id = $1 ORDER BY id LIMIT $2 OFFSET $3",
            ENTRY_COLUMNS
        ))
        .bind(params.account_id)
        .bind(params.limit)
        .bind(params.offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Entry::from).collect())
    }

    async fn get_transfer(&self, id: i64) -> LedgerResult<Transfer> {
        let row: Option<TransferRow> = sqlx::query_as(&format!(
            "SELECT {} FROM transfers WHERE id = $1",
            TRANSFER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Transfer::from)
            .ok_or_else(|| LedgerError::NotFound(format!("transfer {}", id)))
    }

    async fn list_transfers(&self, params: ListTransfersParams) -> LedgerResult<Vec<Transfer>> {
        let rows: Vec<TransferRow> = sqlx::query_as(&format!(
            r#"
            SELECT {} FROM transfers
            WHERE from_account_id = $1 OR to_account_id = $2
            ORDER BY id
            LIMIT $3 OFFSET $4
            "#,
            TRANSFER_COLUMNS
        ))
        .bind(params.from_account_id)
        .bind(params.to_account_id)
        .bind(params.limit)
        .bind(params.offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Transfer::from).collect())
    }

    async fn health_check(&self) -> LedgerResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// One PostgreSQL transaction. Dropping it without commit rolls back.
pub struct PostgresTx {
    tx: sqlx::Transaction<'static, sqlx::Postgres>,
}

#[async_trait]
impl StoreTx for PostgresTx {
    async fn create_transfer(&mut self, params: CreateTransferParams) -> LedgerResult<Transfer> {
        let row: TransferRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO transfers (from_account_id, to_account_id, amount)
            VALUES ($1, $2, $3)
            RETURNING {}
            "#,
            TRANSFER_COLUMNS
        ))
        .bind(params.from_account_id)
        .bind(params.to_account_id)
        .bind(params.amount)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(row.into())
    }

    async fn create_entry(&mut self, params: CreateEntryParams) -> LedgerResult<Entry> {
        let row: EntryRow = sqlx::query_as(&format!(
            "INSERT INTO entries (account_id, amount) VALUES ($1, $2) RETURNING {}",
            ENTRY_COLUMNS
        ))
        .bind(params.account_id)
        .bind(params.amount)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(row.into())
    }

    async fn add_account_balance(
        &mut self,
        params: AddAccountBalanceParams,
    ) -> LedgerResult<Account> {
        let row: Option<AccountRow> = sqlx::query_as(&format!(
            r#"
            UPDATE accounts
            SET balance = balance + $1
            WHERE id = $2
            RETURNING {}
            "#,
            ACCOUNT_COLUMNS
        ))
        .bind(params.amount)
        .bind(params.account_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.ok_or_else(|| LedgerError::NotFound(format!("account {}", params.account_id)))?
            .try_into()
    }

    async fn commit(self: Box<Self>) -> LedgerResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> LedgerResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
