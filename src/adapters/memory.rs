// src/adapters/memory.rs
use crate::{
    Account, AddAccountBalanceParams, CreateAccountParams, CreateEntryParams,
    CreateTransferParams, Entry, LedgerError, LedgerResult, ListAccountsParams, ListEntriesParams,
    ListTransfersParams, RecordStore, StoreTx, Transfer,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::OwnedMutexGuard;

/// Step at which [`MemoryStore::inject_fault`] makes the next unit fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultPoint {
    CreateTransfer,
    CreateEntry,
    AddAccountBalance,
    /// Fails the commit with a serialization `Conflict`.
    Commit,
}

#[derive(Default)]
struct Tables {
    accounts: BTreeMap<i64, Account>,
    entries: BTreeMap<i64, Entry>,
    transfers: BTreeMap<i64, Transfer>,
}

struct Sequence(AtomicI64);

impl Sequence {
    fn new() -> Self {
        Self(AtomicI64::new(1))
    }

    /// Values handed out are never reused, even if the unit rolls back.
    fn next(&self) -> i64 {
        self.0.fetch_add(1, Ordering::SeqCst)
    }
}

struct Inner {
    tables: Mutex<Tables>,
    row_locks: Mutex<HashMap<i64, Arc<tokio::sync::Mutex<()>>>>,
    faults: Mutex<VecDeque<FaultPoint>>,
    account_seq: Sequence,
    entry_seq: Sequence,
    transfer_seq: Sequence,
    rollbacks: AtomicUsize,
}

impl Inner {
    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn row_lock(&self, account_id: i64) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.row_locks.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(locks.entry(account_id).or_default())
    }

    /// Pops the pending fault if it targets `point`.
    fn take_fault(&self, point: FaultPoint) -> bool {
        let mut faults = self.faults.lock().unwrap_or_else(|e| e.into_inner());
        if faults.front() == Some(&point) {
            faults.pop_front();
            true
        } else {
            false
        }
    }

    fn account(&self, id: i64) -> LedgerResult<Account> {
        self.tables()
            .accounts
            .get(&id)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(format!("account {}", id)))
    }
}

fn injected(point: FaultPoint) -> LedgerError {
    LedgerError::Persistence(format!("injected fault at {:?}", point))
}

/// In-memory record store.
///
/// Emulates the row locking of a relational store: `add_account_balance`
/// takes a per-account lock held until the unit commits, rolls back, or is
/// dropped. Units stage their writes and publish them on commit only.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                tables: Mutex::new(Tables::default()),
                row_locks: Mutex::new(HashMap::new()),
                faults: Mutex::new(VecDeque::new()),
                account_seq: Sequence::new(),
                entry_seq: Sequence::new(),
                transfer_seq: Sequence::new(),
                rollbacks: AtomicUsize::new(0),
            }),
        }
    }

    /// Make the next operation reaching `point` fail once.
    pub fn inject_fault(&self, point: FaultPoint) {
        self.inner
            .faults
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(point);
    }

    pub fn entry_count(&self) -> usize {
        self.inner.tables().entries.len()
    }

    pub fn transfer_count(&self) -> usize {
        self.inner.tables().transfers.len()
    }

    /// Units ended through an explicit rollback. Dropped units are not counted.
    pub fn rollback_count(&self) -> usize {
        self.inner.rollbacks.load(Ordering::SeqCst)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn page<T>(rows: impl Iterator<Item = T>, limit: i64, offset: i64) -> Vec<T> {
    rows.skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .collect()
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn begin(&self) -> LedgerResult<Box<dyn StoreTx>> {
        Ok(Box::new(MemoryTx {
            store: Arc::clone(&self.inner),
            transfers: Vec::new(),
            entries: Vec::new(),
            balances: BTreeMap::new(),
            locks: HashMap::new(),
        }))
    }

    async fn create_account(&self, params: CreateAccountParams) -> LedgerResult<Account> {
        if params.balance < 0 {
            return Err(LedgerError::Persistence(
                "account balance must be non-negative".to_string(),
            ));
        }

        let account = Account {
            id: self.inner.account_seq.next(),
            owner: params.owner,
            currency: params.currency,
            balance: params.balance,
            created_at: Utc::now(),
        };

        self.inner
            .tables()
            .accounts
            .insert(account.id, account.clone());
        Ok(account)
    }

    async fn get_account(&self, id: i64) -> LedgerResult<Account> {
        self.inner.account(id)
    }

    async fn list_accounts(&self, params: ListAccountsParams) -> LedgerResult<Vec<Account>> {
        let tables = self.inner.tables();
        Ok(page(
            tables.accounts.values().cloned(),
            params.limit,
            params.offset,
        ))
    }

    async fn get_entry(&self, id: i64) -> LedgerResult<Entry> {
        self.inner
            .tables()
            .entries
            .get(&id)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(format!("entry {}", id)))
    }

    async fn list_entries(&self, params: ListEntriesParams) -> LedgerResult<Vec<Entry>> {
        let tables = self.inner.tables();
        let rows = tables
            .entries
            .values()
            .filter(|e| e.account_id == params.account_id)
            .cloned();
        Ok(page(rows, params.limit, params.offset))
    }

    async fn get_transfer(&self, id: i64) -> LedgerResult<Transfer> {
        self.inner
            .tables()
            .transfers
            .get(&id)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(format!("transfer {}", id)))
    }

    async fn list_transfers(&self, params: ListTransfersParams) -> LedgerResult<Vec<Transfer>> {
        let tables = self.inner.tables();
        let rows = tables
            .transfers
            .values()
            .filter(|t| {
                t.from_account_id == params.from_account_id
                    || t.to_account_id == params.to_account_id
            })
            .cloned();
        Ok(page(rows, params.limit, params.offset))
    }

    async fn health_check(&self) -> LedgerResult<()> {
        Ok(())
    }
}

/// One unit of work against [`MemoryStore`].
pub struct MemoryTx {
    store: Arc<Inner>,
    transfers: Vec<Transfer>,
    entries: Vec<Entry>,
    // account id -> balance after this unit's deltas
    balances: BTreeMap<i64, i64>,
    locks: HashMap<i64, OwnedMutexGuard<()>>,
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn create_transfer(&mut self, params: CreateTransferParams) -> LedgerResult<Transfer> {
        if self.store.take_fault(FaultPoint::CreateTransfer) {
            return Err(injected(FaultPoint::CreateTransfer));
        }
        self.store.account(params.from_account_id)?;
        self.store.account(params.to_account_id)?;
        if params.amount <= 0 {
            return Err(LedgerError::Persistence(
                "transfer amount must be positive".to_string(),
            ));
        }

        let transfer = Transfer {
            id: self.store.transfer_seq.next(),
            from_account_id: params.from_account_id,
            to_account_id: params.to_account_id,
            amount: params.amount,
            created_at: Utc::now(),
        };
        self.transfers.push(transfer.clone());
        Ok(transfer)
    }

    async fn create_entry(&mut self, params: CreateEntryParams) -> LedgerResult<Entry> {
        if self.store.take_fault(FaultPoint::CreateEntry) {
            return Err(injected(FaultPoint::CreateEntry));
        }
        self.store.account(params.account_id)?;

        let entry = Entry {
            id: self.store.entry_seq.next(),
            account_id: params.account_id,
            amount: params.amount,
            created_at: Utc::now(),
        };
        self.entries.push(entry.clone());
        Ok(entry)
    }

    async fn add_account_balance(
        &mut self,
        params: AddAccountBalanceParams,
    ) -> LedgerResult<Account> {
        if self.store.take_fault(FaultPoint::AddAccountBalance) {
            return Err(injected(FaultPoint::AddAccountBalance));
        }
        self.store.account(params.account_id)?;

        if !self.locks.contains_key(&params.account_id) {
            let guard = self.store.row_lock(params.account_id).lock_owned().await;
            self.locks.insert(params.account_id, guard);
        }

        // Read under the row lock: no other unit can commit this row now.
        let mut account = self.store.account(params.account_id)?;
        let current = self
            .balances
            .get(&params.account_id)
            .copied()
            .unwrap_or(account.balance);

        let updated = current
            .checked_add(params.amount)
            .ok_or_else(|| LedgerError::Persistence("balance out of range".to_string()))?;
        if updated < 0 {
            return Err(LedgerError::Persistence(format!(
                "account {} balance would become negative ({})",
                params.account_id, updated
            )));
        }

        self.balances.insert(params.account_id, updated);
        account.balance = updated;
        Ok(account)
    }

    async fn commit(self: Box<Self>) -> LedgerResult<()> {
        if self.store.take_fault(FaultPoint::Commit) {
            return Err(LedgerError::Conflict(
                "could not serialize access due to concurrent update".to_string(),
            ));
        }

        let this = *self;
        {
            let mut tables = this.store.tables();
            for transfer in this.transfers {
                tables.transfers.insert(transfer.id, transfer);
            }
            for entry in this.entries {
                tables.entries.insert(entry.id, entry);
            }
            for (account_id, balance) in this.balances {
                if let Some(account) = tables.accounts.get_mut(&account_id) {
                    account.balance = balance;
                }
            }
        }
        // Row locks are released only after the writes are published.
        drop(this.locks);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> LedgerResult<()> {
        self.store.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Currency;
    use std::time::Duration;

    async fn account(store: &MemoryStore, balance: i64) -> Account {
        store
            .create_account(CreateAccountParams::new("owner", Currency::USD).with_balance(balance))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_staged_writes_invisible_until_commit() {
        let store = MemoryStore::new();
        let a = account(&store, 100).await;

        let mut tx = store.begin().await.unwrap();
        let updated = tx
            .add_account_balance(AddAccountBalanceParams {
                account_id: a.id,
                amount: -40,
            })
            .await
            .unwrap();
        assert_eq!(updated.balance, 60);
        assert_eq!(store.get_account(a.id).await.unwrap().balance, 100);

        tx.commit().await.unwrap();
        assert_eq!(store.get_account(a.id).await.unwrap().balance, 60);
    }

    #[tokio::test]
    async fn test_negative_balance_rejected() {
        let store = MemoryStore::new();
        let a = account(&store, 10).await;

        let mut tx = store.begin().await.unwrap();
        let err = tx
            .add_account_balance(AddAccountBalanceParams {
                account_id: a.id,
                amount: -11,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Persistence(_)));
    }

    #[tokio::test]
    async fn test_missing_account_is_not_found() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let err = tx
            .create_entry(CreateEntryParams {
                account_id: 42,
                amount: 1,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_row_lock_held_until_unit_ends() {
        let store = MemoryStore::new();
        let a = account(&store, 100).await;

        let mut first = store.begin().await.unwrap();
        first
            .add_account_balance(AddAccountBalanceParams {
                account_id: a.id,
                amount: 5,
            })
            .await
            .unwrap();

        let contender = store.clone();
        let waiter = tokio::spawn(async move {
            let mut second = contender.begin().await.unwrap();
            let account = second
                .add_account_balance(AddAccountBalanceParams {
                    account_id: a.id,
                    amount: 5,
                })
                .await
                .unwrap();
            second.commit().await.unwrap();
            account.balance
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        first.commit().await.unwrap();
        assert_eq!(waiter.await.unwrap(), 110);
    }

    #[tokio::test]
    async fn test_dropped_unit_releases_locks() {
        let store = MemoryStore::new();
        let a = account(&store, 100).await;

        {
            let mut tx = store.begin().await.unwrap();
            tx.add_account_balance(AddAccountBalanceParams {
                account_id: a.id,
                amount: 1,
            })
            .await
            .unwrap();
        }

        let mut tx = store.begin().await.unwrap();
        let updated = tokio::time::timeout(
            Duration::from_secs(1),
            tx.add_account_balance(AddAccountBalanceParams {
                account_id: a.id,
                amount: 1,
            }),
        )
        .await
        .expect("lock should be free")
        .unwrap();
        assert_eq!(updated.balance, 101);
    }

    #[tokio::test]
    async fn test_fault_fires_once() {
        let store = MemoryStore::new();
        let a = account(&store, 0).await;
        store.inject_fault(FaultPoint::CreateEntry);

        let mut tx = store.begin().await.unwrap();
        let params = CreateEntryParams {
            account_id: a.id,
            amount: 1,
        };
        assert!(tx.create_entry(params).await.is_err());
        assert!(tx.create_entry(params).await.is_ok());
    }

    #[tokio::test]
    async fn test_list_transfers_matches_either_side() {
        let store = MemoryStore::new();
        let a = account(&store, 100).await;
        let b = account(&store, 100).await;
        let c = account(&store, 100).await;

        let mut tx = store.begin().await.unwrap();
        for (from, to) in [(a.id, b.id), (c.id, b.id), (b.id, c.id)] {
            tx.create_transfer(CreateTransferParams {
                from_account_id: from,
                to_account_id: to,
                amount: 1,
            })
            .await
            .unwrap();
        }
        tx.commit().await.unwrap();

        let found = store
            .list_transfers(ListTransfersParams {
                from_account_id: a.id,
                to_account_id: b.id,
                limit: 10,
                offset: 0,
            })
            .await
            .unwrap();
        assert_eq!(found.len(), 2);
    }
}
