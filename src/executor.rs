// src/executor.rs
use futures::FutureExt;
use futures::future::BoxFuture;
use metrics::counter;
use std::panic::{AssertUnwindSafe, resume_unwind};
use std::time::Duration;
use tokio::time::Instant;

use crate::{Ledger, LedgerError, LedgerResult, StoreTx};

/// Future returned by a unit of work, borrowing the transaction handle.
pub type UnitFuture<'t, T> = BoxFuture<'t, LedgerResult<T>>;

impl Ledger {
    /// Run `work` as one all-or-nothing unit against the store.
    ///
    /// Commits only if `work` returns `Ok`. On `Err`, on panic, and when the
    /// ledger deadline expires, the unit is rolled back before returning
    /// (a panic is resumed after the rollback). A failed commit discards the
    /// unit and its error is returned as is.
    ///
    /// ```ignore
    /// let entry = ledger
    ///     .atomic(|tx| Box::pin(async move {
    ///         tx.create_entry(CreateEntryParams { account_id: 1, amount: 10 }).await
    ///     }))
    ///     .await?;
    /// ```
    pub async fn atomic<T, F>(&self, work: F) -> LedgerResult<T>
    where
        T: Send,
        F: for<'t> FnOnce(&'t mut dyn StoreTx) -> UnitFuture<'t, T> + Send,
    {
        self.atomic_with_deadline(self.deadline, work).await
    }

    /// Same as [`Ledger::atomic`] with a per-call deadline overriding the
    /// ledger default. `None` waits indefinitely.
    pub async fn atomic_with_deadline<T, F>(
        &self,
        deadline: Option<Duration>,
        work: F,
    ) -> LedgerResult<T>
    where
        T: Send,
        F: for<'t> FnOnce(&'t mut dyn StoreTx) -> UnitFuture<'t, T> + Send,
    {
        let expires_at = deadline.map(|limit| (Instant::now() + limit, limit));

        let mut tx = match expires_at {
            Some((at, limit)) => tokio::time::timeout_at(at, self.store.begin())
                .await
                .map_err(|_| LedgerError::DeadlineExceeded(limit))??,
            None => self.store.begin().await?,
        };

        let outcome = {
            // The closure itself runs inside the guard, not just its future.
            let tx_ref = tx.as_mut();
            let unit = AssertUnwindSafe(async move { work(tx_ref).await }).catch_unwind();
            match expires_at {
                Some((at, limit)) => match tokio::time::timeout_at(at, unit).await {
                    Ok(outcome) => outcome,
                    Err(_) => Ok(Err(LedgerError::DeadlineExceeded(limit))),
                },
                None => unit.await,
            }
        };

        match outcome {
            Ok(Ok(value)) => match tx.commit().await {
                Ok(()) => {
                    counter!("ledger.units.total", "status" => "committed").increment(1);
                    Ok(value)
                }
                Err(err) => {
                    tracing::warn!(error = %err, "Commit failed, unit discarded");
                    counter!("ledger.units.total", "status" => "commit_failed").increment(1);
                    Err(err)
                }
            },
            Ok(Err(err)) => {
                tracing::debug!(error = %err, "Unit failed, rolling back");
                discard(tx).await;
                counter!("ledger.units.total", "status" => "rolled_back").increment(1);
                Err(err)
            }
            Err(panic) => {
                tracing::error!("Unit panicked, rolling back");
                discard(tx).await;
                counter!("ledger.units.total", "status" => "panicked").increment(1);
                resume_unwind(panic)
            }
        }
    }
}

/// Rollback errors are logged, never returned: the unit is already lost and
/// the caller needs the error that caused it.
async fn discard(tx: Box<dyn StoreTx>) {
    if let Err(err) = tx.rollback().await {
        tracing::warn!(error = %err, "Rollback failed");
    }
}
