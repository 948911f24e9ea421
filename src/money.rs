// src/money.rs
use metrics::{counter, histogram};

use crate::{
    AddAccountBalanceParams, CreateEntryParams, Ledger, LedgerResult, TransferTxParams,
    TransferTxResult,
};

/// Balance deltas of a transfer, in the order the rows must be locked.
///
/// Every unit touching two accounts locks the lower id first, so two
/// transfers over the same pair in opposite directions cannot wait on each
/// other.
pub fn balance_updates(params: &TransferTxParams) -> [AddAccountBalanceParams; 2] {
    let debit = AddAccountBalanceParams {
        account_id: params.from_account_id,
        amount: -params.amount,
    };
    let credit = AddAccountBalanceParams {
        account_id: params.to_account_id,
        amount: params.amount,
    };

    if params.from_account_id < params.to_account_id {
        [debit, credit]
    } else {
        [credit, debit]
    }
}

impl Ledger {
    /// Move `amount` between two accounts in one unit.
    ///
    /// Records the transfer and its two entries, then applies both balance
    /// deltas in ascending account-id order. Arguments are not validated
    /// here; callers check that ids differ, the amount is positive and both
    /// accounts exist. A debit that would leave a negative balance is
    /// rejected by the store and nothing is written.
    pub async fn transfer_money(&self, params: TransferTxParams) -> LedgerResult<TransferTxResult> {
        let outcome = self
            .atomic(move |tx| {
                Box::pin(async move {
                    let transfer = tx.create_transfer(params.into()).await?;

                    let from_entry = tx
                        .create_entry(CreateEntryParams {
                            account_id: params.from_account_id,
                            amount: -params.amount,
                        })
                        .await?;
                    let to_entry = tx
                        .create_entry(CreateEntryParams {
                            account_id: params.to_account_id,
                            amount: params.amount,
                        })
                        .await?;

                    let [first, second] = balance_updates(&params);
                    let first = tx.add_account_balance(first).await?;
                    let second = tx.add_account_balance(second).await?;

                    let (from_account, to_account) = if first.id == params.from_account_id {
                        (first, second)
                    } else {
                        (second, first)
                    };

                    Ok(TransferTxResult {
                        transfer,
                        from_entry,
                        to_entry,
                        from_account,
                        to_account,
                    })
                })
            })
            .await;

        match &outcome {
            Ok(result) => {
                counter!("ledger.transfers.total", "status" => "committed").increment(1);
                histogram!("ledger.transfer.amount").record(params.amount as f64);
                tracing::info!(
                    transfer_id = result.transfer.id,
                    from = params.from_account_id,
                    to = params.to_account_id,
                    amount = params.amount,
                    "Transfer committed"
                );
            }
            Err(err) => {
                counter!("ledger.transfers.total", "status" => err.kind().as_str()).increment(1);
                tracing::warn!(
                    from = params.from_account_id,
                    to = params.to_account_id,
                    amount = params.amount,
                    error = %err,
                    "Transfer aborted"
                );
            }
        }

        outcome
    }
}
