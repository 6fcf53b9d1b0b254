//! Historical rewind: reconstruct an account at an earlier round.
//!
//! Starting from the indexed snapshot, every transaction touching the account
//! after the target round is replayed backwards. The result is approximate:
//! rewards, pending rewards and minimum balance cannot be recovered from the
//! transaction log and are zeroed, `closed_at_round` is left untouched, and
//! key registration state is not restored.
//!
//! ```text
//! Start ──► StreamingTransactions ──► Applying ──► Done
//!                    │                    │
//!                    └────── Failed ◄─────┘
//! ```

use std::sync::Arc;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use ledgerindex_core::classify::is_asset_create;
use ledgerindex_core::config::EngineConfig;
use ledgerindex_core::error::{ConsistencyError, RewindError, SpecialAccountKind, StoreError};
use ledgerindex_core::store::{LedgerStore, TransactionFilter, TxnRow, TxnRowStream};
use ledgerindex_core::txn::{SignedTxnWithAd, TxnBody};
use ledgerindex_core::types::{Account, AssetHolding, SpecialAddresses};

use crate::specials::SpecialAccounts;

// ─── Scoped stream ────────────────────────────────────────────────────────────

/// Owns one streaming read and its cancellation token.
///
/// [`ScopedRows::close`] cancels the producer and drains what it already
/// queued. If the guard is dropped without `close` (an unwinding panic, a
/// dropped future) the token is still cancelled and the stream released.
struct ScopedRows {
    rows: Option<TxnRowStream>,
    cancel: CancellationToken,
}

impl ScopedRows {
    fn new(rows: TxnRowStream, cancel: CancellationToken) -> Self {
        Self {
            rows: Some(rows),
            cancel,
        }
    }

    async fn next(&mut self) -> Option<Result<TxnRow, StoreError>> {
        match self.rows.as_mut() {
            Some(rows) => rows.next().await,
            None => None,
        }
    }

    async fn close(mut self) {
        self.cancel.cancel();
        if let Some(mut rows) = self.rows.take() {
            while rows.next().await.is_some() {}
        }
    }
}

impl Drop for ScopedRows {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ─── Rewind ───────────────────────────────────────────────────────────────────

/// Reconstruct `account` as it was at `round`.
///
/// `round` must not be after `account.round`. Fails with
/// [`RewindError::Consistency`] when the store cannot yet serve every round up
/// to the snapshot's round.
pub async fn account_at_round<S>(
    cancel: &CancellationToken,
    account: &Account,
    round: u64,
    store: &S,
    specials: &SpecialAddresses,
) -> Result<Account, RewindError>
where
    S: LedgerStore + ?Sized,
{
    if round > account.round {
        return Err(RewindError::FutureRound {
            target: round,
            account_round: account.round,
        });
    }
    if account.address == specials.fee_sink {
        return Err(RewindError::SpecialAccount(SpecialAccountKind::FeeSink));
    }
    if account.address == specials.rewards_pool {
        return Err(RewindError::SpecialAccount(SpecialAccountKind::RewardsPool));
    }

    if round == account.round {
        return Ok(finish(account.clone(), round, 0));
    }

    let filter = TransactionFilter {
        address: account.address,
        min_round: round.saturating_add(1),
        max_round: account.round,
    };
    let token = cancel.child_token();
    let (stream, max_round) = match store.transactions(filter, token.clone()).await {
        Ok(read) => read,
        Err(e) => {
            token.cancel();
            return Err(e.into());
        }
    };
    let mut rows = ScopedRows::new(stream, token);

    let result = if max_round < account.round {
        tracing::warn!(
            address = %account.address,
            store_round = max_round,
            account_round = account.round,
            "Store is behind the account snapshot"
        );
        Err(ConsistencyError::new(format!(
            "queried round r: {max_round} < account.Round: {}",
            account.round
        ))
        .into())
    } else {
        replay(&mut rows, account.clone(), round).await
    };

    rows.close().await;
    result
}

async fn replay(
    rows: &mut ScopedRows,
    mut acct: Account,
    round: u64,
) -> Result<Account, RewindError> {
    let mut replayed = 0usize;
    while let Some(row) = rows.next().await {
        let row = row?;
        let stxn = row.txn.as_ref().ok_or(RewindError::InnerTransaction)?;
        undo(&mut acct, &row, stxn)?;
        replayed += 1;
    }
    Ok(finish(acct, round, replayed))
}

/// Clear what a transaction log cannot restore and stamp the target round.
fn finish(mut acct: Account, round: u64, replayed: usize) -> Account {
    acct.round = round;
    acct.rewards = 0;
    acct.pending_rewards = 0;
    acct.min_balance = 0;
    acct.amount = acct.amount_without_pending_rewards;

    tracing::debug!(
        address = %acct.address,
        round,
        replayed,
        "Account rewound"
    );
    acct
}

/// Undo the effect of one transaction on `acct`.
///
/// Amounts wrap like the ledger's unsigned arithmetic: intermediate values may
/// underflow transiently, the final sum is exact.
fn undo(acct: &mut Account, row: &TxnRow, stxn: &SignedTxnWithAd) -> Result<(), RewindError> {
    let addr = acct.address;
    let txn = &stxn.txn;
    let ad = &stxn.apply_data;
    let balance = &mut acct.amount_without_pending_rewards;

    if txn.sender == addr {
        *balance = balance.wrapping_add(txn.fee).wrapping_sub(ad.sender_rewards);
    }

    match &txn.body {
        TxnBody::Payment(pay) => {
            if txn.sender == addr {
                *balance = balance.wrapping_add(pay.amount);
            }
            if pay.receiver == addr {
                *balance = balance
                    .wrapping_sub(pay.amount)
                    .wrapping_sub(ad.receiver_rewards);
            }
            if pay.close_remainder_to == addr {
                // undo receiving a close
                *balance = balance
                    .wrapping_sub(ad.closing_amount)
                    .wrapping_sub(ad.close_rewards);
            } else if !pay.close_remainder_to.is_zero() && txn.sender == addr {
                // undo sending a close
                *balance = balance.wrapping_add(ad.closing_amount);
            }
        }
        TxnBody::AssetConfig(cfg) => {
            if is_asset_create(txn) && txn.sender == addr {
                asset_update(acct, row.asset_id, 0, cfg.params.total);
            }
        }
        TxnBody::AssetTransfer(xfer) => {
            let source = if xfer.asset_sender.is_zero() {
                txn.sender
            } else {
                xfer.asset_sender
            };
            let close_amount = row.extra.asset_close_amount;
            if source == addr {
                asset_update(acct, xfer.xfer_asset, xfer.amount.wrapping_add(close_amount), 0);
            }
            if xfer.receiver == addr {
                asset_update(acct, xfer.xfer_asset, 0, xfer.amount);
            }
            if !xfer.close_to.is_zero() && xfer.close_to == addr {
                asset_update(acct, xfer.xfer_asset, 0, close_amount);
            }
        }
        TxnBody::AssetFreeze(_) => {}
        // Key registration fields cannot be restored from here.
        TxnBody::KeyRegistration(_) => {}
        TxnBody::ApplicationCall(_) | TxnBody::StateProof => {
            return Err(RewindError::UnsupportedTxnType {
                address: addr.to_string(),
                round: row.round,
                intra: row.intra,
                tx_type: txn.tx_type(),
            });
        }
    }
    Ok(())
}

fn asset_update(acct: &mut Account, asset_id: u64, add: u64, sub: u64) {
    if let Some(holding) = acct.assets.iter_mut().find(|h| h.asset_id == asset_id) {
        holding.amount = holding.amount.wrapping_add(add).wrapping_sub(sub);
        return;
    }
    acct.assets.push(AssetHolding {
        asset_id,
        amount: add.wrapping_sub(sub),
        is_frozen: false,
    });
}

// ─── Rewinder ─────────────────────────────────────────────────────────────────

/// A store plus its special accounts, ready to answer rewind queries.
pub struct Rewinder<S: ?Sized> {
    specials: SpecialAccounts,
    max_rounds: Option<u64>,
    store: Arc<S>,
}

impl<S> Rewinder<S>
where
    S: LedgerStore + ?Sized,
{
    /// Special accounts are fetched from `store` on the first query.
    pub fn new(store: Arc<S>, config: &EngineConfig) -> Self {
        Self::with_specials(store, SpecialAccounts::new(), config)
    }

    pub fn with_specials(store: Arc<S>, specials: SpecialAccounts, config: &EngineConfig) -> Self {
        Self {
            specials,
            max_rounds: config.max_rewind_rounds,
            store,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// See [`account_at_round`].
    pub async fn account_at_round(
        &self,
        cancel: &CancellationToken,
        account: &Account,
        round: u64,
    ) -> Result<Account, RewindError> {
        if let Some(limit) = self.max_rounds {
            let requested = account.round.saturating_sub(round);
            if requested > limit {
                return Err(RewindError::TooDeep { requested, limit });
            }
        }
        let specials = self.specials.get(&*self.store).await?;
        account_at_round(cancel, account, round, &*self.store, &specials).await
    }
}
