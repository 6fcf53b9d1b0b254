//! In-memory storage backend.
//!
//! Indexes transactions by participant, serves them as a cancellable stream,
//! resolves creators and applies [`RoundUpdates`] to an account table.
//! Useful for tests and short-lived tools that don't need persistence.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use ledgerindex_core::config::EngineConfig;
use ledgerindex_core::error::StoreError;
use ledgerindex_core::participants::{unique_participants, walk_txns};
use ledgerindex_core::store::{
    CreatorLookup, LedgerStore, TransactionFilter, TxnExtra, TxnRow, TxnRowStream,
};
use ledgerindex_core::txn::{AssetParams, SignedTxnWithAd, TxnBody};
use ledgerindex_core::types::{Account, Address, AssetHolding, SpecialAddresses};
use ledgerindex_core::updates::{AssetUpdateKind, RoundUpdates};

/// In-memory ledger store.
///
/// All data is lost when the process exits.
pub struct InMemoryStore {
    specials: SpecialAddresses,
    stream_buffer: usize,
    /// Address → rows of transactions touching it.
    rows: Mutex<HashMap<Address, Vec<TxnRow>>>,
    /// `(round, intra)` of rows that fail to decode when streamed.
    undecodable: Mutex<HashSet<(u64, u32)>>,
    max_round: Mutex<u64>,
    asset_creators: Mutex<HashMap<u64, Address>>,
    app_creators: Mutex<HashMap<u64, Address>>,
    asset_params: Mutex<HashMap<u64, AssetParams>>,
    accounts: Mutex<HashMap<Address, Account>>,
    applied_round: Mutex<u64>,
    active_readers: Arc<AtomicUsize>,
}

impl InMemoryStore {
    pub fn new(specials: SpecialAddresses) -> Self {
        Self::with_config(specials, &EngineConfig::default())
    }

    pub fn with_config(specials: SpecialAddresses, config: &EngineConfig) -> Self {
        Self {
            specials,
            stream_buffer: config.stream_buffer.max(1),
            rows: Mutex::new(HashMap::new()),
            undecodable: Mutex::new(HashSet::new()),
            max_round: Mutex::new(0),
            asset_creators: Mutex::new(HashMap::new()),
            app_creators: Mutex::new(HashMap::new()),
            asset_params: Mutex::new(HashMap::new()),
            accounts: Mutex::new(HashMap::new()),
            applied_round: Mutex::new(0),
            active_readers: Arc::new(AtomicUsize::new(0)),
        }
    }

    // ─── Transaction index ────────────────────────────────────────────────────

    /// Index the transactions of one round.
    ///
    /// Each root transaction gets a full row for its direct participants and a
    /// row without the transaction for addresses reached only through inner
    /// transactions. Creations (including inner ones) register their creator.
    pub fn import_round(&self, round: u64, round_time: DateTime<Utc>, payset: &[SignedTxnWithAd]) {
        let mut rows = self.rows.lock().unwrap();
        let mut asset_creators = self.asset_creators.lock().unwrap();
        let mut app_creators = self.app_creators.lock().unwrap();

        for (intra, stxn) in payset.iter().enumerate() {
            let row = TxnRow {
                round,
                intra: intra as u32,
                round_time,
                txn: Some(stxn.clone()),
                extra: TxnExtra {
                    asset_close_amount: stxn.apply_data.asset_closing_amount,
                },
                asset_id: asset_id_of(stxn),
            };

            let direct = unique_participants(stxn, false);
            for addr in unique_participants(stxn, true) {
                let entry = rows.entry(addr).or_default();
                if direct.contains(&addr) {
                    entry.push(row.clone());
                } else {
                    entry.push(TxnRow {
                        txn: None,
                        ..row.clone()
                    });
                }
            }

            walk_txns(stxn, true, |s| match &s.txn.body {
                TxnBody::AssetConfig(cfg) if cfg.config_asset == 0 => {
                    asset_creators.insert(s.apply_data.config_asset, s.txn.sender);
                }
                TxnBody::ApplicationCall(app) if app.application_id == 0 => {
                    app_creators.insert(s.apply_data.application_id, s.txn.sender);
                }
                _ => {}
            });
        }

        let mut max_round = self.max_round.lock().unwrap();
        *max_round = (*max_round).max(round);
        tracing::debug!(round, txns = payset.len(), "Imported round");
    }

    /// Make the row at `(round, intra)` fail to decode when streamed.
    pub fn mark_undecodable(&self, round: u64, intra: u32) {
        self.undecodable.lock().unwrap().insert((round, intra));
    }

    /// Highest imported round.
    pub fn max_round(&self) -> u64 {
        *self.max_round.lock().unwrap()
    }

    /// Number of streaming reads whose producer has not finished yet.
    pub fn active_readers(&self) -> usize {
        self.active_readers.load(Ordering::SeqCst)
    }

    fn matching_rows(&self, filter: &TransactionFilter) -> Vec<Result<TxnRow, StoreError>> {
        let undecodable = self.undecodable.lock().unwrap();
        let rows = self.rows.lock().unwrap();
        let mut matching: Vec<&TxnRow> = rows
            .get(&filter.address)
            .map(|rows| {
                rows.iter()
                    .filter(|r| r.round >= filter.min_round && r.round <= filter.max_round)
                    .collect()
            })
            .unwrap_or_default();
        matching.sort_by_key(|r| (r.round, r.intra));
        matching
            .into_iter()
            .map(|r| {
                if undecodable.contains(&(r.round, r.intra)) {
                    Err(StoreError::Decode {
                        round: r.round,
                        intra: r.intra,
                        reason: "corrupt transaction encoding".into(),
                    })
                } else {
                    Ok(r.clone())
                }
            })
            .collect()
    }

    // ─── Account table ────────────────────────────────────────────────────────

    /// Apply one round of updates. Asset subrounds are applied strictly in order.
    pub fn apply_round(&self, updates: &RoundUpdates) {
        let mut accounts = self.accounts.lock().unwrap();
        let mut asset_creators = self.asset_creators.lock().unwrap();
        let mut asset_params = self.asset_params.lock().unwrap();

        for (addr, update) in &updates.algo_updates {
            let acct = accounts.entry(*addr).or_insert_with(|| Account {
                address: *addr,
                ..Default::default()
            });
            // A close finalizes the balance; a reopen in the same round starts from zero.
            if update.closed || updates.closed_accounts.contains(addr) {
                acct.amount = 0;
                acct.rewards = 0;
                acct.closed_at_round = Some(updates.round);
            }
            if !update.closed {
                acct.amount = add_signed(acct.amount, i128::from(update.balance));
                acct.rewards = add_signed(acct.rewards, i128::from(update.rewards));
            }
            acct.amount_without_pending_rewards = acct.amount;
        }

        for subround in &updates.asset_updates {
            for (addr, list) in subround {
                let acct = accounts.entry(*addr).or_insert_with(|| Account {
                    address: *addr,
                    ..Default::default()
                });
                for update in list {
                    match &update.kind {
                        AssetUpdateKind::Transfer { delta } => {
                            let holding = holding_mut(acct, update.asset_id, update.default_frozen);
                            holding.amount = add_signed(holding.amount, *delta);
                        }
                        AssetUpdateKind::Close { .. } => {
                            acct.assets.retain(|h| h.asset_id != update.asset_id);
                        }
                        AssetUpdateKind::Config {
                            is_new,
                            destroyed,
                            params,
                        } => {
                            if *destroyed {
                                asset_creators.remove(&update.asset_id);
                                asset_params.remove(&update.asset_id);
                            } else {
                                if *is_new {
                                    asset_creators.insert(update.asset_id, *addr);
                                }
                                asset_params.insert(update.asset_id, params.clone());
                            }
                        }
                        AssetUpdateKind::Freeze { frozen } => {
                            if let Some(h) =
                                acct.assets.iter_mut().find(|h| h.asset_id == update.asset_id)
                            {
                                h.is_frozen = *frozen;
                            }
                        }
                    }
                }
            }
        }

        let mut applied = self.applied_round.lock().unwrap();
        *applied = (*applied).max(updates.round);
        tracing::debug!(
            round = updates.round,
            accounts = updates.algo_updates.len(),
            subrounds = updates.asset_updates.len(),
            "Applied round updates"
        );
    }

    /// Current snapshot of an account, stamped with the last applied round.
    pub fn account(&self, addr: &Address) -> Option<Account> {
        let round = *self.applied_round.lock().unwrap();
        self.accounts.lock().unwrap().get(addr).map(|a| Account {
            round,
            ..a.clone()
        })
    }

    /// Asset id → default-frozen flag for every known asset.
    pub fn default_frozen(&self) -> HashMap<u64, bool> {
        self.asset_params
            .lock()
            .unwrap()
            .iter()
            .map(|(id, p)| (*id, p.default_frozen))
            .collect()
    }
}

fn asset_id_of(stxn: &SignedTxnWithAd) -> u64 {
    match &stxn.txn.body {
        TxnBody::AssetConfig(cfg) if cfg.config_asset == 0 => stxn.apply_data.config_asset,
        TxnBody::AssetConfig(cfg) => cfg.config_asset,
        TxnBody::AssetTransfer(xfer) => xfer.xfer_asset,
        TxnBody::AssetFreeze(frz) => frz.freeze_asset,
        _ => 0,
    }
}

fn add_signed(value: u64, delta: i128) -> u64 {
    (i128::from(value) + delta).clamp(0, i128::from(u64::MAX)) as u64
}

fn holding_mut(acct: &mut Account, asset_id: u64, default_frozen: bool) -> &mut AssetHolding {
    let pos = match acct.assets.iter().position(|h| h.asset_id == asset_id) {
        Some(pos) => pos,
        None => {
            acct.assets.push(AssetHolding {
                asset_id,
                amount: 0,
                is_frozen: default_frozen,
            });
            acct.assets.len() - 1
        }
    };
    &mut acct.assets[pos]
}

/// Decrements the reader count when the producer task ends.
struct ReaderGuard(Arc<AtomicUsize>);

impl Drop for ReaderGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl LedgerStore for InMemoryStore {
    async fn special_accounts(&self) -> Result<SpecialAddresses, StoreError> {
        Ok(self.specials)
    }

    async fn transactions(
        &self,
        filter: TransactionFilter,
        cancel: CancellationToken,
    ) -> Result<(TxnRowStream, u64), StoreError> {
        let max_round = self.max_round();
        let rows = self.matching_rows(&filter);
        let (tx, rx) = mpsc::channel(self.stream_buffer);

        self.active_readers.fetch_add(1, Ordering::SeqCst);
        let guard = ReaderGuard(self.active_readers.clone());
        tokio::spawn(async move {
            for row in rows {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        // Err only if the reader already dropped the stream.
                        let _ = tx.send(Err(StoreError::Cancelled)).await;
                        break;
                    }
                    sent = tx.send(row) => {
                        if sent.is_err() {
                            break;
                        }
                    }
                }
            }
            // Release the reader slot before the channel closes.
            drop(guard);
            drop(tx);
        });

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|row| (row, rx))
        });
        Ok((Box::pin(stream), max_round))
    }
}

#[async_trait]
impl CreatorLookup for InMemoryStore {
    async fn asset_creators(
        &self,
        ids: &HashSet<u64>,
    ) -> Result<HashMap<u64, Address>, StoreError> {
        let creators = self.asset_creators.lock().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| creators.get(id).map(|a| (*id, *a)))
            .collect())
    }

    async fn app_creators(&self, ids: &HashSet<u64>) -> Result<HashMap<u64, Address>, StoreError> {
        let creators = self.app_creators.lock().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| creators.get(id).map(|a| (*id, *a)))
            .collect())
    }
}
