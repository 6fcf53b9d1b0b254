//! Storage collaborator traits consumed by the accounting engine.
//!
//! Implementations live in `ledgerindex-storage`.

use std::collections::{HashMap, HashSet};
use std::pin::Pin;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::StoreError;
use crate::txn::SignedTxnWithAd;
use crate::types::{Address, SpecialAddresses};

/// Selects transactions touching `address` in `[min_round, max_round]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionFilter {
    pub address: Address,
    pub min_round: u64,
    pub max_round: u64,
}

/// Values derived at import time and stored next to the transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TxnExtra {
    /// Amount moved to the asset close-to address.
    pub asset_close_amount: u64,
}

/// One indexed transaction as returned by a transaction query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxnRow {
    pub round: u64,
    /// Position of the root transaction within its round.
    pub intra: u32,
    pub round_time: DateTime<Utc>,
    /// `None` when the row indexes an inner transaction of a root transaction.
    pub txn: Option<SignedTxnWithAd>,
    pub extra: TxnExtra,
    /// Asset this transaction refers to (allocated id for creations).
    pub asset_id: u64,
}

/// A stream of transaction rows, ascending by `(round, intra)`.
///
/// Decode failures are delivered in-band as `Err` items.
pub type TxnRowStream = Pin<Box<dyn Stream<Item = Result<TxnRow, StoreError>> + Send>>;

/// Read access to indexed ledger data.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Fee sink and rewards pool for this ledger.
    async fn special_accounts(&self) -> Result<SpecialAddresses, StoreError>;

    /// Stream transactions matching `filter`.
    ///
    /// Also returns the highest round the store had data for when the query
    /// started. The producer stops once `cancel` is triggered; a read cut short
    /// that way ends with an `Err(StoreError::Cancelled)` item, so a stream
    /// that simply ends was delivered in full.
    async fn transactions(
        &self,
        filter: TransactionFilter,
        cancel: CancellationToken,
    ) -> Result<(TxnRowStream, u64), StoreError>;
}

/// Resolves the creator address of assets and applications.
///
/// Ids that do not exist are absent from the returned maps.
#[async_trait]
pub trait CreatorLookup: Send + Sync {
    async fn asset_creators(&self, ids: &HashSet<u64>)
        -> Result<HashMap<u64, Address>, StoreError>;

    async fn app_creators(&self, ids: &HashSet<u64>) -> Result<HashMap<u64, Address>, StoreError>;
}
