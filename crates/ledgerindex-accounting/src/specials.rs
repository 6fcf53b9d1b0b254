//! Special-account cache.
//!
//! The fee sink and rewards pool never change for a ledger, so they are
//! resolved from the store at most once and shared afterwards. Concurrent
//! first callers wait on the same initialization.

use tokio::sync::OnceCell;

use ledgerindex_core::error::RewindError;
use ledgerindex_core::store::LedgerStore;
use ledgerindex_core::types::SpecialAddresses;

#[derive(Debug, Default)]
pub struct SpecialAccounts {
    cell: OnceCell<SpecialAddresses>,
}

impl SpecialAccounts {
    /// An empty cache, filled from the store on first use.
    pub fn new() -> Self {
        Self::default()
    }

    /// A cache that is already resolved (e.g. from genesis at startup).
    pub fn resolved(addresses: SpecialAddresses) -> Self {
        Self {
            cell: OnceCell::new_with(Some(addresses)),
        }
    }

    /// Returns the special addresses, querying `store` only the first time.
    pub async fn get<S>(&self, store: &S) -> Result<SpecialAddresses, RewindError>
    where
        S: LedgerStore + ?Sized,
    {
        self.cell
            .get_or_try_init(|| async { store.special_accounts().await })
            .await
            .copied()
            .map_err(RewindError::SpecialAccounts)
    }

    /// Returns the cached value without touching a store.
    pub fn cached(&self) -> Option<SpecialAddresses> {
        self.cell.get().copied()
    }
}
