//! Per-round account deltas handed from the accountant to persistence.

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use crate::txn::{AssetParams, SigType};
use crate::types::Address;

// ─── RoundContext ─────────────────────────────────────────────────────────────

/// Block-level values the accountant needs for one round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundContext {
    pub round: u64,
    pub fee_sink: Address,
    pub rewards_pool: Address,
    /// Rewards accrued per reward unit since genesis, as of this round.
    pub rewards_level: u64,
}

// ─── AlgoUpdate ───────────────────────────────────────────────────────────────

/// Net change to an account's native balance within one round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AlgoUpdate {
    /// The account was fully closed and not touched again afterwards.
    pub closed: bool,
    pub balance: i64,
    pub rewards: i64,
}

// ─── AssetUpdate ──────────────────────────────────────────────────────────────

/// What happened to an asset holding or definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AssetUpdateKind {
    /// Signed change to the holding amount.
    Transfer { delta: i128 },
    /// The holding was closed out to `close_to`.
    Close {
        close_to: Address,
        sender: Address,
        round: u64,
        offset: u32,
    },
    /// The asset definition was created, reconfigured or destroyed.
    Config {
        is_new: bool,
        destroyed: bool,
        params: AssetParams,
    },
    /// The holding's frozen flag changed.
    Freeze { frozen: bool },
}

/// A single change to one asset on one address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetUpdate {
    pub asset_id: u64,
    /// Frozen state a newly created holding starts in.
    pub default_frozen: bool,
    #[serde(flatten)]
    pub kind: AssetUpdateKind,
}

impl AssetUpdate {
    /// Returns the transfer delta if this is a transfer.
    pub fn transfer_delta(&self) -> Option<i128> {
        match self.kind {
            AssetUpdateKind::Transfer { delta } => Some(delta),
            _ => None,
        }
    }

    pub fn is_close(&self) -> bool {
        matches!(self.kind, AssetUpdateKind::Close { .. })
    }
}

/// Asset updates of one subround, keyed by address in first-touch order.
pub type AssetSubround = IndexMap<Address, Vec<AssetUpdate>>;

// ─── RoundUpdates ─────────────────────────────────────────────────────────────

/// Everything persistence needs to apply one round.
///
/// `asset_updates` is order-significant: subround `i + 1` must be written
/// strictly after subround `i`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundUpdates {
    pub round: u64,
    pub rewards_level: u64,
    pub algo_updates: IndexMap<Address, AlgoUpdate>,
    pub asset_updates: Vec<AssetSubround>,
    pub account_types: IndexMap<Address, SigType>,
    /// Addresses closed at some point in the round, even if touched again
    /// afterwards. Persistence zeroes these before applying `algo_updates`.
    #[serde(default)]
    pub closed_accounts: IndexSet<Address>,
}

impl RoundUpdates {
    /// Empty updates for `round`, with one open subround.
    pub fn new(round: u64, rewards_level: u64) -> Self {
        Self {
            round,
            rewards_level,
            algo_updates: IndexMap::new(),
            asset_updates: vec![AssetSubround::new()],
            account_types: IndexMap::new(),
            closed_accounts: IndexSet::new(),
        }
    }

    /// Returns `true` if the round changed nothing.
    pub fn is_empty(&self) -> bool {
        self.algo_updates.is_empty()
            && self.account_types.is_empty()
            && self.closed_accounts.is_empty()
            && self.asset_updates.iter().all(|s| s.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_round_has_one_open_subround() {
        let updates = RoundUpdates::new(12, 0);
        assert_eq!(updates.asset_updates.len(), 1);
        assert!(updates.is_empty());
    }

    #[test]
    fn asset_update_json_is_flat() {
        let update = AssetUpdate {
            asset_id: 4,
            default_frozen: false,
            kind: AssetUpdateKind::Transfer { delta: -5 },
        };
        let v = serde_json::to_value(&update).unwrap();
        assert_eq!(v["kind"], "transfer");
        assert_eq!(v["asset_id"], 4);
        assert_eq!(update.transfer_delta(), Some(-5));
        assert!(!update.is_close());
    }
}
