//! Round accountant: turns one round's transactions into per-account deltas.
//!
//! Native balance changes accumulate into one [`AlgoUpdate`] per address.
//! Asset changes accumulate into the last subround of
//! [`RoundUpdates::asset_updates`]; every asset close appends a fresh
//! subround so that whatever follows in the round is written after the close.

use std::collections::HashMap;

use ledgerindex_core::classify::{
    is_asset_create, is_asset_destroy, is_asset_opt_in, is_asset_opt_out, is_close,
};
use ledgerindex_core::participants::walk_txns;
use ledgerindex_core::txn::{SignedTxnWithAd, TxnBody};
use ledgerindex_core::types::Address;
use ledgerindex_core::updates::{
    AlgoUpdate, AssetSubround, AssetUpdate, AssetUpdateKind, RoundContext, RoundUpdates,
};

/// Accumulates the account deltas of a single round.
///
/// Transactions must be added in block order. Input is assumed to have passed
/// consensus validation; nothing here returns an error.
pub struct RoundAccountant {
    ctx: RoundContext,
    /// Asset id → frozen state of new holdings. Extended by in-round creations.
    default_frozen: HashMap<u64, bool>,
    updates: RoundUpdates,
    /// Offset of the next top-level transaction within the round.
    next_intra: u32,
}

impl RoundAccountant {
    pub fn new(ctx: RoundContext, default_frozen: HashMap<u64, bool>) -> Self {
        Self {
            updates: RoundUpdates::new(ctx.round, ctx.rewards_level),
            ctx,
            default_frozen,
            next_intra: 0,
        }
    }

    pub fn round(&self) -> u64 {
        self.ctx.round
    }

    /// Updates accumulated so far.
    pub fn updates(&self) -> &RoundUpdates {
        &self.updates
    }

    /// Account for every transaction of a payset, in order.
    pub fn add_payset<'a>(&mut self, payset: impl IntoIterator<Item = &'a SignedTxnWithAd>) {
        for stxn in payset {
            self.add_transaction(stxn);
        }
    }

    /// Account for one top-level transaction and all of its inner transactions.
    pub fn add_transaction(&mut self, stxn: &SignedTxnWithAd) {
        let offset = self.next_intra;
        self.next_intra += 1;

        if let Some(sig_type) = stxn.sig_type {
            self.updates.account_types.insert(stxn.txn.sender, sig_type);
        }
        walk_txns(stxn, true, |s| self.apply(s, offset));
    }

    /// Finish the round and hand the updates to persistence.
    pub fn finish(self) -> RoundUpdates {
        tracing::debug!(
            round = self.ctx.round,
            txns = self.next_intra,
            accounts = self.updates.algo_updates.len(),
            subrounds = self.updates.asset_updates.len(),
            "Round accounted"
        );
        self.updates
    }

    fn apply(&mut self, stxn: &SignedTxnWithAd, offset: u32) {
        let txn = &stxn.txn;
        let ad = &stxn.apply_data;
        let sender = txn.sender;

        self.update_algo(sender, -signed(txn.fee));
        if txn.fee != 0 {
            self.update_algo(self.ctx.fee_sink, signed(txn.fee));
        }
        self.reward(sender, ad.sender_rewards);

        match &txn.body {
            TxnBody::Payment(pay) => {
                self.update_algo(sender, -signed(pay.amount));
                self.update_algo(pay.receiver, signed(pay.amount));
                self.reward(pay.receiver, ad.receiver_rewards);

                if is_close(txn, &sender) {
                    let close_to = pay.close_remainder_to;
                    self.update_algo(sender, -signed(ad.closing_amount));
                    self.update_algo(close_to, signed(ad.closing_amount));
                    self.reward(close_to, ad.close_rewards);
                    self.close_account(sender);
                }
            }
            TxnBody::AssetConfig(cfg) => {
                if is_asset_create(txn) {
                    let asset_id = ad.config_asset;
                    self.default_frozen
                        .insert(asset_id, cfg.params.default_frozen);
                    self.push_asset(
                        sender,
                        asset_id,
                        AssetUpdateKind::Config {
                            is_new: true,
                            destroyed: false,
                            params: cfg.params.clone(),
                        },
                    );
                    self.transfer_asset(sender, asset_id, i128::from(cfg.params.total));
                } else {
                    self.push_asset(
                        sender,
                        cfg.config_asset,
                        AssetUpdateKind::Config {
                            is_new: false,
                            destroyed: is_asset_destroy(txn),
                            params: cfg.params.clone(),
                        },
                    );
                }
            }
            TxnBody::AssetTransfer(xfer) => {
                let asset_id = xfer.xfer_asset;
                // A non-zero asset sender makes this a clawback.
                let source = if xfer.asset_sender.is_zero() {
                    sender
                } else {
                    xfer.asset_sender
                };

                if xfer.amount != 0 {
                    let amount = i128::from(xfer.amount);
                    self.transfer_asset(source, asset_id, -amount);
                    self.transfer_asset(xfer.receiver, asset_id, amount);
                } else if is_asset_opt_in(txn) {
                    self.transfer_asset(xfer.receiver, asset_id, 0);
                }

                if is_asset_opt_out(txn) {
                    let close_amount = i128::from(ad.asset_closing_amount);
                    if close_amount != 0 {
                        self.transfer_asset(source, asset_id, -close_amount);
                        self.transfer_asset(xfer.close_to, asset_id, close_amount);
                    }
                    self.push_asset(
                        source,
                        asset_id,
                        AssetUpdateKind::Close {
                            close_to: xfer.close_to,
                            sender: source,
                            round: self.ctx.round,
                            offset,
                        },
                    );
                    self.updates.asset_updates.push(AssetSubround::new());
                }
            }
            TxnBody::AssetFreeze(frz) => {
                self.push_asset(
                    frz.freeze_account,
                    frz.freeze_asset,
                    AssetUpdateKind::Freeze { frozen: frz.frozen },
                );
            }
            TxnBody::KeyRegistration(_) | TxnBody::ApplicationCall(_) | TxnBody::StateProof => {}
        }
    }

    /// Credit `amount` of rewards to `addr`, paid out of the rewards pool.
    fn reward(&mut self, addr: Address, amount: u64) {
        if amount == 0 {
            return;
        }
        let amount = signed(amount);
        self.update_algo_and_rewards(addr, amount, amount);
        self.update_algo(self.ctx.rewards_pool, -amount);
    }

    fn update_algo(&mut self, addr: Address, delta: i64) {
        self.update_algo_and_rewards(addr, delta, 0);
    }

    /// Apply a balance and rewards delta. Crediting a closed account reopens it
    /// with fresh totals; the close stays recorded in `closed_accounts`. A zero
    /// delta never reopens.
    fn update_algo_and_rewards(&mut self, addr: Address, delta: i64, rewards: i64) {
        let update = self.updates.algo_updates.entry(addr).or_default();
        if update.closed {
            if delta == 0 && rewards == 0 {
                return;
            }
            *update = AlgoUpdate {
                closed: false,
                balance: delta,
                rewards,
            };
        } else {
            update.balance = update.balance.saturating_add(delta);
            update.rewards = update.rewards.saturating_add(rewards);
        }
    }

    fn close_account(&mut self, addr: Address) {
        self.updates.algo_updates.entry(addr).or_default().closed = true;
        self.updates.closed_accounts.insert(addr);
    }

    fn default_frozen(&self, asset_id: u64) -> bool {
        self.default_frozen.get(&asset_id).copied().unwrap_or(false)
    }

    fn current_subround(&mut self) -> &mut AssetSubround {
        if self.updates.asset_updates.is_empty() {
            self.updates.asset_updates.push(AssetSubround::new());
        }
        let last = self.updates.asset_updates.len() - 1;
        &mut self.updates.asset_updates[last]
    }

    /// Add `delta` to the holding, merging into the address's latest entry
    /// when it is a transfer of the same asset.
    fn transfer_asset(&mut self, addr: Address, asset_id: u64, delta: i128) {
        let default_frozen = self.default_frozen(asset_id);
        let list = self.current_subround().entry(addr).or_default();
        if let Some(AssetUpdate {
            asset_id: last_id,
            kind: AssetUpdateKind::Transfer { delta: acc },
            ..
        }) = list.last_mut()
        {
            if *last_id == asset_id {
                *acc = acc.saturating_add(delta);
                return;
            }
        }
        list.push(AssetUpdate {
            asset_id,
            default_frozen,
            kind: AssetUpdateKind::Transfer { delta },
        });
    }

    fn push_asset(&mut self, addr: Address, asset_id: u64, kind: AssetUpdateKind) {
        let default_frozen = self.default_frozen(asset_id);
        self.current_subround()
            .entry(addr)
            .or_default()
            .push(AssetUpdate {
                asset_id,
                default_frozen,
                kind,
            });
    }
}

/// Convert an unsigned ledger amount to a signed delta, saturating.
fn signed(v: u64) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgerindex_core::txn::{ApplyData, AssetFreezeFields, SigType, Transaction};

    const FEE_SINK: Address = Address([0xfe; 32]);
    const POOL: Address = Address([0xee; 32]);

    fn ctx() -> RoundContext {
        RoundContext {
            round: 10,
            fee_sink: FEE_SINK,
            rewards_pool: POOL,
            rewards_level: 0,
        }
    }

    fn addr(b: u8) -> Address {
        Address::repeat(b)
    }

    #[test]
    fn fee_goes_to_fee_sink_and_rewards_come_from_pool() {
        let mut acct = RoundAccountant::new(ctx(), HashMap::new());
        let stxn = SignedTxnWithAd::new(Transaction::payment(addr(1), addr(2), 50).fee(1000))
            .with_apply_data(ApplyData {
                sender_rewards: 7,
                receiver_rewards: 3,
                ..Default::default()
            });
        acct.add_transaction(&stxn);
        let updates = acct.finish();

        assert_eq!(updates.algo_updates[&FEE_SINK].balance, 1000);
        assert_eq!(updates.algo_updates[&POOL].balance, -10);
        assert_eq!(updates.account_types[&addr(1)], SigType::Sig);
        assert!(!updates.account_types.contains_key(&addr(2)));
    }

    #[test]
    fn same_asset_transfers_merge() {
        let mut acct = RoundAccountant::new(ctx(), HashMap::new());
        acct.add_transaction(&SignedTxnWithAd::new(Transaction::asset_transfer(
            addr(1),
            addr(2),
            5,
            10,
        )));
        acct.add_transaction(&SignedTxnWithAd::new(Transaction::asset_transfer(
            addr(1),
            addr(2),
            5,
            4,
        )));
        let updates = acct.finish();
        assert_eq!(updates.asset_updates.len(), 1);
        let sub = &updates.asset_updates[0];
        assert_eq!(sub[&addr(1)].len(), 1);
        assert_eq!(sub[&addr(1)][0].transfer_delta(), Some(-14));
        assert_eq!(sub[&addr(2)][0].transfer_delta(), Some(14));
    }

    #[test]
    fn opt_in_uses_default_frozen_lookup() {
        let mut frozen = HashMap::new();
        frozen.insert(77, true);
        let mut acct = RoundAccountant::new(ctx(), frozen);
        acct.add_transaction(&SignedTxnWithAd::new(Transaction::asset_transfer(
            addr(3),
            addr(3),
            77,
            0,
        )));
        let updates = acct.finish();
        let entry = &updates.asset_updates[0][&addr(3)][0];
        assert_eq!(entry.asset_id, 77);
        assert!(entry.default_frozen);
        assert_eq!(entry.transfer_delta(), Some(0));
    }

    #[test]
    fn freeze_is_recorded_on_target() {
        let mut acct = RoundAccountant::new(ctx(), HashMap::new());
        acct.add_transaction(&SignedTxnWithAd::new(Transaction::new(
            addr(1),
            TxnBody::AssetFreeze(AssetFreezeFields {
                freeze_account: addr(4),
                freeze_asset: 9,
                frozen: true,
            }),
        )));
        let updates = acct.finish();
        assert_eq!(
            updates.asset_updates[0][&addr(4)][0].kind,
            AssetUpdateKind::Freeze { frozen: true }
        );
    }

    #[test]
    fn signed_saturates() {
        assert_eq!(signed(5), 5);
        assert_eq!(signed(u64::MAX), i64::MAX);
    }
}
