//! Dependency preloading for batched ledger evaluation.
//!
//! Two passes over a payset: first collect which asset/app creators must be
//! resolved, then (with those creators known) collect exactly which accounts
//! and per-account resources the evaluator will read. Both passes are pure
//! and include inner transactions.

use std::collections::{HashMap, HashSet};

use ledgerindex_core::classify::is_asset_opt_in;
use ledgerindex_core::error::StoreError;
use ledgerindex_core::participants::walk_txns;
use ledgerindex_core::store::CreatorLookup;
use ledgerindex_core::txn::{SignedTxnWithAd, TxnBody};
use ledgerindex_core::types::{Address, Creatable};

/// Asset and application ids whose creators must be resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreatorsRequest {
    pub assets: HashSet<u64>,
    pub apps: HashSet<u64>,
}

/// Accounts, and per-account resources, a batched evaluator will read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountsRequest {
    pub addresses: HashSet<Address>,
    pub resources: HashMap<Address, HashSet<Creatable>>,
}

impl AccountsRequest {
    fn add_resource(&mut self, addr: Address, creatable: Creatable) {
        self.resources.entry(addr).or_default().insert(creatable);
    }
}

/// Everything gathered by [`preload`].
#[derive(Debug, Clone, Default)]
pub struct Preloaded {
    pub asset_creators: HashMap<u64, Address>,
    pub app_creators: HashMap<u64, Address>,
    pub accounts: AccountsRequest,
}

/// Ids above the signed 64-bit range cannot name real resources.
fn in_range(id: u64) -> bool {
    i64::try_from(id).is_ok()
}

fn insert_id(set: &mut HashSet<u64>, id: u64) {
    if in_range(id) {
        set.insert(id);
    }
}

/// Collect asset and app ids referenced by the payset.
pub fn request_creators(payset: &[SignedTxnWithAd]) -> CreatorsRequest {
    let mut req = CreatorsRequest::default();
    for root in payset {
        walk_txns(root, true, |stxn| add_to_creators_request(stxn, &mut req));
    }
    req
}

fn add_to_creators_request(stxn: &SignedTxnWithAd, req: &mut CreatorsRequest) {
    let txn = &stxn.txn;
    match &txn.body {
        TxnBody::AssetConfig(cfg) => {
            if cfg.config_asset != 0 {
                insert_id(&mut req.assets, cfg.config_asset);
            }
        }
        TxnBody::AssetTransfer(xfer) => {
            // A self opt-in without clawback reads nothing beyond the sender.
            let noop_opt_in = is_asset_opt_in(txn) && xfer.asset_sender.is_zero();
            if !noop_opt_in {
                insert_id(&mut req.assets, xfer.xfer_asset);
            }
        }
        TxnBody::AssetFreeze(frz) => insert_id(&mut req.assets, frz.freeze_asset),
        TxnBody::ApplicationCall(app) => {
            if app.application_id != 0 {
                insert_id(&mut req.apps, app.application_id);
            }
            for &id in &app.foreign_apps {
                insert_id(&mut req.apps, id);
            }
            for &id in &app.foreign_assets {
                insert_id(&mut req.assets, id);
            }
        }
        TxnBody::Payment(_) | TxnBody::KeyRegistration(_) | TxnBody::StateProof => {}
    }
}

/// Collect the accounts and account resources the payset touches.
///
/// `asset_creators` / `app_creators` hold the creators resolved for the ids
/// returned by [`request_creators`]; missing ids are treated as nonexistent.
pub fn request_accounts_and_resources(
    payset: &[SignedTxnWithAd],
    asset_creators: &HashMap<u64, Address>,
    app_creators: &HashMap<u64, Address>,
) -> AccountsRequest {
    let mut req = AccountsRequest::default();
    for root in payset {
        walk_txns(root, true, |stxn| {
            add_to_accounts_request(stxn, asset_creators, app_creators, &mut req)
        });
    }
    req
}

fn add_to_accounts_request(
    stxn: &SignedTxnWithAd,
    asset_creators: &HashMap<u64, Address>,
    app_creators: &HashMap<u64, Address>,
    req: &mut AccountsRequest,
) {
    let txn = &stxn.txn;
    let ad = &stxn.apply_data;
    req.addresses.insert(txn.sender);

    match &txn.body {
        TxnBody::Payment(pay) => {
            req.addresses.insert(pay.receiver);
            if !pay.close_remainder_to.is_zero() {
                req.addresses.insert(pay.close_remainder_to);
            }
        }
        TxnBody::AssetConfig(cfg) => {
            if cfg.config_asset == 0 {
                if ad.config_asset != 0 {
                    req.add_resource(txn.sender, Creatable::asset(ad.config_asset));
                }
            } else if let Some(&creator) = asset_creators.get(&cfg.config_asset) {
                req.addresses.insert(creator);
                req.add_resource(creator, Creatable::asset(cfg.config_asset));
            }
        }
        TxnBody::AssetTransfer(xfer) => {
            let creatable = Creatable::asset(xfer.xfer_asset);
            if let Some(&creator) = asset_creators.get(&xfer.xfer_asset) {
                req.add_resource(creator, creatable);
            }
            let source = if xfer.asset_sender.is_zero() {
                txn.sender
            } else {
                xfer.asset_sender
            };
            req.addresses.insert(source);
            req.add_resource(source, creatable);
            req.addresses.insert(xfer.receiver);
            req.add_resource(xfer.receiver, creatable);
            if !xfer.close_to.is_zero() {
                req.addresses.insert(xfer.close_to);
                req.add_resource(xfer.close_to, creatable);
            }
        }
        TxnBody::AssetFreeze(frz) => {
            let creatable = Creatable::asset(frz.freeze_asset);
            if let Some(&creator) = asset_creators.get(&frz.freeze_asset) {
                req.add_resource(creator, creatable);
            }
            req.addresses.insert(frz.freeze_account);
            req.add_resource(frz.freeze_account, creatable);
        }
        TxnBody::ApplicationCall(app) => {
            if app.application_id == 0 {
                if ad.application_id != 0 {
                    req.add_resource(txn.sender, Creatable::app(ad.application_id));
                }
            } else {
                let creatable = Creatable::app(app.application_id);
                if let Some(&creator) = app_creators.get(&app.application_id) {
                    req.addresses.insert(creator);
                    req.add_resource(creator, creatable);
                }
                req.add_resource(txn.sender, creatable);
            }
            for account in &app.accounts {
                req.addresses.insert(*account);
            }
            for id in &app.foreign_apps {
                if let Some(&creator) = app_creators.get(id) {
                    req.add_resource(creator, Creatable::app(*id));
                }
            }
            for id in &app.foreign_assets {
                if let Some(&creator) = asset_creators.get(id) {
                    req.add_resource(creator, Creatable::asset(*id));
                }
            }
        }
        TxnBody::KeyRegistration(_) | TxnBody::StateProof => {}
    }
}

/// Run both passes, resolving creators through `lookup` in between.
pub async fn preload<L>(payset: &[SignedTxnWithAd], lookup: &L) -> Result<Preloaded, StoreError>
where
    L: CreatorLookup + ?Sized,
{
    let creators = request_creators(payset);
    let asset_creators = lookup.asset_creators(&creators.assets).await?;
    let app_creators = lookup.app_creators(&creators.apps).await?;
    let accounts = request_accounts_and_resources(payset, &asset_creators, &app_creators);

    tracing::debug!(
        txns = payset.len(),
        assets = creators.assets.len(),
        apps = creators.apps.len(),
        accounts = accounts.addresses.len(),
        "Preloaded payset dependencies"
    );

    Ok(Preloaded {
        asset_creators,
        app_creators,
        accounts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgerindex_core::txn::{
        ApplicationCallFields, ApplyData, AssetConfigFields, AssetFreezeFields, AssetParams,
        EvalDelta, Transaction,
    };

    fn addr(b: u8) -> Address {
        Address::repeat(b)
    }

    fn app_call(fields: ApplicationCallFields) -> SignedTxnWithAd {
        SignedTxnWithAd::new(Transaction::new(addr(1), TxnBody::ApplicationCall(fields)))
    }

    #[test]
    fn creators_from_every_type() {
        let payset = vec![
            SignedTxnWithAd::new(Transaction::new(
                addr(1),
                TxnBody::AssetConfig(AssetConfigFields {
                    config_asset: 11,
                    params: AssetParams::default(),
                }),
            )),
            SignedTxnWithAd::new(Transaction::asset_transfer(addr(1), addr(2), 12, 5)),
            SignedTxnWithAd::new(Transaction::new(
                addr(1),
                TxnBody::AssetFreeze(AssetFreezeFields {
                    freeze_account: addr(3),
                    freeze_asset: 13,
                    frozen: true,
                }),
            )),
            app_call(ApplicationCallFields {
                application_id: 21,
                foreign_apps: vec![22],
                foreign_assets: vec![14],
                ..Default::default()
            }),
        ];
        let req = request_creators(&payset);
        assert_eq!(req.assets, HashSet::from([11, 12, 13, 14]));
        assert_eq!(req.apps, HashSet::from([21, 22]));
    }

    #[test]
    fn creation_and_noop_opt_in_request_nothing() {
        let payset = vec![
            SignedTxnWithAd::new(Transaction::new(
                addr(1),
                TxnBody::AssetConfig(AssetConfigFields::default()),
            )),
            SignedTxnWithAd::new(Transaction::asset_transfer(addr(1), addr(1), 12, 0)),
            app_call(ApplicationCallFields::default()),
        ];
        let req = request_creators(&payset);
        assert!(req.assets.is_empty());
        assert!(req.apps.is_empty());
    }

    #[test]
    fn out_of_range_ids_are_skipped() {
        let huge = i64::MAX as u64 + 1;
        let payset = vec![app_call(ApplicationCallFields {
            application_id: huge,
            foreign_apps: vec![huge, 5],
            foreign_assets: vec![u64::MAX, 6],
            ..Default::default()
        })];
        let req = request_creators(&payset);
        assert_eq!(req.apps, HashSet::from([5]));
        assert_eq!(req.assets, HashSet::from([6]));
    }

    #[test]
    fn inner_transactions_are_included() {
        let inner = SignedTxnWithAd::inner(Transaction::asset_transfer(addr(8), addr(9), 40, 1));
        let root = app_call(ApplicationCallFields {
            application_id: 30,
            ..Default::default()
        })
        .with_apply_data(ApplyData {
            eval_delta: EvalDelta {
                inner_txns: vec![inner],
            },
            ..Default::default()
        });
        let payset = vec![root];

        let req = request_creators(&payset);
        assert!(req.assets.contains(&40));

        let accounts = request_accounts_and_resources(&payset, &HashMap::new(), &HashMap::new());
        assert!(accounts.addresses.contains(&addr(8)));
        assert!(accounts.addresses.contains(&addr(9)));
        assert!(accounts.resources[&addr(9)].contains(&Creatable::asset(40)));
    }

    #[test]
    fn asset_transfer_resources_with_clawback_and_close() {
        let mut txn = Transaction::asset_transfer(addr(1), addr(2), 50, 10);
        if let TxnBody::AssetTransfer(x) = &mut txn.body {
            x.asset_sender = addr(3);
            x.close_to = addr(4);
        }
        let payset = vec![SignedTxnWithAd::new(txn)];
        let creators = HashMap::from([(50, addr(7))]);
        let req = request_accounts_and_resources(&payset, &creators, &HashMap::new());

        let asset = Creatable::asset(50);
        for a in [addr(1), addr(2), addr(3), addr(4)] {
            assert!(req.addresses.contains(&a), "missing address {a}");
        }
        // The creator's holding is fetched, but the creator account itself is not requested.
        assert!(!req.addresses.contains(&addr(7)));
        for a in [addr(2), addr(3), addr(4), addr(7)] {
            assert!(req.resources[&a].contains(&asset));
        }
        // Sender is not the source of a clawback.
        assert!(!req.resources.contains_key(&addr(1)));
    }

    #[test]
    fn app_call_resources() {
        let payset = vec![app_call(ApplicationCallFields {
            application_id: 60,
            accounts: vec![addr(5)],
            foreign_apps: vec![61, 62],
            foreign_assets: vec![70],
            ..Default::default()
        })];
        let apps = HashMap::from([(60, addr(6)), (61, addr(7))]);
        let assets = HashMap::from([(70, addr(8))]);
        let req = request_accounts_and_resources(&payset, &assets, &apps);

        assert_eq!(
            req.addresses,
            HashSet::from([addr(1), addr(5), addr(6)])
        );
        assert!(req.resources[&addr(6)].contains(&Creatable::app(60)));
        assert!(req.resources[&addr(1)].contains(&Creatable::app(60)));
        assert!(req.resources[&addr(7)].contains(&Creatable::app(61)));
        assert!(req.resources[&addr(8)].contains(&Creatable::asset(70)));
        // Unknown foreign app 62 contributes nothing.
        assert!(req
            .resources
            .values()
            .all(|set| !set.contains(&Creatable::app(62))));
    }

    #[test]
    fn creations_request_the_allocated_id() {
        let acfg = SignedTxnWithAd::new(Transaction::new(
            addr(1),
            TxnBody::AssetConfig(AssetConfigFields::default()),
        ))
        .with_apply_data(ApplyData {
            config_asset: 90,
            ..Default::default()
        });
        let appl = app_call(ApplicationCallFields::default()).with_apply_data(ApplyData {
            application_id: 91,
            ..Default::default()
        });
        let req = request_accounts_and_resources(&[acfg, appl], &HashMap::new(), &HashMap::new());
        assert_eq!(
            req.resources[&addr(1)],
            HashSet::from([Creatable::asset(90), Creatable::app(91)])
        );
    }
}
