//! Transaction classification predicates.
//!
//! Pure functions over a [`Transaction`]: no side effects, no errors.

use crate::txn::{OnCompletion, Transaction, TxnBody};
use crate::types::Address;

/// Payment that closes `addr` (the sender) out to a close-to address.
pub fn is_close(txn: &Transaction, addr: &Address) -> bool {
    match &txn.body {
        TxnBody::Payment(pay) => !pay.close_remainder_to.is_zero() && txn.sender == *addr,
        _ => false,
    }
}

/// Asset configuration that creates a new asset.
pub fn is_asset_create(txn: &Transaction) -> bool {
    matches!(&txn.body, TxnBody::AssetConfig(cfg) if cfg.config_asset == 0)
}

/// Asset configuration that destroys an existing asset (all parameters cleared).
pub fn is_asset_destroy(txn: &Transaction) -> bool {
    matches!(&txn.body, TxnBody::AssetConfig(cfg) if cfg.config_asset != 0 && cfg.params.is_zero())
}

/// Zero-amount self transfer that opts the sender into an asset.
pub fn is_asset_opt_in(txn: &Transaction) -> bool {
    match &txn.body {
        TxnBody::AssetTransfer(xfer) => {
            xfer.amount == 0 && txn.sender == xfer.receiver && xfer.close_to.is_zero()
        }
        _ => false,
    }
}

/// Asset transfer that closes the holding out to a close-to address.
pub fn is_asset_opt_out(txn: &Transaction) -> bool {
    matches!(&txn.body, TxnBody::AssetTransfer(xfer) if !xfer.close_to.is_zero())
}

pub fn is_app_create(txn: &Transaction) -> bool {
    matches!(&txn.body, TxnBody::ApplicationCall(app) if app.application_id == 0)
}

pub fn is_app_destroy(txn: &Transaction) -> bool {
    matches!(
        &txn.body,
        TxnBody::ApplicationCall(app) if app.on_completion == OnCompletion::DeleteApplication
    )
}

pub fn is_app_opt_in(txn: &Transaction) -> bool {
    matches!(
        &txn.body,
        TxnBody::ApplicationCall(app) if app.on_completion == OnCompletion::OptIn
    )
}

/// Application call that leaves the app, gracefully or not.
pub fn is_app_opt_out(txn: &Transaction) -> bool {
    matches!(
        &txn.body,
        TxnBody::ApplicationCall(app)
            if matches!(app.on_completion, OnCompletion::CloseOut | OnCompletion::ClearState)
    )
}
