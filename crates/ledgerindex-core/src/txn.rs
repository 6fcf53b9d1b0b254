//! Ledger transaction model: signed transactions with their apply data.
//!
//! Only the fields the accounting engine reads are modelled. Everything is
//! serde-friendly so rounds can be loaded from JSON fixtures.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::Address;

// ─── TxType ───────────────────────────────────────────────────────────────────

/// Transaction type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxType {
    #[serde(rename = "pay")]
    Payment,
    #[serde(rename = "keyreg")]
    KeyRegistration,
    #[serde(rename = "acfg")]
    AssetConfig,
    #[serde(rename = "axfer")]
    AssetTransfer,
    #[serde(rename = "afrz")]
    AssetFreeze,
    #[serde(rename = "appl")]
    ApplicationCall,
    #[serde(rename = "stpf")]
    StateProof,
}

impl fmt::Display for TxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Payment => "pay",
            Self::KeyRegistration => "keyreg",
            Self::AssetConfig => "acfg",
            Self::AssetTransfer => "axfer",
            Self::AssetFreeze => "afrz",
            Self::ApplicationCall => "appl",
            Self::StateProof => "stpf",
        };
        f.write_str(s)
    }
}

// ─── Type-specific fields ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PaymentFields {
    pub receiver: Address,
    #[serde(default)]
    pub amount: u64,
    #[serde(default)]
    pub close_remainder_to: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KeyregFields {
    #[serde(default)]
    pub vote_first: u64,
    #[serde(default)]
    pub vote_last: u64,
    #[serde(default)]
    pub vote_key_dilution: u64,
    #[serde(default)]
    pub nonparticipation: bool,
}

/// Parameters of an asset. An all-default value is the "destroy" marker.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetParams {
    pub total: u64,
    pub decimals: u32,
    pub default_frozen: bool,
    pub unit_name: String,
    pub asset_name: String,
    pub url: String,
    pub manager: Address,
    pub reserve: Address,
    pub freeze: Address,
    pub clawback: Address,
}

impl AssetParams {
    /// Returns `true` when every parameter is zero-valued.
    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AssetConfigFields {
    /// Asset being reconfigured; 0 for a creation.
    #[serde(default)]
    pub config_asset: u64,
    #[serde(default)]
    pub params: AssetParams,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AssetTransferFields {
    pub xfer_asset: u64,
    #[serde(default)]
    pub amount: u64,
    /// Clawback source; zero for an ordinary transfer.
    #[serde(default)]
    pub asset_sender: Address,
    pub receiver: Address,
    #[serde(default)]
    pub close_to: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AssetFreezeFields {
    pub freeze_account: Address,
    pub freeze_asset: u64,
    #[serde(default)]
    pub frozen: bool,
}

/// Action taken by an application call once the program approves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnCompletion {
    #[default]
    NoOp,
    OptIn,
    CloseOut,
    ClearState,
    UpdateApplication,
    DeleteApplication,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationCallFields {
    /// Application being called; 0 for a creation.
    pub application_id: u64,
    pub on_completion: OnCompletion,
    pub accounts: Vec<Address>,
    pub foreign_apps: Vec<u64>,
    pub foreign_assets: Vec<u64>,
}

/// Type-specific body of a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TxnBody {
    #[serde(rename = "pay")]
    Payment(PaymentFields),
    #[serde(rename = "keyreg")]
    KeyRegistration(KeyregFields),
    #[serde(rename = "acfg")]
    AssetConfig(AssetConfigFields),
    #[serde(rename = "axfer")]
    AssetTransfer(AssetTransferFields),
    #[serde(rename = "afrz")]
    AssetFreeze(AssetFreezeFields),
    #[serde(rename = "appl")]
    ApplicationCall(ApplicationCallFields),
    #[serde(rename = "stpf")]
    StateProof,
}

// ─── Transaction ──────────────────────────────────────────────────────────────

/// An unsigned transaction: common header plus typed body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub sender: Address,
    #[serde(default)]
    pub fee: u64,
    #[serde(default)]
    pub first_valid: u64,
    #[serde(default)]
    pub last_valid: u64,
    #[serde(flatten)]
    pub body: TxnBody,
}

impl Transaction {
    pub fn new(sender: Address, body: TxnBody) -> Self {
        Self {
            sender,
            fee: 0,
            first_valid: 0,
            last_valid: 0,
            body,
        }
    }

    /// A plain payment of `amount` from `sender` to `receiver`.
    pub fn payment(sender: Address, receiver: Address, amount: u64) -> Self {
        Self::new(
            sender,
            TxnBody::Payment(PaymentFields {
                receiver,
                amount,
                close_remainder_to: Address::ZERO,
            }),
        )
    }

    /// An asset transfer of `amount` units of `asset` from `sender` to `receiver`.
    pub fn asset_transfer(sender: Address, receiver: Address, asset: u64, amount: u64) -> Self {
        Self::new(
            sender,
            TxnBody::AssetTransfer(AssetTransferFields {
                xfer_asset: asset,
                amount,
                asset_sender: Address::ZERO,
                receiver,
                close_to: Address::ZERO,
            }),
        )
    }

    /// Set the fee.
    pub fn fee(mut self, fee: u64) -> Self {
        self.fee = fee;
        self
    }

    /// Returns the type tag of this transaction.
    pub fn tx_type(&self) -> TxType {
        match &self.body {
            TxnBody::Payment(_) => TxType::Payment,
            TxnBody::KeyRegistration(_) => TxType::KeyRegistration,
            TxnBody::AssetConfig(_) => TxType::AssetConfig,
            TxnBody::AssetTransfer(_) => TxType::AssetTransfer,
            TxnBody::AssetFreeze(_) => TxType::AssetFreeze,
            TxnBody::ApplicationCall(_) => TxType::ApplicationCall,
            TxnBody::StateProof => TxType::StateProof,
        }
    }
}

// ─── Apply data ───────────────────────────────────────────────────────────────

/// State changes made by application execution.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalDelta {
    pub inner_txns: Vec<SignedTxnWithAd>,
}

/// Results of applying a transaction that are not part of the transaction itself.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplyData {
    pub closing_amount: u64,
    pub asset_closing_amount: u64,
    pub sender_rewards: u64,
    pub receiver_rewards: u64,
    pub close_rewards: u64,
    /// Asset id allocated by a creation.
    pub config_asset: u64,
    /// Application id allocated by a creation.
    pub application_id: u64,
    pub eval_delta: EvalDelta,
}

/// How the sender authorized the transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SigType {
    Sig,
    Msig,
    Lsig,
}

/// A signed transaction together with its apply data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTxnWithAd {
    pub txn: Transaction,
    /// `None` for inner transactions, which carry no signature.
    #[serde(default)]
    pub sig_type: Option<SigType>,
    #[serde(default)]
    pub apply_data: ApplyData,
}

impl SignedTxnWithAd {
    /// Wrap a single-signature top-level transaction with empty apply data.
    pub fn new(txn: Transaction) -> Self {
        Self {
            txn,
            sig_type: Some(SigType::Sig),
            apply_data: ApplyData::default(),
        }
    }

    /// Wrap a transaction issued by application execution.
    pub fn inner(txn: Transaction) -> Self {
        Self {
            txn,
            sig_type: None,
            apply_data: ApplyData::default(),
        }
    }

    pub fn with_apply_data(mut self, apply_data: ApplyData) -> Self {
        self.apply_data = apply_data;
        self
    }

    /// Inner transactions issued by this transaction, in execution order.
    pub fn inner_txns(&self) -> &[SignedTxnWithAd] {
        &self.apply_data.eval_delta.inner_txns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tx_type_of_body() {
        let a = Address::repeat(1);
        assert_eq!(Transaction::payment(a, a, 1).tx_type(), TxType::Payment);
        assert_eq!(Transaction::asset_transfer(a, a, 5, 0).tx_type(), TxType::AssetTransfer);
        assert_eq!(Transaction::new(a, TxnBody::StateProof).tx_type(), TxType::StateProof);
        assert_eq!(TxType::AssetFreeze.to_string(), "afrz");
    }

    #[test]
    fn asset_params_zero() {
        assert!(AssetParams::default().is_zero());
        let p = AssetParams {
            decimals: 2,
            ..Default::default()
        };
        assert!(!p.is_zero());
    }

    #[test]
    fn transaction_json_uses_type_tag() {
        let sender = Address::repeat(1);
        let receiver = Address::repeat(2);
        let json = serde_json::json!({
            "txn": {
                "sender": sender.to_string(),
                "fee": 1000,
                "type": "pay",
                "receiver": receiver.to_string(),
                "amount": 42
            },
            "apply_data": { "sender_rewards": 3 }
        });
        let stxn: SignedTxnWithAd = serde_json::from_value(json).unwrap();
        assert_eq!(stxn.txn.fee, 1000);
        assert_eq!(stxn.apply_data.sender_rewards, 3);
        assert!(stxn.sig_type.is_none());
        match &stxn.txn.body {
            TxnBody::Payment(p) => {
                assert_eq!(p.receiver, receiver);
                assert_eq!(p.amount, 42);
                assert!(p.close_remainder_to.is_zero());
            }
            other => panic!("expected payment, got {other:?}"),
        }
    }
}
