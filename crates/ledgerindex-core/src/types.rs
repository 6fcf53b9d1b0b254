//! Shared types for the accounting engine.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ─── Address ──────────────────────────────────────────────────────────────────

/// A 32-byte account address. The all-zero address means "not set".
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(pub [u8; 32]);

impl Address {
    pub const ZERO: Address = Address([0u8; 32]);

    /// Returns `true` for the all-zero (unset) address.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Build an address whose bytes are all `b`. Handy for fixtures.
    pub fn repeat(b: u8) -> Self {
        Self([b; 32])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", &hex::encode(self.0)[..8])
    }
}

/// Error returned when parsing an [`Address`] from text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid address '{0}': expected 64 hex characters")]
pub struct AddressParseError(pub String);

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(raw).map_err(|_| AddressParseError(s.to_string()))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| AddressParseError(s.to_string()))?;
        Ok(Self(arr))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ─── SpecialAddresses ─────────────────────────────────────────────────────────

/// Protocol-owned accounts that are never rewound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialAddresses {
    pub fee_sink: Address,
    pub rewards_pool: Address,
}

// ─── Creatable ────────────────────────────────────────────────────────────────

/// Kind of a creator-resolved resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CreatableKind {
    Asset,
    Application,
}

/// An asset or application identified as a resource to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Creatable {
    pub index: u64,
    pub kind: CreatableKind,
}

impl Creatable {
    pub fn asset(index: u64) -> Self {
        Self {
            index,
            kind: CreatableKind::Asset,
        }
    }

    pub fn app(index: u64) -> Self {
        Self {
            index,
            kind: CreatableKind::Application,
        }
    }
}

// ─── Account ──────────────────────────────────────────────────────────────────

/// An asset balance held by an account.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AssetHolding {
    pub asset_id: u64,
    pub amount: u64,
    #[serde(default)]
    pub is_frozen: bool,
}

/// Query-facing account snapshot, as indexed at `round`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Account {
    pub address: Address,
    pub amount: u64,
    pub amount_without_pending_rewards: u64,
    #[serde(default)]
    pub rewards: u64,
    #[serde(default)]
    pub pending_rewards: u64,
    #[serde(default)]
    pub min_balance: u64,
    pub round: u64,
    #[serde(default)]
    pub closed_at_round: Option<u64>,
    #[serde(default)]
    pub assets: Vec<AssetHolding>,
}

impl Account {
    /// Returns the holding for `asset_id`, if the account has one.
    pub fn holding(&self, asset_id: u64) -> Option<&AssetHolding> {
        self.assets.iter().find(|h| h.asset_id == asset_id)
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_address() {
        assert!(Address::ZERO.is_zero());
        assert!(Address::default().is_zero());
        assert!(!Address::repeat(1).is_zero());
    }

    #[test]
    fn address_text_form() {
        let addr = Address::repeat(0xab);
        let text = addr.to_string();
        assert_eq!(text.len(), 64);
        assert_eq!(text.parse::<Address>().unwrap(), addr);
        assert_eq!(format!("0x{text}").parse::<Address>().unwrap(), addr);
        assert!("abcd".parse::<Address>().is_err());
    }

    #[test]
    fn address_serde_as_hex_string() {
        let addr = Address::repeat(7);
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, format!("\"{}\"", "07".repeat(32)));
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }

    #[test]
    fn account_holding_lookup() {
        let acct = Account {
            assets: vec![AssetHolding {
                asset_id: 9,
                amount: 3,
                is_frozen: false,
            }],
            ..Default::default()
        };
        assert_eq!(acct.holding(9).unwrap().amount, 3);
        assert!(acct.holding(10).is_none());
    }
}
