//! JSON ledger files.
//!
//! ```json
//! {
//!   "special": { "fee_sink": "fe..fe", "rewards_pool": "ee..ee" },
//!   "rounds": [
//!     { "round": 1, "timestamp": 1700000000, "rewards_level": 0, "txns": [ ... ] }
//!   ]
//! }
//! ```

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ledgerindex_core::txn::SignedTxnWithAd;
use ledgerindex_core::types::SpecialAddresses;

#[derive(Debug, thiserror::Error)]
pub enum LedgerFileError {
    #[error("failed to read ledger file: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed ledger file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("rounds out of order: {previous} then {next}")]
    OutOfOrder { previous: u64, next: u64 },
}

/// One block: its round, time and payset in block order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundBlock {
    pub round: u64,
    /// Unix seconds.
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub rewards_level: u64,
    #[serde(default)]
    pub txns: Vec<SignedTxnWithAd>,
}

impl RoundBlock {
    pub fn round_time(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.timestamp, 0).unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerFile {
    pub special: SpecialAddresses,
    #[serde(default)]
    pub rounds: Vec<RoundBlock>,
}

impl LedgerFile {
    /// Parse a ledger file. Rounds must be strictly increasing.
    pub fn from_json(s: &str) -> Result<Self, LedgerFileError> {
        let file: LedgerFile = serde_json::from_str(s)?;
        for pair in file.rounds.windows(2) {
            if pair[1].round <= pair[0].round {
                return Err(LedgerFileError::OutOfOrder {
                    previous: pair[0].round,
                    next: pair[1].round,
                });
            }
        }
        Ok(file)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, LedgerFileError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    /// Highest round in the file, or 0 when empty.
    pub fn last_round(&self) -> u64 {
        self.rounds.last().map(|r| r.round).unwrap_or(0)
    }
}
