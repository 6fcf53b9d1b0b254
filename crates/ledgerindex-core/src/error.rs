//! Error types for the accounting engine and its storage collaborator.

use thiserror::Error;

use crate::txn::TxType;

/// The store returned data from a round earlier than the snapshot being
/// processed. Usually a concurrent import advanced one source but not the
/// other; retrying later is expected to succeed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("consistency error: {message}")]
pub struct ConsistencyError {
    pub message: String,
}

impl ConsistencyError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Errors surfaced by a storage backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    /// A stored transaction row could not be decoded.
    #[error("Decode error at round {round}, intra {intra}: {reason}")]
    Decode { round: u64, intra: u32, reason: String },

    /// The read was cancelled before it completed.
    #[error("Storage read cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

/// Which protected account a rewind was refused for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialAccountKind {
    FeeSink,
    RewardsPool,
}

impl std::fmt::Display for SpecialAccountKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FeeSink => write!(f, "FeeSink"),
            Self::RewardsPool => write!(f, "RewardsPool"),
        }
    }
}

/// Errors returned when reconstructing an account at an earlier round.
#[derive(Debug, Error)]
pub enum RewindError {
    #[error("unable to rewind the {0}")]
    SpecialAccount(SpecialAccountKind),

    #[error(transparent)]
    Consistency(#[from] ConsistencyError),

    #[error("{address}[{round},{intra}]: rewinding past txn type {tx_type} is not currently supported")]
    UnsupportedTxnType {
        address: String,
        round: u64,
        intra: u32,
        tx_type: TxType,
    },

    #[error("rewinding past inner transactions is not supported")]
    InnerTransaction,

    #[error("target round {target} is after the account round {account_round}")]
    FutureRound { target: u64, account_round: u64 },

    #[error("rewinding {requested} rounds exceeds the configured limit of {limit}")]
    TooDeep { requested: u64, limit: u64 },

    #[error("unable to get special accounts: {0}")]
    SpecialAccounts(StoreError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl RewindError {
    /// Returns `true` if retrying the whole rewind later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Consistency(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_consistency_is_retryable() {
        assert!(RewindError::from(ConsistencyError::new("stale")).is_retryable());
        assert!(!RewindError::SpecialAccount(SpecialAccountKind::FeeSink).is_retryable());
        assert!(!RewindError::InnerTransaction.is_retryable());
    }

    #[test]
    fn special_account_message() {
        let err = RewindError::SpecialAccount(SpecialAccountKind::RewardsPool);
        assert_eq!(err.to_string(), "unable to rewind the RewardsPool");
    }
}
