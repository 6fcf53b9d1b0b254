//! ledgerindex-core: data model and collaborator traits for the ledger
//! accounting engine.
//!
//! # Architecture
//!
//! ```text
//! payset ──► DependencyPreloader ──► batched evaluator (external)
//!        └─► RoundAccountant ──► RoundUpdates ──► persistence
//! query  ──► HistoricalRewinder ◄── LedgerStore::transactions (stream)
//! ```
//!
//! This crate holds what those components share: the transaction model,
//! classification predicates, participant extraction, storage traits and
//! error types. The components themselves live in `ledgerindex-accounting`.

pub mod classify;
pub mod config;
pub mod error;
pub mod participants;
pub mod store;
pub mod txn;
pub mod types;
pub mod updates;

pub use config::{EngineConfig, LogConfig};
pub use error::{ConsistencyError, RewindError, SpecialAccountKind, StoreError};
pub use participants::{extract_participants, walk_txns, MAX_INNER_DEPTH};
pub use store::{CreatorLookup, LedgerStore, TransactionFilter, TxnExtra, TxnRow, TxnRowStream};
pub use txn::{ApplyData, SignedTxnWithAd, SigType, Transaction, TxType, TxnBody};
pub use types::{Account, Address, AssetHolding, Creatable, CreatableKind, SpecialAddresses};
pub use updates::{AlgoUpdate, AssetUpdate, AssetUpdateKind, RoundContext, RoundUpdates};
