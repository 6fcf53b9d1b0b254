//! ledgerindex-storage: storage backends for LedgerIndex.
//!
//! Backends:
//! - [`memory`]: in-memory transaction index and account table (dev/testing, no persistence)
//!
//! [`file`] reads the JSON ledger files the backends are seeded from.

pub mod file;
pub mod memory;

pub use file::{LedgerFile, LedgerFileError, RoundBlock};
pub use memory::InMemoryStore;
