//! ledgerindex-accounting: the accounting engine.
//!
//! - [`accountant`]: forward per-round deltas ([`RoundAccountant`])
//! - [`preload`]: creator and account/resource requests for batched evaluation
//! - [`rewind`]: approximate account state at an earlier round
//! - [`specials`]: once-resolved fee sink / rewards pool cache

pub mod accountant;
pub mod preload;
pub mod rewind;
pub mod specials;

pub use accountant::RoundAccountant;
pub use preload::{
    preload, request_accounts_and_resources, request_creators, AccountsRequest, CreatorsRequest,
    Preloaded,
};
pub use rewind::{account_at_round, Rewinder};
pub use specials::SpecialAccounts;
