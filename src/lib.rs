//! Chain-account adapter for the XIF ledger.

pub mod config;
pub mod ledger;
pub mod observability;
pub mod resilience;

pub use config::schema::AdapterConfig;
pub use ledger::{LedgerError, LedgerResult, Wallet, XifAdapter};
