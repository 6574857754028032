//! Ledger account adapter subsystem.
//!
//! # Data Flow
//! ```text
//! TransferRequest
//!     → transaction.rs (validate fields, ask nonce.rs for the next nonce)
//!         → nonce.rs (max of cache.rs and client.rs `coin/{address}`, +1)
//!     → UnsignedTransaction
//!     → signer.rs (SHA-256, P-256 ECDSA, DER; offline or `signature/generate`)
//!     → SignedTransaction
//!     → gateway.rs (`coin/sendraw`)
//!     → SubmittedTransaction { txid }
//! ```
//!
//! # Security Constraints
//! - Private keys ONLY from environment variables or caller-held `Wallet`s
//! - Never log private keys or sensitive data
//! - Online signing is off unless `signing.allow_online` is set
//! - Broadcasts are never retried automatically

pub mod adapter;
pub mod address;
pub mod cache;
pub mod client;
pub mod gateway;
pub mod nonce;
pub mod signer;
pub mod transaction;
pub mod types;
pub mod wallet;

#[cfg(test)]
pub(crate) mod testing;

pub use adapter::XifAdapter;
pub use address::{AddressCodec, P256AddressCodec};
pub use cache::{NonceCache, NonceStore};
pub use client::{LedgerClient, RemoteLedgerClient};
pub use gateway::SubmissionGateway;
pub use nonce::NonceReconciler;
pub use signer::{OfflineSigner, OnlineSigner, SigningMode, TransactionSigner};
pub use transaction::{
    SignedTransaction, SubmittedTransaction, TransferRequest, TxBuilder, UnsignedTransaction,
};
pub use types::{Account, Block, BlockHeader, LedgerError, LedgerResult, Transaction};
pub use wallet::Wallet;
