//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Remote ledger call:
//!     → reqwest client (connect/request timeouts from LedgerConfig)
//!     → On transport failure: retries.rs (GET only, exponential backoff with jitter)
//!     → Domain errors (`error` envelopes) are never retried
//! ```
//!
//! # Design Decisions
//! - Timeouts belong to the transport, not to ledger operations
//! - Broadcasts and signing requests are POSTs and never retried here
//! - Dropping the calling future cancels a pending retry cooperatively

pub mod retries;

pub use retries::RetryPolicy;
