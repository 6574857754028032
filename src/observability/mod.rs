//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All components produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters for remote calls, nonces, signatures, submissions)
//!
//! Consumers:
//!     → stdout/stderr log sink
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Private keys never appear in log fields
//! - Metrics are cheap (atomic increments) and no-ops without a recorder

pub mod logging;
pub mod metrics;
