//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the adapter.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the ledger adapter.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AdapterConfig {
    /// Remote ledger service settings.
    pub ledger: LedgerConfig,

    /// Retry configuration for idempotent remote calls.
    pub retries: RetryConfig,

    /// Nonce cache behaviour.
    pub nonce: NonceConfig,

    /// Signing policy.
    pub signing: SigningConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Elliptic curve used for keys and signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CurveType {
    #[default]
    NistP256,
}

/// Remote ledger service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Base URL of the indexing/broadcast service. Empty means unconfigured.
    pub server_api: String,

    /// Asset ticker of the ledger's native coin.
    pub symbol: String,

    /// Curve for address encoding and signing.
    pub curve: CurveType,

    /// Log raw responses.
    pub debug: bool,

    /// Total request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            server_api: String::new(),
            symbol: "XIF".to_string(),
            curve: CurveType::NistP256,
            debug: false,
            request_timeout_secs: 30,
            connect_timeout_secs: 5,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Enable retries.
    pub enabled: bool,

    /// Maximum number of attempts, including the first one.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 2000,
        }
    }
}

/// Nonce cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NonceConfig {
    /// Write the chosen nonce back to the cache while still holding the
    /// per-account lock. When false the caller persists it explicitly.
    pub persist_on_build: bool,

    /// JSON file backing the cache. In-memory only when unset.
    pub cache_path: Option<String>,
}

impl Default for NonceConfig {
    fn default() -> Self {
        Self {
            persist_on_build: true,
            cache_path: None,
        }
    }
}

/// What to do when a freshly produced signature fails self-verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifyPolicy {
    /// Log a warning and return the signature anyway.
    Warn,
    /// Fail the signing operation.
    #[default]
    Enforce,
}

/// Signing configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SigningConfig {
    /// Self-verification policy for offline signatures.
    pub verify: VerifyPolicy,

    /// Permit sending raw private keys to the remote service for signing.
    /// Never enable this for keys holding real funds.
    pub allow_online: bool,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
