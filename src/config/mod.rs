//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse, deserialize, env overrides)
//!     → validation.rs (semantic checks)
//!     → AdapterConfig (validated, immutable)
//!     → handed to each component at construction time
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no global client state
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_or_default, ConfigError};
pub use schema::AdapterConfig;
pub use schema::{
    CurveType, LedgerConfig, NonceConfig, ObservabilityConfig, RetryConfig, SigningConfig,
    VerifyPolicy,
};
