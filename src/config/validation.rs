//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, attempts >= 1)
//! - Check the service URL and metrics address parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AdapterConfig → Result<(), Vec<ValidationError>>

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::AdapterConfig;
use crate::ledger::transaction::validate_symbol;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a loaded configuration.
pub fn validate_config(config: &AdapterConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let api = config.ledger.server_api.trim();
    if !api.is_empty() {
        match url::Url::parse(api) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
            Ok(url) => errors.push(ValidationError::new(
                "ledger.server_api",
                format!("unsupported scheme '{}'", url.scheme()),
            )),
            Err(e) => errors.push(ValidationError::new("ledger.server_api", e.to_string())),
        }
    }

    if let Err(e) = validate_symbol(&config.ledger.symbol) {
        errors.push(ValidationError::new("ledger.symbol", e.to_string()));
    }
    if config.ledger.request_timeout_secs == 0 {
        errors.push(ValidationError::new("ledger.request_timeout_secs", "must be > 0"));
    }
    if config.ledger.connect_timeout_secs == 0 {
        errors.push(ValidationError::new("ledger.connect_timeout_secs", "must be > 0"));
    }

    if config.retries.max_attempts == 0 {
        errors.push(ValidationError::new("retries.max_attempts", "must be >= 1"));
    }
    if config.retries.base_delay_ms > config.retries.max_delay_ms {
        errors.push(ValidationError::new(
            "retries.base_delay_ms",
            "must not exceed retries.max_delay_ms",
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
