//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::schema::AdapterConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Overrides `ledger.server_api`.
pub const SERVER_API_ENV_VAR: &str = "XPAY_SERVER_API";
/// Overrides `observability.log_level`.
pub const LOG_LEVEL_ENV_VAR: &str = "XPAY_LOG_LEVEL";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<AdapterConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse, apply environment overrides, and validate.
pub fn parse_config(content: &str) -> Result<AdapterConfig, ConfigError> {
    let mut config: AdapterConfig = toml::from_str(content)?;
    apply_env_overrides(&mut config, |name| std::env::var(name).ok());

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Load from `path` when given, otherwise start from defaults.
pub fn load_or_default(path: Option<&Path>) -> Result<AdapterConfig, ConfigError> {
    match path {
        Some(path) => load_config(path),
        None => parse_config(""),
    }
}

fn apply_env_overrides<F>(config: &mut AdapterConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(api) = lookup(SERVER_API_ENV_VAR) {
        tracing::debug!(server_api = %api, "Using {} override", SERVER_API_ENV_VAR);
        config.ledger.server_api = api;
    }
    if let Some(level) = lookup(LOG_LEVEL_ENV_VAR) {
        config.observability.log_level = level;
    }
}
