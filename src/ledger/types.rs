//! Ledger-specific types and error definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The client was never configured with a base URL.
    #[error("Ledger transport unavailable: API url is not set up")]
    TransportUnavailable,

    /// HTTP request could not be completed.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The remote service answered with an `error` envelope.
    #[error("Remote ledger error: {message}")]
    RemoteLedger { message: String },

    /// The response did not have the expected shape.
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Address is not valid hex or has the wrong length.
    #[error("Malformed address '{0}'")]
    MalformedAddress(String),

    /// Key material is not a valid point or scalar on the configured curve.
    #[error("Malformed key: {0}")]
    MalformedKey(String),

    /// Raw signature is not r || s with 32 bytes each.
    #[error("Signature length is {0} bytes, expected 64")]
    InvalidSignatureLength(usize),

    /// The nonce cache holds a value that is not an unsigned integer.
    #[error("Corrupt nonce cache entry {key}: {value}")]
    CorruptNonceCache { key: String, value: String },

    /// The nonce cache could not be read or written.
    #[error("Nonce store error: {0}")]
    NonceStore(String),

    /// Underlying curve operation failed.
    #[error("Signing failed: {0}")]
    SigningFailure(String),

    /// Signature does not verify against the sender's public key.
    #[error("Transaction verify failed for sender {0}")]
    VerificationFailed(String),

    /// Transfer fields violate the canonical record rules.
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),

    /// A field this ledger has no use for was populated.
    #[error("Field '{0}' is not supported by this ledger")]
    UnsupportedField(&'static str),

    /// Online signing was requested without being enabled.
    #[error("Online signing is disabled; set signing.allow_online to enable it")]
    OnlineSigningDisabled,
}

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// An account as reported by the remote ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub address: String,
    pub public_key: String,
    pub symbol: String,
    /// Decimal balance, kept in its textual form.
    pub balance: String,
    /// Last sequence number the chain has seen for this account.
    pub nonce: u64,
    pub account_type: String,
}

impl Account {
    /// Parse the `account` object of a `coin/{address}` response.
    pub fn from_response(result: &Value) -> LedgerResult<Self> {
        let account = result
            .get("account")
            .filter(|v| v.is_object())
            .ok_or_else(|| LedgerError::UnexpectedResponse("missing 'account' object".into()))?;

        Ok(Self {
            address: json_str(account, "address"),
            public_key: json_str(account, "publickey"),
            symbol: json_str(account, "symbol"),
            balance: json_str(account, "amount"),
            nonce: json_u64(account, "nonce"),
            account_type: json_str(account, "type"),
        })
    }

    /// Address under which the local nonce cache entry is kept.
    pub fn cache_key(&self) -> &str {
        if self.public_key.is_empty() {
            &self.address
        } else {
            &self.public_key
        }
    }
}

/// A block on the remote ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub height: u64,
    pub hash: String,
    pub last_hash: String,
    pub txns: Vec<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl Block {
    /// Parse a `coin/blocks/...` response.
    pub fn from_response(result: &Value) -> LedgerResult<Self> {
        if !result.is_object() {
            return Err(LedgerError::UnexpectedResponse("block is not an object".into()));
        }

        let txns = result
            .get("txns")
            .and_then(Value::as_array)
            .map(|txns| txns.iter().map(value_to_string).collect())
            .unwrap_or_default();

        Ok(Self {
            height: json_u64(result, "id"),
            hash: json_str(result, "hash"),
            last_hash: json_str(result, "last_hash"),
            txns,
            timestamp: parse_timestamp(&json_str(result, "created")),
        })
    }

    /// Chain-agnostic header view of this block.
    pub fn header(&self, symbol: &str) -> BlockHeader {
        BlockHeader {
            hash: self.hash.clone(),
            previous_hash: self.last_hash.clone(),
            height: self.height,
            time: self.timestamp.map(|t| t.timestamp().max(0) as u64).unwrap_or(0),
            symbol: symbol.to_string(),
        }
    }
}

/// Block header as consumed by block scanners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub hash: String,
    pub previous_hash: String,
    pub height: u64,
    /// Unix seconds.
    pub time: u64,
    pub symbol: String,
}

/// A transaction as reported by `coin/transaction/{hash}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub hash: String,
    pub owner: String,
    pub from: String,
    pub to: String,
    pub amount: String,
    pub symbol: String,
    pub block_hash: String,
    pub block_height: u64,
    pub status: String,
    pub tx_type: String,
    pub memo: String,
    pub timestamp: Option<DateTime<Utc>>,
}

impl Transaction {
    pub fn from_response(result: &Value) -> LedgerResult<Self> {
        let tx = result
            .get("transaction")
            .filter(|v| v.is_object())
            .ok_or_else(|| {
                LedgerError::UnexpectedResponse("missing 'transaction' object".into())
            })?;

        Ok(Self {
            hash: json_str(tx, "key"),
            owner: json_str(tx, "owner"),
            from: json_str(tx, "sender_account"),
            to: json_str(tx, "recipient_account"),
            amount: json_str(tx, "amount"),
            symbol: json_str(tx, "symbol"),
            block_hash: json_str(tx, "hash"),
            block_height: json_u64(tx, "block"),
            status: json_str(tx, "status"),
            tx_type: json_str(tx, "type"),
            memo: json_str(tx, "notes"),
            timestamp: parse_timestamp(&json_str(tx, "created")),
        })
    }
}

/// Parse a `YYYY-MM-DDTHH:MM:SS[.fff]Z` timestamp as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if raw.is_empty() {
        return None;
    }
    match DateTime::parse_from_rfc3339(raw) {
        Ok(ts) => Some(ts.with_timezone(&Utc)),
        Err(e) => {
            tracing::debug!(raw = %raw, error = %e, "Unparsable ledger timestamp");
            None
        }
    }
}

/// Read a field as a string; numbers are rendered, anything else is empty.
pub(crate) fn json_str(value: &Value, field: &str) -> String {
    value.get(field).map(value_to_string).unwrap_or_default()
}

/// Read a field as u64, accepting JSON numbers and numeric strings.
pub(crate) fn json_u64(value: &Value, field: &str) -> u64 {
    match value.get(field) {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}
