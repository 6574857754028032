//! Transfer records and the transaction builder.
//!
//! # Lifecycle
//! ```text
//! TransferRequest → TxBuilder::build → UnsignedTransaction
//!     → signer → SignedTransaction
//!     → gateway → SubmittedTransaction
//! ```
//!
//! The canonical record is `sender ∥ recipient ∥ symbol ∥ amount ∥ nonce`
//! as raw bytes with no separators, hashed with SHA-256. Field rules below
//! keep the concatenation unambiguous at the symbol/amount boundary.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::ledger::address::{canonical_address, AddressCodec};
use crate::ledger::nonce::NonceReconciler;
use crate::ledger::types::{LedgerError, LedgerResult};

/// A transfer intent as received from the wallet platform.
///
/// `fee_rate`, `memo` and `contract` exist for parity with other chains.
/// This ledger has no fee market, no memo field in the signed record and
/// no contract transfers, so populated values are rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub sender: String,
    pub recipient: String,
    pub symbol: String,
    pub amount: String,
    #[serde(default)]
    pub fee_rate: Option<String>,
    #[serde(default)]
    pub memo: Option<String>,
    #[serde(default)]
    pub contract: Option<String>,
}

impl TransferRequest {
    pub fn new(
        sender: impl Into<String>,
        recipient: impl Into<String>,
        symbol: impl Into<String>,
        amount: impl Into<String>,
    ) -> Self {
        Self {
            sender: sender.into(),
            recipient: recipient.into(),
            symbol: symbol.into(),
            amount: amount.into(),
            ..Self::default()
        }
    }

    fn reject_unsupported(&self) -> LedgerResult<()> {
        let populated = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        if populated(&self.fee_rate) {
            return Err(LedgerError::UnsupportedField("fee_rate"));
        }
        if populated(&self.memo) {
            return Err(LedgerError::UnsupportedField("memo"));
        }
        if populated(&self.contract) {
            return Err(LedgerError::UnsupportedField("contract"));
        }
        Ok(())
    }
}

/// The five immutable fields that are hashed and signed.
///
/// Deserialization goes through [`UnsignedTransaction::new`], so a decoded
/// record obeys the same field rules as a built one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawUnsignedTransaction")]
pub struct UnsignedTransaction {
    sender: String,
    recipient: String,
    symbol: String,
    amount: String,
    nonce: u64,
}

impl UnsignedTransaction {
    /// Validate and freeze a canonical record.
    pub fn new(
        sender: impl Into<String>,
        recipient: impl Into<String>,
        symbol: impl Into<String>,
        amount: impl Into<String>,
        nonce: u64,
    ) -> LedgerResult<Self> {
        let tx = Self {
            sender: sender.into(),
            recipient: recipient.into(),
            symbol: symbol.into(),
            amount: amount.into(),
            nonce,
        };
        if tx.sender.is_empty() || tx.recipient.is_empty() {
            return Err(LedgerError::InvalidTransaction(
                "sender and recipient are required".into(),
            ));
        }
        validate_symbol(&tx.symbol)?;
        validate_amount(&tx.amount)?;
        Ok(tx)
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    pub fn recipient(&self) -> &str {
        &self.recipient
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn amount(&self) -> &str {
        &self.amount
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    /// Bytes that get hashed.
    pub fn canonical_message(&self) -> Vec<u8> {
        format!(
            "{}{}{}{}{}",
            self.sender, self.recipient, self.symbol, self.amount, self.nonce
        )
        .into_bytes()
    }

    /// SHA-256 of the canonical message.
    pub fn hash(&self) -> [u8; 32] {
        Sha256::digest(self.canonical_message()).into()
    }

    /// Attach a hex DER signature.
    pub(crate) fn into_signed(self, signature: String) -> SignedTransaction {
        SignedTransaction {
            unsigned: self,
            signature,
        }
    }
}

#[derive(Deserialize)]
struct RawUnsignedTransaction {
    sender: String,
    recipient: String,
    symbol: String,
    amount: String,
    nonce: u64,
}

impl TryFrom<RawUnsignedTransaction> for UnsignedTransaction {
    type Error = LedgerError;

    fn try_from(raw: RawUnsignedTransaction) -> LedgerResult<Self> {
        Self::new(raw.sender, raw.recipient, raw.symbol, raw.amount, raw.nonce)
    }
}

/// An unsigned record plus a hex-encoded DER ECDSA signature over its hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    #[serde(flatten)]
    unsigned: UnsignedTransaction,
    signature: String,
}

impl SignedTransaction {
    pub fn unsigned(&self) -> &UnsignedTransaction {
        &self.unsigned
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// Hash recomputed from the five canonical fields.
    pub fn hash(&self) -> [u8; 32] {
        self.unsigned.hash()
    }

    /// Drop the signature and start over from the same record.
    pub fn into_unsigned(self) -> UnsignedTransaction {
        self.unsigned
    }
}

/// A transaction the remote service accepted for broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedTransaction {
    pub txid: String,
    pub transaction: SignedTransaction,
}

/// Builds canonical unsigned transfers, assigning nonces.
pub struct TxBuilder {
    reconciler: Arc<NonceReconciler>,
    codec: Arc<dyn AddressCodec>,
}

impl TxBuilder {
    /// Create a new transaction builder.
    pub fn new(reconciler: Arc<NonceReconciler>, codec: Arc<dyn AddressCodec>) -> Self {
        Self { reconciler, codec }
    }

    /// Validate a transfer request and assign it the next nonce.
    pub async fn build(&self, mut request: TransferRequest) -> LedgerResult<UnsignedTransaction> {
        request.reject_unsupported()?;
        request.sender = canonical_address(&request.sender);
        request.recipient = canonical_address(&request.recipient);
        if !self.codec.verify(&request.sender) {
            return Err(LedgerError::MalformedAddress(request.sender));
        }
        if !self.codec.verify(&request.recipient) {
            return Err(LedgerError::MalformedAddress(request.recipient));
        }
        validate_symbol(&request.symbol)?;
        validate_amount(&request.amount)?;

        let nonce = self.reconciler.next_nonce(&request.sender).await?;

        tracing::info!(
            sender = %request.sender,
            recipient = %request.recipient,
            symbol = %request.symbol,
            amount = %request.amount,
            nonce,
            "Built unsigned transfer"
        );

        UnsignedTransaction::new(
            request.sender,
            request.recipient,
            request.symbol,
            request.amount,
            nonce,
        )
    }

    pub fn reconciler(&self) -> &Arc<NonceReconciler> {
        &self.reconciler
    }
}

/// Asset tickers: ASCII alphanumerics, not ending in a digit.
pub fn validate_symbol(symbol: &str) -> LedgerResult<()> {
    let valid = !symbol.is_empty()
        && symbol.bytes().all(|b| b.is_ascii_alphanumeric())
        && !symbol.bytes().last().is_some_and(|b| b.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(LedgerError::InvalidTransaction(format!(
            "invalid symbol '{}'",
            symbol
        )))
    }
}

/// Non-negative decimal: `digits` or `digits.digits`.
pub fn validate_amount(amount: &str) -> LedgerResult<()> {
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    let valid = match amount.split_once('.') {
        Some((whole, frac)) => all_digits(whole) && all_digits(frac),
        None => all_digits(amount),
    };
    if valid {
        Ok(())
    } else {
        Err(LedgerError::InvalidTransaction(format!(
            "invalid amount '{}'",
            amount
        )))
    }
}
