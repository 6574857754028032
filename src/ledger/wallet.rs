//! Local key holder for offline signing.
//!
//! # Security
//! - Private keys are loaded ONLY from hex strings or environment variables
//! - Keys are never logged or serialized
//! - `Debug` output is redacted

use p256::ecdsa::{SigningKey, VerifyingKey};
use p256::elliptic_curve::sec1::ToEncodedPoint;

use crate::ledger::address::COMPRESSED_KEY_LEN;
use crate::ledger::types::{LedgerError, LedgerResult};

/// Environment variable name for the private key.
pub const PRIVATE_KEY_ENV_VAR: &str = "XPAY_PRIVATE_KEY";

/// A P-256 key pair.
#[derive(Clone)]
pub struct Wallet {
    signing_key: SigningKey,
}

impl Wallet {
    /// Create a wallet from a hex-encoded 32-byte private key.
    ///
    /// # Arguments
    /// * `private_key_hex` - Hex string (with or without 0x prefix)
    pub fn from_private_key(private_key_hex: &str) -> LedgerResult<Self> {
        let key_hex = private_key_hex
            .trim()
            .strip_prefix("0x")
            .unwrap_or(private_key_hex.trim());

        let bytes = hex::decode(key_hex)
            .map_err(|e| LedgerError::MalformedKey(format!("Invalid private key format: {}", e)))?;
        let wallet = Self::from_bytes(&bytes)?;

        tracing::debug!(address = %wallet.address(), "Wallet initialized");
        Ok(wallet)
    }

    /// Create a wallet from raw private key bytes.
    pub fn from_bytes(bytes: &[u8]) -> LedgerResult<Self> {
        if bytes.len() != 32 {
            return Err(LedgerError::MalformedKey(format!(
                "Invalid private key length: {} bytes",
                bytes.len()
            )));
        }
        let signing_key = SigningKey::from_slice(bytes)
            .map_err(|_| LedgerError::MalformedKey("Invalid private key scalar".into()))?;
        Ok(Self { signing_key })
    }

    /// Load wallet from environment variable.
    ///
    /// Reads `XPAY_PRIVATE_KEY` from environment.
    pub fn from_env() -> LedgerResult<Self> {
        let private_key = std::env::var(PRIVATE_KEY_ENV_VAR).map_err(|_| {
            LedgerError::MalformedKey(format!(
                "Environment variable {} not set",
                PRIVATE_KEY_ENV_VAR
            ))
        })?;

        Self::from_private_key(&private_key)
    }

    /// Generate a fresh random key pair.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::random(&mut rand::rngs::OsRng),
        }
    }

    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    pub fn verifying_key(&self) -> &VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// 33-byte SEC1 compressed public key.
    pub fn public_key_compressed(&self) -> [u8; COMPRESSED_KEY_LEN] {
        let point = self.verifying_key().to_encoded_point(true);
        let mut out = [0u8; COMPRESSED_KEY_LEN];
        out.copy_from_slice(point.as_bytes());
        out
    }

    /// 65-byte SEC1 uncompressed public key (`04 || x || y`).
    pub fn public_key_uncompressed(&self) -> Vec<u8> {
        self.verifying_key()
            .to_encoded_point(false)
            .as_bytes()
            .to_vec()
    }

    /// The ledger address of this key.
    pub fn address(&self) -> String {
        hex::encode(self.public_key_compressed())
    }

    /// Raw secret scalar as hex. Only online signing needs this.
    pub(crate) fn private_key_hex(&self) -> String {
        hex::encode(self.signing_key.to_bytes())
    }
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.address())
            .field("signing_key", &"[REDACTED]")
            .finish()
    }
}
