//! Address codec: canonical address strings are the hex form of a
//! compressed public key.
//!
//! The codec is pure. Announcing a new address to the remote service is a
//! separate step (see `LedgerClient::inform_wallet`).

use p256::ecdsa::VerifyingKey;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::PublicKey;

use crate::config::CurveType;
use crate::ledger::types::{LedgerError, LedgerResult};

/// Length of a SEC1 compressed point on the supported curves.
pub const COMPRESSED_KEY_LEN: usize = 33;

/// Options for address encoding and decoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CodecConfig {
    pub curve: CurveType,
}

/// Conversion between public-key bytes and address strings.
pub trait AddressCodec: Send + Sync {
    /// Hex-decode an address into raw key bytes.
    fn decode(&self, address: &str) -> LedgerResult<Vec<u8>>;

    /// Encode key material as an address, compressing uncompressed keys first.
    fn encode(&self, key_material: &[u8]) -> LedgerResult<String>;

    /// Structural check: valid hex of exactly one compressed key.
    fn verify(&self, address: &str) -> bool;

    /// Recover the verifying key an address stands for.
    fn public_key(&self, address: &str) -> LedgerResult<VerifyingKey>;
}

/// Address codec for NIST P-256 keys.
#[derive(Debug, Clone, Copy, Default)]
pub struct P256AddressCodec {
    config: CodecConfig,
}

impl P256AddressCodec {
    pub fn new(config: CodecConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> CodecConfig {
        self.config
    }
}

impl AddressCodec for P256AddressCodec {
    fn decode(&self, address: &str) -> LedgerResult<Vec<u8>> {
        hex::decode(address).map_err(|_| LedgerError::MalformedAddress(address.to_string()))
    }

    fn encode(&self, key_material: &[u8]) -> LedgerResult<String> {
        if key_material.len() < 64 {
            return Ok(hex::encode(key_material));
        }
        let compressed = compress_point(key_material)?;
        Ok(hex::encode(compressed))
    }

    fn verify(&self, address: &str) -> bool {
        match hex::decode(address) {
            Ok(bytes) => bytes.len() == COMPRESSED_KEY_LEN,
            Err(_) => false,
        }
    }

    fn public_key(&self, address: &str) -> LedgerResult<VerifyingKey> {
        let bytes = self.decode(address)?;
        if bytes.len() != COMPRESSED_KEY_LEN {
            return Err(LedgerError::MalformedAddress(address.to_string()));
        }
        VerifyingKey::from_sec1_bytes(&bytes)
            .map_err(|_| LedgerError::MalformedAddress(address.to_string()))
    }
}

/// Canonical spelling of an address: trimmed, lowercase hex.
///
/// `decode` and `verify` accept either hex case, so two spellings can name
/// one account.
pub fn canonical_address(address: &str) -> String {
    address.trim().to_ascii_lowercase()
}

/// Compress an uncompressed point given either as `04 || x || y` (65 bytes)
/// or as bare `x || y` (64 bytes).
pub fn compress_point(key_material: &[u8]) -> LedgerResult<Vec<u8>> {
    let sec1 = match key_material.len() {
        64 => {
            let mut buf = Vec::with_capacity(65);
            buf.push(0x04);
            buf.extend_from_slice(key_material);
            buf
        }
        65 => key_material.to_vec(),
        n => {
            return Err(LedgerError::MalformedKey(format!(
                "uncompressed public key must be 64 or 65 bytes, got {}",
                n
            )))
        }
    };

    let key = PublicKey::from_sec1_bytes(&sec1)
        .map_err(|_| LedgerError::MalformedKey("point is not on curve P-256".into()))?;
    Ok(key.to_encoded_point(true).as_bytes().to_vec())
}
