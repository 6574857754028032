//! Transaction signing.
//!
//! # Modes
//! - Offline: SHA-256 of the canonical record, ECDSA P-256 over the hash
//!   with the local key, DER-encoded, then self-verified against the public
//!   key recovered from the sender address.
//! - Online: the five fields and the raw private key go to
//!   `signature/generate`. The remote service sees the key. This exists for
//!   test environments only and is unsuitable for production key custody.
//!
//! The caller picks the mode by picking the signer; nothing switches
//! between them automatically.

use async_trait::async_trait;
use p256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use p256::ecdsa::Signature;
use reqwest::Method;
use serde_json::Value;
use std::sync::Arc;

use crate::config::{SigningConfig, VerifyPolicy};
use crate::ledger::address::AddressCodec;
use crate::ledger::client::LedgerClient;
use crate::ledger::transaction::{SignedTransaction, UnsignedTransaction};
use crate::ledger::types::{LedgerError, LedgerResult};
use crate::ledger::wallet::Wallet;
use crate::observability::metrics;

/// Length of a raw `r || s` signature.
pub const RAW_SIGNATURE_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningMode {
    Offline,
    Online,
}

impl SigningMode {
    fn as_str(self) -> &'static str {
        match self {
            SigningMode::Offline => "offline",
            SigningMode::Online => "online",
        }
    }
}

/// Produces a signed transaction from an unsigned one.
#[async_trait]
pub trait TransactionSigner: Send + Sync {
    async fn sign(&self, tx: UnsignedTransaction) -> LedgerResult<SignedTransaction>;

    fn mode(&self) -> SigningMode;
}

/// Sign locally with `wallet`'s private key.
pub fn sign_offline(
    tx: UnsignedTransaction,
    wallet: &Wallet,
    codec: &dyn AddressCodec,
    policy: VerifyPolicy,
) -> LedgerResult<SignedTransaction> {
    let hash = tx.hash();
    let signature: Signature = wallet
        .signing_key()
        .sign_prehash(&hash)
        .map_err(|e| LedgerError::SigningFailure(e.to_string()))?;
    let der = encode_der(&signature.to_bytes())?;
    let signed = tx.into_signed(hex::encode(der));

    match verify_signed(&signed, codec) {
        Ok(()) => {
            tracing::info!(sender = %signed.unsigned().sender(), nonce = signed.unsigned().nonce(), "Transaction verify success");
            metrics::record_signature(SigningMode::Offline.as_str(), true);
        }
        Err(e) => {
            metrics::record_signature(SigningMode::Offline.as_str(), false);
            match policy {
                VerifyPolicy::Warn => {
                    tracing::warn!(sender = %signed.unsigned().sender(), error = %e, "Transaction verify failed");
                }
                VerifyPolicy::Enforce => {
                    tracing::error!(sender = %signed.unsigned().sender(), error = %e, "Transaction verify failed");
                    return Err(e);
                }
            }
        }
    }

    Ok(signed)
}

/// Ask the remote service to sign. Sends the raw private key.
pub async fn sign_online(
    client: &dyn LedgerClient,
    tx: UnsignedTransaction,
    wallet: &Wallet,
) -> LedgerResult<SignedTransaction> {
    tracing::warn!(
        sender = %tx.sender(),
        "Online signing sends the private key to the remote service; not for production keys"
    );

    let params = [
        ("sender", tx.sender().to_string()),
        ("recipient", tx.recipient().to_string()),
        ("symbol", tx.symbol().to_string()),
        ("amount", tx.amount().to_string()),
        ("nonce", tx.nonce().to_string()),
        ("privatekey", wallet.private_key_hex()),
    ];
    let result = client
        .call(Method::POST, "signature/generate", &params)
        .await?;

    let signature = result
        .get("signature")
        .and_then(Value::as_str)
        .unwrap_or_default();
    if signature.is_empty() || hex::decode(signature).is_err() {
        metrics::record_signature(SigningMode::Online.as_str(), false);
        return Err(LedgerError::UnexpectedResponse(format!(
            "signature/generate returned '{}'",
            signature
        )));
    }

    metrics::record_signature(SigningMode::Online.as_str(), true);
    Ok(tx.into_signed(signature.to_string()))
}

/// Check a signed transaction against the key its sender address encodes.
pub fn verify_signed(tx: &SignedTransaction, codec: &dyn AddressCodec) -> LedgerResult<()> {
    let sender = tx.unsigned().sender();
    let key = codec.public_key(sender)?;
    let der = hex::decode(tx.signature())
        .map_err(|_| LedgerError::SigningFailure("signature is not hex".into()))?;
    let raw = decode_der(&der)?;
    let signature = Signature::from_slice(&raw)
        .map_err(|e| LedgerError::SigningFailure(e.to_string()))?;

    key.verify_prehash(&tx.hash(), &signature)
        .map_err(|_| LedgerError::VerificationFailed(sender.to_string()))
}

/// DER-encode a raw `r || s` signature.
///
/// Integers are minimal-length with a `0x00` pad when the high bit is set,
/// so the output is 68 to 72 bytes. The common case, both halves 32 bytes
/// with the high bit clear, yields `30 44 02 20 <r> 02 20 <s>`.
pub fn encode_der(raw: &[u8]) -> LedgerResult<Vec<u8>> {
    if raw.len() != RAW_SIGNATURE_LEN {
        return Err(LedgerError::InvalidSignatureLength(raw.len()));
    }

    let r = der_integer(&raw[..32]);
    let s = der_integer(&raw[32..]);

    let mut der = Vec::with_capacity(6 + r.len() + s.len());
    der.push(0x30);
    der.push((4 + r.len() + s.len()) as u8);
    der.push(0x02);
    der.push(r.len() as u8);
    der.extend_from_slice(&r);
    der.push(0x02);
    der.push(s.len() as u8);
    der.extend_from_slice(&s);
    Ok(der)
}

/// Decode a DER signature into raw `r || s`.
///
/// Also accepts the fixed `0220` layout some signers emit for values with
/// the high bit set.
pub fn decode_der(der: &[u8]) -> LedgerResult<[u8; RAW_SIGNATURE_LEN]> {
    let malformed = || LedgerError::SigningFailure("malformed DER signature".into());

    if der.len() < 8 || der[0] != 0x30 || der[1] as usize != der.len() - 2 {
        return Err(malformed());
    }
    let (r, rest) = read_integer(&der[2..]).ok_or_else(malformed)?;
    let (s, rest) = read_integer(rest).ok_or_else(malformed)?;
    if !rest.is_empty() {
        return Err(malformed());
    }

    let mut raw = [0u8; RAW_SIGNATURE_LEN];
    raw[32 - r.len()..32].copy_from_slice(r);
    raw[64 - s.len()..].copy_from_slice(s);
    Ok(raw)
}

fn der_integer(bytes: &[u8]) -> Vec<u8> {
    let start = bytes
        .iter()
        .position(|&b| b != 0)
        .unwrap_or(bytes.len() - 1);
    let trimmed = &bytes[start..];

    let mut out = Vec::with_capacity(trimmed.len() + 1);
    if trimmed[0] & 0x80 != 0 {
        out.push(0x00);
    }
    out.extend_from_slice(trimmed);
    out
}

/// Returns the integer's magnitude (leading zeros stripped) and the rest.
fn read_integer(input: &[u8]) -> Option<(&[u8], &[u8])> {
    if input.len() < 2 || input[0] != 0x02 {
        return None;
    }
    let len = input[1] as usize;
    if len == 0 || len > 33 || input.len() < 2 + len {
        return None;
    }
    let value = &input[2..2 + len];
    let start = value.iter().position(|&b| b != 0).unwrap_or(value.len());
    let magnitude = &value[start..];
    if magnitude.len() > 32 {
        return None;
    }
    Some((magnitude, &input[2 + len..]))
}

/// Signs locally; the private key never leaves the process.
pub struct OfflineSigner {
    wallet: Wallet,
    codec: Arc<dyn AddressCodec>,
    policy: VerifyPolicy,
}

impl OfflineSigner {
    pub fn new(wallet: Wallet, codec: Arc<dyn AddressCodec>, policy: VerifyPolicy) -> Self {
        Self {
            wallet,
            codec,
            policy,
        }
    }

    pub fn wallet(&self) -> &Wallet {
        &self.wallet
    }
}

#[async_trait]
impl TransactionSigner for OfflineSigner {
    async fn sign(&self, tx: UnsignedTransaction) -> LedgerResult<SignedTransaction> {
        sign_offline(tx, &self.wallet, self.codec.as_ref(), self.policy)
    }

    fn mode(&self) -> SigningMode {
        SigningMode::Offline
    }
}

/// Delegates signing to the remote service. See the module docs.
pub struct OnlineSigner {
    client: Arc<dyn LedgerClient>,
    wallet: Wallet,
    codec: Arc<dyn AddressCodec>,
}

impl OnlineSigner {
    /// Fails unless `signing.allow_online` is set.
    pub fn new(
        client: Arc<dyn LedgerClient>,
        wallet: Wallet,
        codec: Arc<dyn AddressCodec>,
        config: &SigningConfig,
    ) -> LedgerResult<Self> {
        if !config.allow_online {
            return Err(LedgerError::OnlineSigningDisabled);
        }
        Ok(Self {
            client,
            wallet,
            codec,
        })
    }
}

#[async_trait]
impl TransactionSigner for OnlineSigner {
    async fn sign(&self, tx: UnsignedTransaction) -> LedgerResult<SignedTransaction> {
        let signed = sign_online(self.client.as_ref(), tx, &self.wallet).await?;
        // Diagnostic only: the remote service is the authority here.
        if let Err(e) = verify_signed(&signed, self.codec.as_ref()) {
            tracing::warn!(sender = %signed.unsigned().sender(), error = %e, "Remote signature did not verify locally");
        }
        Ok(signed)
    }

    fn mode(&self) -> SigningMode {
        SigningMode::Online
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::address::P256AddressCodec;
    use crate::ledger::testing::MockLedger;
    use serde_json::json;
    use sha2::{Digest, Sha256};

    const RECIPIENT: &str = "033e379d467f0cb36b30b068f5fd9c81bd4ae7d2dbb93a5e08bad7cf2671eb6f46";

    fn unsigned_from(wallet: &Wallet, amount: &str, nonce: u64) -> UnsignedTransaction {
        UnsignedTransaction::new(wallet.address(), RECIPIENT, "XIF", amount, nonce).unwrap()
    }

    #[test]
    fn test_der_fixed_layout() {
        let mut raw = [0x11u8; 64];
        raw[32..].copy_from_slice(&[0x22; 32]);
        let der = encode_der(&raw).unwrap();

        assert_eq!(der.len(), 70);
        assert_eq!(&der[..4], &[0x30, 0x44, 0x02, 0x20]);
        assert_eq!(&der[4..36], &raw[..32]);
        assert_eq!(&der[36..38], &[0x02, 0x20]);
        assert_eq!(&der[38..], &raw[32..]);
    }

    #[test]
    fn test_der_high_bit_and_leading_zeros() {
        let mut raw = [0x80u8; 64];
        raw[32..63].copy_from_slice(&[0x00; 31]);
        raw[63] = 0x05;
        let der = encode_der(&raw).unwrap();

        assert_eq!(&der[..5], &[0x30, 0x26, 0x02, 0x21, 0x00]);
        assert_eq!(&der[5..37], &raw[..32]);
        assert_eq!(&der[37..], &[0x02, 0x01, 0x05]);
        assert_eq!(der.len(), 40);
        assert_eq!(decode_der(&der).unwrap(), raw);
    }

    #[test]
    fn test_der_rejects_wrong_length() {
        for len in [0, 32, 63, 65, 72] {
            assert!(matches!(
                encode_der(&vec![1u8; len]),
                Err(LedgerError::InvalidSignatureLength(n)) if n == len
            ));
        }
    }

    #[test]
    fn test_decode_fixed_layout_with_high_bit() {
        // 30440220 || r || 0220 || s, even though r has its high bit set.
        let mut der = vec![0x30, 0x44, 0x02, 0x20];
        der.extend_from_slice(&[0xf0; 32]);
        der.extend_from_slice(&[0x02, 0x20]);
        der.extend_from_slice(&[0x0f; 32]);

        let raw = decode_der(&der).unwrap();
        assert_eq!(&raw[..32], &[0xf0; 32]);
        assert_eq!(&raw[32..], &[0x0f; 32]);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_der(&[]).is_err());
        assert!(decode_der(&[0x30, 0x02, 0x02, 0x00]).is_err());
        let mut der = encode_der(&[0x11; 64]).unwrap();
        der.push(0x00);
        assert!(decode_der(&der).is_err());
    }

    #[test]
    fn test_known_answer_rfc6979() {
        // RFC 6979 A.2.5, P-256 with SHA-256, message "sample".
        let wallet = Wallet::from_private_key(
            "c9afa9d845ba75166b5c215767b1d6934e50c3db36e89b127b8a622b120f6721",
        )
        .unwrap();
        let hash = Sha256::digest(b"sample");
        let signature: Signature = wallet.signing_key().sign_prehash(&hash).unwrap();
        let der = hex::encode(encode_der(&signature.to_bytes()).unwrap());

        assert_eq!(
            der,
            "3046022100efd48b2aacb6a8fd1140dd9cd45e81d69d2c877b56aaf991c34d0ea84eaf3716\
             022100f7cb1c942d657c41d436c7a1b6e29f65f3e900dbb9aff4064dc4ab2f843acda8"
        );
    }

    #[test]
    fn test_sign_and_verify_randomized() {
        let codec = P256AddressCodec::default();
        for i in 0..100u64 {
            let wallet = Wallet::generate();
            let tx = unsigned_from(&wallet, &format!("{}.{}", i, i % 7), i);
            let signed = sign_offline(tx, &wallet, &codec, VerifyPolicy::Enforce).unwrap();

            assert!(verify_signed(&signed, &codec).is_ok());
            let der = hex::decode(signed.signature()).unwrap();
            assert!(Signature::from_der(&der).is_ok());
        }
    }

    #[test]
    fn test_resign_is_deterministic() {
        let codec = P256AddressCodec::default();
        let wallet = Wallet::generate();
        let first = sign_offline(unsigned_from(&wallet, "0.1", 5), &wallet, &codec, VerifyPolicy::Enforce).unwrap();
        let second = sign_offline(first.clone().into_unsigned(), &wallet, &codec, VerifyPolicy::Enforce).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_wrong_key_policy() {
        let codec = P256AddressCodec::default();
        let owner = Wallet::generate();
        let intruder = Wallet::generate();
        let tx = unsigned_from(&owner, "1", 1);

        assert!(matches!(
            sign_offline(tx.clone(), &intruder, &codec, VerifyPolicy::Enforce),
            Err(LedgerError::VerificationFailed(_))
        ));

        let signed = sign_offline(tx, &intruder, &codec, VerifyPolicy::Warn).unwrap();
        assert!(verify_signed(&signed, &codec).is_err());
    }

    #[test]
    fn test_tampered_field_fails_verification() {
        let codec = P256AddressCodec::default();
        let wallet = Wallet::generate();
        let signed = sign_offline(unsigned_from(&wallet, "0.1", 5), &wallet, &codec, VerifyPolicy::Enforce).unwrap();

        let forged = unsigned_from(&wallet, "100", 5).into_signed(signed.signature().to_string());
        assert!(matches!(
            verify_signed(&forged, &codec),
            Err(LedgerError::VerificationFailed(_))
        ));
    }

    fn signing_service() -> MockLedger {
        MockLedger::new(|_, path, params| {
            assert_eq!(path, "signature/generate");
            let get = |k: &str| {
                params
                    .iter()
                    .find(|(key, _)| key == k)
                    .map(|(_, v)| v.clone())
                    .unwrap_or_default()
            };
            let wallet = Wallet::from_private_key(&get("privatekey")).unwrap();
            let tx = UnsignedTransaction::new(
                get("sender"),
                get("recipient"),
                get("symbol"),
                get("amount"),
                get("nonce").parse().unwrap(),
            )
            .unwrap();
            let codec = P256AddressCodec::default();
            let signed = sign_offline(tx, &wallet, &codec, VerifyPolicy::Enforce).unwrap();
            json!({ "signature": signed.signature() })
        })
    }

    #[tokio::test]
    async fn test_online_signing() {
        let wallet = Wallet::generate();
        let codec: Arc<dyn AddressCodec> = Arc::new(P256AddressCodec::default());
        let config = SigningConfig {
            allow_online: true,
            ..SigningConfig::default()
        };
        let signer = OnlineSigner::new(Arc::new(signing_service()), wallet.clone(), codec.clone(), &config).unwrap();
        assert_eq!(signer.mode(), SigningMode::Online);

        let signed = signer.sign(unsigned_from(&wallet, "0.01", 3)).await.unwrap();
        assert!(verify_signed(&signed, codec.as_ref()).is_ok());
    }

    #[tokio::test]
    async fn test_online_signing_disabled_by_default() {
        let result = OnlineSigner::new(
            Arc::new(signing_service()),
            Wallet::generate(),
            Arc::new(P256AddressCodec::default()),
            &SigningConfig::default(),
        );
        assert!(matches!(result, Err(LedgerError::OnlineSigningDisabled)));
    }

    #[tokio::test]
    async fn test_online_signing_empty_signature() {
        let ledger = MockLedger::new(|_, _, _| json!({ "signature": "" }));
        let wallet = Wallet::generate();
        let result = sign_online(&ledger, unsigned_from(&wallet, "1", 1), &wallet).await;
        assert!(matches!(result, Err(LedgerError::UnexpectedResponse(_))));
    }

    #[tokio::test]
    async fn test_offline_signer_trait() {
        let wallet = Wallet::generate();
        let signer = OfflineSigner::new(wallet.clone(), Arc::new(P256AddressCodec::default()), VerifyPolicy::Enforce);
        assert_eq!(signer.mode(), SigningMode::Offline);
        let signed = signer.sign(unsigned_from(&wallet, "2.5", 9)).await.unwrap();
        assert_eq!(signed.unsigned().nonce(), 9);
    }
}
