//! Build, sign and broadcast against an in-process ledger service.

use p256::ecdsa::signature::Verifier;
use p256::ecdsa::{Signature, VerifyingKey};
use serde_json::json;
use std::sync::{Arc, Mutex};
use xpay_adapter::ledger::{LedgerError, TransferRequest};
use xpay_adapter::{Wallet, XifAdapter};

mod common;
use common::{MockRequest, Reply};

// RFC 6979 A.2.5 P-256 key.
const KEY: &str = "c9afa9d845ba75166b5c215767b1d6934e50c3db36e89b127b8a622b120f6721";
const RECIPIENT: &str = "033e379d467f0cb36b30b068f5fd9c81bd4ae7d2dbb93a5e08bad7cf2671eb6f46";

/// Ledger service that reports `chain_nonce` for every account and accepts
/// broadcasts whose signature verifies over the concatenated fields.
async fn start_ledger(chain_nonce: u64) -> (std::net::SocketAddr, Arc<Mutex<Vec<MockRequest>>>) {
    let broadcasts = Arc::new(Mutex::new(Vec::new()));
    let log = broadcasts.clone();

    let addr = common::start_ledger_backend(move |req| {
        let log = log.clone();
        async move {
            let path = req.path.trim_start_matches("api/");
            if path == "coin/sendraw" {
                let reply = match verify_broadcast(&req) {
                    Ok(()) => Reply::json(json!({ "txn": format!("txid-{}", req.param("nonce").unwrap_or_default()) })),
                    Err(message) => Reply::json(json!({ "error": { "message": message } })),
                };
                log.lock().unwrap().push(req);
                reply
            } else if let Some(address) = path.strip_prefix("coin/") {
                Reply::json(json!({
                    "account": {
                        "address": address,
                        "publickey": address,
                        "symbol": "XIF",
                        "amount": "1000",
                        "nonce": chain_nonce,
                        "type": "USER"
                    }
                }))
            } else {
                Reply::json(json!({ "error": { "message": "no route" } }))
            }
        }
    })
    .await;

    (addr, broadcasts)
}

fn verify_broadcast(req: &MockRequest) -> Result<(), String> {
    let field = |name: &str| req.param(name).unwrap_or_default().to_string();
    let message = format!(
        "{}{}{}{}{}",
        field("sender"),
        field("recipient"),
        field("symbol"),
        field("amount"),
        field("nonce")
    );

    let key_bytes = hex::decode(field("sender")).map_err(|e| e.to_string())?;
    let key = VerifyingKey::from_sec1_bytes(&key_bytes).map_err(|e| e.to_string())?;
    let der = hex::decode(field("signature")).map_err(|e| e.to_string())?;
    let signature = Signature::from_der(&der).map_err(|e| e.to_string())?;
    key.verify(message.as_bytes(), &signature)
        .map_err(|_| "signature check failed".to_string())
}

#[tokio::test]
async fn test_offline_transfer_round_trip() {
    let (addr, broadcasts) = start_ledger(4).await;
    let adapter = XifAdapter::from_config(common::ledger_config(addr)).unwrap();
    let wallet = Wallet::from_private_key(KEY).unwrap();

    let unsigned = adapter
        .build_transfer(TransferRequest::new(wallet.address(), RECIPIENT, "XIF", "0.5"))
        .await
        .unwrap();
    assert_eq!(unsigned.nonce(), 5);

    let signed = adapter.sign_offline(unsigned, &wallet).unwrap();
    let submitted = adapter.submit(&signed).await.unwrap();
    assert_eq!(submitted.txid, "txid-5");

    let broadcasts = broadcasts.lock().unwrap();
    assert_eq!(broadcasts.len(), 1);
    assert_eq!(broadcasts[0].method, "POST");
    assert_eq!(broadcasts[0].param("amount"), Some("0.5"));
    assert_eq!(broadcasts[0].param("signature"), Some(signed.signature()));
}

#[tokio::test]
async fn test_consecutive_transfers_advance_nonce() {
    let (addr, _) = start_ledger(4).await;
    let adapter = XifAdapter::from_config(common::ledger_config(addr)).unwrap();
    let wallet = Wallet::from_private_key(KEY).unwrap();

    let first = adapter.transfer_offline(&wallet, RECIPIENT, "1", None).await.unwrap();
    let second = adapter.transfer_offline(&wallet, RECIPIENT, "2", None).await.unwrap();
    assert_eq!(first.txid, "txid-5");
    assert_eq!(second.txid, "txid-6");
}

#[tokio::test]
async fn test_nonce_cache_survives_restart() {
    let (addr, _) = start_ledger(4).await;
    let dir = tempfile::tempdir().unwrap();
    let mut config = common::ledger_config(addr);
    config.nonce.cache_path = Some(dir.path().join("nonces.json").display().to_string());
    let wallet = Wallet::from_private_key(KEY).unwrap();

    let adapter = XifAdapter::from_config(config.clone()).unwrap();
    adapter.transfer_offline(&wallet, RECIPIENT, "1", None).await.unwrap();
    drop(adapter);

    let restarted = XifAdapter::from_config(config).unwrap();
    let submitted = restarted.transfer_offline(&wallet, RECIPIENT, "1", None).await.unwrap();
    assert_eq!(submitted.transaction.unsigned().nonce(), 6);
}

#[tokio::test]
async fn test_rejected_broadcast_surfaces_remote_error() {
    let (addr, broadcasts) = start_ledger(0).await;
    let mut config = common::ledger_config(addr);
    config.signing.verify = xpay_adapter::config::VerifyPolicy::Warn;
    let adapter = XifAdapter::from_config(config).unwrap();
    let owner = Wallet::from_private_key(KEY).unwrap();

    // Signed with a key that does not match the sender address.
    let unsigned = adapter
        .build_transfer(TransferRequest::new(owner.address(), RECIPIENT, "XIF", "3"))
        .await
        .unwrap();
    let signed = adapter.sign_offline(unsigned, &Wallet::generate()).unwrap();

    match adapter.submit(&signed).await {
        Err(LedgerError::RemoteLedger { message }) => assert_eq!(message, "signature check failed"),
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(broadcasts.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_invalid_requests_never_reach_the_service() {
    let (addr, broadcasts) = start_ledger(0).await;
    let adapter = XifAdapter::from_config(common::ledger_config(addr)).unwrap();
    let wallet = Wallet::from_private_key(KEY).unwrap();

    for (recipient, symbol, amount) in [
        ("not-hex", "XIF", "1"),
        (RECIPIENT, "XIF2", "1"),
        (RECIPIENT, "XIF", "-1"),
        (RECIPIENT, "XIF", "1e5"),
        (RECIPIENT, "", "1"),
    ] {
        let result = adapter
            .build_transfer(TransferRequest::new(wallet.address(), recipient, symbol, amount))
            .await;
        assert!(result.is_err(), "{} {} {} should be rejected", recipient, symbol, amount);
    }
    assert!(broadcasts.lock().unwrap().is_empty());
}
