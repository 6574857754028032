//! In-process `LedgerClient` for unit tests.

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Value};
use std::sync::Mutex;

use crate::ledger::client::{check_error, LedgerClient, Params};
use crate::ledger::types::LedgerResult;

type Handler = dyn Fn(&Method, &str, &[(String, String)]) -> Value + Send + Sync;

/// A recorded call: method, path, params.
pub type RecordedCall = (Method, String, Vec<(String, String)>);

pub struct MockLedger {
    handler: Box<Handler>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockLedger {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&Method, &str, &[(String, String)]) -> Value + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Answers `coin/{address}` with the given chain nonce and echoes a
    /// transaction id for broadcasts.
    pub fn with_account(address: &'static str, nonce: u64) -> Self {
        Self::new(move |method, path, params| {
            if *method == Method::GET && path == format!("coin/{}", address) {
                json!({
                    "account": {
                        "address": address,
                        "publickey": address,
                        "symbol": "XIF",
                        "amount": "100",
                        "nonce": nonce,
                        "type": "USER"
                    }
                })
            } else if path == "coin/sendraw" {
                let nonce = params
                    .iter()
                    .find(|(k, _)| k == "nonce")
                    .map(|(_, v)| v.clone())
                    .unwrap_or_default();
                json!({ "txn": format!("tx-{}", nonce) })
            } else {
                json!({ "error": { "message": format!("no route for {}", path) } })
            }
        })
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn call(&self, method: Method, path: &str, params: &Params<'_>) -> LedgerResult<Value> {
        let params: Vec<(String, String)> = params
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        let response = (self.handler)(&method, path, &params);
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((method, path.to_string(), params));
        }
        check_error(&response)?;
        Ok(response)
    }
}
