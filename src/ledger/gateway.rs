//! Broadcast of signed transactions.

use reqwest::Method;
use std::sync::Arc;

use crate::ledger::client::LedgerClient;
use crate::ledger::transaction::{SignedTransaction, SubmittedTransaction};
use crate::ledger::types::{json_str, LedgerError, LedgerResult};
use crate::observability::metrics;

/// Submits signed transactions to `coin/sendraw`.
#[derive(Clone)]
pub struct SubmissionGateway {
    client: Arc<dyn LedgerClient>,
}

impl SubmissionGateway {
    pub fn new(client: Arc<dyn LedgerClient>) -> Self {
        Self { client }
    }

    /// Broadcast `tx` and return the ledger-assigned transaction id.
    ///
    /// Never retried here: a resend after an ambiguous failure could land
    /// twice. The nonce makes a duplicate visible on chain, not harmless.
    pub async fn submit(&self, tx: &SignedTransaction) -> LedgerResult<SubmittedTransaction> {
        let unsigned = tx.unsigned();
        let params = [
            ("sender", unsigned.sender().to_string()),
            ("recipient", unsigned.recipient().to_string()),
            ("symbol", unsigned.symbol().to_string()),
            ("amount", unsigned.amount().to_string()),
            ("nonce", unsigned.nonce().to_string()),
            ("signature", tx.signature().to_string()),
        ];

        let result = match self.client.call(Method::POST, "coin/sendraw", &params).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(sender = %unsigned.sender(), nonce = unsigned.nonce(), error = %e, "Broadcast failed");
                metrics::record_submission(false);
                return Err(e);
            }
        };

        let txid = json_str(&result, "txn");
        if txid.is_empty() {
            metrics::record_submission(false);
            return Err(LedgerError::UnexpectedResponse(
                "coin/sendraw returned no transaction id".into(),
            ));
        }

        tracing::info!(
            sender = %unsigned.sender(),
            recipient = %unsigned.recipient(),
            nonce = unsigned.nonce(),
            txid = %txid,
            "Transaction broadcast"
        );
        metrics::record_submission(true);

        Ok(SubmittedTransaction {
            txid,
            transaction: tx.clone(),
        })
    }
}
