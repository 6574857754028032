//! Remote ledger client.
//!
//! # Responsibilities
//! - Send requests to `server_api + path` over HTTP
//! - Turn `{"error": {"message": ...}}` envelopes into `RemoteLedgerError`
//! - Retry idempotent calls on transport failures
//! - Map the query endpoints onto typed records

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use std::time::Duration;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::{LedgerConfig, RetryConfig};
use crate::ledger::types::{Account, Block, LedgerError, LedgerResult, Transaction};
use crate::observability::metrics;
use crate::resilience::retries::{is_retryable, RetryPolicy};

/// Request parameters: query string for GET, form body otherwise.
pub type Params<'a> = [(&'a str, String)];

/// Transport to the remote ledger service.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Perform a request and return the decoded JSON body.
    async fn call(&self, method: Method, path: &str, params: &Params<'_>) -> LedgerResult<Value>;

    /// `GET coin/{address}`.
    async fn get_account(&self, address: &str) -> LedgerResult<Account> {
        let result = self
            .call(Method::GET, &format!("coin/{}", address), &[])
            .await?;
        Account::from_response(&result)
    }

    /// Balance of `address` as a decimal string.
    async fn get_balance(&self, address: &str) -> LedgerResult<String> {
        Ok(self.get_account(address).await?.balance)
    }

    /// `POST coin/new`: ask the service to create a wallet for `symbol`.
    async fn new_wallet(&self, symbol: &str) -> LedgerResult<Value> {
        self.call(Method::POST, "coin/new", &[("symbol", symbol.to_string())])
            .await
    }

    /// `POST coin/inform`: announce a newly derived address.
    async fn inform_wallet(&self, address: &str, symbol: &str) -> LedgerResult<()> {
        let params = [
            ("publickey", address.to_string()),
            ("symbol", symbol.to_string()),
        ];
        self.call(Method::POST, "coin/inform", &params).await?;
        Ok(())
    }

    /// `GET coin/blocks/latest`.
    async fn get_latest_block(&self) -> LedgerResult<Block> {
        let result = self.call(Method::GET, "coin/blocks/latest", &[]).await?;
        Block::from_response(&result)
    }

    /// `GET coin/blocks/{height}`.
    async fn get_block(&self, height: u64) -> LedgerResult<Block> {
        let result = self
            .call(Method::GET, &format!("coin/blocks/{}", height), &[])
            .await?;
        Block::from_response(&result)
    }

    /// `GET coin/transaction/{hash}`.
    async fn get_transaction(&self, hash: &str) -> LedgerResult<Transaction> {
        let result = self
            .call(Method::GET, &format!("coin/transaction/{}", hash), &[])
            .await?;
        Transaction::from_response(&result)
    }
}

/// HTTP implementation of [`LedgerClient`].
#[derive(Clone)]
pub struct RemoteLedgerClient {
    /// `None` when no base URL was configured.
    http: Option<reqwest::Client>,
    server_api: String,
    debug: bool,
    retry: RetryPolicy,
}

impl RemoteLedgerClient {
    /// Create a new client.
    ///
    /// An empty `server_api` yields a client whose every call fails with
    /// `TransportUnavailable`.
    pub fn new(config: &LedgerConfig, retries: &RetryConfig) -> LedgerResult<Self> {
        let server_api = config.server_api.trim().trim_end_matches('/').to_string();

        let http = if server_api.is_empty() {
            tracing::warn!("Ledger client created without a server API url");
            None
        } else {
            let client = reqwest::Client::builder()
                .timeout(Duration::from_secs(config.request_timeout_secs))
                .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
                .build()?;
            tracing::info!(server_api = %server_api, "Ledger client initialized");
            Some(client)
        };

        Ok(Self {
            http,
            server_api,
            debug: config.debug,
            retry: RetryPolicy::from_config(retries),
        })
    }

    /// Base URL with trailing slashes removed.
    pub fn server_api(&self) -> &str {
        &self.server_api
    }

    async fn send_once(
        &self,
        http: &reqwest::Client,
        method: &Method,
        url: &str,
        params: &Params<'_>,
        request_id: &str,
    ) -> Result<(reqwest::StatusCode, String), reqwest::Error> {
        let mut request = http
            .request(method.clone(), url)
            .header("X-Request-Id", request_id);
        if !params.is_empty() {
            request = if *method == Method::GET {
                request.query(params)
            } else {
                request.form(params)
            };
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        Ok((status, body))
    }
}

#[async_trait]
impl LedgerClient for RemoteLedgerClient {
    async fn call(&self, method: Method, path: &str, params: &Params<'_>) -> LedgerResult<Value> {
        let http = self.http.as_ref().ok_or(LedgerError::TransportUnavailable)?;
        let url = join_url(&self.server_api, path);
        let request_id = Uuid::new_v4().to_string();
        let span = tracing::debug_span!("ledger_call", %method, path = %path, request_id = %request_id);

        async {
            let attempts = self.retry.attempts_for(&method);
            let mut attempt = 0;
            let (status, body) = loop {
                attempt += 1;
                match self.send_once(http, &method, &url, params, &request_id).await {
                    Ok(reply) => break reply,
                    Err(e) if attempt < attempts && is_retryable(&e) => {
                        let delay = self.retry.delay(attempt);
                        tracing::warn!(attempt, error = %e, delay_ms = delay.as_millis() as u64, "Ledger request failed, retrying");
                        tokio::time::sleep(delay).await;
                    }
                    Err(e) => {
                        metrics::record_remote_call(method.as_str(), false);
                        return Err(LedgerError::Transport(e));
                    }
                }
            };

            tracing::debug!(status = %status, "Request API completed");
            if self.debug {
                tracing::debug!(body = %body, "Raw ledger response");
            }

            let result = parse_response(&body);
            metrics::record_remote_call(method.as_str(), result.is_ok());
            result
        }
        .instrument(span)
        .await
    }
}

impl std::fmt::Debug for RemoteLedgerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteLedgerClient")
            .field("server_api", &self.server_api)
            .field("configured", &self.http.is_some())
            .field("debug", &self.debug)
            .finish()
    }
}

/// Join base and path with exactly one slash between them.
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Decode a response body, surfacing `error.message` envelopes.
pub fn parse_response(body: &str) -> LedgerResult<Value> {
    let value: Value = serde_json::from_str(body).map_err(|e| {
        LedgerError::UnexpectedResponse(format!("response is not JSON: {}", e))
    })?;
    check_error(&value)?;
    Ok(value)
}

/// `{"error":{"message":"nonce check failed"}}` → `RemoteLedger`.
pub fn check_error(value: &Value) -> LedgerResult<()> {
    match value.get("error") {
        Some(Value::Object(error)) => {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            Err(LedgerError::RemoteLedger { message })
        }
        _ => Ok(()),
    }
}
