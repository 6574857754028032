//! Nonce reconciliation between the local cache and the chain.
//!
//! The cache holds the last sequence number this process used for an
//! address; the chain reports the last one it has seen. Whichever is larger
//! wins, and the next transaction uses that value plus one.
//!
//! `next_nonce` runs "read cache, read chain, choose, persist" as one
//! critical section per `(address, symbol)`, so concurrent builders in this
//! process never pick the same nonce. Addresses are lowercased before they
//! key a lock or a cache entry. A lock entry lives only while some caller
//! holds or waits on it.

use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::NonceConfig;
use crate::ledger::address::canonical_address;
use crate::ledger::cache::NonceStore;
use crate::ledger::client::LedgerClient;
use crate::ledger::types::{Account, LedgerError, LedgerResult};
use crate::observability::metrics;

/// Chooses transaction sequence numbers for accounts.
pub struct NonceReconciler {
    client: Arc<dyn LedgerClient>,
    store: Arc<dyn NonceStore>,
    /// Ledger symbol used in the cache key (`"<symbol>-nonce"`).
    symbol: String,
    persist_on_build: bool,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl NonceReconciler {
    pub fn new(
        client: Arc<dyn LedgerClient>,
        store: Arc<dyn NonceStore>,
        symbol: impl Into<String>,
        config: &NonceConfig,
    ) -> Self {
        Self {
            client,
            store,
            symbol: symbol.into(),
            persist_on_build: config.persist_on_build,
            locks: DashMap::new(),
        }
    }

    /// Cache key under which nonces for this ledger are stored.
    pub fn cache_key(&self) -> String {
        format!("{}-nonce", self.symbol)
    }

    /// Last sequence number this process recorded for `address`; 0 if none.
    pub async fn local_nonce(&self, address: &str) -> LedgerResult<u64> {
        let address = canonical_address(address);
        let key = self.cache_key();
        let stored = self.store.get_address_ext_param(&address, &key).await?;
        match stored {
            None | Some(Value::Null) => Ok(0),
            Some(value) => coerce_nonce(&format!("{}/{}", address, key), &value),
        }
    }

    /// Pick the larger of the cached and chain-reported nonce.
    pub async fn resolve(&self, account: &Account) -> LedgerResult<u64> {
        let address = account.cache_key();
        let local = self.local_nonce(address).await?;
        let chain = account.nonce;

        let nonce = if local > chain {
            tracing::debug!(address = %address, local, chain, "Using cached nonce");
            metrics::record_nonce_resolution("local");
            local
        } else {
            tracing::debug!(address = %address, local, chain, "Using chain nonce");
            metrics::record_nonce_resolution("chain");
            chain
        };
        Ok(nonce)
    }

    /// Fetch the account from the ledger, then [`resolve`](Self::resolve).
    pub async fn resolve_address(&self, address: &str) -> LedgerResult<u64> {
        let account = self.client.get_account(&canonical_address(address)).await?;
        self.resolve(&account).await
    }

    /// Record `nonce` as used for `address`. Failures are logged, not returned:
    /// the chain value is always an acceptable fallback.
    pub async fn update_address_nonce(&self, address: &str, nonce: u64) {
        let address = canonical_address(address);
        let key = self.cache_key();
        if let Err(e) = self
            .store
            .set_address_ext_param(&address, &key, Value::from(nonce))
            .await
        {
            tracing::error!(address = %address, nonce, error = %e, "Failed to persist nonce");
        }
    }

    /// Choose the nonce for the next transaction from `address`.
    ///
    /// Holds the per-account lock across the chain lookup and, when
    /// `persist_on_build` is set, the cache write.
    pub async fn next_nonce(&self, address: &str) -> LedgerResult<u64> {
        let address = canonical_address(address);
        let lock_key = format!("{}/{}", address, self.symbol);
        let lock = self.locks.entry(lock_key.clone()).or_default().clone();

        let result = {
            let _guard = lock.lock().await;
            self.reserve_next(&address).await
        };

        drop(lock);
        self.locks
            .remove_if(&lock_key, |_, lock| Arc::strong_count(lock) == 1);
        result
    }

    async fn reserve_next(&self, address: &str) -> LedgerResult<u64> {
        let account = self.client.get_account(address).await?;
        let resolved = self.resolve(&account).await?;
        let next = resolved.checked_add(1).ok_or_else(|| {
            LedgerError::InvalidTransaction(format!("nonce overflow for {}", address))
        })?;

        if self.persist_on_build {
            self.update_address_nonce(account.cache_key(), next).await;
        }

        tracing::debug!(address = %address, nonce = next, "Nonce reserved");
        Ok(next)
    }
}

impl std::fmt::Debug for NonceReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NonceReconciler")
            .field("symbol", &self.symbol)
            .field("persist_on_build", &self.persist_on_build)
            .finish()
    }
}

/// Interpret a stored cache value as a nonce.
fn coerce_nonce(key: &str, value: &Value) -> LedgerResult<u64> {
    let parsed = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| {
        tracing::error!(key = %key, value = %value, "Corrupt nonce cache entry");
        LedgerError::CorruptNonceCache {
            key: key.to_string(),
            value: value.to_string(),
        }
    })
}
