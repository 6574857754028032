//! Address extension-parameter store backing the nonce cache.

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::ledger::types::{LedgerError, LedgerResult};

/// Narrow key-value contract the nonce reconciler depends on.
#[async_trait]
pub trait NonceStore: Send + Sync {
    /// Read `key` for `address`; `None` when absent.
    async fn get_address_ext_param(&self, address: &str, key: &str) -> LedgerResult<Option<Value>>;

    /// Write `key` for `address`.
    async fn set_address_ext_param(&self, address: &str, key: &str, value: Value) -> LedgerResult<()>;
}

/// A thread-safe extension-parameter store, optionally persisted as JSON.
#[derive(Clone, Default)]
pub struct NonceCache {
    /// address -> (key -> value)
    inner: Arc<DashMap<String, BTreeMap<String, Value>>>,
    persistence_path: Option<PathBuf>,
    /// Serializes writers of the backing file.
    save_lock: Arc<Mutex<()>>,
}

impl NonceCache {
    /// Create a new empty cache.
    pub fn new(persistence_path: Option<PathBuf>) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            persistence_path,
            save_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Load from file if it exists; later writes go back to the same file.
    pub fn load_from_file(path: impl AsRef<Path>) -> LedgerResult<Self> {
        let path = path.as_ref();
        let cache = Self::new(Some(path.to_path_buf()));
        if path.exists() {
            let file = File::open(path).map_err(store_error)?;
            let map: HashMap<String, BTreeMap<String, Value>> =
                serde_json::from_reader(BufReader::new(file)).map_err(store_error)?;

            for (address, params) in map {
                cache.inner.insert(address, params);
            }
            tracing::info!(
                path = %path.display(),
                addresses = cache.inner.len(),
                "Loaded nonce cache"
            );
        }
        Ok(cache)
    }

    /// Save to file when a persistence path is set.
    pub fn save_to_file(&self) -> LedgerResult<()> {
        let Some(path) = &self.persistence_path else {
            return Ok(());
        };

        let _guard = self
            .save_lock
            .lock()
            .map_err(|_| LedgerError::NonceStore("nonce cache save lock poisoned".into()))?;

        let map: HashMap<_, _> = self
            .inner
            .iter()
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect();

        // Written beside the target, then renamed into place.
        let tmp = path.with_extension("tmp");
        let file = File::create(&tmp).map_err(store_error)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &map).map_err(store_error)?;
        writer.flush().map_err(store_error)?;
        std::fs::rename(&tmp, path).map_err(store_error)?;

        tracing::debug!(path = %path.display(), addresses = map.len(), "Saved nonce cache");
        Ok(())
    }

    /// Number of addresses with at least one entry.
    pub fn count(&self) -> usize {
        self.inner.len()
    }
}

#[async_trait]
impl NonceStore for NonceCache {
    async fn get_address_ext_param(&self, address: &str, key: &str) -> LedgerResult<Option<Value>> {
        Ok(self
            .inner
            .get(address)
            .and_then(|params| params.get(key).cloned()))
    }

    async fn set_address_ext_param(&self, address: &str, key: &str, value: Value) -> LedgerResult<()> {
        self.inner
            .entry(address.to_string())
            .or_default()
            .insert(key.to_string(), value);
        self.save_to_file()
    }
}

fn store_error(e: impl std::fmt::Display) -> LedgerError {
    LedgerError::NonceStore(e.to_string())
}
