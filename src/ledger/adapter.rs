//! Per-ledger capability bundle.
//!
//! `XifAdapter` wires the codec, remote client, nonce reconciler,
//! transaction builder and submission gateway for one ledger. Callers
//! holding a single value get the whole account lifecycle: derive an
//! address, build, sign, broadcast, query.

use serde_json::Value;
use std::sync::Arc;

use crate::config::AdapterConfig;
use crate::ledger::address::{AddressCodec, CodecConfig, P256AddressCodec};
use crate::ledger::cache::{NonceCache, NonceStore};
use crate::ledger::client::{LedgerClient, RemoteLedgerClient};
use crate::ledger::gateway::SubmissionGateway;
use crate::ledger::nonce::NonceReconciler;
use crate::ledger::signer::{self, OnlineSigner, TransactionSigner};
use crate::ledger::transaction::{
    SignedTransaction, SubmittedTransaction, TransferRequest, TxBuilder, UnsignedTransaction,
};
use crate::ledger::types::{Account, Block, LedgerResult, Transaction};
use crate::ledger::wallet::Wallet;

pub struct XifAdapter {
    config: AdapterConfig,
    client: Arc<dyn LedgerClient>,
    codec: Arc<dyn AddressCodec>,
    builder: TxBuilder,
    gateway: SubmissionGateway,
}

impl XifAdapter {
    /// Assemble an adapter around an existing client and nonce store.
    pub fn new(
        config: AdapterConfig,
        client: Arc<dyn LedgerClient>,
        store: Arc<dyn NonceStore>,
    ) -> Self {
        let codec: Arc<dyn AddressCodec> = Arc::new(P256AddressCodec::new(CodecConfig {
            curve: config.ledger.curve,
        }));
        let reconciler = Arc::new(NonceReconciler::new(
            client.clone(),
            store,
            config.ledger.symbol.clone(),
            &config.nonce,
        ));
        let builder = TxBuilder::new(reconciler, codec.clone());
        let gateway = SubmissionGateway::new(client.clone());

        Self {
            config,
            client,
            codec,
            builder,
            gateway,
        }
    }

    /// Build the HTTP client and nonce cache described by `config`.
    pub fn from_config(config: AdapterConfig) -> LedgerResult<Self> {
        let client = RemoteLedgerClient::new(&config.ledger, &config.retries)?;
        let cache = match &config.nonce.cache_path {
            Some(path) => NonceCache::load_from_file(path)?,
            None => NonceCache::new(None),
        };
        Ok(Self::new(config, Arc::new(client), Arc::new(cache)))
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    pub fn symbol(&self) -> &str {
        &self.config.ledger.symbol
    }

    pub fn client(&self) -> &Arc<dyn LedgerClient> {
        &self.client
    }

    pub fn codec(&self) -> &Arc<dyn AddressCodec> {
        &self.codec
    }

    pub fn reconciler(&self) -> &Arc<NonceReconciler> {
        self.builder.reconciler()
    }

    /// Derive the address for `key_material` and announce it to the service.
    pub async fn create_address(&self, key_material: &[u8]) -> LedgerResult<String> {
        let address = self.codec.encode(key_material)?;
        self.client.inform_wallet(&address, self.symbol()).await?;
        tracing::info!(address = %address, symbol = %self.symbol(), "Address created");
        Ok(address)
    }

    pub fn verify_address(&self, address: &str) -> bool {
        self.codec.verify(address)
    }

    pub async fn build_transfer(&self, request: TransferRequest) -> LedgerResult<UnsignedTransaction> {
        self.builder.build(request).await
    }

    pub fn sign_offline(
        &self,
        tx: UnsignedTransaction,
        wallet: &Wallet,
    ) -> LedgerResult<SignedTransaction> {
        signer::sign_offline(tx, wallet, self.codec.as_ref(), self.config.signing.verify)
    }

    /// Requires `signing.allow_online`.
    pub async fn sign_online(
        &self,
        tx: UnsignedTransaction,
        wallet: &Wallet,
    ) -> LedgerResult<SignedTransaction> {
        let signer = OnlineSigner::new(
            self.client.clone(),
            wallet.clone(),
            self.codec.clone(),
            &self.config.signing,
        )?;
        signer.sign(tx).await
    }

    pub async fn submit(&self, tx: &SignedTransaction) -> LedgerResult<SubmittedTransaction> {
        self.gateway.submit(tx).await
    }

    /// Build, sign locally and broadcast a transfer from `wallet`.
    pub async fn transfer_offline(
        &self,
        wallet: &Wallet,
        recipient: &str,
        amount: &str,
        symbol: Option<&str>,
    ) -> LedgerResult<SubmittedTransaction> {
        let request = self.transfer_request(wallet, recipient, amount, symbol);
        let unsigned = self.build_transfer(request).await?;
        let signed = self.sign_offline(unsigned, wallet)?;
        self.submit(&signed).await
    }

    /// Same as [`transfer_offline`](Self::transfer_offline), signed remotely.
    pub async fn transfer_online(
        &self,
        wallet: &Wallet,
        recipient: &str,
        amount: &str,
        symbol: Option<&str>,
    ) -> LedgerResult<SubmittedTransaction> {
        let request = self.transfer_request(wallet, recipient, amount, symbol);
        let unsigned = self.build_transfer(request).await?;
        let signed = self.sign_online(unsigned, wallet).await?;
        self.submit(&signed).await
    }

    fn transfer_request(
        &self,
        wallet: &Wallet,
        recipient: &str,
        amount: &str,
        symbol: Option<&str>,
    ) -> TransferRequest {
        TransferRequest::new(
            wallet.address(),
            recipient,
            symbol.unwrap_or(self.symbol()),
            amount,
        )
    }

    pub async fn get_account(&self, address: &str) -> LedgerResult<Account> {
        self.client.get_account(address).await
    }

    pub async fn get_balance(&self, address: &str) -> LedgerResult<String> {
        self.client.get_balance(address).await
    }

    pub async fn new_wallet(&self, symbol: Option<&str>) -> LedgerResult<Value> {
        self.client
            .new_wallet(symbol.unwrap_or(self.symbol()))
            .await
    }

    pub async fn get_latest_block(&self) -> LedgerResult<Block> {
        self.client.get_latest_block().await
    }

    pub async fn get_block(&self, height: u64) -> LedgerResult<Block> {
        self.client.get_block(height).await
    }

    pub async fn get_transaction(&self, hash: &str) -> LedgerResult<Transaction> {
        self.client.get_transaction(hash).await
    }
}

impl std::fmt::Debug for XifAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XifAdapter")
            .field("symbol", &self.config.ledger.symbol)
            .field("server_api", &self.config.ledger.server_api)
            .finish()
    }
}
