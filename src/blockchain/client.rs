//! JSON-RPC ledger with provider failover.
//!
//! # Responsibilities
//! - Connect to the primary and failover JSON-RPC endpoints
//! - Sign with a node-managed account (`eth_signTransaction`) at a pinned nonce
//! - Broadcast the signed bytes (`eth_sendRawTransaction`)
//! - Derive confirmation and failure from receipts and block depth
//! - Handle timeouts and network errors per provider
//!
//! # Failover
//! Read calls walk the provider list until one answers. A transaction is
//! signed once per idempotency key and the signed bytes are kept until a
//! node accepts them. Every later attempt rebroadcasts the same bytes, so a
//! timed-out send can move to another provider or be retried without ever
//! producing a second transaction. Only a definite refusal of a first
//! broadcast discards the signed bytes.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use alloy::network::TransactionBuilder;
use alloy::primitives::{keccak256, Address, Bytes, TxHash};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::{TransactionReceipt, TransactionRequest};
use alloy::transports::{RpcError, TransportErrorKind};
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::{Mutex, OnceCell};
use tokio::time::timeout;

use crate::blockchain::ledger::Ledger;
use crate::blockchain::types::{
    BlockchainConfig, ChainId, LedgerError, LedgerResult, TxReceipt, TxRecord, TxRequest,
};

type DynProvider = Arc<dyn Provider + Send + Sync>;

/// Ledger backed by one or more JSON-RPC nodes.
pub struct RpcLedger {
    /// List of providers (primary + failovers).
    providers: Vec<DynProvider>,
    config: BlockchainConfig,
    timeout_duration: Duration,
    /// Sending account, resolved from config or `eth_accounts` on first use.
    sender: OnceCell<Address>,
    /// Signed transactions by idempotency key.
    signed: DashMap<String, SignedTx>,
    /// Serializes creation so one key is never signed twice.
    create_lock: Mutex<()>,
}

#[derive(Debug, Clone)]
struct SignedTx {
    raw: Bytes,
    hash: TxHash,
    nonce: u64,
    /// A node has accepted the bytes at least once.
    accepted: bool,
}

/// Why a broadcast did not land.
#[derive(Debug)]
enum BroadcastError {
    /// Every node that answered refused the bytes and none may hold them.
    Refused(LedgerError),
    /// The bytes may be sitting in a mempool.
    Uncertain(LedgerError),
}

impl RpcLedger {
    /// Create a new ledger.
    ///
    /// Fails only on an unusable primary URL or sender address. An unreachable
    /// node is not an error here; it surfaces through `is_connected`.
    pub async fn new(config: BlockchainConfig) -> LedgerResult<Self> {
        let timeout_duration = Duration::from_secs(config.rpc_timeout_secs);
        let mut providers = Vec::new();

        let primary_url: url::Url = config.rpc_url.parse().map_err(|e| {
            LedgerError::NotAvailable(format!("Invalid RPC URL '{}': {}", config.rpc_url, e))
        })?;
        providers.push(Arc::new(ProviderBuilder::new().connect_http(primary_url)) as DynProvider);

        for url_str in &config.failover_urls {
            match url_str.parse::<url::Url>() {
                Ok(url) => providers.push(Arc::new(ProviderBuilder::new().connect_http(url)) as DynProvider),
                Err(_) => tracing::warn!(url = %url_str, "Ignoring invalid failover RPC URL"),
            }
        }

        let sender = match config.from_address.as_deref() {
            Some(raw) => {
                let address: Address = raw.parse().map_err(|e| {
                    LedgerError::NotAvailable(format!("Invalid from address '{}': {}", raw, e))
                })?;
                OnceCell::new_with(Some(address))
            }
            None => OnceCell::new(),
        };

        let ledger = Self {
            providers,
            config: config.clone(),
            timeout_duration,
            sender,
            signed: DashMap::new(),
            create_lock: Mutex::new(()),
        };

        match ledger.verify_chain_id().await {
            Ok(()) => tracing::info!(
                rpc_url = %config.rpc_url,
                chain_id = config.chain_id,
                failover_count = config.failover_urls.len(),
                "RPC ledger initialized"
            ),
            Err(e) => tracing::warn!(error = %e, "RPC ledger initialized but chain verification failed"),
        }

        Ok(ledger)
    }

    /// Verify the connected chain ID matches configuration.
    pub async fn verify_chain_id(&self) -> LedgerResult<()> {
        let chain_id = self.get_chain_id().await?;
        if chain_id.0 != self.config.chain_id {
            return Err(LedgerError::ChainMismatch {
                expected: self.config.chain_id,
                actual: chain_id.0,
            });
        }
        Ok(())
    }

    pub async fn get_chain_id(&self) -> LedgerResult<ChainId> {
        self.with_failover("get chain id", |p| async move { p.get_chain_id().await })
            .await
            .map(ChainId)
    }

    pub async fn get_block_number(&self) -> LedgerResult<u64> {
        self.with_failover("get block number", |p| async move { p.get_block_number().await })
            .await
    }

    pub async fn get_transaction_receipt(&self, hash: TxHash) -> LedgerResult<Option<TransactionReceipt>> {
        self.with_failover("get receipt", move |p| async move {
            p.get_transaction_receipt(hash).await
        })
        .await
    }

    /// Run one read call against each provider in turn until one answers.
    async fn with_failover<T, F, Fut>(&self, operation: &'static str, call: F) -> LedgerResult<T>
    where
        F: Fn(DynProvider) -> Fut,
        Fut: Future<Output = Result<T, RpcError<TransportErrorKind>>>,
    {
        for (i, provider) in self.providers.iter().enumerate() {
            match timeout(self.timeout_duration, call(provider.clone())).await {
                Ok(Ok(result)) => return Ok(result),
                Ok(Err(e)) => tracing::warn!(provider_idx = i, operation, error = %e, "RPC error, trying next provider"),
                Err(_) => tracing::warn!(provider_idx = i, operation, "RPC timeout, trying next provider"),
            }
        }
        Err(LedgerError::Rpc(format!("All RPC providers failed to {}", operation)))
    }

    async fn sender(&self) -> LedgerResult<Address> {
        self.sender
            .get_or_try_init(|| async {
                let accounts = self
                    .with_failover("list accounts", |p| async move { p.get_accounts().await })
                    .await?;
                accounts
                    .first()
                    .copied()
                    .ok_or_else(|| LedgerError::NotAvailable("node manages no accounts".to_string()))
            })
            .await
            .copied()
    }

    async fn pending_nonce(&self, from: Address) -> LedgerResult<u64> {
        self.with_failover("get pending nonce", move |p| async move {
            p.get_transaction_count(from).pending().await
        })
        .await
    }

    /// Sign `tx` with the node's key for its sender.
    ///
    /// Nothing reaches a mempool here, so a timeout moves on like a transport error.
    async fn sign(&self, tx: &TransactionRequest) -> LedgerResult<Bytes> {
        let mut last_error = None;
        for (i, provider) in self.providers.iter().enumerate() {
            let call = provider.client().request::<_, Value>("eth_signTransaction", (tx.clone(),));
            match timeout(self.timeout_duration, call).await {
                Ok(Ok(response)) => return raw_from_sign_response(&response),
                Ok(Err(e)) if e.is_error_resp() => return Err(classify_send_error(&e)),
                Ok(Err(e)) => {
                    tracing::warn!(provider_idx = i, error = %e, "Transport error signing transaction, trying next provider");
                    last_error = Some(LedgerError::Rpc(e.to_string()));
                }
                Err(_) => {
                    tracing::warn!(provider_idx = i, "Timeout signing transaction, trying next provider");
                    last_error = Some(LedgerError::Timeout(self.config.rpc_timeout_secs));
                }
            }
        }
        Err(last_error.unwrap_or_else(|| LedgerError::Rpc("no RPC providers configured".to_string())))
    }

    /// Offer signed bytes to each provider until one takes them.
    ///
    /// Once any attempt may have reached a node, "already known" style
    /// answers count as delivered.
    async fn broadcast(&self, raw: &Bytes, mut maybe_delivered: bool) -> Result<(), BroadcastError> {
        let mut last_error = None;
        for (i, provider) in self.providers.iter().enumerate() {
            match timeout(self.timeout_duration, provider.send_raw_transaction(raw)).await {
                Ok(Ok(_)) => return Ok(()),
                Ok(Err(e)) if e.is_error_resp() => {
                    if maybe_delivered && is_already_submitted(&e) {
                        tracing::debug!(provider_idx = i, error = %e, "Node already has the transaction");
                        return Ok(());
                    }
                    let error = classify_send_error(&e);
                    return Err(if maybe_delivered {
                        BroadcastError::Uncertain(error)
                    } else {
                        BroadcastError::Refused(error)
                    });
                }
                Ok(Err(e)) => {
                    tracing::warn!(provider_idx = i, error = %e, "Transport error broadcasting transaction, trying next provider");
                    last_error = Some(LedgerError::Rpc(e.to_string()));
                }
                Err(_) => {
                    tracing::warn!(provider_idx = i, "Timeout broadcasting transaction, trying next provider");
                    maybe_delivered = true;
                    last_error = Some(LedgerError::Timeout(self.config.rpc_timeout_secs));
                }
            }
        }
        let error = last_error.unwrap_or_else(|| LedgerError::Rpc("no RPC providers configured".to_string()));
        Err(if maybe_delivered {
            BroadcastError::Uncertain(error)
        } else {
            BroadcastError::Refused(error)
        })
    }

    /// Build and sign the transaction for `request` at the sender's pending nonce.
    async fn sign_request(&self, request: &TxRequest) -> LedgerResult<SignedTx> {
        let from = self.sender().await?;
        let nonce = self.pending_nonce(from).await?;
        let gas_price = match request.gas_price {
            Some(gas_price) => gas_price,
            None => {
                self.with_failover("get gas price", |p| async move { p.get_gas_price().await })
                    .await?
            }
        };

        let tx = TransactionRequest::default()
            .with_from(from)
            .with_to(request.to)
            .with_input(request.data.clone())
            .with_chain_id(self.config.chain_id)
            .with_nonce(nonce)
            .with_gas_price(gas_price)
            .with_gas_limit(request.gas_limit.unwrap_or(self.config.default_gas_limit));

        let raw = self.sign(&tx).await?;
        let hash = keccak256(&raw);
        tracing::debug!(key = %request.idempotency_key, tx_hash = %hash, nonce, from = %from, "Transaction signed");
        Ok(SignedTx { raw, hash, nonce, accepted: false })
    }
}

#[async_trait]
impl Ledger for RpcLedger {
    async fn is_connected(&self) -> bool {
        self.get_block_number().await.is_ok()
    }

    async fn create_transaction(&self, request: TxRequest) -> LedgerResult<TxHash> {
        let _guard = self.create_lock.lock().await;
        let key = request.idempotency_key.clone();

        let existing = self.signed.get(&key).map(|entry| entry.value().clone());
        // A kept entry was handed to a node before, so it may already be pending.
        let (signed, rebroadcast) = match existing {
            Some(signed) if signed.accepted => {
                tracing::debug!(key = %key, tx_hash = %signed.hash, "Transaction already created for key");
                return Ok(signed.hash);
            }
            Some(signed) => {
                tracing::info!(key = %key, tx_hash = %signed.hash, nonce = signed.nonce, "Rebroadcasting signed transaction");
                (signed, true)
            }
            None => {
                let signed = self.sign_request(&request).await?;
                self.signed.insert(key.clone(), signed.clone());
                (signed, false)
            }
        };

        match self.broadcast(&signed.raw, rebroadcast).await {
            Ok(()) => {
                if let Some(mut entry) = self.signed.get_mut(&key) {
                    entry.accepted = true;
                }
                tracing::info!(key = %key, tx_hash = %signed.hash, nonce = signed.nonce, "Transaction broadcast");
                Ok(signed.hash)
            }
            Err(BroadcastError::Refused(error)) => {
                self.signed.remove(&key);
                Err(error)
            }
            Err(BroadcastError::Uncertain(error)) => {
                tracing::warn!(key = %key, tx_hash = %signed.hash, error = %error, "Broadcast outcome unknown, keeping signed transaction");
                Err(error)
            }
        }
    }

    async fn find_transaction_by_hash(&self, hash: TxHash) -> LedgerResult<TxRecord> {
        let known = self
            .with_failover("get transaction", move |p| async move {
                p.get_transaction_by_hash(hash).await
            })
            .await?
            .is_some();
        if !known {
            return Err(LedgerError::NotFound(hash));
        }

        let Some(receipt) = self.get_transaction_receipt(hash).await? else {
            return Ok(TxRecord::pending(hash, None));
        };

        let current_block = self.get_block_number().await?;
        let tx_block = receipt.block_number.unwrap_or(current_block);
        Ok(record_from_receipt(
            hash,
            tx_block,
            receipt.status(),
            current_block,
            self.config.confirmation_blocks,
        ))
    }

    async fn get_receipt(&self, hash: TxHash) -> LedgerResult<Option<TxReceipt>> {
        Ok(self.get_transaction_receipt(hash).await?.map(|r| TxReceipt {
            hash: r.transaction_hash,
            block_number: r.block_number.unwrap_or_default(),
            block_hash: r.block_hash,
            status: r.status(),
        }))
    }
}

impl std::fmt::Debug for RpcLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcLedger")
            .field("rpc_url", &self.config.rpc_url)
            .field("providers", &self.providers.len())
            .field("chain_id", &self.config.chain_id)
            .field("timeout_secs", &self.config.rpc_timeout_secs)
            .finish()
    }
}

/// A mined transaction counts as confirmed once it is `required` blocks deep,
/// the block that included it counting as the first. Reverted receipts are failed.
fn record_from_receipt(hash: TxHash, tx_block: u64, succeeded: bool, current_block: u64, required: u32) -> TxRecord {
    let depth = current_block.saturating_sub(tx_block) + 1;
    TxRecord {
        hash,
        sent_at: Some(tx_block),
        confirmed: succeeded && depth >= u64::from(required),
        failed: !succeeded,
    }
}

/// `eth_signTransaction` answers with the raw bytes, or with an object
/// carrying them under `raw`.
fn raw_from_sign_response(response: &Value) -> LedgerResult<Bytes> {
    let raw = match response {
        Value::String(raw) => raw.as_str(),
        Value::Object(fields) => fields.get("raw").and_then(Value::as_str).unwrap_or_default(),
        _ => "",
    };
    if raw.is_empty() {
        return Err(LedgerError::Rpc(format!("unexpected eth_signTransaction response: {}", response)));
    }
    raw.parse::<Bytes>()
        .map_err(|e| LedgerError::Rpc(format!("invalid signed transaction bytes: {}", e)))
}

/// Error responses meaning the node already holds these bytes, or a
/// transaction at their nonce.
fn is_already_submitted(error: &RpcError<TransportErrorKind>) -> bool {
    let lower = error.to_string().to_lowercase();
    lower.contains("already known")
        || lower.contains("known transaction")
        || lower.contains("nonce too low")
        || lower.contains("replacement transaction underpriced")
}

fn classify_send_error(error: &RpcError<TransportErrorKind>) -> LedgerError {
    let message = error.to_string();
    if !error.is_error_resp() {
        return LedgerError::Rpc(message);
    }

    let lower = message.to_lowercase();
    if lower.contains("invalid signature")
        || lower.contains("malformed")
        || lower.contains("insufficient funds")
        || lower.contains("invalid transaction")
        || lower.contains("intrinsic gas too low")
        || lower.contains("exceeds block gas limit")
        || lower.contains("unknown account")
        || lower.contains("execution reverted")
    {
        return LedgerError::Rejected(message);
    }
    LedgerError::Rpc(message)
}
