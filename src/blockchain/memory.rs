//! In-memory ledger.
//!
//! Keeps transaction records and receipts in process memory. Connectivity,
//! submission failures and confirmation are driven by the caller, which makes
//! it the ledger of choice for tests and dry runs.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use alloy::primitives::{keccak256, TxHash};
use async_trait::async_trait;
use dashmap::DashMap;

use crate::blockchain::ledger::Ledger;
use crate::blockchain::types::{LedgerError, LedgerResult, TxReceipt, TxRecord, TxRequest};

/// Ledger backed by concurrent maps.
#[derive(Debug)]
pub struct MemoryLedger {
    connected: AtomicBool,
    auto_confirm: AtomicBool,
    block_number: AtomicU64,
    broadcasts: AtomicU64,
    by_key: DashMap<String, TxHash>,
    requests: DashMap<TxHash, TxRequest>,
    records: DashMap<TxHash, TxRecord>,
    receipts: DashMap<TxHash, TxReceipt>,
    queued_failures: Mutex<VecDeque<LedgerError>>,
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self {
            connected: AtomicBool::new(true),
            auto_confirm: AtomicBool::new(false),
            block_number: AtomicU64::new(1),
            broadcasts: AtomicU64::new(0),
            by_key: DashMap::new(),
            requests: DashMap::new(),
            records: DashMap::new(),
            receipts: DashMap::new(),
            queued_failures: Mutex::new(VecDeque::new()),
        }
    }
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Confirm every transaction, with a receipt, as soon as it is created.
    pub fn with_auto_confirm(self) -> Self {
        self.auto_confirm.store(true, Ordering::SeqCst);
        self
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Make the next creation request fail with `error`.
    pub fn fail_next_submission(&self, error: LedgerError) {
        if let Ok(mut queue) = self.queued_failures.lock() {
            queue.push_back(error);
        }
    }

    /// Number of transactions actually created (deduplicated requests excluded).
    pub fn broadcast_count(&self) -> u64 {
        self.broadcasts.load(Ordering::SeqCst)
    }

    /// Hash created for an idempotency key.
    pub fn hash_for_key(&self, key: &str) -> Option<TxHash> {
        self.by_key.get(key).map(|r| *r.value())
    }

    /// The request that produced a hash.
    pub fn request(&self, hash: &TxHash) -> Option<TxRequest> {
        self.requests.get(hash).map(|r| r.value().clone())
    }

    /// Insert or replace a record.
    pub fn insert_record(&self, record: TxRecord) {
        self.records.insert(record.hash, record);
    }

    /// Mark a transaction confirmed and store its receipt at `block_number`.
    pub fn confirm(&self, hash: TxHash, block_number: u64) {
        self.confirm_without_receipt(hash);
        self.receipts.insert(
            hash,
            TxReceipt {
                hash,
                block_number,
                block_hash: None,
                status: true,
            },
        );
    }

    /// Mark a transaction confirmed while leaving its receipt missing.
    pub fn confirm_without_receipt(&self, hash: TxHash) {
        let mut record = self
            .records
            .entry(hash)
            .or_insert_with(|| TxRecord::pending(hash, None));
        record.confirmed = true;
    }

    /// Mark a transaction as given up on.
    pub fn fail(&self, hash: TxHash) {
        let mut record = self
            .records
            .entry(hash)
            .or_insert_with(|| TxRecord::pending(hash, None));
        record.failed = true;
    }

    fn next_hash(&self, key: &str) -> TxHash {
        let nonce = self.broadcasts.fetch_add(1, Ordering::SeqCst);
        keccak256(format!("{}:{}", key, nonce).as_bytes())
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn create_transaction(&self, request: TxRequest) -> LedgerResult<TxHash> {
        if let Some(existing) = self.hash_for_key(&request.idempotency_key) {
            return Ok(existing);
        }

        let queued = self
            .queued_failures
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front());
        if let Some(error) = queued {
            return Err(error);
        }

        let hash = self.next_hash(&request.idempotency_key);
        let sent_at = self.block_number.fetch_add(1, Ordering::SeqCst);
        self.by_key.insert(request.idempotency_key.clone(), hash);
        self.requests.insert(hash, request);
        self.records.insert(hash, TxRecord::pending(hash, Some(sent_at)));

        if self.auto_confirm.load(Ordering::SeqCst) {
            self.confirm(hash, sent_at);
        }
        Ok(hash)
    }

    async fn find_transaction_by_hash(&self, hash: TxHash) -> LedgerResult<TxRecord> {
        self.records
            .get(&hash)
            .map(|r| r.value().clone())
            .ok_or(LedgerError::NotFound(hash))
    }

    async fn get_receipt(&self, hash: TxHash) -> LedgerResult<Option<TxReceipt>> {
        Ok(self.receipts.get(&hash).map(|r| r.value().clone()))
    }
}
