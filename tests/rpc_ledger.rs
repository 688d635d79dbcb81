//! RpcLedger against a mock JSON-RPC node.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{keccak256, Address, Bytes, TxHash};
use serde_json::{json, Value};

use eth_tx_adapter::blockchain::{BlockchainConfig, Ledger, LedgerError, RpcLedger, TxRequest};

mod common;

const ANVIL_CHAIN_ID: &str = "0x7a69";

fn config(rpc_url: String) -> BlockchainConfig {
    BlockchainConfig {
        rpc_url,
        failover_urls: Vec::new(),
        chain_id: 31337,
        rpc_timeout_secs: 2,
        confirmation_blocks: 1,
        from_address: Some(format!("{}", Address::repeat_byte(0x0f))),
        default_gas_limit: 200_000,
    }
}

fn request(key: &str) -> TxRequest {
    TxRequest {
        idempotency_key: key.to_string(),
        to: Address::repeat_byte(0xcc),
        data: Bytes::from_static(&[0x12, 0x34, 0x56, 0x78]),
        gas_price: Some(1_000_000_000),
        gas_limit: Some(100_000),
    }
}

/// Answers the calls every ledger operation needs.
fn chain_basics(method: &str) -> Option<Value> {
    match method {
        "eth_chainId" => Some(json!(ANVIL_CHAIN_ID)),
        "eth_blockNumber" => Some(json!("0x10")),
        "eth_getTransactionCount" => Some(json!("0x0")),
        "eth_gasPrice" => Some(json!("0x3b9aca00")),
        "eth_estimateGas" => Some(json!("0x5208")),
        _ => None,
    }
}

#[tokio::test]
async fn test_connected_node() {
    let addr = common::start_mock_node(|method, _| {
        chain_basics(method).ok_or((-32601, "method not found".to_string()))
    })
    .await;

    let ledger = RpcLedger::new(config(format!("http://{}", addr))).await.unwrap();
    assert!(ledger.is_connected().await);
    assert!(ledger.verify_chain_id().await.is_ok());
    assert_eq!(ledger.get_block_number().await.unwrap(), 16);
}

#[tokio::test]
async fn test_chain_mismatch() {
    let addr = common::start_mock_node(|method, _| {
        chain_basics(method).ok_or((-32601, "method not found".to_string()))
    })
    .await;

    let mut config = config(format!("http://{}", addr));
    config.chain_id = 1;
    let ledger = RpcLedger::new(config).await.unwrap();

    let err = ledger.verify_chain_id().await.unwrap_err();
    assert!(matches!(err, LedgerError::ChainMismatch { expected: 1, actual: 31337 }));
}

#[tokio::test]
async fn test_failover_to_secondary() {
    let addr = common::start_mock_node(|method, _| {
        chain_basics(method).ok_or((-32601, "method not found".to_string()))
    })
    .await;

    let mut config = config("http://127.0.0.1:1".to_string());
    config.failover_urls.push(format!("http://{}", addr));
    let ledger = RpcLedger::new(config).await.unwrap();

    assert!(ledger.is_connected().await);
}

#[tokio::test]
async fn test_unknown_transaction() {
    let addr = common::start_mock_node(|method, _| match method {
        "eth_getTransactionByHash" | "eth_getTransactionReceipt" => Ok(Value::Null),
        other => chain_basics(other).ok_or((-32601, "method not found".to_string())),
    })
    .await;

    let ledger = RpcLedger::new(config(format!("http://{}", addr))).await.unwrap();
    let hash = TxHash::repeat_byte(0x99);

    let err = ledger.find_transaction_by_hash(hash).await.unwrap_err();
    assert!(matches!(err, LedgerError::NotFound(h) if h == hash));
    assert_eq!(ledger.get_receipt(hash).await.unwrap(), None);
}

/// Signed bytes the mock node hands out: a marker byte and the nonce.
fn signed_bytes(params: &Value) -> Value {
    let nonce = params[0]["nonce"].as_str().unwrap_or("0x0").trim_start_matches("0x");
    let nonce = u64::from_str_radix(nonce, 16).unwrap();
    json!(format!("0x02{:02x}", nonce))
}

fn raw_hash(raw: &str) -> TxHash {
    keccak256(raw.parse::<Bytes>().unwrap())
}

#[tokio::test]
async fn test_send_is_idempotent() {
    let signs = Arc::new(AtomicUsize::new(0));
    let sends = Arc::new(AtomicUsize::new(0));
    let (sign_counter, send_counter) = (signs.clone(), sends.clone());

    let addr = common::start_mock_node(move |method, params| match method {
        "eth_signTransaction" => {
            sign_counter.fetch_add(1, Ordering::SeqCst);
            Ok(signed_bytes(params))
        }
        "eth_sendRawTransaction" => {
            send_counter.fetch_add(1, Ordering::SeqCst);
            Ok(json!(raw_hash(params[0].as_str().unwrap()).to_string()))
        }
        other => chain_basics(other).ok_or((-32601, "method not found".to_string())),
    })
    .await;

    let ledger = RpcLedger::new(config(format!("http://{}", addr))).await.unwrap();
    let first = ledger.create_transaction(request("run-1")).await.unwrap();
    let second = ledger.create_transaction(request("run-1")).await.unwrap();

    assert_eq!(first, raw_hash("0x0200"));
    assert_eq!(second, first);
    assert_eq!(signs.load(Ordering::SeqCst), 1);
    assert_eq!(sends.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_signs_at_pending_nonce() {
    let signed = Arc::new(std::sync::Mutex::new(Vec::new()));
    let seen = signed.clone();

    let addr = common::start_mock_node(move |method, params| match method {
        "eth_getTransactionCount" if params[1] == "pending" => Ok(json!("0x7")),
        "eth_getTransactionCount" => Err((-32602, "expected the pending block tag".to_string())),
        "eth_signTransaction" => {
            seen.lock().unwrap().push(params[0].clone());
            Ok(json!({ "raw": "0x0207", "tx": params[0] }))
        }
        "eth_sendRawTransaction" => Ok(json!(raw_hash("0x0207").to_string())),
        other => chain_basics(other).ok_or((-32601, "method not found".to_string())),
    })
    .await;

    let ledger = RpcLedger::new(config(format!("http://{}", addr))).await.unwrap();
    let hash = ledger.create_transaction(request("run-1")).await.unwrap();
    assert_eq!(hash, raw_hash("0x0207"));

    let signed = signed.lock().unwrap();
    assert_eq!(signed.len(), 1);
    assert_eq!(signed[0]["nonce"], "0x7");
    assert_eq!(signed[0]["gasPrice"], "0x3b9aca00");
    assert_eq!(signed[0]["gas"], "0x186a0");
    let from = signed[0]["from"].as_str().unwrap().to_lowercase();
    assert_eq!(from, format!("{:#x}", Address::repeat_byte(0x0f)));
}

#[tokio::test]
async fn test_send_timeout_rebroadcasts_same_bytes() {
    let signs = Arc::new(AtomicUsize::new(0));
    let broadcasts = Arc::new(std::sync::Mutex::new(Vec::new()));
    let (sign_counter, seen) = (signs.clone(), broadcasts.clone());
    let slow = Arc::new(AtomicUsize::new(0));

    let addr = common::start_mock_node_with_delay(
        move |method, params| match method {
            "eth_signTransaction" => {
                sign_counter.fetch_add(1, Ordering::SeqCst);
                Ok(signed_bytes(params))
            }
            "eth_sendRawTransaction" => {
                let mut seen = seen.lock().unwrap();
                seen.push(params[0].clone());
                if seen.len() == 1 {
                    Ok(json!(raw_hash(params[0].as_str().unwrap()).to_string()))
                } else {
                    Err((-32000, "already known".to_string()))
                }
            }
            other => chain_basics(other).ok_or((-32601, "method not found".to_string())),
        },
        // the first broadcast reaches the node but the answer comes too late
        move |method| {
            (method == "eth_sendRawTransaction" && slow.fetch_add(1, Ordering::SeqCst) == 0)
                .then(|| Duration::from_secs(3))
        },
    )
    .await;

    let mut config = config(format!("http://{}", addr));
    config.rpc_timeout_secs = 1;
    let ledger = RpcLedger::new(config).await.unwrap();

    let first = ledger.create_transaction(request("run-1")).await.unwrap_err();
    assert!(matches!(first, LedgerError::Timeout(1)));
    assert!(first.is_retryable());

    let second = ledger.create_transaction(request("run-1")).await.unwrap();
    assert_eq!(second, raw_hash("0x0200"));

    let broadcasts = broadcasts.lock().unwrap();
    assert_eq!(signs.load(Ordering::SeqCst), 1);
    assert_eq!(broadcasts.len(), 2);
    assert_eq!(broadcasts[0], broadcasts[1]);
}

#[tokio::test]
async fn test_timeout_fails_over_with_same_bytes() {
    let primary_seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let secondary_seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let (primary_log, secondary_log) = (primary_seen.clone(), secondary_seen.clone());

    let primary = common::start_mock_node_with_delay(
        move |method, params| match method {
            "eth_signTransaction" => Ok(signed_bytes(params)),
            "eth_sendRawTransaction" => {
                primary_log.lock().unwrap().push(params[0].clone());
                Ok(json!(raw_hash(params[0].as_str().unwrap()).to_string()))
            }
            other => chain_basics(other).ok_or((-32601, "method not found".to_string())),
        },
        |method| (method == "eth_sendRawTransaction").then(|| Duration::from_secs(3)),
    )
    .await;
    let secondary = common::start_mock_node(move |method, params| match method {
        "eth_sendRawTransaction" => {
            secondary_log.lock().unwrap().push(params[0].clone());
            Err((-32000, "already known".to_string()))
        }
        other => chain_basics(other).ok_or((-32601, "method not found".to_string())),
    })
    .await;

    let mut config = config(format!("http://{}", primary));
    config.failover_urls.push(format!("http://{}", secondary));
    config.rpc_timeout_secs = 1;
    let ledger = RpcLedger::new(config).await.unwrap();

    let hash = ledger.create_transaction(request("run-1")).await.unwrap();
    assert_eq!(hash, raw_hash("0x0200"));

    let primary_seen = primary_seen.lock().unwrap();
    assert_eq!(primary_seen.len(), 1);
    assert_eq!(*primary_seen, *secondary_seen.lock().unwrap());
}

#[tokio::test]
async fn test_refused_broadcast_signs_again() {
    let signs = Arc::new(AtomicUsize::new(0));
    let sends = Arc::new(AtomicUsize::new(0));
    let (sign_counter, send_counter) = (signs.clone(), sends.clone());

    let addr = common::start_mock_node(move |method, params| match method {
        "eth_signTransaction" => {
            sign_counter.fetch_add(1, Ordering::SeqCst);
            Ok(signed_bytes(params))
        }
        "eth_sendRawTransaction" => {
            if send_counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err((-32000, "txpool is full".to_string()))
            } else {
                Ok(json!(raw_hash(params[0].as_str().unwrap()).to_string()))
            }
        }
        other => chain_basics(other).ok_or((-32601, "method not found".to_string())),
    })
    .await;

    let ledger = RpcLedger::new(config(format!("http://{}", addr))).await.unwrap();
    let err = ledger.create_transaction(request("run-1")).await.unwrap_err();
    assert!(err.is_retryable());

    ledger.create_transaction(request("run-1")).await.unwrap();
    assert_eq!(signs.load(Ordering::SeqCst), 2);
    assert_eq!(sends.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_rejected_send_is_fatal() {
    let addr = common::start_mock_node(|method, params| match method {
        "eth_signTransaction" => Ok(signed_bytes(params)),
        "eth_sendRawTransaction" => Err((-32000, "insufficient funds for gas * price + value".to_string())),
        other => chain_basics(other).ok_or((-32601, "method not found".to_string())),
    })
    .await;

    let ledger = RpcLedger::new(config(format!("http://{}", addr))).await.unwrap();
    let err = ledger.create_transaction(request("run-1")).await.unwrap_err();

    assert!(matches!(err, LedgerError::Rejected(_)));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_unknown_account_cannot_sign() {
    let addr = common::start_mock_node(|method, _| match method {
        "eth_signTransaction" => Err((-32000, "unknown account".to_string())),
        other => chain_basics(other).ok_or((-32601, "method not found".to_string())),
    })
    .await;

    let ledger = RpcLedger::new(config(format!("http://{}", addr))).await.unwrap();
    let err = ledger.create_transaction(request("run-1")).await.unwrap_err();
    assert!(matches!(err, LedgerError::Rejected(_)));
}
