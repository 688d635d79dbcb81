//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, Bytes};
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use eth_tx_adapter::adapter::{DataFormat, EthTxConfig, FunctionSelector};
use eth_tx_adapter::{RunInput, RunOutput, RunStatus};

/// Reply of the mock node: a JSON-RPC result, or an error code and message.
pub type RpcReply = Result<Value, (i64, String)>;

/// Job calling `fulfill(bytes32,bytes32)` on a fixed contract.
#[allow(dead_code)]
pub fn job_config(format: DataFormat) -> EthTxConfig {
    EthTxConfig {
        address: Address::repeat_byte(0xcc),
        function_selector: FunctionSelector::from_signature("fulfill(bytes32,bytes32)"),
        data_prefix: Bytes::new(),
        format,
        gas_price: Some(1_000_000_000),
        gas_limit: Some(300_000),
    }
}

/// A run that has not been performed yet.
#[allow(dead_code)]
pub fn fresh_input(run_id: &str, result: Value) -> RunInput {
    RunInput::new(run_id, RunStatus::InProgress, result, json!({}))
}

/// What the scheduler hands back on the next tick after `output`.
#[allow(dead_code)]
pub fn next_input(previous: &RunInput, output: &RunOutput) -> RunInput {
    let mut next = previous.clone();
    next.status = output.status();
    if let Some(data) = output.data() {
        next.data = data.clone();
    }
    next
}

/// Start a programmable JSON-RPC node on an ephemeral port.
///
/// `handler` receives the method name and params of every call.
#[allow(dead_code)]
pub async fn start_mock_node<F>(handler: F) -> SocketAddr
where
    F: Fn(&str, &Value) -> RpcReply + Send + Sync + 'static,
{
    start_mock_node_with_delay(handler, |_| None).await
}

/// Like [`start_mock_node`], holding back the reply to a call for as long
/// as `delay` returns for its method. The call is still handled first.
#[allow(dead_code)]
pub async fn start_mock_node_with_delay<F, D>(handler: F, delay: D) -> SocketAddr
where
    F: Fn(&str, &Value) -> RpcReply + Send + Sync + 'static,
    D: Fn(&str) -> Option<Duration> + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handler = Arc::new(handler);
    let delay = Arc::new(delay);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((socket, _)) => {
                    tokio::spawn(serve_connection(socket, handler.clone(), delay.clone()));
                }
                Err(_) => break,
            }
        }
    });

    addr
}

async fn serve_connection<F, D>(mut socket: TcpStream, handler: Arc<F>, delay: Arc<D>)
where
    F: Fn(&str, &Value) -> RpcReply + Send + Sync + 'static,
    D: Fn(&str) -> Option<Duration> + Send + Sync + 'static,
{
    while let Some(body) = read_request(&mut socket).await {
        let request: Value = match serde_json::from_slice(&body) {
            Ok(request) => request,
            Err(_) => break,
        };
        let response = match &request {
            Value::Array(calls) => Value::Array(calls.iter().map(|c| answer(handler.as_ref(), c)).collect()),
            call => answer(handler.as_ref(), call),
        };

        let hold = match &request {
            Value::Array(calls) => calls.iter().filter_map(|c| delay(c["method"].as_str().unwrap_or_default())).max(),
            call => delay(call["method"].as_str().unwrap_or_default()),
        };
        if let Some(hold) = hold {
            tokio::time::sleep(hold).await;
        }

        let payload = response.to_string();
        let http = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
            payload.len(),
            payload
        );
        if socket.write_all(http.as_bytes()).await.is_err() {
            break;
        }
    }
}

fn answer<F>(handler: &F, call: &Value) -> Value
where
    F: Fn(&str, &Value) -> RpcReply,
{
    let method = call["method"].as_str().unwrap_or_default();
    let params = call.get("params").cloned().unwrap_or(Value::Null);
    match handler(method, &params) {
        Ok(result) => json!({ "jsonrpc": "2.0", "id": call["id"], "result": result }),
        Err((code, message)) => json!({
            "jsonrpc": "2.0",
            "id": call["id"],
            "error": { "code": code, "message": message }
        }),
    }
}

/// Read one HTTP request and return its body, or `None` once the peer is gone.
async fn read_request(socket: &mut TcpStream) -> Option<Vec<u8>> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let headers = String::from_utf8_lossy(&buf[..header_end]).to_lowercase();
    let content_length = headers
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    Some(buf[header_end..header_end + content_length].to_vec())
}
