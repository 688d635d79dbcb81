//! eth-tx-adapter
//!
//! Drives one run of the transaction adapter to a terminal state.
//!
//! # Architecture Overview
//!
//! ```text
//!   --result ──▶ RunInput ──▶ RunDriver ──▶ EthTxAdapter::perform ──▶ Ledger
//!                                 ▲                 │                  │
//!                                 │                 ▼                  ▼
//!                                 └──── data ── RunOutput        RpcLedger (JSON-RPC)
//!                                                   │            MemoryLedger (--dry-run)
//!                                                   ▼
//!                                             stdout (JSON)
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use serde_json::Value;

use eth_tx_adapter::blockchain::{Ledger, MemoryLedger, RpcLedger};
use eth_tx_adapter::config::{load_config, AppConfig};
use eth_tx_adapter::lifecycle::signals::trigger_on_ctrl_c;
use eth_tx_adapter::observability::{logging, metrics};
use eth_tx_adapter::resilience::SubmissionRetryPolicy;
use eth_tx_adapter::{EthTxAdapter, RunDriver, RunInput, RunStatus, Shutdown};

#[derive(Parser)]
#[command(name = "eth-tx-adapter")]
#[command(about = "Submit a contract call for a run and follow it to a receipt", long_about = None)]
struct Cli {
    /// TOML configuration file; built-in defaults when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Upstream result to encode. Parsed as JSON, or taken as a plain string.
    #[arg(short, long)]
    result: String,

    /// Run identifier, also the submission idempotency key.
    #[arg(long)]
    run_id: Option<String>,

    /// Use an in-memory ledger that confirms immediately.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "eth-tx-adapter starting");

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let ledger: Arc<dyn Ledger> = if cli.dry_run {
        tracing::info!("Dry run, using in-memory ledger");
        Arc::new(MemoryLedger::new().with_auto_confirm())
    } else {
        Arc::new(RpcLedger::new(config.blockchain.clone()).await?)
    };

    tracing::info!(
        address = %config.job.address,
        format = %config.job.format,
        interval_ms = config.poller.interval_ms,
        "Configuration loaded"
    );

    let result = serde_json::from_str(&cli.result).unwrap_or(Value::String(cli.result.clone()));
    let run_id = cli.run_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let input = RunInput::new(run_id, RunStatus::InProgress, result, Value::Object(Default::default()));

    let shutdown = Shutdown::new();
    tokio::spawn(trigger_on_ctrl_c(shutdown.clone()));

    let adapter = EthTxAdapter::new(ledger, config.job.clone());
    let driver = RunDriver::new(adapter, &config.poller, SubmissionRetryPolicy::from(&config.retries));
    let report = driver.drive(input, shutdown.subscribe()).await;

    tracing::info!(polls = report.polls, reason = ?report.reason, "Run driver stopped");
    println!("{}", serde_json::to_string_pretty(&report.output)?);

    Ok(if report.output.error_reason().is_some() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
