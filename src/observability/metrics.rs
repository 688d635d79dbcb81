//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define adapter metrics (submissions, confirmation checks, run outputs)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `ethtx_submissions_total` (counter): submission attempts by outcome
//! - `ethtx_confirmation_checks_total` (counter): tracker polls by outcome
//! - `ethtx_receipt_history_parse_failures_total` (counter): unreadable
//!   persisted receipt histories that were replaced by an empty one
//! - `ethtx_run_outputs_total` (counter): outputs by proposed status
//! - `ethtx_ledger_connected` (gauge): 1=reachable, 0=unreachable
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed, so the core and its
//!   tests never depend on the exporter
//! - Label values are static strings

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with an HTTP listener on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Count one submission attempt.
pub fn record_submission(outcome: &'static str) {
    metrics::counter!("ethtx_submissions_total", "outcome" => outcome).increment(1);
}

/// Count one confirmation check.
pub fn record_confirmation_check(outcome: &'static str) {
    metrics::counter!("ethtx_confirmation_checks_total", "outcome" => outcome).increment(1);
}

/// Count a persisted receipt history that could not be parsed.
pub fn record_receipt_history_parse_failure() {
    metrics::counter!("ethtx_receipt_history_parse_failures_total").increment(1);
}

/// Count one run output by its proposed status.
pub fn record_run_output(status: &'static str) {
    metrics::counter!("ethtx_run_outputs_total", "status" => status).increment(1);
}

/// Record ledger reachability.
pub fn record_ledger_connected(connected: bool) {
    metrics::gauge!("ethtx_ledger_connected").set(if connected { 1.0 } else { 0.0 });
}
