//! Metrics collection and exposition.
//!
//! # Metrics
//! - `moneyrace_tx_submitted_total` (counter): submissions by path and outcome
//! - `moneyrace_session_events_total` (counter): session lifecycle events
//! - `moneyrace_api_requests_total` (counter): backend calls by endpoint and status
//! - `moneyrace_rpc_health` (gauge): 1=reachable, 0=unreachable
//! - `moneyrace_live_yield_rooms` (gauge): rooms with a running estimator

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Install the Prometheus recorder and HTTP listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a transaction submission.
pub fn record_tx_submission(path: &'static str, outcome: &'static str) {
    counter!("moneyrace_tx_submitted_total", "path" => path, "outcome" => outcome).increment(1);
}

/// Record a session lifecycle event (`created`, `restored`, `expired`, ...).
pub fn record_session_event(event: &'static str) {
    counter!("moneyrace_session_events_total", "event" => event).increment(1);
}

/// Record a backend API call.
pub fn record_api_request(endpoint: &'static str, status: u16) {
    counter!(
        "moneyrace_api_requests_total",
        "endpoint" => endpoint,
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record ledger reachability.
pub fn record_rpc_health(healthy: bool) {
    gauge!("moneyrace_rpc_health").set(if healthy { 1.0 } else { 0.0 });
}

/// Record the number of rooms tracked by the live-yield store.
pub fn record_live_yield_rooms(count: usize) {
    gauge!("moneyrace_live_yield_rooms").set(count as f64);
}
