//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gate_decisions_total` (counter): decisions by action label
//! - `gate_rate_limited_total` (counter): requests rejected with 429
//! - `gate_degraded_total` (counter): store failures absorbed, by kind
//! - `gate_rate_limit_clients` (gauge): tracked client addresses
//! - `gate_duration_seconds` (histogram): time spent in the gate
//! - `gate_upstream_requests_total` / `gate_upstream_duration_seconds`:
//!   forwarded requests by method and status
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed, so tests need no setup
//! - Labels are static strings wherever possible

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_decision(action: &'static str) {
    counter!("gate_decisions_total", "action" => action).increment(1);
}

pub fn record_rate_limited() {
    counter!("gate_rate_limited_total").increment(1);
}

pub fn record_degraded(kind: &'static str) {
    counter!("gate_degraded_total", "kind" => kind).increment(1);
}

pub fn record_rate_limit_clients(count: usize) {
    gauge!("gate_rate_limit_clients").set(count as f64);
}

pub fn record_gate_duration(start: Instant) {
    histogram!("gate_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_upstream(method: &str, status: u16, start: Instant) {
    let status = status.to_string();
    counter!(
        "gate_upstream_requests_total",
        "method" => method.to_string(),
        "status" => status.clone()
    )
    .increment(1);
    histogram!(
        "gate_upstream_duration_seconds",
        "method" => method.to_string(),
        "status" => status
    )
    .record(start.elapsed().as_secs_f64());
}
