//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, route, status
//! - `gateway_request_duration_seconds` (histogram): latency distribution
//! - `gateway_rate_limited_total` (counter): rejections by path prefix
//! - `gateway_cors_rejected_total` (counter): rejected origins
//! - `gateway_db_connect_total` (counter): lazy connection attempts by outcome
//! - `gateway_upstream_requests_total` (counter): auth forwarding by outcome
//!
//! Recording is a no-op until a recorder is installed, so handlers call
//! these unconditionally.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(method: &str, route: &str, status: u16, start: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("route", route.to_string()),
        ("status", status.to_string()),
    ];
    metrics::counter!("gateway_requests_total", &labels).increment(1);
    metrics::histogram!("gateway_request_duration_seconds", &labels)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_rate_limited(prefix: &str) {
    metrics::counter!("gateway_rate_limited_total", "prefix" => prefix.to_string()).increment(1);
}

pub fn record_cors_rejected() {
    metrics::counter!("gateway_cors_rejected_total").increment(1);
}

pub fn record_db_connect(success: bool) {
    let outcome = if success { "success" } else { "failure" };
    metrics::counter!("gateway_db_connect_total", "outcome" => outcome).increment(1);
}

pub fn record_upstream(outcome: &'static str) {
    metrics::counter!("gateway_upstream_requests_total", "outcome" => outcome).increment(1);
}
