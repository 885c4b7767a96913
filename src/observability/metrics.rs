//! Metrics collection and exposition.
//!
//! # Metrics
//! - `danger_room_proxied_responses_total` (counter): response heads sent,
//!   by mount prefix and status
//! - `danger_room_upstream_errors_total` (counter): failed origin calls, by
//!   mount prefix
//! - `danger_room_control_requests_total` (counter): control requests, by
//!   outcome
//! - `danger_room_mounted_proxies` (gauge): current number of mounts

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, address = %addr, "Failed to install metrics exporter"),
    }
}

pub fn record_proxied(prefix: &str, status: u16) {
    metrics::counter!(
        "danger_room_proxied_responses_total",
        "prefix" => prefix.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

pub fn record_upstream_error(prefix: &str) {
    metrics::counter!("danger_room_upstream_errors_total", "prefix" => prefix.to_string()).increment(1);
}

/// Count a control request. `outcome` is a fixed label such as `created`.
pub fn record_control(outcome: &'static str) {
    metrics::counter!("danger_room_control_requests_total", "outcome" => outcome).increment(1);
}

pub fn set_mounted(count: usize) {
    metrics::gauge!("danger_room_mounted_proxies").set(count as f64);
}
