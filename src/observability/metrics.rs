//! Metrics collection and exposition.
//!
//! # Metrics
//! - `netaware_fallback_total` (counter): fallback results served, by domain and source
//! - `netaware_live_calls_total` (counter): live calls, by domain and outcome
//! - `netaware_queue_depth` (gauge): pending outbox entries, by domain
//! - `netaware_mutations_abandoned_total` (counter): queued writes dropped after replay
//! - `netaware_online` (gauge): 1=online, 0=offline, by domain
//! - `netaware_resource_exhausted_total` (counter): exhaustion detections

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_fallback(domain: &str, source: &'static str) {
    counter!(
        "netaware_fallback_total",
        "domain" => domain.to_string(),
        "source" => source
    )
    .increment(1);
}

pub fn record_live_call(domain: &str, outcome: &'static str) {
    counter!(
        "netaware_live_calls_total",
        "domain" => domain.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_queue_depth(domain: &str, depth: usize) {
    gauge!("netaware_queue_depth", "domain" => domain.to_string()).set(depth as f64);
}

pub fn record_abandoned(domain: &str) {
    counter!("netaware_mutations_abandoned_total", "domain" => domain.to_string()).increment(1);
}

pub fn record_online(domain: &str, online: bool) {
    gauge!("netaware_online", "domain" => domain.to_string()).set(if online { 1.0 } else { 0.0 });
}

pub fn record_resource_exhausted(domain: &str) {
    counter!("netaware_resource_exhausted_total", "domain" => domain.to_string()).increment(1);
}
