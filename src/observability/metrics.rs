//! Metrics collection and exposition.
//!
//! # Metrics
//! - `haproxy_admin_requests_total` (counter): requests by method, status
//! - `haproxy_admin_request_duration_seconds` (histogram): handler latency
//! - `haproxy_admin_mutations_total` (counter): config mutations by op, outcome
//! - `haproxy_admin_commands_total` (counter): external commands by command, outcome
//! - `haproxy_admin_command_duration_seconds` (histogram): external command latency

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder with its own scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics recorder"),
    }
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    counter!(
        "haproxy_admin_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("haproxy_admin_request_duration_seconds", "method" => method.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_mutation(op: &'static str, outcome: &'static str) {
    counter!("haproxy_admin_mutations_total", "op" => op, "outcome" => outcome).increment(1);
}

pub fn record_command(command: &str, outcome: &'static str, start: Instant) {
    counter!(
        "haproxy_admin_commands_total",
        "command" => command.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    histogram!("haproxy_admin_command_duration_seconds", "command" => command.to_string())
        .record(start.elapsed().as_secs_f64());
}
