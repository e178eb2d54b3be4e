//! Metrics collection and exposition.
//!
//! # Metrics
//! - `function_invocations_total` (counter): invocations by route, status
//! - `function_invocation_duration_seconds` (histogram): wall-clock per route
//! - `function_builds_total` (counter): compile cycles by outcome
//! - `function_restarts_total` (counter): watch session restarts
//! - `function_routes` (gauge): routes in the last discovered table
//!
//! Recording is a no-op until [`init_metrics`] installs the exporter.

use std::net::SocketAddr;
use std::time::Duration;

use ::metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_invocation(route: &str, status: u16, elapsed: Duration) {
    counter!(
        "function_invocations_total",
        "route" => route.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("function_invocation_duration_seconds", "route" => route.to_string())
        .record(elapsed.as_secs_f64());
}

/// `outcome` is `success` or `failure`.
pub fn record_build(outcome: &'static str) {
    counter!("function_builds_total", "outcome" => outcome).increment(1);
}

pub fn record_restart() {
    counter!("function_restarts_total").increment(1);
}

pub fn record_route_count(routes: usize) {
    gauge!("function_routes").set(routes as f64);
}
