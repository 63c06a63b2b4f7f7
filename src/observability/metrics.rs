//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): proxied requests by service, method, status
//! - `gateway_request_duration_seconds` (histogram): end-to-end latency by service
//! - `gateway_instance_healthy` (gauge): 1=healthy, 0=unhealthy, per instance
//! - `gateway_discovery_failures_total` (counter): failed backend queries
//!
//! Recording goes through the `metrics` facade, so without an installed
//! recorder every call is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// One proxied request, successful or not.
pub fn record_request(service: &str, method: &str, status: u16, start: Instant) {
    counter!(
        "gateway_requests_total",
        "service" => service.to_string(),
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!("gateway_request_duration_seconds", "service" => service.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_instance_health(service: &str, instance: &str, healthy: bool) {
    gauge!(
        "gateway_instance_healthy",
        "service" => service.to_string(),
        "instance" => instance.to_string()
    )
    .set(if healthy { 1.0 } else { 0.0 });
}

pub fn record_discovery_failure(backend: &'static str) {
    counter!("gateway_discovery_failures_total", "backend" => backend).increment(1);
}
