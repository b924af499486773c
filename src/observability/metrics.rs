//! Metrics collection and exposition.
//!
//! # Metrics
//! - `feign_lb_requests_total` (counter): load-balanced calls by service, status
//! - `feign_lb_request_duration_seconds` (histogram): latency per service
//! - `feign_circuit_breaker_calls_total` (counter): breaker outcomes by name
//! - `feign_retry_attempts_total` (counter): retries issued per service
//!
//! Updates go through the `metrics` facade and are no-ops until a recorder
//! is installed (see [`init_metrics`]).

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics recorder"),
    }
}

/// Record a completed load-balanced call.
pub fn record_lb_request(service_id: &str, status: &'static str, elapsed: Duration) {
    metrics::counter!(
        "feign_lb_requests_total",
        "service" => service_id.to_string(),
        "status" => status
    )
    .increment(1);
    metrics::histogram!(
        "feign_lb_request_duration_seconds",
        "service" => service_id.to_string()
    )
    .record(elapsed.as_secs_f64());
}

/// Record a circuit breaker outcome ("success", "failure", "rejected").
pub fn record_breaker_call(name: &str, outcome: &'static str) {
    metrics::counter!(
        "feign_circuit_breaker_calls_total",
        "name" => name.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Record a retry attempt.
pub fn record_retry(service_id: &str) {
    metrics::counter!("feign_retry_attempts_total", "service" => service_id.to_string()).increment(1);
}
