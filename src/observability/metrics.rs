//! Metrics collection and exposition.
//!
//! # Metrics
//! - `lb_requests_total` (counter): forwarded requests by backend, status
//! - `lb_request_duration_seconds` (histogram): upstream latency by backend
//! - `lb_backend_active_connections` (gauge): in-flight count per backend
//! - `lb_dispatch_failures_total` (counter): requests with no backend, by reason

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder with an HTTP scrape listener on `addr`.
///
/// Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(backend: &str, status: u16, started: Instant) {
    counter!(
        "lb_requests_total",
        "backend" => backend.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("lb_request_duration_seconds", "backend" => backend.to_string())
        .record(started.elapsed().as_secs_f64());
}

pub fn record_active_connections(backend: &str, count: usize) {
    gauge!("lb_backend_active_connections", "backend" => backend.to_string()).set(count as f64);
}

pub fn record_dispatch_failure(reason: &'static str) {
    counter!("lb_dispatch_failures_total", "reason" => reason).increment(1);
}
