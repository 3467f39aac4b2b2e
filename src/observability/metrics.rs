//! Metrics collection and exposition.
//!
//! # Metrics
//! - `echo_requests_total` (counter): requests by route and status
//! - `echo_request_duration_seconds` (histogram): handling latency by route
//! - `echo_stress_workers` (gauge): busy-wait workers currently spinning
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus exporter with an HTTP scrape listener on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Prometheus exporter listening");
    Ok(())
}

/// Record a completed request.
pub fn record_request(route: &'static str, status: u16, start: Instant) {
    ::metrics::counter!(
        "echo_requests_total",
        "route" => route,
        "status" => status.to_string()
    )
    .increment(1);
    ::metrics::histogram!("echo_request_duration_seconds", "route" => route)
        .record(start.elapsed().as_secs_f64());
}

/// Adjust the spinning worker gauge by `delta`.
pub fn record_stress_workers(delta: f64) {
    ::metrics::gauge!("echo_stress_workers").increment(delta);
}
