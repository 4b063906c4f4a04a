//! Metrics collection and exposition.
//!
//! # Metrics
//! - `roster_http_requests_total` (counter): requests by method, status
//! - `roster_http_request_duration_seconds` (histogram): latency distribution
//! - `roster_rpc_calls_total` (counter): calls by service, method, outcome
//! - `roster_job_runs_total` (counter): cron invocations by job
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter is installed
//! - Labels kept low-cardinality (no paths, no ids)

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("status", status.to_string()),
    ];
    metrics::counter!("roster_http_requests_total", &labels).increment(1);
    metrics::histogram!("roster_http_request_duration_seconds", &labels)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_rpc_call(service: &str, method: &str, ok: bool) {
    metrics::counter!(
        "roster_rpc_calls_total",
        "service" => service.to_string(),
        "method" => method.to_string(),
        "outcome" => if ok { "ok" } else { "error" },
    )
    .increment(1);
}

pub fn record_job_run(job: &str) {
    metrics::counter!("roster_job_runs_total", "job" => job.to_string()).increment(1);
}
