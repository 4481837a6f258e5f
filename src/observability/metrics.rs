//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gate_requests_admitted_total` (counter): admissions by priority
//! - `gate_requests_rate_limited_total` (counter): rejected by the limiter
//! - `gate_requests_completed_total` (counter): completions by outcome
//! - `gate_queue_wait_seconds` (histogram): admission to dispatch
//! - `gate_handler_duration_seconds` (histogram): time in service
//! - `gate_pending_requests` (gauge): current queue depth
//! - `gate_tracked_clients` (gauge): client records held by the limiter
//!
//! Without an installed recorder every call here is a no-op.

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_admitted(priority: u32) {
    counter!("gate_requests_admitted_total", "priority" => priority.to_string()).increment(1);
}

pub fn record_rate_limited() {
    counter!("gate_requests_rate_limited_total").increment(1);
}

/// Record one finished dispatch.
pub fn record_completion(outcome: &'static str, waited: Duration, served: Duration) {
    counter!("gate_requests_completed_total", "outcome" => outcome).increment(1);
    histogram!("gate_queue_wait_seconds").record(waited.as_secs_f64());
    histogram!("gate_handler_duration_seconds").record(served.as_secs_f64());
}

pub fn set_pending(depth: usize) {
    gauge!("gate_pending_requests").set(depth as f64);
}

pub fn set_tracked_clients(count: usize) {
    gauge!("gate_tracked_clients").set(count as f64);
}
