//! Metrics collection and exposition.
//!
//! # Metrics
//! - `api_requests_total` (counter): requests by method, status
//! - `api_request_duration_seconds` (histogram): latency by method
//! - `api_rate_limited_total` (counter): requests rejected with 429
//! - `api_rate_limiter_clients` (gauge): clients tracked by the limiter
//! - `api_auth_rejections_total` (counter): admission failures by reason
//! - `api_panics_recovered_total` (counter): handler panics turned into 500s
//! - `api_background_tasks_total` (counter): finished background work by task, outcome
//! - `api_background_tasks_pending` (gauge): background work still running

use std::net::SocketAddr;
use std::time::Instant;

use axum::{body::Body, extract::Request, middleware::Next, response::Response};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    let labels = [("method", method.to_string()), ("status", status.to_string())];
    counter!("api_requests_total", &labels).increment(1);
    histogram!("api_request_duration_seconds", &labels[..1]).record(start.elapsed().as_secs_f64());
}

pub fn record_rate_limited() {
    counter!("api_rate_limited_total").increment(1);
}

pub fn record_rate_limiter_clients(count: usize) {
    gauge!("api_rate_limiter_clients").set(count as f64);
}

pub fn record_auth_rejection(reason: &'static str) {
    counter!("api_auth_rejections_total", "reason" => reason).increment(1);
}

pub fn record_panic_recovered() {
    counter!("api_panics_recovered_total").increment(1);
}

pub fn record_background_task(task: &'static str, outcome: &'static str) {
    counter!("api_background_tasks_total", "task" => task, "outcome" => outcome).increment(1);
}

pub fn record_pending_tasks(count: usize) {
    gauge!("api_background_tasks_pending").set(count as f64);
}

/// Record method, status and latency for every response.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let start = Instant::now();
    let response = next.run(request).await;
    record_request(method.as_str(), response.status().as_u16(), start);
    response
}
