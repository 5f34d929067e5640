//! Prometheus metrics for monitoring
//!
//! Exposes metrics for:
//! - Plans built and rejected
//! - Hop creation
//! - Status polling and transitions

use crate::error::{SwapError, SwapResult};
use crate::types::Status;

use axum::{http::StatusCode, routing::get, Router};
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge, register_histogram, CounterVec, Encoder, Gauge,
    Histogram, TextEncoder,
};
use std::net::SocketAddr;
use tracing::info;

lazy_static! {
    // Planning metrics
    pub static ref PLANS_BUILT: Histogram = register_histogram!(
        "hopswap_plans_built_hops",
        "Hop count of successfully built plans",
        vec![1.0, 2.0, 3.0]
    ).unwrap();

    pub static ref PLAN_REJECTIONS: CounterVec = register_counter_vec!(
        "hopswap_plan_rejections_total",
        "Plans rejected during planning",
        &["reason"]
    ).unwrap();

    // Execution metrics
    pub static ref HOPS: CounterVec = register_counter_vec!(
        "hopswap_hops_total",
        "Hop creation attempts by outcome",
        &["outcome"]
    ).unwrap();

    // Tracking metrics
    pub static ref STATUS_POLLS: CounterVec = register_counter_vec!(
        "hopswap_status_polls_total",
        "Status polls by outcome",
        &["outcome"]
    ).unwrap();

    pub static ref STATUS_TRANSITIONS: CounterVec = register_counter_vec!(
        "hopswap_status_transitions_total",
        "Ledger status transitions by target state",
        &["status"]
    ).unwrap();

    pub static ref TRACKED: Gauge = register_gauge!(
        "hopswap_tracked_transactions",
        "Transactions currently being polled"
    ).unwrap();
}

/// Prometheus metrics server
pub struct MetricsServer {
    port: u16,
}

impl MetricsServer {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    pub async fn run(&self) -> SwapResult<()> {
        let app = Router::new().route("/metrics", get(metrics_handler));

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        info!("Starting metrics server on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| SwapError::Config(format!("Failed to bind {}: {}", addr, e)))?;
        axum::serve(listener, app)
            .await
            .map_err(|e| SwapError::Internal(format!("Metrics server failed: {}", e)))?;

        Ok(())
    }
}

async fn metrics_handler() -> Result<String, StatusCode> {
    render().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

/// Encode all registered metrics in the text exposition format
pub fn render() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

// Helper functions to record metrics

pub fn record_plan_built(hops: usize) {
    PLANS_BUILT.observe(hops as f64);
}

pub fn record_below_minimum() {
    PLAN_REJECTIONS.with_label_values(&["below_minimum"]).inc();
}

pub fn record_hop_created() {
    HOPS.with_label_values(&["created"]).inc();
}

pub fn record_hop_failed() {
    HOPS.with_label_values(&["failed"]).inc();
}

pub fn record_status_poll() {
    STATUS_POLLS.with_label_values(&["completed"]).inc();
}

pub fn record_poll_failure() {
    STATUS_POLLS.with_label_values(&["failed"]).inc();
}

pub fn record_status_transition(status: Status) {
    STATUS_TRANSITIONS
        .with_label_values(&[status.as_str()])
        .inc();
}

pub fn record_tracked(count: usize) {
    TRACKED.set(count as f64);
}
