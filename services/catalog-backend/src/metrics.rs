//! Prometheus metrics exposition
//!
//! - `catalog_http_requests_total` (counter): labels `route`, `status`
//! - `catalog_backend_logins_total` (counter): label `outcome`
//! - `catalog_backend_refresh_total` (counter): label `outcome`

use anyhow::Context;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and return a handle for rendering `/metrics`.
pub fn install_recorder() -> anyhow::Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install Prometheus recorder")
}

/// Record a completed request against its route template.
pub fn record_request(route: &str, status: u16) {
    metrics::counter!(
        "catalog_http_requests_total",
        "route" => route.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

pub fn record_login(outcome: &'static str) {
    metrics::counter!("catalog_backend_logins_total", "outcome" => outcome).increment(1);
}

pub fn record_refresh(outcome: &'static str) {
    metrics::counter!("catalog_backend_refresh_total", "outcome" => outcome).increment(1);
}
