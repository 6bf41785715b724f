//! Prometheus request metrics middleware.

use actix_web_prom::{PrometheusMetrics, PrometheusMetricsBuilder};
use prometheus::Registry;

const NAMESPACE: &str = "chat_usage";
const ENDPOINT: &str = "/metrics";

/// Build the request metrics middleware on top of a shared registry.
///
/// # Errors
/// Returns [`std::io::Error`] when the HTTP collectors cannot be registered.
pub(crate) fn request_metrics(registry: Registry) -> std::io::Result<PrometheusMetrics> {
    PrometheusMetricsBuilder::new(NAMESPACE)
        .registry(registry)
        .endpoint(ENDPOINT)
        .build()
        .map_err(|e| std::io::Error::other(format!("configure Prometheus metrics: {e}")))
}
