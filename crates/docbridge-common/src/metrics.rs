//! Metrics and observability for docbridge
#![allow(clippy::cast_precision_loss)]

use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

/// Process-wide Prometheus recorder handle
static PROMETHEUS: OnceCell<PrometheusHandle> = OnceCell::new();

static START_TIME: once_cell::sync::Lazy<Instant> = once_cell::sync::Lazy::new(Instant::now);

/// Install the Prometheus recorder.
///
/// Safe to call more than once; only the first call installs. Returns false
/// when another recorder already owns the global slot.
pub fn install() -> bool {
    once_cell::sync::Lazy::force(&START_TIME);
    PROMETHEUS
        .get_or_try_init(|| PrometheusBuilder::new().install_recorder())
        .map_err(|e| tracing::warn!("Failed to install Prometheus recorder: {}", e))
        .is_ok()
}

// ============================================================================
// Request Metrics
// ============================================================================

/// Record a completed save
pub fn record_save(created: bool) {
    counter!("docbridge_saves_total", "created" => created.to_string()).increment(1);
}

/// Record a completed search and how many records it returned
pub fn record_search(returned: usize) {
    counter!("docbridge_searches_total").increment(1);
    histogram!("docbridge_search_results").record(returned as f64);
}

/// Record a search answered without touching the store
pub fn record_search_short_circuit() {
    counter!("docbridge_search_short_circuits_total").increment(1);
}

/// Record a store failure
pub fn record_store_error(operation: &str) {
    counter!("docbridge_store_errors_total", "operation" => operation.to_string()).increment(1);
}

/// Record request handling latency
pub fn record_request_latency(endpoint: &'static str, latency_ms: f64) {
    histogram!("docbridge_request_duration_ms", "endpoint" => endpoint).record(latency_ms);
}

// ============================================================================
// Export Functions
// ============================================================================

/// Export metrics in Prometheus format
#[must_use]
pub fn export_prometheus() -> String {
    let uptime = format!(
        "# HELP docbridge_uptime_seconds Server uptime in seconds\n\
         # TYPE docbridge_uptime_seconds gauge\n\
         docbridge_uptime_seconds {}\n",
        START_TIME.elapsed().as_secs_f64()
    );

    match PROMETHEUS.get() {
        Some(handle) => format!("{uptime}{}", handle.render()),
        None => uptime,
    }
}

/// Timer guard that records request latency when dropped
pub struct LatencyTimer {
    start: Instant,
    endpoint: &'static str,
}

impl LatencyTimer {
    #[must_use]
    pub fn new(endpoint: &'static str) -> Self {
        Self {
            start: Instant::now(),
            endpoint,
        }
    }

    #[must_use]
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        record_request_latency(self.endpoint, self.elapsed_ms());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_includes_uptime() {
        install();
        record_save(true);
        let text = export_prometheus();
        assert!(text.contains("docbridge_uptime_seconds"));
    }

    #[test]
    fn test_install_is_idempotent() {
        let first = install();
        let second = install();
        assert_eq!(first, second);
    }
}
