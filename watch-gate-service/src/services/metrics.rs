//! Metrics collection for watch-gate-service.
//!
//! Counters are recorded through the `metrics` facade and rendered in
//! Prometheus text format on `/metrics`.

use metrics::counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder. Later calls are no-ops.
pub fn init_metrics() {
    if METRICS_HANDLE.get().is_some() {
        return;
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            let _ = METRICS_HANDLE.set(handle);
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to install Prometheus recorder");
        }
    }
}

/// Get metrics output in Prometheus text format.
pub fn get_metrics() -> String {
    METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized\n".to_string())
}

/// Outcome of an access check: `granted`, `unverified` or `expired`.
pub fn record_access_check(outcome: &'static str) {
    counter!("watch_gate_access_checks_total", "outcome" => outcome).increment(1);
}

pub fn record_verification(outcome: &'static str) {
    counter!("watch_gate_verifications_total", "outcome" => outcome).increment(1);
}

pub fn record_content_request(outcome: &'static str) {
    counter!("watch_gate_content_requests_total", "outcome" => outcome).increment(1);
}

/// Inbound chat update by command kind.
pub fn record_update(kind: &'static str) {
    counter!("watch_gate_updates_total", "kind" => kind).increment(1);
}
