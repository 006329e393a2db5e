//! Prometheus metrics for the proxy routes.
//!
//! The recorder is installed once per process; later calls to [`init`]
//! return a handle to the same registry.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Instant;

static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the global Prometheus recorder (idempotent) and return its handle.
pub fn init() -> PrometheusHandle {
    HANDLE
        .get_or_init(|| {
            let recorder = PrometheusBuilder::new().build_recorder();
            let handle = recorder.handle();
            // Another recorder may already be installed (e.g. by a test harness)
            let _ = metrics::set_global_recorder(recorder);
            handle
        })
        .clone()
}

/// Count a finished request for `route` with its response status.
pub fn record_request(route: &'static str, status: u16) {
    counter!("streamgate_requests_total", "route" => route, "status" => status.to_string())
        .increment(1);
}

/// Record the elapsed handling time for `route`.
pub fn record_duration(route: &'static str, start: Instant) {
    histogram!("streamgate_request_duration_seconds", "route" => route)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_upstream_error() {
    counter!("streamgate_upstream_errors_total").increment(1);
}

/// Count a manifest that went through the rewriter and how many lines changed.
pub fn record_manifest_rewrite(rewritten_lines: usize) {
    counter!("streamgate_manifest_rewrites_total").increment(1);
    counter!("streamgate_manifest_rewritten_lines_total").increment(rewritten_lines as u64);
}
