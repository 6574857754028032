//! Metrics collection and exposition.
//!
//! # Metrics
//! - `xpay_remote_calls_total` (counter): remote calls by method, outcome
//! - `xpay_nonce_resolutions_total` (counter): which source won, local or chain
//! - `xpay_signatures_total` (counter): signatures by mode, outcome
//! - `xpay_submissions_total` (counter): broadcasts by outcome

use metrics::counter;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Start the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_remote_call(method: &str, ok: bool) {
    counter!(
        "xpay_remote_calls_total",
        "method" => method.to_string(),
        "outcome" => outcome(ok)
    )
    .increment(1);
}

pub fn record_nonce_resolution(source: &'static str) {
    counter!("xpay_nonce_resolutions_total", "source" => source).increment(1);
}

pub fn record_signature(mode: &'static str, ok: bool) {
    counter!("xpay_signatures_total", "mode" => mode, "outcome" => outcome(ok)).increment(1);
}

pub fn record_submission(ok: bool) {
    counter!("xpay_submissions_total", "outcome" => outcome(ok)).increment(1);
}

fn outcome(ok: bool) -> &'static str {
    if ok {
        "success"
    } else {
        "failure"
    }
}
