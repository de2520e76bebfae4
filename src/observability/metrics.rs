//! Metrics collection and exposition.
//!
//! # Metrics
//! - `deadline_delays_created_total` (counter): armed delays by phase
//! - `deadline_exceeded_total` (counter): expirations surfaced to callers by phase
//! - `pool_checkouts_total` (counter): checkouts by outcome
//! - `operation_retries_total` (counter): retry attempts by deadline policy
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed
//! - Prometheus rendering is opt-in via `install_prometheus`

use metrics::counter;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

use crate::timing::Phase;

/// Install a global Prometheus recorder and return a handle for rendering.
pub fn install_prometheus() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

pub fn record_delay_created(phase: Phase) {
    counter!("deadline_delays_created_total", "phase" => phase.as_str()).increment(1);
}

pub fn record_deadline_exceeded(phase: Phase) {
    counter!("deadline_exceeded_total", "phase" => phase.as_str()).increment(1);
}

/// Outcome is one of `success`, `timeout`, `closed`.
pub fn record_checkout(outcome: &'static str) {
    counter!("pool_checkouts_total", "outcome" => outcome).increment(1);
}

pub fn record_retry(policy: &'static str) {
    counter!("operation_retries_total", "policy" => policy).increment(1);
}
