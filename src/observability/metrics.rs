//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_sessions_total` (counter): sessions started
//! - `relay_sessions_active` (gauge): sessions currently running
//! - `relay_session_duration_seconds` (histogram): session lifetime
//! - `relay_frames_total` (counter): frames forwarded, by direction and kind
//! - `relay_upstream_failures_total` (counter): failed upstream handshakes, by reason
//! - `relay_upgrade_failures_total` (counter): inbound requests that could not be upgraded
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - The Prometheus exporter is only installed when enabled in config

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_session_started() {
    metrics::counter!("relay_sessions_total").increment(1);
    metrics::gauge!("relay_sessions_active").increment(1.0);
}

pub fn record_session_finished(duration: Duration) {
    metrics::gauge!("relay_sessions_active").decrement(1.0);
    metrics::histogram!("relay_session_duration_seconds").record(duration.as_secs_f64());
}

pub fn record_frame(direction: &'static str, kind: &'static str) {
    metrics::counter!("relay_frames_total", "direction" => direction, "kind" => kind).increment(1);
}

pub fn record_upstream_failure(reason: &'static str) {
    metrics::counter!("relay_upstream_failures_total", "reason" => reason).increment(1);
}

pub fn record_upgrade_failure() {
    metrics::counter!("relay_upgrade_failures_total").increment(1);
}
