//! Prometheus metrics for Wicket.
//!
//! # Standard Metrics
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `wicket_connections_accepted_total` | Counter | - | Accepted connections |
//! | `wicket_accept_retries_total` | Counter | - | Accept calls retried after an interrupt |
//! | `wicket_workers_active` | Gauge | - | Workers spawned and not yet reaped |
//! | `wicket_workers_reaped_total` | Counter | `outcome` | Reclaimed workers |
//! | `wicket_responses_total` | Counter | `status` | Responses sent |
//! | `wicket_request_errors_total` | Counter | `kind` | Connections failed by error kind |
//!
//! Recording is a no-op until [`init_metrics`] installs a recorder.

use crate::error::TelemetryError;
use crate::TelemetryResult;
use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Metric names.
pub mod names {
    /// Accepted connections.
    pub const CONNECTIONS_ACCEPTED: &str = "wicket_connections_accepted_total";
    /// Interrupted accept calls that were retried.
    pub const ACCEPT_RETRIES: &str = "wicket_accept_retries_total";
    /// Workers spawned and not yet reaped.
    pub const WORKERS_ACTIVE: &str = "wicket_workers_active";
    /// Reclaimed workers by outcome.
    pub const WORKERS_REAPED: &str = "wicket_workers_reaped_total";
    /// Responses sent by status code.
    pub const RESPONSES: &str = "wicket_responses_total";
    /// Failed connections by error kind.
    pub const REQUEST_ERRORS: &str = "wicket_request_errors_total";
}

/// Metrics configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsConfig {
    /// Whether the Prometheus exporter is installed.
    pub enabled: bool,

    /// Address of the scrape endpoint (e.g., "0.0.0.0:9090").
    pub addr: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            addr: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Installs the Prometheus recorder and its HTTP scrape listener.
///
/// # Errors
///
/// Returns `TelemetryError::InvalidAddress` for an unparsable address and
/// `TelemetryError::MetricsInit` if the exporter cannot be installed.
pub fn init_metrics(config: &MetricsConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let addr: SocketAddr = config
        .addr
        .parse()
        .map_err(|e| TelemetryError::InvalidAddress(format!("{}: {e}", config.addr)))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;

    register_metric_descriptions();
    tracing::info!(%addr, "metrics endpoint listening");

    Ok(())
}

fn register_metric_descriptions() {
    describe_counter!(names::CONNECTIONS_ACCEPTED, "Total connections accepted");
    describe_counter!(
        names::ACCEPT_RETRIES,
        "Accept calls interrupted by a signal and retried"
    );
    describe_gauge!(
        names::WORKERS_ACTIVE,
        "Connection workers spawned and not yet reclaimed"
    );
    describe_counter!(names::WORKERS_REAPED, "Connection workers reclaimed");
    describe_counter!(names::RESPONSES, "Responses written to clients");
    describe_counter!(names::REQUEST_ERRORS, "Connections that ended in an error");
}

/// Records an accepted connection.
pub fn record_connection_accepted() {
    counter!(names::CONNECTIONS_ACCEPTED).increment(1);
}

/// Records an interrupted accept that is about to be retried.
pub fn record_accept_retry() {
    counter!(names::ACCEPT_RETRIES).increment(1);
}

/// Records a newly spawned worker.
pub fn record_worker_spawned() {
    gauge!(names::WORKERS_ACTIVE).increment(1.0);
}

/// Records a reclaimed worker.
///
/// `outcome` is one of `completed`, `failed` or `panicked`.
pub fn record_worker_reaped(outcome: &'static str) {
    gauge!(names::WORKERS_ACTIVE).decrement(1.0);
    counter!(names::WORKERS_REAPED, "outcome" => outcome).increment(1);
}

/// Records a response. Only the numeric part of the status is used as label.
pub fn record_response(status: &str) {
    counter!(names::RESPONSES, "status" => status_label(status)).increment(1);
}

/// Records a connection that failed with the given error kind.
pub fn record_request_error(kind: &'static str) {
    counter!(names::REQUEST_ERRORS, "kind" => kind).increment(1);
}

fn status_label(status: &str) -> String {
    status
        .split_whitespace()
        .next()
        .unwrap_or("unknown")
        .to_string()
}
