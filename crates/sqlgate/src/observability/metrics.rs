//! Prometheus metrics for sqlgate

use std::sync::OnceLock;
use std::time::{Duration, Instant};

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::Result;
use crate::error::Error;

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
static START_TIME: OnceLock<Instant> = OnceLock::new();

// Server metrics
const METRIC_UPTIME: &str = "sqlgate_uptime_seconds";
const METRIC_INFO: &str = "sqlgate_info";
const METRIC_REQUESTS: &str = "sqlgate_requests_total";
const METRIC_REQUEST_DURATION: &str = "sqlgate_request_duration_seconds";

// Session metrics
const METRIC_SESSIONS: &str = "sqlgate_live_sessions";
const METRIC_AUTH_REJECTIONS: &str = "sqlgate_auth_rejections_total";

// Query metrics
const METRIC_QUERY_TOTAL: &str = "sqlgate_queries_total";

// Console metrics
const METRIC_CONSOLE_COMMANDS: &str = "sqlgate_console_commands_total";

/// Initialize Prometheus metrics recorder.
pub fn init_metrics() -> Result<()> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| Error::Config(format!("Failed to install metrics recorder: {e}")))?;

    PROMETHEUS_HANDLE.set(handle).ok();
    START_TIME.set(Instant::now()).ok();

    register_metrics();
    tracing::info!("Prometheus metrics initialized");
    Ok(())
}

fn register_metrics() {
    describe_gauge!(METRIC_UPTIME, "Gateway uptime in seconds");
    describe_gauge!(METRIC_INFO, "Gateway information (always 1)");
    describe_counter!(METRIC_REQUESTS, "Total HTTP requests by route and status");
    describe_histogram!(METRIC_REQUEST_DURATION, "HTTP request duration in seconds");

    describe_gauge!(METRIC_SESSIONS, "Live sessions by plane");
    describe_counter!(METRIC_AUTH_REJECTIONS, "Requests turned away by the auth gate");

    describe_counter!(METRIC_QUERY_TOTAL, "Statements proxied to downstream databases");

    describe_counter!(METRIC_CONSOLE_COMMANDS, "Operator console commands by kind");

    gauge!(
        METRIC_INFO,
        "version" => env!("CARGO_PKG_VERSION"),
    )
    .set(1.0);
}

/// Render metrics in Prometheus text format.
#[must_use]
pub fn render_metrics() -> String {
    if let Some(start) = START_TIME.get() {
        gauge!(METRIC_UPTIME).set(start.elapsed().as_secs_f64());
    }

    PROMETHEUS_HANDLE
        .get()
        .map(PrometheusHandle::render)
        .unwrap_or_default()
}

/// Record a finished HTTP request.
pub fn record_request(route: &str, status: u16, duration: Duration) {
    counter!(
        METRIC_REQUESTS,
        "route" => route.to_owned(),
        "status" => status.to_string(),
    )
    .increment(1);

    histogram!(METRIC_REQUEST_DURATION, "route" => route.to_owned())
        .record(duration.as_secs_f64());
}

/// Record a proxied statement by outcome (`OK` or `FAIL`).
pub fn record_query(status: &str) {
    counter!(METRIC_QUERY_TOTAL, "status" => status.to_owned()).increment(1);
}

/// Record a request turned away by the auth gate.
pub fn record_auth_rejection(plane: &str, reason: &str) {
    counter!(
        METRIC_AUTH_REJECTIONS,
        "plane" => plane.to_owned(),
        "reason" => reason.to_owned(),
    )
    .increment(1);
}

/// Update the live session gauge for one plane.
#[allow(clippy::cast_precision_loss)]
pub fn set_live_sessions(plane: &str, count: usize) {
    gauge!(METRIC_SESSIONS, "plane" => plane.to_owned()).set(count as f64);
}

/// Record a dispatched console command.
pub fn record_console_command(kind: &str) {
    counter!(METRIC_CONSOLE_COMMANDS, "kind" => kind.to_owned()).increment(1);
}
