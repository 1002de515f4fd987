//! Prometheus Metrics Module
//!
//! # Metrics Categories
//!
//! - **REST**: Requests by transaction and outcome, pages fetched, latency
//! - **Stream**: Ticks received, pings echoed, reconnects, errors
//! - **Portfolio**: Active subscriptions and holdings
//!
//! Metrics are exposed at `/metrics` on the status server port.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder, or return the existing handle.
///
/// # Errors
///
/// Returns `BuildError` if a different global recorder is already installed.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    register_metrics();
    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle).clone())
}

/// Prometheus handle, if metrics were initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

fn register_metrics() {
    describe_counter!(
        "kiwoom_http_requests_total",
        "REST requests by transaction id and outcome"
    );
    describe_counter!(
        "kiwoom_pages_fetched_total",
        "Paginated response pages received"
    );
    describe_histogram!(
        "kiwoom_http_request_seconds",
        "REST request latency by transaction id"
    );

    describe_counter!("kiwoom_ticks_received_total", "Realtime ticks recorded");
    describe_counter!("kiwoom_pings_echoed_total", "Keep-alive frames echoed");
    describe_counter!(
        "kiwoom_stream_reconnects_total",
        "Realtime WebSocket reconnection attempts"
    );
    describe_counter!(
        "kiwoom_stream_errors_total",
        "Realtime stream errors by type"
    );

    describe_gauge!(
        "kiwoom_subscriptions",
        "Instruments registered with the realtime feed"
    );
    describe_gauge!("kiwoom_holdings", "Holdings in the cached account balance");
}

/// Outcome label for REST requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// 2xx response.
    Success,
    /// Non-success status.
    HttpError,
    /// No response.
    NetworkError,
}

impl RequestOutcome {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::HttpError => "http_error",
            Self::NetworkError => "network_error",
        }
    }
}

/// Record a completed REST request.
pub fn record_http_request(api_id: &'static str, outcome: RequestOutcome, elapsed: Duration) {
    counter!(
        "kiwoom_http_requests_total",
        "api_id" => api_id,
        "outcome" => outcome.as_str()
    )
    .increment(1);
    histogram!("kiwoom_http_request_seconds", "api_id" => api_id).record(elapsed.as_secs_f64());
}

/// Record one page of a paginated response.
pub fn record_page_fetched(api_id: &'static str) {
    counter!("kiwoom_pages_fetched_total", "api_id" => api_id).increment(1);
}

/// Record a tick written to the price board.
pub fn record_tick_received() {
    counter!("kiwoom_ticks_received_total").increment(1);
}

/// Record an echoed keep-alive.
pub fn record_ping_echoed() {
    counter!("kiwoom_pings_echoed_total").increment(1);
}

/// Record a reconnection attempt.
pub fn record_reconnect() {
    counter!("kiwoom_stream_reconnects_total").increment(1);
}

/// Record a stream error.
pub fn record_stream_error(error_type: &'static str) {
    counter!("kiwoom_stream_errors_total", "error_type" => error_type).increment(1);
}

/// Update the active subscription count.
#[allow(clippy::cast_precision_loss)]
pub fn set_subscriptions(count: usize) {
    gauge!("kiwoom_subscriptions").set(count as f64);
}

/// Update the cached holdings count.
#[allow(clippy::cast_precision_loss)]
pub fn set_holdings(count: usize) {
    gauge!("kiwoom_holdings").set(count as f64);
}
