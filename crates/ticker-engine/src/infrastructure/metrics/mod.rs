//! Prometheus Metrics Module
//!
//! Exposes engine metrics via Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Events**: Counts of ticker events published and delivered
//! - **Subscriptions**: Active streaming and polled instrument counts
//! - **Errors**: Poll failures, stream failures, and reconnects
//! - **Latency**: Polling cycle durations
//!
//! # Integration
//!
//! The embedding process calls [`init_metrics`] once at startup and serves
//! the rendered handle wherever it exposes `/metrics`.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// # Panics
///
/// Panics if the recorder cannot be installed.
#[allow(clippy::expect_used)]
pub fn init_metrics() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            let builder = PrometheusBuilder::new();
            let handle = builder
                .install_recorder()
                .expect("failed to install Prometheus recorder");

            register_metrics();
            handle
        })
        .clone()
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "ticker_engine_events_published_total",
        "Total ticker events published to the broadcast hub"
    );
    describe_counter!(
        "ticker_engine_events_delivered_total",
        "Total ticker event deliveries across all consumers"
    );

    describe_gauge!(
        "ticker_engine_streaming_subscriptions",
        "Live streaming subscriptions per exchange"
    );
    describe_gauge!(
        "ticker_engine_polled_instruments",
        "Instruments currently covered by the polling loop"
    );

    describe_counter!(
        "ticker_engine_poll_errors_total",
        "Failed per-instrument polling fetches"
    );
    describe_counter!(
        "ticker_engine_stream_errors_total",
        "Per-update errors reported by live streams"
    );
    describe_counter!(
        "ticker_engine_reconnects_total",
        "Streaming sessions torn down and re-established per exchange"
    );

    describe_histogram!(
        "ticker_engine_poll_cycle_seconds",
        "Duration of one full polling pass over all instruments"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Record one published ticker event and how many consumers received it.
pub fn record_event_published(delivered: u64) {
    counter!("ticker_engine_events_published_total").increment(1);
    counter!("ticker_engine_events_delivered_total").increment(delivered);
}

/// Update the live streaming subscription count for an exchange.
pub fn set_streaming_subscriptions(exchange: &str, count: f64) {
    gauge!(
        "ticker_engine_streaming_subscriptions",
        "exchange" => exchange.to_string()
    )
    .set(count);
}

/// Update the total polled instrument count.
pub fn set_polled_instruments(count: f64) {
    gauge!("ticker_engine_polled_instruments").set(count);
}

/// Record a failed polling fetch for an exchange.
pub fn record_poll_error(exchange: &str) {
    counter!(
        "ticker_engine_poll_errors_total",
        "exchange" => exchange.to_string()
    )
    .increment(1);
}

/// Record a per-update stream error for an exchange.
pub fn record_stream_error(exchange: &str) {
    counter!(
        "ticker_engine_stream_errors_total",
        "exchange" => exchange.to_string()
    )
    .increment(1);
}

/// Record a streaming session teardown/re-establish cycle.
pub fn record_reconnect(exchange: &str) {
    counter!(
        "ticker_engine_reconnects_total",
        "exchange" => exchange.to_string()
    )
    .increment(1);
}

/// Record the duration of one full polling pass.
pub fn record_poll_cycle_duration(duration: Duration) {
    histogram!("ticker_engine_poll_cycle_seconds").record(duration.as_secs_f64());
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_without_recorder_is_a_no_op() {
        // The metrics crate silently drops recordings when no recorder is
        // installed; these must not panic in library consumers that skip
        // init_metrics.
        record_event_published(3);
        record_poll_error("bitstamp");
        record_stream_error("binance");
        record_reconnect("binance");
        set_streaming_subscriptions("binance", 2.0);
        set_polled_instruments(1.0);
        record_poll_cycle_duration(Duration::from_millis(5));
    }

    #[test]
    fn handle_is_available_after_init() {
        let _handle = init_metrics();
        assert!(get_metrics_handle().is_some());
    }
}
