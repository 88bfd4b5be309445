//! Prometheus metrics for the signal engines.
//!
//! Counters cover every event the engines consume or emit; histograms
//! cover per-event evaluation latency. Without an installed recorder the
//! macros are no-ops.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use tracing::{debug, info};

// === Metric Name Constants ===

/// Ticks received counter metric name.
pub const METRIC_TICKS_RECEIVED: &str = "ticks_received_total";
/// Book messages received counter metric name.
pub const METRIC_BOOKS_RECEIVED: &str = "book_messages_received_total";
/// Dropped events counter metric name.
pub const METRIC_EVENTS_DROPPED: &str = "events_dropped_total";
/// Subscription failures counter metric name.
pub const METRIC_SUBSCRIPTION_FAILURES: &str = "subscription_failures_total";
/// Arbitrage signals counter metric name.
pub const METRIC_ARBITRAGE_SIGNALS: &str = "arbitrage_signals_total";
/// Position events counter metric name.
pub const METRIC_POSITION_EVENTS: &str = "position_events_total";
/// Executed cycles counter metric name.
pub const METRIC_EXECUTIONS: &str = "executions_total";
/// Failed executions counter metric name.
pub const METRIC_EXECUTION_FAILURES: &str = "execution_failures_total";
/// WebSocket messages received counter metric name.
pub const METRIC_WS_MESSAGES_RECEIVED: &str = "ws_messages_received_total";
/// WebSocket reconnects counter metric name.
pub const METRIC_WS_RECONNECTS: &str = "ws_reconnects_total";
/// Tick evaluation latency metric name.
pub const METRIC_TICK_LATENCY: &str = "tick_evaluation_latency_ms";
/// Book evaluation latency metric name.
pub const METRIC_BOOK_LATENCY: &str = "book_evaluation_latency_ms";

/// Initialize all metric descriptions.
/// Call this once at startup to register metrics with descriptions.
pub fn init_metrics() {
    describe_histogram!(
        METRIC_TICK_LATENCY,
        "Time to absorb a tick and scan affected cycles in milliseconds"
    );
    describe_histogram!(
        METRIC_BOOK_LATENCY,
        "Time to apply a book message and evaluate position rules in milliseconds"
    );

    describe_counter!(METRIC_TICKS_RECEIVED, "Total number of ticks received");
    describe_counter!(
        METRIC_BOOKS_RECEIVED,
        "Total number of book messages received"
    );
    describe_counter!(
        METRIC_EVENTS_DROPPED,
        "Total number of malformed events dropped"
    );
    describe_counter!(
        METRIC_SUBSCRIPTION_FAILURES,
        "Total number of failed subscribe or unsubscribe requests"
    );
    describe_counter!(
        METRIC_ARBITRAGE_SIGNALS,
        "Total number of tradeable cycles detected"
    );
    describe_counter!(
        METRIC_POSITION_EVENTS,
        "Total number of position state transitions"
    );
    describe_counter!(METRIC_EXECUTIONS, "Total number of cycles fully executed");
    describe_counter!(
        METRIC_EXECUTION_FAILURES,
        "Total number of cycle executions that failed"
    );
    describe_counter!(
        METRIC_WS_MESSAGES_RECEIVED,
        "Total number of WebSocket messages received"
    );
    describe_counter!(
        METRIC_WS_RECONNECTS,
        "Total number of WebSocket reconnections"
    );

    debug!("Metrics initialized");
}

/// Install the Prometheus recorder and its scrape endpoint on `0.0.0.0:port`.
pub fn install_exporter(port: u16) -> Result<(), BuildError> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    init_metrics();
    info!(%addr, "Prometheus exporter listening");
    Ok(())
}

/// Increment ticks received counter.
pub fn inc_ticks_received() {
    counter!(METRIC_TICKS_RECEIVED).increment(1);
}

/// Increment book messages received counter.
pub fn inc_books_received(symbol: &str) {
    counter!(METRIC_BOOKS_RECEIVED, "symbol" => symbol.to_string()).increment(1);
}

/// Increment dropped events counter.
pub fn inc_events_dropped(engine: &'static str) {
    counter!(METRIC_EVENTS_DROPPED, "engine" => engine).increment(1);
}

/// Increment subscription failures counter.
pub fn inc_subscription_failures() {
    counter!(METRIC_SUBSCRIPTION_FAILURES).increment(1);
}

/// Increment arbitrage signals counter.
pub fn inc_arbitrage_signals() {
    counter!(METRIC_ARBITRAGE_SIGNALS).increment(1);
}

/// Increment position events counter.
pub fn inc_position_events(action: &str) {
    counter!(METRIC_POSITION_EVENTS, "action" => action.to_string()).increment(1);
}

/// Increment executed cycles counter.
pub fn inc_executions() {
    counter!(METRIC_EXECUTIONS).increment(1);
}

/// Increment failed executions counter.
pub fn inc_execution_failures() {
    counter!(METRIC_EXECUTION_FAILURES).increment(1);
}

/// Increment WebSocket messages received counter.
pub fn inc_ws_messages_received() {
    counter!(METRIC_WS_MESSAGES_RECEIVED).increment(1);
}

/// Increment WebSocket reconnects counter.
pub fn inc_ws_reconnects() {
    counter!(METRIC_WS_RECONNECTS).increment(1);
}

/// RAII guard for timing operations.
/// Automatically records latency when dropped.
pub struct LatencyTimer {
    start: Instant,
    metric_name: &'static str,
}

impl LatencyTimer {
    /// Create a new latency timer for the given metric.
    pub fn new(metric_name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            metric_name,
        }
    }

    /// Get elapsed time in milliseconds (without recording).
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        histogram!(self.metric_name).record(self.elapsed_ms());
    }
}

/// Create a latency timer for tick evaluation.
pub fn timer_tick() -> LatencyTimer {
    LatencyTimer::new(METRIC_TICK_LATENCY)
}

/// Create a latency timer for book evaluation.
pub fn timer_book() -> LatencyTimer {
    LatencyTimer::new(METRIC_BOOK_LATENCY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn latency_timer_measures_time() {
        let timer = timer_tick();
        sleep(Duration::from_millis(10));
        assert!(timer.elapsed_ms() >= 9.0);
    }

    #[test]
    fn counters_are_noops_without_recorder() {
        inc_ticks_received();
        inc_events_dropped("arbitrage");
        inc_position_events("enter-long");
    }
}
