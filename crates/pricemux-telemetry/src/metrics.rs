//! Prometheus metrics.
//!
//! Connection health and throughput gauges, refreshed by the daemon's
//! status loop from each connection's counters.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. A registration
//! failure means duplicate metric names, a fatal configuration error that
//! should crash at startup rather than fail silently. These panics only
//! occur during static initialization, never at runtime.

use once_cell::sync::Lazy;
use prometheus::{
    register_gauge_vec, register_int_gauge_vec, GaugeVec, IntGaugeVec,
};

/// Connection state machine current state per exchange.
/// Labels: exchange, state (idle/connecting/open/closing/closed/abandoned).
pub static CONNECTION_STATE: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "pricemux_connection_state",
        "Connection state per exchange (1=active, 0=inactive)",
        &["exchange", "state"]
    )
    .unwrap()
});

/// Current reconnect attempt count per exchange.
pub static RECONNECT_ATTEMPTS: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "pricemux_reconnect_attempts",
        "Current reconnect attempt count per exchange",
        &["exchange"]
    )
    .unwrap()
});

/// Cumulative reconnects scheduled per exchange.
pub static RECONNECTS_TOTAL: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "pricemux_reconnects_total",
        "Total reconnects scheduled per exchange",
        &["exchange"]
    )
    .unwrap()
});

/// Cumulative price updates forwarded per exchange.
pub static UPDATES_TOTAL: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "pricemux_updates_total",
        "Total price updates forwarded per exchange",
        &["exchange"]
    )
    .unwrap()
});

/// Cumulative updates dropped on the connection -> aggregator hand-off.
pub static UPDATES_DROPPED_TOTAL: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "pricemux_updates_dropped_total",
        "Total price updates dropped per exchange",
        &["exchange"]
    )
    .unwrap()
});

/// Cumulative malformed frames discarded per exchange.
pub static PARSE_ERRORS_TOTAL: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "pricemux_parse_errors_total",
        "Total malformed frames discarded per exchange",
        &["exchange"]
    )
    .unwrap()
});

/// All states a connection can report, for gauge bookkeeping.
pub const CONNECTION_STATES: [&str; 6] = [
    "idle",
    "connecting",
    "open",
    "closing",
    "closed",
    "abandoned",
];

/// Set the one-hot state gauge for an exchange.
pub fn set_connection_state(exchange: &str, state: &str) {
    for candidate in CONNECTION_STATES {
        let value = if candidate == state { 1.0 } else { 0.0 };
        CONNECTION_STATE
            .with_label_values(&[exchange, candidate])
            .set(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_connection_state_is_one_hot() {
        set_connection_state("binance", "open");
        assert_eq!(
            CONNECTION_STATE.with_label_values(&["binance", "open"]).get(),
            1.0
        );
        assert_eq!(
            CONNECTION_STATE.with_label_values(&["binance", "closed"]).get(),
            0.0
        );

        set_connection_state("binance", "closed");
        assert_eq!(
            CONNECTION_STATE.with_label_values(&["binance", "open"]).get(),
            0.0
        );
    }

    #[test]
    fn test_counter_gauges_register() {
        UPDATES_TOTAL.with_label_values(&["okx"]).set(5);
        assert_eq!(UPDATES_TOTAL.with_label_values(&["okx"]).get(), 5);
    }
}
