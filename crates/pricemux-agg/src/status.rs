//! Status snapshot types.
//!
//! Serializable per-exchange reports for an ops surface. The feed manager
//! assembles these from each connection's shared state and counters; no
//! lock is held across socket I/O.

use chrono::{DateTime, Utc};
use pricemux_core::ExchangeId;
use pricemux_ws::ConnectionState;
use serde::Serialize;

/// One exchange's connection health.
#[derive(Debug, Clone, Serialize)]
pub struct ExchangeStatus {
    pub exchange: ExchangeId,
    pub state: ConnectionState,
    /// Current reconnect attempt count.
    pub attempts: u32,
    pub updates_forwarded: u64,
    pub updates_dropped: u64,
    pub parse_errors: u64,
    pub reconnects: u64,
    /// Symbols currently requested for this exchange.
    pub symbols: Vec<String>,
}

/// Point-in-time report across all exchanges.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub generated_at: DateTime<Utc>,
    pub consumers: usize,
    pub exchanges: Vec<ExchangeStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_serializes() {
        let report = StatusReport {
            generated_at: Utc::now(),
            consumers: 2,
            exchanges: vec![ExchangeStatus {
                exchange: ExchangeId::Binance,
                state: ConnectionState::Open,
                attempts: 0,
                updates_forwarded: 10,
                updates_dropped: 0,
                parse_errors: 1,
                reconnects: 0,
                symbols: vec!["BTCUSDT".to_string()],
            }],
        };

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["exchanges"][0]["exchange"], "binance");
        assert_eq!(json["exchanges"][0]["state"], "open");
    }
}
