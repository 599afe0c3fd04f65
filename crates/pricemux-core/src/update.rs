//! The canonical price update event.

use crate::ExchangeId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One normalized price tick.
///
/// Every exchange-specific wire format is translated into this shape
/// before it reaches any consumer. `timestamp` is the local receipt time,
/// never the exchange's own clock (venues are inconsistent or silent
/// there).
///
/// Duplicate updates for the same (symbol, exchange) are expected across
/// reconnection windows; consumers must treat them as refreshes, not
/// errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceUpdate {
    /// Normalized instrument identifier (e.g., `BTCUSDT`).
    pub symbol: String,
    /// Source exchange.
    pub exchange: ExchangeId,
    /// Last traded price, non-negative.
    pub price: Decimal,
    /// Absolute 24h price change; zero when the venue omits it.
    pub price_change: Decimal,
    /// Relative 24h price change in percent; zero when the venue omits it.
    pub price_change_percent: Decimal,
    /// 24h base-asset volume, non-negative.
    pub volume: Decimal,
    /// Local receipt time.
    pub timestamp: DateTime<Utc>,
}

impl PriceUpdate {
    /// Create an update stamped with the current local time.
    pub fn new(
        symbol: String,
        exchange: ExchangeId,
        price: Decimal,
        price_change: Decimal,
        price_change_percent: Decimal,
        volume: Decimal,
    ) -> Self {
        Self {
            symbol,
            exchange,
            price,
            price_change,
            price_change_percent,
            volume,
            timestamp: Utc::now(),
        }
    }

    /// Age of this update in milliseconds.
    pub fn age_ms(&self) -> i64 {
        (Utc::now() - self.timestamp).num_milliseconds()
    }
}
