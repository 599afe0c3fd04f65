//! Gate protocol adapter.
//!
//! Gate v4 uses a static endpoint with `spot.tickers` subscribe/
//! unsubscribe envelopes (timestamped, `payload` of wire symbols), so the
//! symbol set can change without a reconnect. Tickers carry a relative 24h
//! change only; the absolute change is derived from it. Liveness is a
//! `spot.ping` channel message answered by `spot.pong`.

use crate::adapter::{Probe, ProtocolAdapter};
use crate::error::{AdapterError, AdapterResult};
use chrono::Utc;
use pricemux_core::{normalize_symbol, symbol::split_symbol, ExchangeId, PriceUpdate};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;

const DEFAULT_ENDPOINT: &str = "wss://api.gateio.ws/ws/v4/";

/// Channel frame: `{"time":..,"channel":"spot.tickers","event":"update","result":{...}}`.
#[derive(Debug, Deserialize)]
struct ChannelFrame {
    channel: String,
    event: String,
    #[serde(default)]
    result: Option<serde_json::Value>,
}

/// `spot.tickers` update payload. Numerics are strings.
#[derive(Debug, Deserialize)]
struct TickerMsg {
    currency_pair: String,
    last: String,
    change_percentage: String,
    base_volume: String,
}

/// Gate market-data adapter.
pub struct GateAdapter {
    endpoint: String,
}

impl GateAdapter {
    pub fn new() -> Self {
        Self::with_endpoint(DEFAULT_ENDPOINT)
    }

    /// Use a custom endpoint (tests point this at a local server).
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }

    fn parse_decimal(field: &str, s: &str) -> AdapterResult<Decimal> {
        s.parse()
            .map_err(|_| AdapterError::Parse(format!("invalid {field}: {s}")))
    }

    fn event_message(&self, event: &str, symbols: &[String]) -> String {
        let payload: Vec<String> = symbols.iter().map(|s| self.to_wire(s)).collect();
        json!({
            "time": Utc::now().timestamp(),
            "channel": "spot.tickers",
            "event": event,
            "payload": payload,
        })
        .to_string()
    }

    fn update_from_ticker(&self, msg: &TickerMsg) -> AdapterResult<PriceUpdate> {
        let last = Self::parse_decimal("last", &msg.last)?;
        let change_percent = Self::parse_decimal("change_percentage", &msg.change_percentage)?;
        let volume = Self::parse_decimal("base_volume", &msg.base_volume)?;

        // Gate only sends the relative change. Recover the absolute change
        // from last = prev * (1 + pct/100); a -100% move would make the
        // divisor zero, in which case the change collapses to `last`.
        let divisor = Decimal::from(100) + change_percent;
        let change = if divisor.is_zero() {
            last
        } else {
            last - last * Decimal::from(100) / divisor
        };

        Ok(PriceUpdate::new(
            self.from_wire(&msg.currency_pair),
            ExchangeId::Gate,
            last,
            change,
            change_percent,
            volume,
        ))
    }
}

impl Default for GateAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtocolAdapter for GateAdapter {
    fn exchange(&self) -> ExchangeId {
        ExchangeId::Gate
    }

    fn endpoint(&self, _symbols: &[String]) -> String {
        self.endpoint.clone()
    }

    fn subscribe_messages(&self, symbols: &[String]) -> Vec<String> {
        if symbols.is_empty() {
            return Vec::new();
        }
        vec![self.event_message("subscribe", symbols)]
    }

    fn unsubscribe_messages(&self, symbols: &[String]) -> Vec<String> {
        if symbols.is_empty() {
            return Vec::new();
        }
        vec![self.event_message("unsubscribe", symbols)]
    }

    fn supports_incremental(&self) -> bool {
        true
    }

    fn parse(&self, frame: &str) -> AdapterResult<Vec<PriceUpdate>> {
        let channel_frame: ChannelFrame = serde_json::from_str(frame)?;

        // Pongs and subscribe acks are control frames.
        if channel_frame.channel != "spot.tickers" || channel_frame.event != "update" {
            return Ok(Vec::new());
        }

        let result = channel_frame
            .result
            .ok_or_else(|| AdapterError::Parse("tickers update without result".to_string()))?;
        let ticker: TickerMsg = serde_json::from_value(result)?;

        Ok(vec![self.update_from_ticker(&ticker)?])
    }

    fn to_wire(&self, symbol: &str) -> String {
        let canonical = normalize_symbol(symbol);
        match split_symbol(&canonical) {
            Some((base, quote)) => format!("{base}_{quote}"),
            None => canonical,
        }
    }

    fn from_wire(&self, wire: &str) -> String {
        normalize_symbol(wire)
    }

    fn probe(&self) -> Probe {
        Probe::Text(
            json!({"time": Utc::now().timestamp(), "channel": "spot.ping"}).to_string(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn ticker_frame() -> String {
        json!({
            "time": 1700000000,
            "channel": "spot.tickers",
            "event": "update",
            "result": {
                "currency_pair": "BTC_USDT",
                "last": "50500",
                "change_percentage": "1",
                "base_volume": "777.7"
            }
        })
        .to_string()
    }

    #[test]
    fn test_subscribe_message_shape() {
        let adapter = GateAdapter::new();
        let msgs = adapter.subscribe_messages(&["BTCUSDT".to_string()]);
        assert_eq!(msgs.len(), 1);

        let parsed: serde_json::Value = serde_json::from_str(&msgs[0]).unwrap();
        assert_eq!(parsed["channel"], "spot.tickers");
        assert_eq!(parsed["event"], "subscribe");
        assert_eq!(parsed["payload"][0], "BTC_USDT");
        assert!(parsed["time"].is_i64());
    }

    #[test]
    fn test_parse_ticker_update() {
        let adapter = GateAdapter::new();
        let updates = adapter.parse(&ticker_frame()).unwrap();

        assert_eq!(updates.len(), 1);
        let u = &updates[0];
        assert_eq!(u.symbol, "BTCUSDT");
        assert_eq!(u.exchange, ExchangeId::Gate);
        assert_eq!(u.price, dec!(50500));
        assert_eq!(u.price_change_percent, dec!(1));
        assert_eq!(u.volume, dec!(777.7));
        // prev close = 50500 / 1.01 = 50000, so change = 500.
        assert_eq!(u.price_change.round_dp(6), dec!(500));
    }

    #[test]
    fn test_parse_ack_and_pong_are_control() {
        let adapter = GateAdapter::new();
        let ack = json!({
            "time": 1700000000,
            "channel": "spot.tickers",
            "event": "subscribe",
            "result": {"status": "success"}
        })
        .to_string();
        let pong = json!({
            "time": 1700000001,
            "channel": "spot.pong",
            "event": "",
        })
        .to_string();

        assert!(adapter.parse(&ack).unwrap().is_empty());
        assert!(adapter.parse(&pong).unwrap().is_empty());
    }

    #[test]
    fn test_parse_malformed_is_error() {
        let adapter = GateAdapter::new();
        let bad = json!({
            "time": 1,
            "channel": "spot.tickers",
            "event": "update",
            "result": {"currency_pair": "BTC_USDT", "last": "x", "change_percentage": "0", "base_volume": "0"}
        })
        .to_string();

        assert!(adapter.parse(&bad).is_err());
    }

    #[test]
    fn test_wire_mapping() {
        let adapter = GateAdapter::new();
        assert_eq!(adapter.to_wire("BTCUSDT"), "BTC_USDT");
        assert_eq!(adapter.from_wire("BTC_USDT"), "BTCUSDT");
    }

    #[test]
    fn test_probe_is_spot_ping() {
        let adapter = GateAdapter::new();
        match adapter.probe() {
            Probe::Text(text) => {
                let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
                assert_eq!(parsed["channel"], "spot.ping");
            }
            Probe::Frame => panic!("expected text probe"),
        }
    }
}
