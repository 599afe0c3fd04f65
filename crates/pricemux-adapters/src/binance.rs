//! Binance protocol adapter.
//!
//! Binance encodes subscriptions in the connection URL (combined streams,
//! one `<symbol>@ticker` entry per instrument) and sends no post-connect
//! handshake. Changing the symbol set therefore requires a reconnect.
//! Liveness uses protocol-level ping frames; the server pings us as well.

use crate::adapter::{Probe, ProtocolAdapter};
use crate::error::{AdapterError, AdapterResult};
use pricemux_core::{normalize_symbol, ExchangeId, PriceUpdate};
use rust_decimal::Decimal;
use serde::Deserialize;

const DEFAULT_ENDPOINT: &str = "wss://stream.binance.com:9443";

/// Combined-stream envelope: `{"stream": "btcusdt@ticker", "data": {...}}`.
#[derive(Debug, Deserialize)]
struct StreamEnvelope {
    #[allow(dead_code)]
    stream: String,
    data: TickerMsg,
}

/// 24hr rolling ticker payload.
///
/// Binance sends numeric values as strings.
#[derive(Debug, Deserialize)]
struct TickerMsg {
    /// Event type, `24hrTicker`.
    #[serde(rename = "e")]
    event: String,
    /// Symbol (already delimiter-free, e.g. `BTCUSDT`).
    #[serde(rename = "s")]
    symbol: String,
    /// Last price.
    #[serde(rename = "c")]
    last_price: String,
    /// 24h absolute price change.
    #[serde(rename = "p")]
    price_change: String,
    /// 24h relative price change, percent.
    #[serde(rename = "P")]
    price_change_percent: String,
    /// 24h base-asset volume.
    #[serde(rename = "v")]
    volume: String,
}

/// Binance market-data adapter.
pub struct BinanceAdapter {
    endpoint: String,
}

impl BinanceAdapter {
    pub fn new() -> Self {
        Self::with_endpoint(DEFAULT_ENDPOINT)
    }

    /// Use a custom endpoint base (tests point this at a local server).
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }

    fn parse_decimal(field: &str, s: &str) -> AdapterResult<Decimal> {
        s.parse()
            .map_err(|_| AdapterError::Parse(format!("invalid {field}: {s}")))
    }

    fn update_from_ticker(&self, msg: &TickerMsg) -> AdapterResult<PriceUpdate> {
        if msg.event != "24hrTicker" {
            return Err(AdapterError::UnsupportedFrame(msg.event.clone()));
        }

        Ok(PriceUpdate::new(
            normalize_symbol(&msg.symbol),
            ExchangeId::Binance,
            Self::parse_decimal("price", &msg.last_price)?,
            Self::parse_decimal("price change", &msg.price_change)?,
            Self::parse_decimal("price change percent", &msg.price_change_percent)?,
            Self::parse_decimal("volume", &msg.volume)?,
        ))
    }
}

impl Default for BinanceAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtocolAdapter for BinanceAdapter {
    fn exchange(&self) -> ExchangeId {
        ExchangeId::Binance
    }

    fn endpoint(&self, symbols: &[String]) -> String {
        let streams = symbols
            .iter()
            .map(|s| format!("{}@ticker", self.to_wire(s)))
            .collect::<Vec<_>>()
            .join("/");
        format!("{}/stream?streams={streams}", self.endpoint)
    }

    fn handshake(&self, _symbols: &[String]) -> Vec<String> {
        Vec::new()
    }

    fn subscribe_messages(&self, _symbols: &[String]) -> Vec<String> {
        Vec::new()
    }

    fn unsubscribe_messages(&self, _symbols: &[String]) -> Vec<String> {
        Vec::new()
    }

    fn supports_incremental(&self) -> bool {
        false
    }

    fn parse(&self, frame: &str) -> AdapterResult<Vec<PriceUpdate>> {
        let value: serde_json::Value = serde_json::from_str(frame)?;

        // Ack shape ({"result": ..., "id": ...}) is a control frame.
        if value.get("id").is_some() {
            return Ok(Vec::new());
        }

        // Combined-stream envelope, falling back to the bare payload for
        // single-stream (`/ws/<symbol>@ticker`) connections.
        let ticker = if value.get("stream").is_some() {
            let envelope: StreamEnvelope = serde_json::from_value(value)?;
            envelope.data
        } else {
            serde_json::from_value(value)?
        };

        Ok(vec![self.update_from_ticker(&ticker)?])
    }

    fn to_wire(&self, symbol: &str) -> String {
        normalize_symbol(symbol).to_ascii_lowercase()
    }

    fn from_wire(&self, wire: &str) -> String {
        normalize_symbol(wire)
    }

    fn probe(&self) -> Probe {
        Probe::Frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn ticker_frame() -> String {
        json!({
            "stream": "btcusdt@ticker",
            "data": {
                "e": "24hrTicker",
                "s": "BTCUSDT",
                "c": "50123.45",
                "p": "523.45",
                "P": "1.055",
                "v": "12345.678"
            }
        })
        .to_string()
    }

    #[test]
    fn test_endpoint_encodes_symbols() {
        let adapter = BinanceAdapter::new();
        let url = adapter.endpoint(&["BTCUSDT".to_string(), "ETHUSDT".to_string()]);
        assert_eq!(
            url,
            "wss://stream.binance.com:9443/stream?streams=btcusdt@ticker/ethusdt@ticker"
        );
    }

    #[test]
    fn test_no_handshake() {
        let adapter = BinanceAdapter::new();
        assert!(adapter.handshake(&["BTCUSDT".to_string()]).is_empty());
        assert!(!adapter.supports_incremental());
    }

    #[test]
    fn test_parse_combined_stream_ticker() {
        let adapter = BinanceAdapter::new();
        let updates = adapter.parse(&ticker_frame()).unwrap();

        assert_eq!(updates.len(), 1);
        let u = &updates[0];
        assert_eq!(u.symbol, "BTCUSDT");
        assert_eq!(u.exchange, ExchangeId::Binance);
        assert_eq!(u.price, dec!(50123.45));
        assert_eq!(u.price_change, dec!(523.45));
        assert_eq!(u.price_change_percent, dec!(1.055));
        assert_eq!(u.volume, dec!(12345.678));
    }

    #[test]
    fn test_parse_bare_ticker() {
        let adapter = BinanceAdapter::new();
        let frame = json!({
            "e": "24hrTicker",
            "s": "ETHUSDT",
            "c": "3000",
            "p": "-30",
            "P": "-0.99",
            "v": "987"
        })
        .to_string();

        let updates = adapter.parse(&frame).unwrap();
        assert_eq!(updates[0].symbol, "ETHUSDT");
        assert_eq!(updates[0].price_change, dec!(-30));
    }

    #[test]
    fn test_parse_ack_is_control() {
        let adapter = BinanceAdapter::new();
        let updates = adapter.parse(r#"{"result":null,"id":1}"#).unwrap();
        assert!(updates.is_empty());
    }

    #[test]
    fn test_parse_malformed_is_error() {
        let adapter = BinanceAdapter::new();
        assert!(adapter.parse("not json").is_err());
        assert!(adapter
            .parse(r#"{"stream":"x","data":{"e":"24hrTicker","s":"BTCUSDT","c":"abc","p":"0","P":"0","v":"0"}}"#)
            .is_err());
    }

    #[test]
    fn test_wire_mapping_roundtrip() {
        let adapter = BinanceAdapter::new();
        assert_eq!(adapter.to_wire("BTCUSDT"), "btcusdt");
        assert_eq!(adapter.from_wire("btcusdt"), "BTCUSDT");
    }
}
