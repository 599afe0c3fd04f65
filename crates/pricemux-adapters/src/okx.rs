//! OKX protocol adapter.
//!
//! OKX v5 uses a static public endpoint with `{"op":"subscribe"}` /
//! `{"op":"unsubscribe"}` envelopes, so the symbol set can change without
//! a reconnect. Tickers arrive on the `tickers` channel; the 24h change is
//! derived from `last` and `open24h` (OKX does not send it directly).
//! Liveness is the literal text `ping`, answered with `pong`.

use crate::adapter::{Probe, ProtocolAdapter};
use crate::error::{AdapterError, AdapterResult};
use pricemux_core::{normalize_symbol, symbol::split_symbol, ExchangeId, PriceUpdate};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;

const DEFAULT_ENDPOINT: &str = "wss://ws.okx.com:8443/ws/v5/public";

/// Data frame: `{"arg": {...}, "data": [{...}]}`.
#[derive(Debug, Deserialize)]
struct DataFrame {
    arg: ChannelArg,
    #[serde(default)]
    data: Vec<TickerMsg>,
}

#[derive(Debug, Deserialize)]
struct ChannelArg {
    channel: String,
    #[allow(dead_code)]
    #[serde(rename = "instId", default)]
    inst_id: Option<String>,
}

/// One `tickers` channel entry. Numerics are strings.
#[derive(Debug, Deserialize)]
struct TickerMsg {
    #[serde(rename = "instId")]
    inst_id: String,
    last: String,
    #[serde(rename = "open24h")]
    open_24h: String,
    #[serde(rename = "vol24h")]
    vol_24h: String,
}

/// OKX market-data adapter.
pub struct OkxAdapter {
    endpoint: String,
}

impl OkxAdapter {
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

    fn op_message(&self, op: &str, symbols: &[String]) -> String {
        let args: Vec<_> = symbols
            .iter()
            .map(|s| json!({"channel": "tickers", "instId": self.to_wire(s)}))
            .collect();
        json!({"op": op, "args": args}).to_string()
    }

    fn update_from_ticker(&self, msg: &TickerMsg) -> AdapterResult<PriceUpdate> {
        let last = Self::parse_decimal("last", &msg.last)?;
        let open = Self::parse_decimal("open24h", &msg.open_24h)?;
        let volume = Self::parse_decimal("vol24h", &msg.vol_24h)?;

        let change = last - open;
        let change_percent = if open.is_zero() {
            Decimal::ZERO
        } else {
            change / open * Decimal::from(100)
        };

        Ok(PriceUpdate::new(
            self.from_wire(&msg.inst_id),
            ExchangeId::Okx,
            last,
            change,
            change_percent,
            volume,
        ))
    }
}

impl Default for OkxAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtocolAdapter for OkxAdapter {
    fn exchange(&self) -> ExchangeId {
        ExchangeId::Okx
    }

    fn endpoint(&self, _symbols: &[String]) -> String {
        self.endpoint.clone()
    }

    fn subscribe_messages(&self, symbols: &[String]) -> Vec<String> {
        if symbols.is_empty() {
            return Vec::new();
        }
        vec![self.op_message("subscribe", symbols)]
    }

    fn unsubscribe_messages(&self, symbols: &[String]) -> Vec<String> {
        if symbols.is_empty() {
            return Vec::new();
        }
        vec![self.op_message("unsubscribe", symbols)]
    }

    fn supports_incremental(&self) -> bool {
        true
    }

    fn parse(&self, frame: &str) -> AdapterResult<Vec<PriceUpdate>> {
        // Probe response arrives as bare text, not JSON.
        if frame == "pong" {
            return Ok(Vec::new());
        }

        let value: serde_json::Value = serde_json::from_str(frame)?;

        // Subscribe/unsubscribe acks and error events carry no price data.
        if value.get("event").is_some() {
            return Ok(Vec::new());
        }

        let data_frame: DataFrame = serde_json::from_value(value)?;
        if data_frame.arg.channel != "tickers" {
            return Ok(Vec::new());
        }

        data_frame
            .data
            .iter()
            .map(|t| self.update_from_ticker(t))
            .collect()
    }

    fn to_wire(&self, symbol: &str) -> String {
        let canonical = normalize_symbol(symbol);
        match split_symbol(&canonical) {
            Some((base, quote)) => format!("{base}-{quote}"),
            None => canonical,
        }
    }

    fn from_wire(&self, wire: &str) -> String {
        normalize_symbol(wire)
    }

    fn probe(&self) -> Probe {
        Probe::Text("ping".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn ticker_frame() -> String {
        json!({
            "arg": {"channel": "tickers", "instId": "BTC-USDT"},
            "data": [{
                "instId": "BTC-USDT",
                "last": "50500",
                "open24h": "50000",
                "vol24h": "321.5"
            }]
        })
        .to_string()
    }

    #[test]
    fn test_subscribe_message_shape() {
        let adapter = OkxAdapter::new();
        let msgs = adapter.subscribe_messages(&["BTCUSDT".to_string(), "ETHUSDT".to_string()]);
        assert_eq!(msgs.len(), 1);

        let parsed: serde_json::Value = serde_json::from_str(&msgs[0]).unwrap();
        assert_eq!(parsed["op"], "subscribe");
        assert_eq!(parsed["args"][0]["instId"], "BTC-USDT");
        assert_eq!(parsed["args"][1]["instId"], "ETH-USDT");
    }

    #[test]
    fn test_parse_ticker_derives_change() {
        let adapter = OkxAdapter::new();
        let updates = adapter.parse(&ticker_frame()).unwrap();

        assert_eq!(updates.len(), 1);
        let u = &updates[0];
        assert_eq!(u.symbol, "BTCUSDT");
        assert_eq!(u.exchange, ExchangeId::Okx);
        assert_eq!(u.price, dec!(50500));
        assert_eq!(u.price_change, dec!(500));
        assert_eq!(u.price_change_percent, dec!(1));
        assert_eq!(u.volume, dec!(321.5));
    }

    #[test]
    fn test_parse_ack_and_pong_are_control() {
        let adapter = OkxAdapter::new();
        let ack = json!({
            "event": "subscribe",
            "arg": {"channel": "tickers", "instId": "BTC-USDT"}
        })
        .to_string();

        assert!(adapter.parse(&ack).unwrap().is_empty());
        assert!(adapter.parse("pong").unwrap().is_empty());
    }

    #[test]
    fn test_parse_zero_open_yields_zero_percent() {
        let adapter = OkxAdapter::new();
        let frame = json!({
            "arg": {"channel": "tickers", "instId": "XYZ-USDT"},
            "data": [{"instId": "XYZ-USDT", "last": "5", "open24h": "0", "vol24h": "1"}]
        })
        .to_string();

        let updates = adapter.parse(&frame).unwrap();
        assert_eq!(updates[0].price_change_percent, Decimal::ZERO);
    }

    #[test]
    fn test_wire_mapping() {
        let adapter = OkxAdapter::new();
        assert_eq!(adapter.to_wire("BTCUSDT"), "BTC-USDT");
        assert_eq!(adapter.from_wire("BTC-USDT"), "BTCUSDT");
        assert_eq!(adapter.from_wire(&adapter.to_wire("ETHUSDC")), "ETHUSDC");
    }

    #[test]
    fn test_unsubscribe_empty_is_noop() {
        let adapter = OkxAdapter::new();
        assert!(adapter.unsubscribe_messages(&[]).is_empty());
    }
}
