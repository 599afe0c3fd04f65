//! The protocol adapter seam.

use crate::error::AdapterResult;
use crate::{BinanceAdapter, GateAdapter, OkxAdapter};
use pricemux_core::{ExchangeId, PriceUpdate};
use std::sync::Arc;

/// Liveness probe kind for an exchange.
///
/// Some venues expect a WebSocket protocol ping frame, others a text
/// payload of their own. The connection driver sends whatever the adapter
/// specifies at each heartbeat interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe {
    /// Protocol-level ping frame (empty payload).
    Frame,
    /// Exchange-specific text message.
    Text(String),
}

/// Pure translation layer between one exchange's wire format and the
/// canonical event model.
///
/// Implementations are stateless (an endpoint override for tests aside)
/// and never perform I/O. A returned empty vec from [`parse`] means the
/// frame was a non-price control message (subscription ack, pong).
///
/// [`parse`]: ProtocolAdapter::parse
pub trait ProtocolAdapter: Send + Sync {
    /// The venue this adapter speaks for.
    fn exchange(&self) -> ExchangeId;

    /// Connection endpoint for the given canonical symbols.
    ///
    /// Venues that encode subscriptions in the URL (Binance) bake the
    /// symbol list into the path; others return a static endpoint.
    fn endpoint(&self, symbols: &[String]) -> String;

    /// Messages to send immediately after the socket opens.
    ///
    /// Defaults to the incremental subscribe messages; URL-subscribed
    /// venues override this to return nothing.
    fn handshake(&self, symbols: &[String]) -> Vec<String> {
        self.subscribe_messages(symbols)
    }

    /// Incremental subscribe messages for symbols added while live.
    fn subscribe_messages(&self, symbols: &[String]) -> Vec<String>;

    /// Incremental unsubscribe messages for symbols removed while live.
    fn unsubscribe_messages(&self, symbols: &[String]) -> Vec<String>;

    /// Whether the symbol set can change without a reconnect.
    fn supports_incremental(&self) -> bool;

    /// Parse one inbound text frame.
    ///
    /// Returns all price updates carried by the frame, an empty vec for
    /// control frames, or an error for malformed input. Errors are logged
    /// and swallowed at the connection boundary.
    fn parse(&self, frame: &str) -> AdapterResult<Vec<PriceUpdate>>;

    /// Canonical symbol -> exchange wire format (e.g. `BTCUSDT` -> `BTC-USDT`).
    fn to_wire(&self, symbol: &str) -> String;

    /// Exchange wire format -> canonical symbol.
    fn from_wire(&self, wire: &str) -> String;

    /// Liveness probe for this venue.
    fn probe(&self) -> Probe;
}

/// Construct the default adapter for an exchange.
pub fn adapter_for(exchange: ExchangeId) -> Arc<dyn ProtocolAdapter> {
    match exchange {
        ExchangeId::Binance => Arc::new(BinanceAdapter::new()),
        ExchangeId::Okx => Arc::new(OkxAdapter::new()),
        ExchangeId::Gate => Arc::new(GateAdapter::new()),
    }
}
