//! Boundary request types.
//!
//! These are the shapes the outer API layer hands to the feed manager;
//! they deserialize straight from its transport.

use pricemux_core::ExchangeId;
use serde::{Deserialize, Serialize};

/// Requested mutation of an exchange's symbol set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionAction {
    Add,
    Remove,
}

/// Subscribe or unsubscribe symbols on one exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionRequest {
    pub exchange: ExchangeId,
    pub symbols: Vec<String>,
    pub action: SubscriptionAction,
}

/// Explicit reconnect request for one exchange.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ReconnectRequest {
    pub exchange: ExchangeId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscription_request_json() {
        let json = r#"{"exchange":"binance","symbols":["BTCUSDT"],"action":"add"}"#;
        let request: SubscriptionRequest = serde_json::from_str(json).unwrap();

        assert_eq!(request.exchange, ExchangeId::Binance);
        assert_eq!(request.action, SubscriptionAction::Add);
        assert_eq!(request.symbols, vec!["BTCUSDT".to_string()]);
    }

    #[test]
    fn test_reconnect_request_json() {
        let json = r#"{"exchange":"gate"}"#;
        let request: ReconnectRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.exchange, ExchangeId::Gate);
    }
}
