//! Subscription registry.
//!
//! Tracks, per exchange, the set of symbols that should currently be
//! streamed. Symbols are normalized on entry so callers can pass any wire
//! spelling. Mutations are visible immediately to concurrent readers.

use parking_lot::RwLock;
use pricemux_core::{normalize_symbol, ExchangeId};
use std::collections::{HashMap, HashSet};

/// Desired symbol set per exchange.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    symbols: RwLock<HashMap<ExchangeId, HashSet<String>>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add symbols for an exchange. Adding an existing symbol is a no-op.
    ///
    /// Returns true when the set actually changed.
    pub fn add_symbols(&self, exchange: ExchangeId, symbols: &[String]) -> bool {
        let mut map = self.symbols.write();
        let set = map.entry(exchange).or_default();
        let mut changed = false;
        for symbol in symbols {
            changed |= set.insert(normalize_symbol(symbol));
        }
        changed
    }

    /// Remove symbols for an exchange. Removing an absent symbol is a no-op.
    ///
    /// Returns true when the set actually changed.
    pub fn remove_symbols(&self, exchange: ExchangeId, symbols: &[String]) -> bool {
        let mut map = self.symbols.write();
        let Some(set) = map.get_mut(&exchange) else {
            return false;
        };
        let mut changed = false;
        for symbol in symbols {
            changed |= set.remove(&normalize_symbol(symbol));
        }
        changed
    }

    /// Current symbol set for an exchange.
    pub fn current_symbols(&self, exchange: ExchangeId) -> HashSet<String> {
        self.symbols
            .read()
            .get(&exchange)
            .cloned()
            .unwrap_or_default()
    }

    /// Current symbols as a sorted vec, for deterministic endpoint and
    /// handshake construction.
    pub fn current_sorted(&self, exchange: ExchangeId) -> Vec<String> {
        let mut symbols: Vec<String> = self.current_symbols(exchange).into_iter().collect();
        symbols.sort();
        symbols
    }

    /// Drop all state for an exchange.
    pub fn remove_exchange(&self, exchange: ExchangeId) {
        self.symbols.write().remove(&exchange);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbols(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_add_and_current() {
        let registry = SubscriptionRegistry::new();
        assert!(registry.add_symbols(ExchangeId::Binance, &symbols(&["BTCUSDT", "ETHUSDT"])));

        let current = registry.current_symbols(ExchangeId::Binance);
        assert_eq!(current.len(), 2);
        assert!(current.contains("BTCUSDT"));
    }

    #[test]
    fn test_add_normalizes() {
        let registry = SubscriptionRegistry::new();
        registry.add_symbols(ExchangeId::Okx, &symbols(&["btc-usdt"]));
        assert!(registry.current_symbols(ExchangeId::Okx).contains("BTCUSDT"));
    }

    #[test]
    fn test_duplicate_add_is_noop() {
        let registry = SubscriptionRegistry::new();
        assert!(registry.add_symbols(ExchangeId::Gate, &symbols(&["BTCUSDT"])));
        assert!(!registry.add_symbols(ExchangeId::Gate, &symbols(&["BTCUSDT"])));
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let registry = SubscriptionRegistry::new();
        assert!(!registry.remove_symbols(ExchangeId::Gate, &symbols(&["BTCUSDT"])));

        registry.add_symbols(ExchangeId::Gate, &symbols(&["BTCUSDT"]));
        assert!(registry.remove_symbols(ExchangeId::Gate, &symbols(&["BTCUSDT"])));
        assert!(registry.current_symbols(ExchangeId::Gate).is_empty());
    }

    #[test]
    fn test_exchanges_are_independent() {
        let registry = SubscriptionRegistry::new();
        registry.add_symbols(ExchangeId::Binance, &symbols(&["BTCUSDT"]));
        registry.add_symbols(ExchangeId::Okx, &symbols(&["ETHUSDT"]));

        assert!(!registry.current_symbols(ExchangeId::Binance).contains("ETHUSDT"));
        assert!(!registry.current_symbols(ExchangeId::Okx).contains("BTCUSDT"));
    }

    #[test]
    fn test_current_sorted_is_deterministic() {
        let registry = SubscriptionRegistry::new();
        registry.add_symbols(ExchangeId::Binance, &symbols(&["ETHUSDT", "BTCUSDT", "SOLUSDT"]));
        assert_eq!(
            registry.current_sorted(ExchangeId::Binance),
            symbols(&["BTCUSDT", "ETHUSDT", "SOLUSDT"])
        );
    }
}
