//! Latest-price cache.
//!
//! Keeps the most recent `PriceUpdate` per (exchange, symbol). This is the
//! in-memory view REST-style consumers read instead of tailing the stream;
//! the pump task refreshes it on every update regardless of whether any
//! stream consumer is registered.

use dashmap::DashMap;
use pricemux_core::{ExchangeId, PriceUpdate};

/// Most recent update per (exchange, symbol).
#[derive(Debug, Default)]
pub struct LatestPrices {
    entries: DashMap<(ExchangeId, String), PriceUpdate>,
}

impl LatestPrices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an update, replacing any previous value for its key.
    pub fn record(&self, update: &PriceUpdate) {
        self.entries
            .insert((update.exchange, update.symbol.clone()), update.clone());
    }

    /// Latest update for one instrument on one exchange.
    pub fn get(&self, exchange: ExchangeId, symbol: &str) -> Option<PriceUpdate> {
        self.entries
            .get(&(exchange, symbol.to_string()))
            .map(|entry| entry.value().clone())
    }

    /// All latest updates for one exchange.
    pub fn for_exchange(&self, exchange: ExchangeId) -> Vec<PriceUpdate> {
        self.entries
            .iter()
            .filter(|entry| entry.key().0 == exchange)
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Every cached update.
    pub fn all(&self) -> Vec<PriceUpdate> {
        self.entries
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
